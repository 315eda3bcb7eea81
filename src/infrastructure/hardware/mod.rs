//! Hardware collaborators: motors, encoders, and mode switches. Each is a
//! narrow trait the control core drives; the in-tree implementations stand
//! in for board-level drivers.

pub mod actuator;
pub mod encoder;
pub mod switches;
