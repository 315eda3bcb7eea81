pub mod models;
pub mod orientation;
pub mod pipeline;
pub mod quaternion;
pub mod settings;
pub mod strategy;
