//! Quaternion algebra for the control pipeline.
//!
//! The remote IMU streams unit quaternions; everything here assumes inputs
//! are at least close to unit magnitude and renormalizes only where a step
//! could drift.

use std::ops::Mul;

/// Angles below this are interpolated with a linear blend; the sin-ratio
/// form of slerp degenerates as `omega` approaches zero.
const SMALL_ANGLE: f32 = 1e-4;

/// A `(w, x, y, z)` rotation quaternion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// The no-rotation quaternion.
    pub const IDENTITY: Self = Self {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation of `angle` radians about `axis` (need not be unit length).
    pub fn from_axis_angle(axis: [f32; 3], angle: f32) -> Self {
        let norm = (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]).sqrt();
        if norm < f32::EPSILON {
            return Self::IDENTITY;
        }
        let (sin, cos) = (angle / 2.0).sin_cos();
        Self {
            w: cos,
            x: axis[0] / norm * sin,
            y: axis[1] / norm * sin,
            z: axis[2] / norm * sin,
        }
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.w * rhs.w + self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// The same rotation with every component negated. `q` and `-q`
    /// represent the same orientation but interpolate along opposite arcs.
    pub fn negated(self) -> Self {
        Self {
            w: -self.w,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }

    /// The inverse rotation, assuming unit magnitude.
    pub fn conjugate(self) -> Self {
        Self {
            w: self.w,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }

    pub fn magnitude(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit-magnitude copy; identity when the magnitude is degenerate.
    pub fn normalized(self) -> Self {
        let mag = self.magnitude();
        if mag < f32::EPSILON {
            return Self::IDENTITY;
        }
        self.scaled(1.0 / mag)
    }

    pub fn scaled(self, s: f32) -> Self {
        Self {
            w: self.w * s,
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    /// Component-wise sum, used to assemble interpolation results.
    pub fn sum(self, rhs: Self) -> Self {
        Self {
            w: self.w + rhs.w,
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl Mul for Quaternion {
    type Output = Self;

    /// Hamilton product: `self * rhs` applies `rhs` first, then `self`.
    fn mul(self, rhs: Self) -> Self {
        Self {
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        }
    }
}

/// Flip `target` onto the same hemisphere as `current` so interpolation
/// takes the shorter great-circle arc. Returns the corrected target and
/// the (now non-negative) dot product.
pub fn shortest_path(current: Quaternion, target: Quaternion) -> (Quaternion, f32) {
    let dot = current.dot(target);
    if dot < 0.0 {
        (target.negated(), -dot)
    } else {
        (target, dot)
    }
}

/// Spherical linear interpolation between two unit quaternions.
///
/// Applies the shortest-path correction, then blends with the standard
/// sin-ratio weights. Falls back to a normalized linear blend when the
/// angular distance is too small for the ratios to be well conditioned.
pub fn slerp(current: Quaternion, target: Quaternion, t: f32) -> Quaternion {
    let current = current.normalized();
    let (target, dot) = shortest_path(current, target.normalized());
    let dot = dot.clamp(0.0, 1.0);
    let omega = dot.acos();

    if omega < SMALL_ANGLE {
        return current.scaled(1.0 - t).sum(target.scaled(t)).normalized();
    }

    let sin_omega = omega.sin();
    current
        .scaled(((1.0 - t) * omega).sin() / sin_omega)
        .sum(target.scaled((t * omega).sin() / sin_omega))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Quaternion, b: Quaternion) {
        assert!(a.dot(b).abs() > 0.9999, "{a:?} != {b:?}");
    }

    #[test]
    fn shortest_path_makes_dot_non_negative() {
        let current = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 0.3);
        let target = Quaternion::from_axis_angle([0.0, 1.0, 0.0], 2.5).negated();
        assert!(current.dot(target) < 0.0);

        let (corrected, dot) = shortest_path(current, target);
        assert!(dot >= 0.0);
        assert!((current.dot(corrected) - dot).abs() < 1e-6);
    }

    #[test]
    fn slerp_hits_both_endpoints() {
        let a = Quaternion::from_axis_angle([1.0, 0.0, 0.0], 0.4);
        let b = Quaternion::from_axis_angle([0.0, 1.0, 0.0], 1.1);
        assert_close(slerp(a, b, 0.0), a);
        assert_close(slerp(a, b, 1.0), b);
    }

    #[test]
    fn slerp_midpoint_is_unit_magnitude() {
        let a = Quaternion::IDENTITY;
        let b = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 1.6);
        let mid = slerp(a, b, 0.5);
        assert!((mid.magnitude() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn slerp_degenerate_arc_uses_linear_blend() {
        let a = Quaternion::IDENTITY;
        let b = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 1e-6);
        let out = slerp(a, b, 0.5);
        assert!((out.magnitude() - 1.0).abs() < 1e-5);
        assert_close(out, a);
    }

    #[test]
    fn conjugate_product_recovers_delta() {
        let a = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 0.2);
        let b = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 0.5);
        let delta = a.conjugate() * b;
        let expected = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 0.3);
        assert_close(delta, expected);
    }
}
