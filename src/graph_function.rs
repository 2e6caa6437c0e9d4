//! Parametric surface functions.
//!
//! Every function maps grid coordinates `(u, v)` in `[-1, 1)` and a time `t`
//! to a position in the graph's local space. They are pure and can be called
//! from anywhere.

use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// The closed set of functions a graph can display.
///
/// The discriminant order is the selector index exposed to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphFunction {
    #[default]
    Sine,
    Sine2D,
    MultiSine,
    MultiSine2D,
    Ripple,
    Cylinder,
    Sphere,
    Torus,
}

impl GraphFunction {
    /// All functions in selector order.
    pub const ALL: [GraphFunction; 8] = [
        Self::Sine,
        Self::Sine2D,
        Self::MultiSine,
        Self::MultiSine2D,
        Self::Ripple,
        Self::Cylinder,
        Self::Sphere,
        Self::Torus,
    ];

    /// Selector index of this function.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up a function by selector index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sine => "sine",
            Self::Sine2D => "sine2d",
            Self::MultiSine => "multisine",
            Self::MultiSine2D => "multisine2d",
            Self::Ripple => "ripple",
            Self::Cylinder => "cylinder",
            Self::Sphere => "sphere",
            Self::Torus => "torus",
        }
    }

    /// Evaluate the function at `(u, v)` for time `t`.
    pub fn evaluate(self, u: f32, v: f32, t: f32) -> Vec3 {
        match self {
            Self::Sine => sine(u, v, t),
            Self::Sine2D => sine_2d(u, v, t),
            Self::MultiSine => multi_sine(u, v, t),
            Self::MultiSine2D => multi_sine_2d(u, v, t),
            Self::Ripple => ripple(u, v, t),
            Self::Cylinder => cylinder(u, v, t),
            Self::Sphere => sphere(u, v, t),
            Self::Torus => torus(u, v, t),
        }
    }
}

impl fmt::Display for GraphFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GraphFunction {
    type Err = String;

    /// Accepts a function name (case-insensitive) or its selector index.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(index) = s.parse::<usize>() {
            return Self::from_index(index)
                .ok_or_else(|| format!("function index {} out of range 0..{}", index, Self::ALL.len()));
        }
        let lower = s.to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name() == lower)
            .ok_or_else(|| format!("unknown function '{}'", s))
    }
}

/// Single wave travelling along x.
pub fn sine(u: f32, v: f32, t: f32) -> Vec3 {
    Vec3::new(u, (PI * (u + t)).sin(), v)
}

/// Two waves along x, the second at double frequency and speed.
pub fn multi_sine(u: f32, v: f32, t: f32) -> Vec3 {
    let mut y = (PI * (u + t)).sin();
    y += (2.0 * PI * (u + 2.0 * t)).sin() / 2.0;
    y *= 2.0 / 3.0;
    Vec3::new(u, y, v)
}

/// Average of independent waves along x and z.
pub fn sine_2d(u: f32, v: f32, t: f32) -> Vec3 {
    let mut y = (PI * (u + t)).sin();
    y += (PI * (v + t)).sin();
    y *= 0.5;
    Vec3::new(u, y, v)
}

/// Diagonal main wave plus an x wave and a fast z wave, normalized to [-1, 1].
pub fn multi_sine_2d(u: f32, v: f32, t: f32) -> Vec3 {
    let mut y = 4.0 * (PI * (u + v + t / 2.0)).sin();
    y += (PI * (u + t)).sin();
    y += (2.0 * PI * (v + 2.0 * t)).sin() * 0.5;
    y *= 1.0 / 5.5;
    Vec3::new(u, y, v)
}

/// Radial wave damped with distance from the origin.
pub fn ripple(u: f32, v: f32, t: f32) -> Vec3 {
    let d = (u * u + v * v).sqrt();
    let mut y = (PI * (4.0 * d - t)).sin();
    y /= 1.0 + 10.0 * d;
    Vec3::new(u, y, v)
}

/// Cylinder around the y axis with a twisting radius.
pub fn cylinder(u: f32, v: f32, t: f32) -> Vec3 {
    let r = 0.8 + (PI * (6.0 * u + 2.0 * v + t)).sin() * 0.2;
    Vec3::new(r * (PI * u).sin(), v, r * (PI * u).cos())
}

/// Sphere with a radius perturbed along both u and v.
pub fn sphere(u: f32, v: f32, t: f32) -> Vec3 {
    let mut r = 0.8 + (PI * (6.0 * u + t)).sin() * 0.1;
    r += (PI * (4.0 * v + t)).sin() * 0.1;
    let s = r * (PI * 0.5 * v).cos();
    Vec3::new(s * (PI * u).sin(), r * (PI * 0.5 * v).sin(), s * (PI * u).cos())
}

/// Torus whose major radius ripples with u and minor radius with v.
pub fn torus(u: f32, v: f32, t: f32) -> Vec3 {
    let r1 = 0.65 + (PI * (6.0 * u + t)).sin() * 0.1;
    let r2 = 0.2 + (PI * (4.0 * v + t)).sin() * 0.05;
    let s = r2 * (PI * v).cos() + r1;
    Vec3::new(s * (PI * u).sin(), r2 * (PI * v).sin(), s * (PI * u).cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    const SAMPLES: [(f32, f32, f32); 5] = [
        (-0.9, -0.9, 0.0),
        (0.0, 0.0, 0.0),
        (0.35, -0.6, 1.25),
        (-0.45, 0.75, 3.5),
        (0.95, 0.05, -2.0),
    ];

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn test_sine_first_grid_point() {
        let p = GraphFunction::Sine.evaluate(-0.9, -0.9, 0.0);
        assert!(approx(p.x, -0.9));
        assert!(approx(p.z, -0.9));
        assert!((p.y - (-0.309017)).abs() < 1e-4);
    }

    #[test]
    fn test_sine_closed_form() {
        for (u, v, t) in SAMPLES {
            assert!(approx(sine(u, v, t).y, (PI * (u + t)).sin()));
        }
    }

    #[test]
    fn test_height_functions_keep_xz() {
        let height_fns = [
            GraphFunction::Sine,
            GraphFunction::Sine2D,
            GraphFunction::MultiSine,
            GraphFunction::MultiSine2D,
            GraphFunction::Ripple,
        ];
        for f in height_fns {
            for (u, v, t) in SAMPLES {
                let p = f.evaluate(u, v, t);
                assert_eq!(p.x, u, "{} moved x", f);
                assert_eq!(p.z, v, "{} moved z", f);
            }
        }
    }

    #[test]
    fn test_sine_2d_closed_form() {
        for (u, v, t) in SAMPLES {
            let expected = 0.5 * ((PI * (u + t)).sin() + (PI * (v + t)).sin());
            assert!(approx(sine_2d(u, v, t).y, expected));
        }
    }

    #[test]
    fn test_multi_sine_closed_form() {
        for (u, v, t) in SAMPLES {
            let expected = 2.0 / 3.0 * ((PI * (u + t)).sin() + 0.5 * (2.0 * PI * (u + 2.0 * t)).sin());
            assert!(approx(multi_sine(u, v, t).y, expected));
        }
    }

    #[test]
    fn test_multi_sine_2d_closed_form() {
        for (u, v, t) in SAMPLES {
            let expected = (4.0 * (PI * (u + v + 0.5 * t)).sin()
                + (PI * (u + t)).sin()
                + 0.5 * (2.0 * PI * (v + 2.0 * t)).sin())
                / 5.5;
            assert!(approx(multi_sine_2d(u, v, t).y, expected));
        }
    }

    #[test]
    fn test_ripple_damped_at_origin_and_edges() {
        // sin(-pi t) at the origin, undamped
        assert!(approx(ripple(0.0, 0.0, 0.5).y, (-PI * 0.5).sin()));

        for (u, v, t) in SAMPLES {
            let d = (u * u + v * v).sqrt();
            let y = ripple(u, v, t).y;
            assert!(y.abs() <= 1.0 / (1.0 + 10.0 * d) + EPS);
        }
    }

    #[test]
    fn test_ripple_closed_form() {
        for (u, v, t) in SAMPLES {
            let d = (u * u + v * v).sqrt();
            let expected = (PI * (4.0 * d - t)).sin() / (1.0 + 10.0 * d);
            assert!(approx(ripple(u, v, t).y, expected));
        }
    }

    #[test]
    fn test_cylinder_radius() {
        for (u, v, t) in SAMPLES {
            let p = cylinder(u, v, t);
            let r = 0.8 + 0.2 * (PI * (6.0 * u + 2.0 * v + t)).sin();
            assert!(approx((p.x * p.x + p.z * p.z).sqrt(), r));
            assert!(approx(p.y, v));
        }
    }

    #[test]
    fn test_sphere_surface_distance() {
        for (u, v, t) in SAMPLES {
            let p = sphere(u, v, t);
            let r = 0.8 + 0.1 * (PI * (6.0 * u + t)).sin() + 0.1 * (PI * (4.0 * v + t)).sin();
            assert!(approx(p.length(), r), "|p| = {} expected {}", p.length(), r);
            let axis_dist = (p.x * p.x + p.z * p.z).sqrt();
            assert!(approx(axis_dist, r * (PI * 0.5 * v).cos()));
        }
    }

    #[test]
    fn test_torus_surface_distance() {
        for (u, v, t) in SAMPLES {
            let p = torus(u, v, t);
            let r1 = 0.65 + 0.1 * (PI * (6.0 * u + t)).sin();
            let r2 = 0.2 + 0.05 * (PI * (4.0 * v + t)).sin();
            // Distance from the tube's centre circle equals the minor radius.
            let axis_dist = (p.x * p.x + p.z * p.z).sqrt();
            let tube = ((axis_dist - r1).powi(2) + p.y * p.y).sqrt();
            assert!(approx(tube, r2), "tube {} expected {}", tube, r2);
        }
    }

    #[test]
    fn test_selector_index_round_trip() {
        for (i, f) in GraphFunction::ALL.iter().enumerate() {
            assert_eq!(f.index(), i);
            assert_eq!(GraphFunction::from_index(i), Some(*f));
        }
        assert_eq!(GraphFunction::from_index(8), None);
    }

    #[test]
    fn test_function_parsing() {
        assert_eq!("Ripple".parse::<GraphFunction>(), Ok(GraphFunction::Ripple));
        assert_eq!("multisine2d".parse::<GraphFunction>(), Ok(GraphFunction::MultiSine2D));
        assert_eq!("7".parse::<GraphFunction>(), Ok(GraphFunction::Torus));
        assert!("8".parse::<GraphFunction>().is_err());
        assert!("wobble".parse::<GraphFunction>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&GraphFunction::Sine2D).unwrap();
        assert_eq!(json, "\"sine2d\"");
        let parsed: GraphFunction = serde_json::from_str("\"torus\"").unwrap();
        assert_eq!(parsed, GraphFunction::Torus);
    }
}
