//! Synthetic test scenes
//!
//! Each scene scatters a seeded, uniformly random set of points over a disc
//! and lifts them onto a surface. The point count is density × disc area.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use wolkenbase_core::geometry::Cube;
use wolkenbase_core::threads::PointSource;
use wolkenbase_core::{LasPoint, Xyz};

/// Seed used unless a scene is given another
pub const DEFAULT_SEED: u64 = 0x776f_6c6b;

/// Cross section of a street 15 m wide: a crowned road, a curb, then level
/// ground
pub fn street(x: f64) -> f64 {
    let x = x.abs();
    if x < 7.2 {
        -x / 50.0
    } else if x < 7.4 {
        -0.15
    } else {
        0.0
    }
}

type Surface = Box<dyn Fn(f64, f64) -> f64 + Send>;

/// A random point cloud over a surface
pub struct Scene {
    name: String,
    radius: f64,
    bounds: Cube,
    remaining: u64,
    emitted: u64,
    rng: StdRng,
    surface: Surface,
}

impl Scene {
    fn new(name: &str, radius: f64, density: f64, z_extent: f64, surface: Surface) -> Self {
        let count = (density * PI * radius * radius).round().max(0.0) as u64;
        let half = radius.max(z_extent) + 1.0;
        Self {
            name: name.to_string(),
            radius,
            bounds: Cube::new(Xyz::new(0.0, 0.0, 0.0), 2.0 * half),
            remaining: count,
            emitted: 0,
            rng: StdRng::seed_from_u64(DEFAULT_SEED),
            surface,
        }
    }

    /// Same scene drawn from another seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Points not yet produced
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Iterator for Scene {
    type Item = LasPoint;

    fn next(&mut self) -> Option<LasPoint> {
        if self.remaining == 0 {
            return None;
        }
        let r = self.radius;
        let (x, y) = loop {
            let x = self.rng.random_range(-r..=r);
            let y = self.rng.random_range(-r..=r);
            if x * x + y * y <= r * r {
                break (x, y);
            }
        };
        let location = Xyz::new(x, y, (self.surface)(x, y));
        let point = LasPoint {
            intensity: self.rng.random_range(100..4000),
            return_num: 1,
            n_returns: 1,
            gps_time: self.emitted as f64 * 1e-5,
            ..LasPoint::at(location)
        };
        self.remaining -= 1;
        self.emitted += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl PointSource for Scene {
    fn name(&self) -> &str {
        &self.name
    }

    fn bounds(&self) -> Cube {
        self.bounds
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("radius", &self.radius)
            .field("remaining", &self.remaining)
            .finish()
    }
}

/// Level disc at z = 0
pub fn flat_scene(radius: f64, density: f64) -> Scene {
    Scene::new("flat", radius, density, 0.0, Box::new(|_, _| 0.0))
}

/// Egg-crate surface `avg + amp·sin(freq·x)·sin(freq·y)`
pub fn wavy_scene(radius: f64, density: f64, avg: f64, amp: f64, freq: f64) -> Scene {
    Scene::new(
        "wavy",
        radius,
        density,
        avg.abs() + amp.abs(),
        Box::new(move |x, y| avg + amp * (freq * x).sin() * (freq * y).sin()),
    )
}

/// Two streets crossing at right angles through the origin
pub fn street_scene(radius: f64, density: f64) -> Scene {
    Scene::new(
        "street",
        radius,
        density,
        0.15,
        Box::new(|x, y| street(x).min(street(y))),
    )
}

/// Scene by name, with the wavy scene at 1 m amplitude and 0.1 rad/m
pub fn scene_by_name(name: &str, radius: f64, density: f64) -> Option<Scene> {
    match name {
        "flat" => Some(flat_scene(radius, density)),
        "wavy" => Some(wavy_scene(radius, density, 0.0, 1.0, 0.1)),
        "street" => Some(street_scene(radius, density)),
        _ => None,
    }
}
