//! Acoustic probes: six axis-aligned rays cast from a point.
//!
//! Feature encoding (15 floats):
//!
//! | Index | Value |
//! |-------|-------|
//! | 0-2 | length (front+back), width (left+right), height (up+down) |
//! | 3-8 | distances: front, back, right, left, up, down |
//! | 9-14 | material codes in the same direction order |

use crate::geometry::{Aabb, Vec3};
use reverb_core::FeatureVector;
use serde::{Deserialize, Serialize};

pub const PROBE_FEATURE_LEN: usize = 15;

/// Integer surface-material code. 0 is the default surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SurfaceMaterial(pub u8);

impl SurfaceMaterial {
    pub const DEFAULT: Self = Self(0);

    pub fn code(&self) -> f32 {
        self.0 as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Front,
    Back,
    Right,
    Left,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::Front,
        Direction::Back,
        Direction::Right,
        Direction::Left,
        Direction::Up,
        Direction::Down,
    ];

    pub fn vector(self) -> Vec3 {
        match self {
            Direction::Front => Vec3::X,
            Direction::Back => Vec3::X * -1.0,
            Direction::Right => Vec3::Y,
            Direction::Left => Vec3::Y * -1.0,
            Direction::Up => Vec3::Z,
            Direction::Down => Vec3::Z * -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub material: SurfaceMaterial,
}

/// Ray queries against the host's scene geometry.
pub trait SceneProbe {
    /// First blocking hit along `direction` within `max_distance`, if any.
    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit>;
}

/// Distances and materials around one point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcousticProbe {
    /// Indexed by [`Direction`] order.
    pub distances: [f32; 6],
    pub materials: [SurfaceMaterial; 6],
}

impl AcousticProbe {
    /// Cast the six rays. A miss records `ray_distance` and the default material.
    pub fn capture(scene: &dyn SceneProbe, origin: Vec3, ray_distance: f32) -> Self {
        let mut distances = [ray_distance; 6];
        let mut materials = [SurfaceMaterial::DEFAULT; 6];
        for (i, dir) in Direction::ALL.iter().enumerate() {
            if let Some(hit) = scene.cast_ray(origin, dir.vector(), ray_distance) {
                distances[i] = hit.distance.clamp(0.0, ray_distance);
                materials[i] = hit.material;
            }
        }
        Self {
            distances,
            materials,
        }
    }

    pub fn distance(&self, dir: Direction) -> f32 {
        self.distances[dir as usize]
    }

    pub fn material(&self, dir: Direction) -> SurfaceMaterial {
        self.materials[dir as usize]
    }

    /// `(length, width, height)` of the space around the probe.
    pub fn room_dimensions(&self) -> (f32, f32, f32) {
        (
            self.distance(Direction::Front) + self.distance(Direction::Back),
            self.distance(Direction::Left) + self.distance(Direction::Right),
            self.distance(Direction::Up) + self.distance(Direction::Down),
        )
    }

    pub fn encode(&self) -> [f32; PROBE_FEATURE_LEN] {
        let (length, width, height) = self.room_dimensions();
        let mut out = [0.0; PROBE_FEATURE_LEN];
        out[0] = length;
        out[1] = width;
        out[2] = height;
        out[3..9].copy_from_slice(&self.distances);
        for (slot, m) in out[9..].iter_mut().zip(&self.materials) {
            *slot = m.code();
        }
        out
    }

    pub fn to_features(&self) -> reverb_core::Result<FeatureVector> {
        FeatureVector::new(self.encode().to_vec())
    }
}

/// A closed shoebox room: every ray hits a wall. Handy for tests and prototyping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxRoom {
    pub bounds: Aabb,
    /// Indexed by [`Direction`] order (the wall each direction runs into).
    pub materials: [SurfaceMaterial; 6],
}

impl BoxRoom {
    pub fn new(bounds: Aabb) -> Self {
        Self {
            bounds,
            materials: [SurfaceMaterial::DEFAULT; 6],
        }
    }

    pub fn with_materials(mut self, materials: [SurfaceMaterial; 6]) -> Self {
        self.materials = materials;
        self
    }
}

impl SceneProbe for BoxRoom {
    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
        if !self.bounds.contains(origin) {
            return None;
        }
        let (idx, distance) = Direction::ALL
            .iter()
            .enumerate()
            .find(|(_, d)| d.vector() == direction)
            .map(|(i, d)| {
                let distance = match d {
                    Direction::Front => self.bounds.max.x - origin.x,
                    Direction::Back => origin.x - self.bounds.min.x,
                    Direction::Right => self.bounds.max.y - origin.y,
                    Direction::Left => origin.y - self.bounds.min.y,
                    Direction::Up => self.bounds.max.z - origin.z,
                    Direction::Down => origin.z - self.bounds.min.z,
                };
                (i, distance)
            })?;
        (distance <= max_distance).then_some(RayHit {
            distance,
            material: self.materials[idx],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn room() -> BoxRoom {
        BoxRoom::new(Aabb::new(Vec3::ZERO, Vec3::new(10.0, 6.0, 3.0))).with_materials([
            SurfaceMaterial(1),
            SurfaceMaterial(2),
            SurfaceMaterial(3),
            SurfaceMaterial(4),
            SurfaceMaterial(5),
            SurfaceMaterial(6),
        ])
    }

    #[test]
    fn test_capture_in_room() {
        let probe = AcousticProbe::capture(&room(), Vec3::new(2.0, 3.0, 1.0), 100.0);
        assert_eq!(probe.distance(Direction::Front), 8.0);
        assert_eq!(probe.distance(Direction::Back), 2.0);
        assert_eq!(probe.distance(Direction::Down), 1.0);
        assert_eq!(probe.material(Direction::Left), SurfaceMaterial(4));
    }

    #[test]
    fn test_misses_use_ray_distance() {
        let probe = AcousticProbe::capture(&room(), Vec3::new(2.0, 3.0, 1.0), 4.0);
        assert_eq!(probe.distance(Direction::Front), 4.0);
        assert_eq!(probe.material(Direction::Front), SurfaceMaterial::DEFAULT);
        assert_eq!(probe.distance(Direction::Back), 2.0);
    }

    #[test]
    fn test_encoding_order() {
        let probe = AcousticProbe::capture(&room(), Vec3::new(2.0, 3.0, 1.0), 100.0);
        let f = probe.encode();
        assert_relative_eq!(f[0], 10.0);
        assert_relative_eq!(f[1], 6.0);
        assert_relative_eq!(f[2], 3.0);
        assert_eq!(&f[3..9], &[8.0, 2.0, 3.0, 3.0, 2.0, 1.0]);
        assert_eq!(&f[9..], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(probe.to_features().unwrap().len(), PROBE_FEATURE_LEN);
    }
}
