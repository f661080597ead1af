//! Scene-side feature extraction for procedural reverb.
//!
//! The playable volume is split into a [`BspTree`]; every leaf is probed with six
//! axis-aligned rays through a host-supplied [`SceneProbe`], and the probes near
//! a listener are blended into the 15-float [`FeatureVector`](reverb_core::FeatureVector)
//! the inference scheduler consumes.
//!
//! ```
//! use reverb_scene::{Aabb, BoxRoom, BspTree, PartitionConfig, Vec3};
//!
//! let bounds = Aabb::new(Vec3::ZERO, Vec3::new(1200.0, 800.0, 300.0));
//! let mut tree = BspTree::build(bounds, &PartitionConfig::default()).unwrap();
//! tree.collect_acoustic_data(&BoxRoom::new(bounds));
//!
//! let features = tree.sample_features(Vec3::new(300.0, 400.0, 150.0), 500.0).unwrap();
//! assert_eq!(features.len(), 15);
//! ```

mod blend;
mod bsp;
mod config;
mod error;
mod geometry;
mod probe;

pub use blend::WeightedLeaf;
pub use bsp::{BspNode, BspTree, LeafData, LeafId};
pub use config::{PartitionConfig, MAX_PARTITION_DEPTH};
pub use error::{Error, Result};
pub use geometry::{Aabb, Vec3};
pub use probe::{AcousticProbe, BoxRoom, Direction, RayHit, SceneProbe, SurfaceMaterial, PROBE_FEATURE_LEN};
