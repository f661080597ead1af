//! Partition and probing configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

pub const MAX_PARTITION_DEPTH: u32 = 100;

/// Settings for [`BspTree`](crate::BspTree) construction and probing.
///
/// ```
/// use reverb_scene::PartitionConfig;
///
/// let config = PartitionConfig::from_toml_str("max_depth = 4\nray_distance = 2000.0").unwrap();
/// assert_eq!(config.max_depth, 4);
/// assert_eq!(config.search_radius, PartitionConfig::default().search_radius);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Deepest split level (1-100). The root is depth 0.
    pub max_depth: u32,
    /// Length of each probe ray, in scene units.
    pub ray_distance: f32,
    /// Nodes whose longest side is at or below this are not split further.
    pub min_leaf_size: f32,
    /// Radius used when blending leaves around a listener.
    pub search_radius: f32,
    /// Upper bound on the number of leaves a build may create.
    pub max_leaves: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            ray_distance: 5000.0,
            min_leaf_size: 100.0,
            search_radius: 1000.0,
            max_leaves: 1 << 16,
        }
    }
}

impl PartitionConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_PARTITION_DEPTH).contains(&self.max_depth) {
            return Err(Error::InvalidDepth(self.max_depth));
        }
        if !(self.ray_distance.is_finite() && self.ray_distance > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "ray_distance must be positive, got {}",
                self.ray_distance
            )));
        }
        if !(self.min_leaf_size.is_finite() && self.min_leaf_size > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "min_leaf_size must be positive, got {}",
                self.min_leaf_size
            )));
        }
        if !(self.search_radius.is_finite() && self.search_radius > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "search_radius must be positive, got {}",
                self.search_radius
            )));
        }
        if self.max_leaves == 0 {
            return Err(Error::InvalidConfig("max_leaves must be at least 1".into()));
        }
        Ok(())
    }
}
