//! Binary space partition of the playable volume.
//!
//! Each node covers an axis-aligned box; internal nodes split their box at the
//! centre of its longest axis. Leaves hold the acoustic data sampled at their
//! centre and, optionally, reverb parameters precomputed for that data.

use crate::config::PartitionConfig;
use crate::error::{Error, Result};
use crate::geometry::{Aabb, Vec3};
use crate::probe::{AcousticProbe, SceneProbe};
use reverb_core::ReverbParameters;

/// Index of a leaf within its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafId(usize);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeafData {
    pub probe: Option<AcousticProbe>,
    pub parameters: Option<ReverbParameters>,
}

#[derive(Debug, Clone, PartialEq)]
enum NodeKind {
    Split { axis: usize, left: usize, right: usize },
    Leaf(LeafData),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BspNode {
    bounds: Aabb,
    depth: u32,
    kind: NodeKind,
}

impl BspNode {
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    pub fn data(&self) -> Option<&LeafData> {
        match &self.kind {
            NodeKind::Leaf(data) => Some(data),
            NodeKind::Split { .. } => None,
        }
    }
}

/// Arena-backed BSP tree. Node 0 is the root.
#[derive(Debug, Clone)]
pub struct BspTree {
    nodes: Vec<BspNode>,
    leaves: Vec<usize>,
    config: PartitionConfig,
}

impl BspTree {
    pub fn build(bounds: Aabb, config: &PartitionConfig) -> Result<Self> {
        if !bounds.is_valid() {
            return Err(Error::InvalidBounds(format!("{bounds:?}")));
        }
        config.validate()?;

        let planned = 1u128 << planned_depth(bounds, config);
        if planned > config.max_leaves as u128 {
            return Err(Error::TooManyLeaves {
                planned,
                limit: config.max_leaves,
            });
        }

        let mut tree = Self {
            nodes: Vec::new(),
            leaves: Vec::new(),
            config: config.clone(),
        };
        tree.partition(bounds, 0);

        tracing::debug!(
            "Built BSP tree: {} nodes, {} leaves (max depth {})",
            tree.nodes.len(),
            tree.leaves.len(),
            config.max_depth
        );
        Ok(tree)
    }

    fn partition(&mut self, bounds: Aabb, depth: u32) -> usize {
        let index = self.nodes.len();
        let axis = bounds.longest_axis();
        let is_leaf = stops_at(&bounds, axis, depth, &self.config);

        if is_leaf {
            self.nodes.push(BspNode {
                bounds,
                depth,
                kind: NodeKind::Leaf(LeafData::default()),
            });
            self.leaves.push(index);
            return index;
        }

        // Placeholder until both children exist.
        self.nodes.push(BspNode {
            bounds,
            depth,
            kind: NodeKind::Leaf(LeafData::default()),
        });
        let (lo, hi) = bounds.split(axis);
        let left = self.partition(lo, depth + 1);
        let right = self.partition(hi, depth + 1);
        self.nodes[index].kind = NodeKind::Split { axis, left, right };
        index
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    pub fn bounds(&self) -> &Aabb {
        &self.nodes[0].bounds
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn leaves(&self) -> impl Iterator<Item = (LeafId, &BspNode)> + '_ {
        self.leaves
            .iter()
            .map(move |&i| (LeafId(i), &self.nodes[i]))
    }

    pub fn leaf(&self, id: LeafId) -> Option<&BspNode> {
        self.nodes.get(id.0).filter(|n| n.is_leaf())
    }

    fn leaf_data_mut(&mut self, index: usize) -> Option<&mut LeafData> {
        match &mut self.nodes[index].kind {
            NodeKind::Leaf(data) => Some(data),
            NodeKind::Split { .. } => None,
        }
    }

    /// Probe every leaf centre against the scene. Returns the number of leaves probed.
    pub fn collect_acoustic_data(&mut self, scene: &dyn SceneProbe) -> usize {
        let ray_distance = self.config.ray_distance;
        let leaves = self.leaves.clone();
        for &i in &leaves {
            let probe = AcousticProbe::capture(scene, self.nodes[i].bounds.center(), ray_distance);
            if let Some(data) = self.leaf_data_mut(i) {
                data.probe = Some(probe);
            }
        }
        tracing::info!("Collected acoustic data for {} leaves", leaves.len());
        leaves.len()
    }

    /// Attach parameters to each probed leaf, e.g. from an offline model pass.
    /// Returns the number of leaves annotated.
    pub fn annotate<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&AcousticProbe) -> Option<ReverbParameters>,
    {
        let mut annotated = 0;
        for i in self.leaves.clone() {
            if let Some(data) = self.leaf_data_mut(i) {
                data.parameters = data.probe.as_ref().and_then(&mut f);
                if data.parameters.is_some() {
                    annotated += 1;
                }
            }
        }
        annotated
    }

    /// Leaf whose box contains `position`.
    pub fn find_leaf(&self, position: Vec3) -> Option<LeafId> {
        if !self.bounds().contains(position) {
            return None;
        }
        let mut index = 0;
        loop {
            match &self.nodes[index].kind {
                NodeKind::Leaf(_) => return Some(LeafId(index)),
                NodeKind::Split { axis, left, right } => {
                    let mid = self.nodes[*left].bounds.max.axis(*axis);
                    index = if position.axis(*axis) <= mid { *left } else { *right };
                }
            }
        }
    }

    /// Leaves whose closest point lies within `radius` of `position`.
    pub fn find_nearby(&self, position: Vec3, radius: f32) -> Vec<LeafId> {
        let mut found = Vec::new();
        if radius.is_nan() || radius < 0.0 {
            return found;
        }
        let mut stack = vec![0];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if node.bounds.distance_to(position) > radius {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf(_) => found.push(LeafId(index)),
                NodeKind::Split { left, right, .. } => {
                    stack.push(*right);
                    stack.push(*left);
                }
            }
        }
        found
    }
}

fn stops_at(bounds: &Aabb, axis: usize, depth: u32, config: &PartitionConfig) -> bool {
    depth >= config.max_depth || bounds.size().axis(axis) <= config.min_leaf_size
}

/// Depth the partition reaches. Halving keeps siblings the same size, so every
/// leaf ends at this depth.
fn planned_depth(mut bounds: Aabb, config: &PartitionConfig) -> u32 {
    let mut depth = 0;
    loop {
        let axis = bounds.longest_axis();
        if stops_at(&bounds, axis, depth, config) {
            return depth;
        }
        bounds = bounds.split(axis).0;
        depth += 1;
    }
}
