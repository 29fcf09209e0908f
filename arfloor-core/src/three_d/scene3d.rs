//! 3D scene graph holding the reticle and placed content

use crate::three_d::Camera3D;
use crate::xr::Pose;
use glam::Mat4;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Stable identifier of a node in a [`Scene3D`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// A node in the 3D scene graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node3D {
    /// Node name
    pub name: String,
    /// World transform
    pub transform: Mat4,
    /// Whether the node is drawn
    pub visible: bool,
    /// Content identifier the node renders, if any
    pub content: Option<String>,
}

impl Node3D {
    /// Create a new visible node at the origin
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::IDENTITY,
            visible: true,
            content: None,
        }
    }

    /// Attach a content identifier
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set the transform
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }
}

/// The render graph
///
/// The reticle node exists for the lifetime of the scene; only its transform
/// and visibility change. Every other node is inserted by placement and
/// removed by session cleanup.
#[derive(Debug, Clone)]
pub struct Scene3D {
    /// Scene name
    pub name: String,
    /// Active camera
    pub camera: Camera3D,
    nodes: FxHashMap<NodeId, Node3D>,
    /// Insertion order of nodes, reticle first
    order: Vec<NodeId>,
    reticle: NodeId,
    next_id: u64,
}

impl Scene3D {
    /// Create a scene with a hidden reticle
    pub fn new(name: impl Into<String>) -> Self {
        let mut scene = Self {
            name: name.into(),
            camera: Camera3D::default(),
            nodes: FxHashMap::default(),
            order: Vec::new(),
            reticle: NodeId(0),
            next_id: 0,
        };
        let mut reticle = Node3D::new("reticle").with_content("reticle");
        reticle.visible = false;
        scene.reticle = scene.add_node(reticle);
        scene
    }

    /// Add a node to the scene
    pub fn add_node(&mut self, node: Node3D) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        self.order.push(id);
        id
    }

    /// Remove a node. The reticle cannot be removed.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node3D> {
        if id == self.reticle {
            return None;
        }
        let node = self.nodes.remove(&id)?;
        self.order.retain(|&existing| existing != id);
        Some(node)
    }

    /// Get a node
    pub fn node(&self, id: NodeId) -> Option<&Node3D> {
        self.nodes.get(&id)
    }

    /// Get a mutable node
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node3D> {
        self.nodes.get_mut(&id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node3D)> {
        self.order
            .iter()
            .filter_map(move |id| self.nodes.get(id).map(|node| (*id, node)))
    }

    /// Nodes that will be drawn
    pub fn visible_nodes(&self) -> impl Iterator<Item = (NodeId, &Node3D)> {
        self.nodes().filter(|(_, node)| node.visible)
    }

    /// Number of nodes, reticle included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the scene holds only the reticle
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Identifier of the reticle node
    pub fn reticle_id(&self) -> NodeId {
        self.reticle
    }

    /// Show the reticle at `pose`, or hide it
    pub fn set_reticle(&mut self, pose: Option<&Pose>) {
        if let Some(reticle) = self.nodes.get_mut(&self.reticle) {
            match pose {
                Some(pose) => {
                    reticle.transform = pose.matrix();
                    reticle.visible = true;
                }
                None => reticle.visible = false,
            }
        }
    }

    /// Whether the reticle is currently shown
    pub fn reticle_visible(&self) -> bool {
        self.node(self.reticle).map_or(false, |node| node.visible)
    }

    /// Pose of the reticle while it is shown
    pub fn reticle_pose(&self) -> Option<Pose> {
        self.node(self.reticle)
            .filter(|node| node.visible)
            .map(|node| Pose::from_matrix(node.transform))
    }
}
