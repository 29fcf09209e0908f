//! Render graph for AR sessions
//!
//! Scene nodes, the render camera and the renderer seam. The frame loop only
//! reads this graph and moves the reticle and camera; placement and session
//! cleanup are the only writers of its topology.

pub mod camera;
pub mod renderer;
pub mod scene3d;

pub use camera::Camera3D;
pub use renderer::{DrawCall, RecordingRenderer, RenderLog, Renderer};
pub use scene3d::{Node3D, NodeId, Scene3D};
