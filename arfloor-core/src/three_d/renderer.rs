//! Renderer seam used by the frame loop

use crate::error::XrError;
use crate::three_d::{Camera3D, NodeId, Scene3D};
use crate::xr::{CompositorLayer, FramebufferId, Viewport};
use async_trait::async_trait;
use glam::Mat4;
use std::cell::RefCell;
use std::rc::Rc;

/// Draws the scene into the compositor's framebuffer
#[async_trait(?Send)]
pub trait Renderer {
    /// Prepare the render surface for use with an immersive session
    async fn make_xr_compatible(&mut self) -> Result<(), XrError>;

    /// Route subsequent draws to the compositor layer
    fn bind_framebuffer(&mut self, layer: &CompositorLayer);

    /// Restrict drawing to one view's sub-rectangle
    fn set_viewport(&mut self, viewport: Viewport);

    /// Draw every visible node once through `camera`
    fn render(&mut self, scene: &Scene3D, camera: &Camera3D) -> Result<(), XrError>;
}

/// One recorded render pass
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// Framebuffer bound at draw time
    pub framebuffer: Option<FramebufferId>,
    /// Viewport set at draw time
    pub viewport: Option<Viewport>,
    /// Camera transform used
    pub camera_transform: Mat4,
    /// Projection used
    pub projection: Mat4,
    /// Nodes drawn, reticle included when visible
    pub nodes: Vec<NodeId>,
}

/// Shared record of what a [`RecordingRenderer`] was asked to do
#[derive(Debug, Default)]
pub struct RenderLog {
    /// Whether `make_xr_compatible` succeeded
    pub xr_compatible: bool,
    /// Every framebuffer bind, in order
    pub binds: Vec<FramebufferId>,
    /// Every render pass, in order
    pub draws: Vec<DrawCall>,
    /// Refuse `make_xr_compatible`
    pub refuse_compatibility: bool,
    /// Number of upcoming render passes that fail
    pub pending_failures: u32,
}

/// Renderer that records passes instead of drawing
///
/// Used by tests and trace replay. The log is shared so it can be inspected
/// after the renderer has been handed to a session manager.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    log: Rc<RefCell<RenderLog>>,
    bound: Option<FramebufferId>,
    viewport: Option<Viewport>,
}

impl RecordingRenderer {
    /// Create a renderer with an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the log
    pub fn log(&self) -> Rc<RefCell<RenderLog>> {
        Rc::clone(&self.log)
    }

    /// Make the next `count` render passes fail
    pub fn fail_next(&self, count: u32) {
        self.log.borrow_mut().pending_failures += count;
    }
}

#[async_trait(?Send)]
impl Renderer for RecordingRenderer {
    async fn make_xr_compatible(&mut self) -> Result<(), XrError> {
        let mut log = self.log.borrow_mut();
        if log.refuse_compatibility {
            return Err(XrError::new("render context cannot be made XR compatible"));
        }
        log.xr_compatible = true;
        Ok(())
    }

    fn bind_framebuffer(&mut self, layer: &CompositorLayer) {
        self.bound = Some(layer.framebuffer);
        self.log.borrow_mut().binds.push(layer.framebuffer);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    fn render(&mut self, scene: &Scene3D, camera: &Camera3D) -> Result<(), XrError> {
        let mut log = self.log.borrow_mut();
        if log.pending_failures > 0 {
            log.pending_failures -= 1;
            return Err(XrError::new("draw submitted with stale matrices"));
        }
        log.draws.push(DrawCall {
            framebuffer: self.bound,
            viewport: self.viewport,
            camera_transform: camera.transform,
            projection: camera.projection,
            nodes: scene.visible_nodes().map(|(id, _)| id).collect(),
        });
        Ok(())
    }
}
