//! Render camera driven by platform-supplied view matrices

use crate::xr::View;
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Camera used for each render pass
///
/// During a session the transform and projection are copied verbatim from the
/// platform's view; nothing is derived locally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera3D {
    /// Camera-to-world transform
    pub transform: Mat4,
    /// Projection matrix
    pub projection: Mat4,
}

impl Camera3D {
    /// Create a perspective camera looking at `target`. Only used before the
    /// first frame of a session.
    pub fn new_perspective(position: Vec3, target: Vec3, fov: f32, aspect_ratio: f32) -> Self {
        Self {
            transform: Mat4::look_at_rh(position, target, Vec3::Y).inverse(),
            projection: Mat4::perspective_rh(fov, aspect_ratio, 0.01, 1000.0),
        }
    }

    /// Take transform and projection from a platform view
    pub fn set_from_view(&mut self, view: &View) {
        self.transform = view.transform.matrix();
        self.projection = view.projection;
    }

    /// Camera position in world space
    pub fn position(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }
}

impl Default for Camera3D {
    fn default() -> Self {
        Self::new_perspective(
            Vec3::new(0.0, 1.6, 0.0),
            Vec3::new(0.0, 1.6, -1.0),
            std::f32::consts::FRAC_PI_4,
            1.0,
        )
    }
}
