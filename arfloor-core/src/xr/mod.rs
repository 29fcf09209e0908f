//! Platform boundary for immersive AR sessions
//!
//! These traits describe what the device runtime offers: capability queries,
//! session negotiation, reference spaces, hit-testing, anchors and the
//! display-driven event stream. Nothing here is reimplemented by the crate;
//! [`simulated`] provides a deterministic stand-in for tests and trace replay.
//!
//! The whole boundary is single-threaded. Frame and selection events are
//! serialized by the compositor, so the async traits are `?Send`.

pub mod simulated;

use crate::error::{SessionRequestError, XrError};
use async_trait::async_trait;
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of session requested from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Camera passthrough with content composited over the real world
    ImmersiveAr,
    /// Fully virtual headset session
    ImmersiveVr,
    /// Non-immersive, rendered into the page
    Inline,
}

/// Optional capabilities negotiated at session request time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    /// Gravity-aligned floor reference space
    LocalFloor,
    /// Real-world hit-testing
    HitTest,
    /// Platform-tracked anchors
    Anchors,
    /// 2D overlay for instructions
    DomOverlay,
}

/// Features passed to `request_session`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Session fails if any of these is missing
    pub required: Vec<Feature>,
    /// Granted when available
    pub optional: Vec<Feature>,
}

impl FeatureSet {
    /// Required features for surface placement: floor space and hit-testing
    pub fn placement(optional: &[Feature]) -> Self {
        let required = vec![Feature::LocalFloor, Feature::HitTest];
        let optional = optional
            .iter()
            .copied()
            .filter(|feature| !required.contains(feature))
            .collect();
        Self { required, optional }
    }
}

/// Kinds of reference space used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceSpaceKind {
    /// Origin at the device, moves with it
    Viewer,
    /// Gravity-aligned, origin on the floor, stable for the session
    LocalFloor,
}

/// An acquired coordinate frame. Immutable once handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferenceSpace {
    id: u32,
    kind: ReferenceSpaceKind,
}

impl ReferenceSpace {
    /// Wrap a platform handle
    pub fn new(id: u32, kind: ReferenceSpaceKind) -> Self {
        Self { id, kind }
    }

    /// Platform handle
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Alignment semantics of this space
    pub fn kind(&self) -> ReferenceSpaceKind {
        self.kind
    }
}

/// A hit-test subscription bound to an origin space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HitTestSource {
    id: u32,
    space: ReferenceSpace,
}

impl HitTestSource {
    /// Wrap a platform handle
    pub fn new(id: u32, space: ReferenceSpace) -> Self {
        Self { id, space }
    }

    /// Platform handle
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Space the ray originates from
    pub fn space(&self) -> ReferenceSpace {
        self.space
    }
}

/// One intersection reported for a frame. Opaque; resolve it with
/// [`XrFrame::result_pose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HitTestResult {
    handle: u64,
}

impl HitTestResult {
    /// Wrap a platform handle
    pub fn new(handle: u64) -> Self {
        Self { handle }
    }

    /// Platform handle
    pub fn handle(&self) -> u64 {
        self.handle
    }
}

/// Position and orientation in some reference space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Translation in metres
    pub position: Vec3,
    /// Rotation
    #[serde(default)]
    pub orientation: Quat,
}

impl Pose {
    /// The origin of a space
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    /// Create a pose
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Pose at `position` with no rotation
    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    /// Decompose a rigid transform. Scale is discarded.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (_, orientation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            orientation,
        }
    }

    /// The 4×4 rigid transform for this pose
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }

    /// Express this pose in the frame whose origin sits at `origin`
    pub fn relative_to(&self, origin: &Pose) -> Pose {
        Pose::from_matrix(origin.matrix().inverse() * self.matrix())
    }

    /// Approximate equality of the underlying transforms
    pub fn abs_diff_eq(&self, other: &Pose, max_abs_diff: f32) -> bool {
        self.matrix().abs_diff_eq(other.matrix(), max_abs_diff)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Which eye a view is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Eye {
    /// Monoscopic view (handheld)
    None,
    /// Left eye of a stereo pair
    Left,
    /// Right eye of a stereo pair
    Right,
}

/// One render view supplied by the platform for a frame
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    /// Eye this view belongs to
    pub eye: Eye,
    /// Camera pose relative to the space the viewer pose was resolved in
    pub transform: Pose,
    /// Projection matrix to use verbatim
    pub projection: Mat4,
}

/// The device pose for one frame, with its views
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerPose {
    /// Device pose
    pub transform: Pose,
    /// One per eye, or a single monoscopic view
    pub views: Vec<View>,
}

/// Pixel rectangle inside the compositor framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Left edge
    pub x: u32,
    /// Bottom edge
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Platform framebuffer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FramebufferId(pub u32);

/// The platform-owned render destination composited with the camera feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositorLayer {
    /// Framebuffer to bind before drawing
    pub framebuffer: FramebufferId,
    /// Framebuffer width
    pub width: u32,
    /// Framebuffer height
    pub height: u32,
}

impl CompositorLayer {
    /// Viewport for a view: the full surface for a monoscopic view, the
    /// matching half for a stereo eye. `None` once the layer has no surface.
    pub fn viewport(&self, view: &View) -> Option<Viewport> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let half = self.width / 2;
        let viewport = match view.eye {
            Eye::None => Viewport {
                x: 0,
                y: 0,
                width: self.width,
                height: self.height,
            },
            Eye::Left => Viewport {
                x: 0,
                y: 0,
                width: half,
                height: self.height,
            },
            Eye::Right => Viewport {
                x: half,
                y: 0,
                width: self.width - half,
                height: self.height,
            },
        };
        Some(viewport)
    }
}

/// Handle for a registered display-driven callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(pub u32);

/// Handle for an in-flight anchor request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorRequestId(pub u64);

/// A platform-tracked anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Anchor {
    id: u64,
}

impl Anchor {
    /// Wrap a platform handle
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// Platform handle
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Session events that handlers can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Discrete primary action (screen tap, controller trigger)
    Select,
    /// Session ended, for any cause
    End,
}

/// Events delivered by the platform's display-driven loop
pub enum XrEvent {
    /// Display tick
    Frame {
        /// Display timestamp in milliseconds
        timestamp: f64,
        /// Frame state for this tick
        frame: Box<dyn XrFrame>,
    },
    /// Selection, carrying the frame active when it fired
    Select {
        /// Frame active at the moment of selection
        frame: Box<dyn XrFrame>,
    },
    /// Asynchronous result of [`XrFrame::create_anchor`]
    AnchorCreated {
        /// Request the result belongs to
        request: AnchorRequestId,
        /// Created anchor or rejection
        result: Result<Anchor, XrError>,
    },
    /// Termination, for any cause
    End,
}

impl fmt::Debug for XrEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XrEvent::Frame { timestamp, .. } => {
                f.debug_struct("Frame").field("timestamp", timestamp).finish()
            }
            XrEvent::Select { .. } => f.write_str("Select"),
            XrEvent::AnchorCreated { request, result } => f
                .debug_struct("AnchorCreated")
                .field("request", request)
                .field("result", result)
                .finish(),
            XrEvent::End => f.write_str("End"),
        }
    }
}

/// Capability query and session negotiation
#[async_trait(?Send)]
pub trait XrPlatform {
    /// Whether sessions of `mode` can be requested at all
    async fn is_session_supported(&self, mode: SessionMode) -> bool;

    /// Negotiate a session. Fails if the mode or any required feature is refused.
    async fn request_session(
        &self,
        mode: SessionMode,
        features: &FeatureSet,
    ) -> Result<Box<dyn XrSession>, SessionRequestError>;
}

/// A granted session
///
/// Registration methods are persistent: a callback or listener stays
/// registered until explicitly removed.
#[async_trait(?Send)]
pub trait XrSession {
    /// Create the compositor render target for this session
    fn create_compositor_layer(&mut self) -> Result<CompositorLayer, XrError>;

    /// Bind the compositor layer. Must precede the first frame callback.
    fn update_render_state(&mut self, layer: &CompositorLayer) -> Result<(), XrError>;

    /// Acquire a reference space
    async fn request_reference_space(
        &mut self,
        kind: ReferenceSpaceKind,
    ) -> Result<ReferenceSpace, XrError>;

    /// Create a hit-test source with rays from `space`
    async fn request_hit_test_source(
        &mut self,
        space: &ReferenceSpace,
    ) -> Result<HitTestSource, XrError>;

    /// Stop producing results for `source`
    fn cancel_hit_test_source(&mut self, source: &HitTestSource);

    /// Register the display-driven frame callback
    fn request_animation_frame(&mut self) -> CallbackHandle;

    /// Unregister a frame callback
    fn cancel_animation_frame(&mut self, handle: CallbackHandle);

    /// Register for an event kind
    fn add_event_listener(&mut self, kind: EventKind);

    /// Unregister from an event kind
    fn remove_event_listener(&mut self, kind: EventKind);

    /// Stop tracking an anchor
    fn delete_anchor(&mut self, anchor: &Anchor);

    /// Request graceful termination
    async fn end(&mut self) -> Result<(), XrError>;

    /// Next event from the display-driven loop. `None` once the platform has
    /// nothing more to deliver.
    async fn next_event(&mut self) -> Option<XrEvent>;
}

/// Per-tick frame state. Only valid for the event it was delivered with.
pub trait XrFrame {
    /// Device pose against `space`. `Ok(None)` is a tracking gap.
    fn viewer_pose(&self, space: &ReferenceSpace) -> Result<Option<ViewerPose>, XrError>;

    /// Hit-test results for this frame, nearest first as the platform orders them
    fn hit_test_results(&self, source: &HitTestSource) -> Result<Vec<HitTestResult>, XrError>;

    /// Resolve a result against `space`
    fn result_pose(&self, result: &HitTestResult, space: &ReferenceSpace) -> Option<Pose>;

    /// Request an anchor at `pose` in `space`. The outcome arrives later as
    /// [`XrEvent::AnchorCreated`].
    fn create_anchor(
        &self,
        pose: &Pose,
        space: &ReferenceSpace,
    ) -> Result<AnchorRequestId, XrError>;

    /// Current tracked pose of an anchor, if tracked this frame
    fn anchor_pose(&self, anchor: &Anchor, space: &ReferenceSpace) -> Option<Pose>;
}
