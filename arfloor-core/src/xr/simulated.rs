//! Deterministic in-process platform
//!
//! Plays back scripted frames and selections, records every registration the
//! session makes, and resolves anchors on the next event pull. World
//! coordinates are the device's start frame; the `local-floor` origin sits
//! `floor_height` metres below it.

use crate::error::{SessionRequestError, XrError};
use crate::xr::{
    Anchor, AnchorRequestId, CallbackHandle, CompositorLayer, EventKind, Eye, Feature, FeatureSet,
    FramebufferId, HitTestResult, HitTestSource, Pose, ReferenceSpace, ReferenceSpaceKind,
    SessionMode, View, ViewerPose, XrEvent, XrFrame, XrPlatform, XrSession,
};
use async_trait::async_trait;
use glam::{Mat4, Vec3};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::trace;

const EYE_SEPARATION: f32 = 0.064;
const FIELD_OF_VIEW: f32 = 1.2;

/// Platform refusals to inject
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformFaults {
    /// Decline every session request, as a user dismissing the prompt would
    pub refuse_session: bool,
    /// Features the device lacks; refused when required
    pub missing_features: Vec<Feature>,
    /// Refuse compositor layer creation
    pub refuse_layer: bool,
    /// Reference spaces that cannot be acquired
    pub refuse_spaces: Vec<ReferenceSpaceKind>,
    /// Refuse hit-test source creation
    pub refuse_hit_test: bool,
    /// Reject every anchor request asynchronously
    pub reject_anchors: bool,
    /// Fail the termination request
    pub fail_end: bool,
}

/// Injected per-frame fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameFault {
    /// `viewer_pose` raises
    Pose,
    /// `hit_test_results` raises
    HitTest,
}

/// One scripted frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSpec {
    /// Display timestamp in milliseconds
    pub timestamp: f64,
    /// Device pose in world coordinates; `None` for a tracking gap
    pub viewer: Option<Pose>,
    /// Two views instead of one
    pub stereo: bool,
    /// Surface intersections in world coordinates, nearest first
    pub hits: Vec<Pose>,
    /// Fault raised by this frame
    pub fault: Option<FrameFault>,
    /// Tracking correction applied to every live anchor before this frame
    pub anchor_shift: Option<Vec3>,
}

impl FrameSpec {
    /// Tracked monoscopic frame with no hits
    pub fn tracked(timestamp: f64, viewer: Pose) -> Self {
        Self {
            timestamp,
            viewer: Some(viewer),
            ..Self::default()
        }
    }

    /// Same frame with these hits
    pub fn with_hits(mut self, hits: Vec<Pose>) -> Self {
        self.hits = hits;
        self
    }

    /// Same frame rendered in stereo
    pub fn stereo(mut self) -> Self {
        self.stereo = true;
        self
    }

    /// Same frame raising `fault`
    pub fn with_fault(mut self, fault: FrameFault) -> Self {
        self.fault = Some(fault);
        self
    }
}

/// One scripted platform event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Display tick
    Frame(FrameSpec),
    /// Selection on this frame
    Select(FrameSpec),
    /// Device-driven termination
    End,
}

/// Compositor surface size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSize {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Default for LayerSize {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// A recorded session: device capabilities plus its event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Whether immersive AR is offered
    #[serde(default = "default_true")]
    pub supported: bool,
    /// Height of the device above the floor at session start
    #[serde(default)]
    pub floor_height: f32,
    /// Compositor surface size
    #[serde(default)]
    pub layer: LayerSize,
    /// Refusals to inject
    #[serde(default)]
    pub faults: PlatformFaults,
    /// Events in delivery order
    #[serde(default)]
    pub events: Vec<TraceEvent>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default)]
struct SimState {
    supported: bool,
    floor_height: f32,
    layer: LayerSize,
    faults: PlatformFaults,
    script: VecDeque<TraceEvent>,
    resolved: VecDeque<(AnchorRequestId, Result<Anchor, XrError>)>,
    next_handle: u64,
    session_active: bool,
    session_requests: u32,
    sessions_granted: u32,
    end_requests: u32,
    last_features: Option<FeatureSet>,
    render_state_bound: bool,
    frame_callbacks: FxHashSet<u32>,
    listeners: FxHashSet<EventKind>,
    hit_test_sources: FxHashSet<u32>,
    anchors: FxHashMap<u64, Pose>,
}

impl SimState {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn floor_origin(&self) -> Pose {
        Pose::from_position(Vec3::new(0.0, -self.floor_height, 0.0))
    }
}

/// Scriptable platform
///
/// Clones share state, so a test can keep one clone to script events and
/// inspect registrations after handing another to a session manager.
#[derive(Debug, Clone)]
pub struct SimulatedPlatform {
    shared: Rc<RefCell<SimState>>,
}

impl SimulatedPlatform {
    /// A device that supports immersive AR
    pub fn new() -> Self {
        Self {
            shared: Rc::new(RefCell::new(SimState {
                supported: true,
                ..SimState::default()
            })),
        }
    }

    /// A device without immersive AR
    pub fn unsupported() -> Self {
        let platform = Self::new();
        platform.shared.borrow_mut().supported = false;
        platform
    }

    /// Platform scripted from a recorded trace
    pub fn from_trace(trace: &Trace) -> Self {
        let platform = Self::new();
        {
            let mut state = platform.shared.borrow_mut();
            state.supported = trace.supported;
            state.floor_height = trace.floor_height;
            state.layer = trace.layer;
            state.faults = trace.faults.clone();
            state.script = trace.events.iter().cloned().collect();
        }
        platform
    }

    /// Inject refusals
    pub fn with_faults(self, faults: PlatformFaults) -> Self {
        self.shared.borrow_mut().faults = faults;
        self
    }

    /// Place the floor `height` metres below the device's start position
    pub fn with_floor_height(self, height: f32) -> Self {
        self.shared.borrow_mut().floor_height = height;
        self
    }

    /// Append an event to the script
    pub fn push(&self, event: TraceEvent) {
        self.shared.borrow_mut().script.push_back(event);
    }

    /// Build a frame event directly, bypassing the script
    pub fn frame_event(&self, spec: FrameSpec) -> XrEvent {
        let timestamp = spec.timestamp;
        XrEvent::Frame {
            timestamp,
            frame: Box::new(self.frame(spec)),
        }
    }

    /// Build a selection event directly, bypassing the script
    pub fn select_event(&self, spec: FrameSpec) -> XrEvent {
        XrEvent::Select {
            frame: Box::new(self.frame(spec)),
        }
    }

    /// Oldest anchor result not yet delivered
    pub fn next_anchor_event(&self) -> Option<XrEvent> {
        self.shared
            .borrow_mut()
            .resolved
            .pop_front()
            .map(|(request, result)| XrEvent::AnchorCreated { request, result })
    }

    fn frame(&self, spec: FrameSpec) -> SimulatedFrame {
        {
            let mut state = self.shared.borrow_mut();
            if let Some(shift) = spec.anchor_shift {
                for pose in state.anchors.values_mut() {
                    pose.position += shift;
                }
            }
        }
        SimulatedFrame {
            spec,
            shared: Rc::clone(&self.shared),
        }
    }

    /// Frame callbacks currently registered
    pub fn frame_callback_count(&self) -> usize {
        self.shared.borrow().frame_callbacks.len()
    }

    /// Event kinds with a registered listener
    pub fn listener_count(&self) -> usize {
        self.shared.borrow().listeners.len()
    }

    /// Hit-test sources not yet cancelled
    pub fn active_hit_test_sources(&self) -> usize {
        self.shared.borrow().hit_test_sources.len()
    }

    /// Anchors still tracked
    pub fn live_anchor_count(&self) -> usize {
        self.shared.borrow().anchors.len()
    }

    /// Whether a granted session has not ended
    pub fn session_active(&self) -> bool {
        self.shared.borrow().session_active
    }

    /// Session requests received, granted or not
    pub fn session_requests(&self) -> u32 {
        self.shared.borrow().session_requests
    }

    /// Sessions granted so far
    pub fn sessions_granted(&self) -> u32 {
        self.shared.borrow().sessions_granted
    }

    /// Termination requests received
    pub fn end_requests(&self) -> u32 {
        self.shared.borrow().end_requests
    }

    /// Features of the most recent session request
    pub fn last_features(&self) -> Option<FeatureSet> {
        self.shared.borrow().last_features.clone()
    }

    /// Whether a compositor layer was bound before frames were delivered
    pub fn render_state_bound(&self) -> bool {
        self.shared.borrow().render_state_bound
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl XrPlatform for SimulatedPlatform {
    async fn is_session_supported(&self, mode: SessionMode) -> bool {
        mode == SessionMode::ImmersiveAr && self.shared.borrow().supported
    }

    async fn request_session(
        &self,
        mode: SessionMode,
        features: &FeatureSet,
    ) -> Result<Box<dyn XrSession>, SessionRequestError> {
        let mut state = self.shared.borrow_mut();
        state.session_requests += 1;
        state.last_features = Some(features.clone());

        if mode != SessionMode::ImmersiveAr || !state.supported {
            return Err(SessionRequestError::ModeUnsupported { mode });
        }
        if let Some(&feature) = features
            .required
            .iter()
            .find(|feature| state.faults.missing_features.contains(*feature))
        {
            return Err(SessionRequestError::FeatureUnsupported { feature });
        }
        if state.faults.refuse_session {
            return Err(XrError::new("user declined the session prompt").into());
        }
        if state.session_active {
            return Err(XrError::new("another session is active").into());
        }

        state.session_active = true;
        state.sessions_granted += 1;
        state.render_state_bound = false;
        Ok(Box::new(SimulatedSession {
            platform: self.clone(),
        }))
    }
}

struct SimulatedSession {
    platform: SimulatedPlatform,
}

impl SimulatedSession {
    fn state(&self) -> std::cell::RefMut<'_, SimState> {
        self.platform.shared.borrow_mut()
    }
}

#[async_trait(?Send)]
impl XrSession for SimulatedSession {
    fn create_compositor_layer(&mut self) -> Result<CompositorLayer, XrError> {
        let mut state = self.state();
        if state.faults.refuse_layer {
            return Err(XrError::new("compositor layer unavailable"));
        }
        let framebuffer = FramebufferId(state.handle() as u32);
        Ok(CompositorLayer {
            framebuffer,
            width: state.layer.width,
            height: state.layer.height,
        })
    }

    fn update_render_state(&mut self, _layer: &CompositorLayer) -> Result<(), XrError> {
        self.state().render_state_bound = true;
        Ok(())
    }

    async fn request_reference_space(
        &mut self,
        kind: ReferenceSpaceKind,
    ) -> Result<ReferenceSpace, XrError> {
        let mut state = self.state();
        if state.faults.refuse_spaces.contains(&kind) {
            return Err(XrError::new(format!("{:?} space not supported", kind)));
        }
        let id = state.handle() as u32;
        Ok(ReferenceSpace::new(id, kind))
    }

    async fn request_hit_test_source(
        &mut self,
        space: &ReferenceSpace,
    ) -> Result<HitTestSource, XrError> {
        let mut state = self.state();
        if state.faults.refuse_hit_test {
            return Err(XrError::new("hit-test not supported"));
        }
        let id = state.handle() as u32;
        state.hit_test_sources.insert(id);
        Ok(HitTestSource::new(id, *space))
    }

    fn cancel_hit_test_source(&mut self, source: &HitTestSource) {
        self.state().hit_test_sources.remove(&source.id());
    }

    fn request_animation_frame(&mut self) -> CallbackHandle {
        let mut state = self.state();
        let id = state.handle() as u32;
        state.frame_callbacks.insert(id);
        CallbackHandle(id)
    }

    fn cancel_animation_frame(&mut self, handle: CallbackHandle) {
        self.state().frame_callbacks.remove(&handle.0);
    }

    fn add_event_listener(&mut self, kind: EventKind) {
        self.state().listeners.insert(kind);
    }

    fn remove_event_listener(&mut self, kind: EventKind) {
        self.state().listeners.remove(&kind);
    }

    fn delete_anchor(&mut self, anchor: &Anchor) {
        self.state().anchors.remove(&anchor.id());
    }

    async fn end(&mut self) -> Result<(), XrError> {
        let mut state = self.state();
        state.end_requests += 1;
        state.session_active = false;
        if state.faults.fail_end {
            return Err(XrError::new("session already torn down by the device"));
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Option<XrEvent> {
        if let Some(event) = self.platform.next_anchor_event() {
            return Some(event);
        }
        let next = self.state().script.pop_front();
        trace!("Simulated platform delivering {:?}", next);
        match next? {
            TraceEvent::Frame(spec) => Some(self.platform.frame_event(spec)),
            TraceEvent::Select(spec) => Some(self.platform.select_event(spec)),
            TraceEvent::End => {
                self.state().session_active = false;
                Some(XrEvent::End)
            }
        }
    }
}

/// Frame state produced from a [`FrameSpec`]
pub struct SimulatedFrame {
    spec: FrameSpec,
    shared: Rc<RefCell<SimState>>,
}

impl SimulatedFrame {
    fn origin(&self, space: &ReferenceSpace) -> Option<Pose> {
        match space.kind() {
            ReferenceSpaceKind::LocalFloor => Some(self.shared.borrow().floor_origin()),
            ReferenceSpaceKind::Viewer => self.spec.viewer,
        }
    }

    fn views(&self, transform: Pose) -> Vec<View> {
        let layer = self.shared.borrow().layer;
        let aspect = |width: u32| width.max(1) as f32 / layer.height.max(1) as f32;

        if !self.spec.stereo {
            return vec![View {
                eye: Eye::None,
                transform,
                projection: Mat4::perspective_rh(FIELD_OF_VIEW, aspect(layer.width), 0.01, 1000.0),
            }];
        }

        let projection = Mat4::perspective_rh(FIELD_OF_VIEW, aspect(layer.width / 2), 0.01, 1000.0);
        [(Eye::Left, -0.5), (Eye::Right, 0.5)]
            .into_iter()
            .map(|(eye, side)| {
                let offset = Mat4::from_translation(Vec3::X * side * EYE_SEPARATION);
                View {
                    eye,
                    transform: Pose::from_matrix(transform.matrix() * offset),
                    projection,
                }
            })
            .collect()
    }
}

impl XrFrame for SimulatedFrame {
    fn viewer_pose(&self, space: &ReferenceSpace) -> Result<Option<ViewerPose>, XrError> {
        if self.spec.fault == Some(FrameFault::Pose) {
            return Err(XrError::new("pose queried during tracking transition"));
        }
        let (Some(viewer), Some(origin)) = (self.spec.viewer, self.origin(space)) else {
            return Ok(None);
        };
        let transform = viewer.relative_to(&origin);
        Ok(Some(ViewerPose {
            transform,
            views: self.views(transform),
        }))
    }

    fn hit_test_results(&self, source: &HitTestSource) -> Result<Vec<HitTestResult>, XrError> {
        if self.spec.fault == Some(FrameFault::HitTest) {
            return Err(XrError::new("hit-test results unavailable"));
        }
        if !self.shared.borrow().hit_test_sources.contains(&source.id()) {
            return Ok(Vec::new());
        }
        Ok((0..self.spec.hits.len() as u64).map(HitTestResult::new).collect())
    }

    fn result_pose(&self, result: &HitTestResult, space: &ReferenceSpace) -> Option<Pose> {
        let hit = self.spec.hits.get(result.handle() as usize)?;
        Some(hit.relative_to(&self.origin(space)?))
    }

    fn create_anchor(
        &self,
        pose: &Pose,
        space: &ReferenceSpace,
    ) -> Result<AnchorRequestId, XrError> {
        let origin = self
            .origin(space)
            .ok_or_else(|| XrError::new("anchor space not tracked this frame"))?;
        let world = Pose::from_matrix(origin.matrix() * pose.matrix());

        let mut state = self.shared.borrow_mut();
        let request = AnchorRequestId(state.handle());
        let result = if state.faults.reject_anchors {
            Err(XrError::new("anchor limit reached"))
        } else {
            let id = state.handle();
            state.anchors.insert(id, world);
            Ok(Anchor::new(id))
        };
        state.resolved.push_back((request, result));
        Ok(request)
    }

    fn anchor_pose(&self, anchor: &Anchor, space: &ReferenceSpace) -> Option<Pose> {
        let world = *self.shared.borrow().anchors.get(&anchor.id())?;
        Some(world.relative_to(&self.origin(space)?))
    }
}
