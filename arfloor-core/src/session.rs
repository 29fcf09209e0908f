//! AR session lifecycle
//!
//! The manager negotiates the session, owns every platform handle in a
//! [`SessionContext`], and dispatches platform events to the frame
//! synchronizer and placement controller. Events are handled one at a time,
//! so nothing here is locked.

use crate::config::ArConfig;
use crate::content::{ContentLoader, ContentSelection};
use crate::diagnostics::DiagnosticsSink;
use crate::error::{Result, SessionEndError, SessionRequestError, StartError};
use crate::frame::{FrameOutcome, FrameStats, FrameSynchronizer};
use crate::hit_test::HitTestEngine;
use crate::placement::{PlacementController, PlacementPolicy, SelectOutcome};
use crate::spaces::{ReferenceSpaceProvider, SessionSpaces};
use crate::three_d::{Renderer, Scene3D};
use crate::ui::{instructions, NullUi, SessionUi, UiState};
use crate::xr::{
    CallbackHandle, CompositorLayer, EventKind, FeatureSet, XrEvent, XrPlatform, XrSession,
};
use tracing::{debug, info, trace, warn};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session; start may be invoked
    Idle,
    /// Negotiating with the platform
    Requesting,
    /// Frames and selections are being handled
    Active,
    /// Cleanup in progress
    Ending,
    /// Cleanup finished; immediately followed by `Idle`
    Ended,
}

/// Outcome of the capability check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportStatus {
    /// `check_support` has not completed
    Unknown,
    /// The device offers the configured session mode
    Supported,
    /// The device does not
    Unsupported,
}

/// What `dispatch` did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// Frame callback ran
    Frame(FrameOutcome),
    /// Selection handler ran
    Select(SelectOutcome),
    /// Selection passed the guard but failed; recorded in diagnostics
    SelectFailed,
    /// Anchor request resolved
    AnchorResolved,
    /// Platform-initiated end handled
    Ended,
    /// No handler registered for the event
    Dropped,
}

/// Platform handles for the active session
///
/// Created whole by `start` and torn down whole by cleanup; handlers receive
/// it by reference.
pub struct SessionContext {
    session: Box<dyn XrSession>,
    layer: CompositorLayer,
    spaces: SessionSpaces,
    hit_test: HitTestEngine,
    selection: ContentSelection,
    frame_callback: Option<CallbackHandle>,
    listeners: Vec<EventKind>,
}

impl SessionContext {
    /// Compositor render target
    pub fn layer(&self) -> &CompositorLayer {
        &self.layer
    }

    /// Viewer and floor spaces
    pub fn spaces(&self) -> &SessionSpaces {
        &self.spaces
    }

    /// The session's hit-test engine
    pub fn hit_test(&self) -> &HitTestEngine {
        &self.hit_test
    }

    /// Content placed by this session
    pub fn selection(&self) -> &ContentSelection {
        &self.selection
    }

    /// Whether the frame callback is registered
    pub fn is_frame_callback_registered(&self) -> bool {
        self.frame_callback.is_some()
    }

    /// Whether a handler is registered for `kind`
    pub fn is_listening(&self, kind: EventKind) -> bool {
        self.listeners.contains(&kind)
    }
}

/// Owns the session lifecycle and the pieces it drives
pub struct SessionManager {
    platform: Box<dyn XrPlatform>,
    renderer: Box<dyn Renderer>,
    loader: Box<dyn ContentLoader>,
    ui: Box<dyn SessionUi>,
    config: ArConfig,
    state: SessionState,
    support: SupportStatus,
    context: Option<SessionContext>,
    scene: Scene3D,
    frames: FrameSynchronizer,
    placement: PlacementController,
    diagnostics: DiagnosticsSink,
    last_ui: Option<UiState>,
}

impl SessionManager {
    /// Create an idle manager
    pub fn new(
        platform: Box<dyn XrPlatform>,
        renderer: Box<dyn Renderer>,
        loader: Box<dyn ContentLoader>,
        config: ArConfig,
    ) -> Self {
        Self {
            platform,
            renderer,
            loader,
            ui: Box::new(NullUi),
            state: SessionState::Idle,
            support: SupportStatus::Unknown,
            context: None,
            scene: Scene3D::new("ar-session"),
            frames: FrameSynchronizer::new(config.diagnostics.sample_every),
            placement: PlacementController::new(PlacementPolicy::from(&config.placement)),
            diagnostics: DiagnosticsSink::new(config.diagnostics.capacity),
            last_ui: None,
            config,
        }
    }

    /// Push UI state to `ui` from now on
    pub fn with_ui(mut self, ui: Box<dyn SessionUi>) -> Self {
        self.ui = ui;
        self.refresh_ui();
        self
    }

    /// Query platform AR capability. Start stays disabled until this returns
    /// `true`.
    pub async fn check_support(&mut self) -> bool {
        let mode = self.config.session.mode;
        let supported = self.platform.is_session_supported(mode).await;
        self.support = if supported {
            SupportStatus::Supported
        } else {
            SupportStatus::Unsupported
        };
        info!("{:?} sessions supported: {}", mode, supported);
        self.refresh_ui();
        supported
    }

    /// Request and set up a session placing `selection`
    ///
    /// On any failure the manager returns to `Idle` with no callback or
    /// listener registered, and a granted platform session is ended. A refused
    /// mode or required feature also marks the device unsupported.
    pub async fn start(&mut self, selection: ContentSelection) -> Result<()> {
        match self.support {
            SupportStatus::Unknown => return Err(StartError::SupportUnknown),
            SupportStatus::Unsupported => {
                return Err(StartError::Capability {
                    mode: self.config.session.mode,
                })
            }
            SupportStatus::Supported => {}
        }
        if self.state != SessionState::Idle {
            return Err(StartError::AlreadyActive);
        }

        self.transition(SessionState::Requesting);
        self.refresh_ui();

        let mode = self.config.session.mode;
        let features = FeatureSet::placement(&self.config.session.optional_features);
        let session = match self.platform.request_session(mode, &features).await {
            Ok(session) => session,
            Err(SessionRequestError::Refused(source)) => {
                return Err(self.abort_start(StartError::SessionRefused { source }));
            }
            Err(err) => {
                // Mode or required feature missing: retrying cannot succeed
                warn!("Device cannot run this session: {}", err);
                self.support = SupportStatus::Unsupported;
                return Err(self.abort_start(StartError::Capability { mode }));
            }
        };

        match self.establish(session, selection).await {
            Ok(context) => {
                self.context = Some(context);
                self.transition(SessionState::Active);
                self.refresh_ui();
                Ok(())
            }
            Err(err) => Err(self.abort_start(err)),
        }
    }

    async fn establish(
        &mut self,
        mut session: Box<dyn XrSession>,
        selection: ContentSelection,
    ) -> Result<SessionContext> {
        let prepared = Self::prepare(self.renderer.as_mut(), session.as_mut()).await;
        let (layer, spaces, hit_test) = match prepared {
            Ok(parts) => parts,
            Err(err) => {
                if let Err(end_err) = session.end().await {
                    warn!("Ending aborted session failed: {}", end_err);
                }
                return Err(err);
            }
        };

        let frame_callback = session.request_animation_frame();
        session.add_event_listener(EventKind::Select);
        session.add_event_listener(EventKind::End);
        debug!("Registered frame callback {:?}", frame_callback);

        Ok(SessionContext {
            session,
            layer,
            spaces,
            hit_test,
            selection,
            frame_callback: Some(frame_callback),
            listeners: vec![EventKind::Select, EventKind::End],
        })
    }

    /// Steps that may fail, in order. The hit-test source is created last so
    /// nothing needs cancelling when an earlier step fails.
    async fn prepare(
        renderer: &mut dyn Renderer,
        session: &mut dyn XrSession,
    ) -> Result<(CompositorLayer, SessionSpaces, HitTestEngine)> {
        renderer
            .make_xr_compatible()
            .await
            .map_err(|source| StartError::RenderSetup { source })?;

        let layer = session
            .create_compositor_layer()
            .map_err(|source| StartError::RenderSetup { source })?;
        session
            .update_render_state(&layer)
            .map_err(|source| StartError::RenderSetup { source })?;

        let spaces = ReferenceSpaceProvider::acquire_session_spaces(session).await?;
        let hit_test = HitTestEngine::create_source(session, &spaces.viewer).await?;

        Ok((layer, spaces, hit_test))
    }

    fn abort_start(&mut self, err: StartError) -> StartError {
        warn!("Session start failed: {}", err);
        self.diagnostics.push(format!("session start failed: {}", err));
        self.transition(SessionState::Idle);
        self.refresh_ui();
        err
    }

    /// End the session. Idempotent.
    ///
    /// Cleanup runs before the termination request and regardless of its
    /// outcome; a failed request is logged and returned.
    pub async fn end(&mut self) -> std::result::Result<(), SessionEndError> {
        let Some(mut context) = self.context.take() else {
            return Ok(());
        };

        self.transition(SessionState::Ending);
        self.release(&mut context);

        let result = context
            .session
            .end()
            .await
            .map_err(|source| SessionEndError { source });
        if let Err(err) = &result {
            warn!("{}", err);
            self.diagnostics.push(err.to_string());
        }

        drop(context);
        self.finish_end();
        result
    }

    /// Cleanup for a device-driven end. Same path as [`end`](Self::end)
    /// without the termination request.
    fn handle_platform_end(&mut self) {
        let Some(mut context) = self.context.take() else {
            return;
        };
        info!("Session ended by platform");
        self.transition(SessionState::Ending);
        self.release(&mut context);
        drop(context);
        self.finish_end();
    }

    /// Cancel hit-testing and unregister every handler before anything else
    /// touches the session, then clear placed content.
    fn release(&mut self, context: &mut SessionContext) {
        context.hit_test.cancel(context.session.as_mut());
        if let Some(handle) = context.frame_callback.take() {
            context.session.cancel_animation_frame(handle);
        }
        for kind in context.listeners.drain(..) {
            context.session.remove_event_listener(kind);
        }

        let removed = self.placement.objects().len();
        for anchor in self.placement.clear(&mut self.scene) {
            context.session.delete_anchor(&anchor);
        }
        self.scene.set_reticle(None);
        debug!("Cleared {} placed object(s)", removed);
    }

    fn finish_end(&mut self) {
        self.transition(SessionState::Ended);
        self.transition(SessionState::Idle);
        self.refresh_ui();
    }

    /// Route one platform event to its registered handler
    pub fn dispatch(&mut self, event: XrEvent) -> Dispatched {
        let Some(context) = self.context.as_mut() else {
            trace!("Dropping {:?}: no active session", event);
            return Dispatched::Dropped;
        };

        let dispatched = match event {
            XrEvent::Frame { timestamp, frame } => {
                if !context.is_frame_callback_registered() {
                    return Dispatched::Dropped;
                }
                let floor = context.spaces.local_floor;
                self.placement
                    .apply_anchor_updates(frame.as_ref(), &floor, &mut self.scene);
                Dispatched::Frame(self.frames.on_frame(
                    context,
                    frame.as_ref(),
                    timestamp,
                    &mut self.scene,
                    self.renderer.as_mut(),
                    &mut self.diagnostics,
                ))
            }
            XrEvent::Select { frame } => {
                if !context.is_listening(EventKind::Select) {
                    return Dispatched::Dropped;
                }
                match self.placement.on_select(
                    frame.as_ref(),
                    context,
                    self.loader.as_ref(),
                    &mut self.scene,
                    &mut self.diagnostics,
                ) {
                    Ok(outcome) => Dispatched::Select(outcome),
                    Err(err) => {
                        warn!("Placement failed: {}", err);
                        self.diagnostics.push(format!("placement failed: {}", err));
                        Dispatched::SelectFailed
                    }
                }
            }
            XrEvent::AnchorCreated { request, result } => {
                if let Some(stale) =
                    self.placement
                        .on_anchor_created(request, result, &mut self.diagnostics)
                {
                    context.session.delete_anchor(&stale);
                }
                Dispatched::AnchorResolved
            }
            XrEvent::End => {
                if !context.is_listening(EventKind::End) {
                    return Dispatched::Dropped;
                }
                self.handle_platform_end();
                Dispatched::Ended
            }
        };

        self.refresh_ui();
        dispatched
    }

    /// Pull and dispatch events until the session is over
    pub async fn run(&mut self) {
        self.run_with(|_, _| {}).await
    }

    /// Like [`run`](Self::run), handing each dispatch result to `observe`
    pub async fn run_with<F>(&mut self, mut observe: F)
    where
        F: FnMut(Dispatched, &SessionManager),
    {
        while let Some(context) = self.context.as_mut() {
            match context.session.next_event().await {
                Some(event) => {
                    let dispatched = self.dispatch(event);
                    observe(dispatched, self);
                }
                None => {
                    debug!("Event stream closed");
                    self.handle_platform_end();
                }
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            info!("Session state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn refresh_ui(&mut self) {
        let state = self.ui_state();
        if self.last_ui.as_ref() != Some(&state) {
            self.ui.update(&state);
            self.last_ui = Some(state);
        }
    }

    /// What the UI should currently show
    pub fn ui_state(&self) -> UiState {
        let instructions = match (self.support, self.state) {
            (SupportStatus::Unknown, _) => instructions::CHECKING,
            (SupportStatus::Unsupported, _) => instructions::UNSUPPORTED,
            (_, SessionState::Requesting) => instructions::STARTING,
            (_, SessionState::Ending | SessionState::Ended) => instructions::ENDING,
            (_, SessionState::Active) if !self.placement.can_place() => instructions::PLACED,
            (_, SessionState::Active) if self.scene.reticle_visible() => {
                instructions::TAP_TO_PLACE
            }
            (_, SessionState::Active) => instructions::SCANNING,
            (_, SessionState::Idle) => instructions::READY,
        };
        UiState {
            instructions: instructions.to_string(),
            ar_active: self.state == SessionState::Active,
            start_enabled: self.support == SupportStatus::Supported
                && self.state == SessionState::Idle,
            diagnostics: self.diagnostics.snapshot(),
        }
    }

    /// Lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Capability check outcome
    pub fn support(&self) -> SupportStatus {
        self.support
    }

    /// Active session handles
    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    /// Whether a frame callback is registered with the platform
    pub fn is_frame_callback_registered(&self) -> bool {
        self.context
            .as_ref()
            .map_or(false, SessionContext::is_frame_callback_registered)
    }

    /// The render graph
    pub fn scene(&self) -> &Scene3D {
        &self.scene
    }

    /// The placement controller
    pub fn placement(&self) -> &PlacementController {
        &self.placement
    }

    /// The diagnostics log
    pub fn diagnostics(&self) -> &DiagnosticsSink {
        &self.diagnostics
    }

    /// Frame counters
    pub fn frame_stats(&self) -> FrameStats {
        self.frames.stats()
    }

    /// Configuration in force
    pub fn config(&self) -> &ArConfig {
        &self.config
    }
}
