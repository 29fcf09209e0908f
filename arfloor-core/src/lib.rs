//! arfloor - surface-anchored AR sessions
//!
//! This crate drives an immersive AR session from capability check to
//! teardown:
//! - Session lifecycle and the explicit session context
//! - Reference space acquisition and per-frame hit-testing
//! - The display-synchronized frame loop (reticle, per-view render passes)
//! - Selection-driven placement with optional drift-correcting anchors
//! - A bounded diagnostics log for runtime faults
//!
//! The device runtime is reached only through the traits in [`xr`];
//! [`xr::simulated`] plays back recorded traces for tests and tooling.

#![warn(missing_docs)]

pub mod config;
pub mod content;
pub mod diagnostics;
pub mod error;
pub mod frame;
pub mod placement;
pub mod session;
pub mod spaces;
pub mod three_d;
pub mod ui;
pub mod xr;

pub use config::ArConfig;
pub use content::{ContentLoader, ContentSelection, TemplateLoader};
pub use diagnostics::{DiagnosticRecord, DiagnosticsSink, ErrorSampler};
pub use error::{
    AnchorCreationError, ContentError, FrameError, HitTestUnsupportedError, PlacementError,
    Result, SessionEndError, SessionRequestError, SpaceUnavailableError, StartError, XrError,
};
pub use frame::{FrameOutcome, FrameStats, FrameSynchronizer};
pub use hit_test::HitTestEngine;
pub use placement::{
    PlacedObject, PlacementController, PlacementPolicy, PlacementState, SelectOutcome,
};
pub use session::{Dispatched, SessionContext, SessionManager, SessionState, SupportStatus};
pub use spaces::{ReferenceSpaceProvider, SessionSpaces};
pub use three_d::{Camera3D, Node3D, NodeId, RecordingRenderer, Renderer, Scene3D};
pub use ui::{NullUi, RecordingUi, SessionUi, UiState};
