//! UI collaborator: instruction text, AR flag and diagnostics

use crate::diagnostics::DiagnosticRecord;
use std::cell::RefCell;
use std::rc::Rc;

/// Everything the UI needs to render the session controls
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    /// Instruction line shown to the user
    pub instructions: String,
    /// Whether an AR session is active
    pub ar_active: bool,
    /// Whether the start control is enabled
    pub start_enabled: bool,
    /// Current diagnostics, oldest first
    pub diagnostics: Vec<DiagnosticRecord>,
}

/// Receives UI state whenever it changes
pub trait SessionUi {
    /// Render the new state
    fn update(&mut self, state: &UiState);
}

/// UI that ignores updates
#[derive(Debug, Clone, Copy, Default)]
pub struct NullUi;

impl SessionUi for NullUi {
    fn update(&mut self, _state: &UiState) {}
}

/// UI that keeps every update it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingUi {
    history: Rc<RefCell<Vec<UiState>>>,
}

impl RecordingUi {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the received states
    pub fn history(&self) -> Rc<RefCell<Vec<UiState>>> {
        Rc::clone(&self.history)
    }
}

impl SessionUi for RecordingUi {
    fn update(&mut self, state: &UiState) {
        self.history.borrow_mut().push(state.clone());
    }
}

/// Instruction strings
pub mod instructions {
    /// Capability check still running
    pub const CHECKING: &str = "Checking for AR support...";
    /// Device cannot run AR sessions
    pub const UNSUPPORTED: &str = "AR not supported on this device";
    /// Ready to start
    pub const READY: &str = "Press Start AR to begin";
    /// Session negotiation in progress
    pub const STARTING: &str = "Starting AR session...";
    /// No surface under the reticle ray
    pub const SCANNING: &str = "Move your device slowly to find a surface";
    /// Reticle shown, placement possible
    pub const TAP_TO_PLACE: &str = "Tap to place the object";
    /// Placement policy exhausted
    pub const PLACED: &str = "Object placed";
    /// Termination in progress
    pub const ENDING: &str = "Ending AR session...";
}
