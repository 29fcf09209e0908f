//! Error types for the AR session pipeline

use crate::xr::{Feature, ReferenceSpaceKind, SessionMode};
use thiserror::Error;

/// Type alias for session start results
pub type Result<T> = std::result::Result<T, StartError>;

/// A rejection reported by the platform boundary
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct XrError {
    /// Platform-supplied description
    pub message: String,
}

impl XrError {
    /// Create a new platform error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Why the platform did not grant a session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionRequestError {
    /// The mode is not offered on this device
    #[error("{mode:?} sessions are not offered")]
    ModeUnsupported {
        /// Requested mode
        mode: SessionMode,
    },

    /// A required feature is not offered on this device
    #[error("required feature {feature:?} unavailable")]
    FeatureUnsupported {
        /// First missing feature
        feature: Feature,
    },

    /// Refused for a reason that may clear, such as a declined prompt or a
    /// session already running
    #[error(transparent)]
    Refused(#[from] XrError),
}

/// Errors that abort `SessionManager::start`
///
/// Every variant leaves the manager in `Idle` with nothing registered.
#[derive(Error, Debug)]
pub enum StartError {
    /// The platform does not offer the requested mode or a required
    /// feature. Start stays disabled afterwards.
    #[error("AR not supported: {mode:?} sessions are unavailable on this device")]
    Capability {
        /// Mode that was checked
        mode: SessionMode,
    },

    /// `start` was invoked before the capability check completed
    #[error("capability check has not completed")]
    SupportUnknown,

    /// A session is already requesting or active
    #[error("a session is already in progress")]
    AlreadyActive,

    /// The platform refused the session for a reason that may clear
    #[error("session request refused: {source}")]
    SessionRefused {
        /// The underlying platform rejection
        #[source]
        source: XrError,
    },

    /// The render surface or compositor layer could not be set up
    #[error("render setup failed: {source}")]
    RenderSetup {
        /// The underlying platform rejection
        #[source]
        source: XrError,
    },

    /// A required reference space could not be acquired
    #[error(transparent)]
    SpaceUnavailable(#[from] SpaceUnavailableError),

    /// The platform cannot create a hit-test source
    #[error(transparent)]
    HitTestUnsupported(#[from] HitTestUnsupportedError),
}

/// A reference space could not be acquired
#[derive(Error, Debug, Clone, PartialEq)]
#[error("reference space {kind:?} unavailable: {source}")]
pub struct SpaceUnavailableError {
    /// Requested space kind
    pub kind: ReferenceSpaceKind,
    /// The underlying platform rejection
    #[source]
    pub source: XrError,
}

/// The platform cannot support hit-testing for this session
#[derive(Error, Debug, Clone, PartialEq)]
#[error("hit-testing unsupported: {source}")]
pub struct HitTestUnsupportedError {
    /// The underlying platform rejection
    #[source]
    pub source: XrError,
}

/// Transient failure inside a single frame tick
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Viewer pose resolution raised instead of returning "no pose"
    #[error("viewer pose query failed: {0}")]
    Pose(#[source] XrError),

    /// The hit-test query raised
    #[error("hit-test query failed: {0}")]
    HitTest(#[source] XrError),

    /// The compositor layer has no viewport for a view
    #[error("no viewport for view {index}")]
    MissingViewport {
        /// Index of the view in the viewer pose
        index: usize,
    },

    /// The renderer failed to draw a view
    #[error("render failed: {0}")]
    Render(#[source] XrError),
}

/// Anchor creation was rejected after a placement
#[derive(Error, Debug, Clone, PartialEq)]
#[error("anchor creation failed for placed object {object}: {source}")]
pub struct AnchorCreationError {
    /// Placed object the anchor was requested for
    pub object: u64,
    /// The underlying platform rejection
    #[source]
    pub source: XrError,
}

/// The platform rejected a termination request
#[derive(Error, Debug, Clone, PartialEq)]
#[error("session end failed: {source}")]
pub struct SessionEndError {
    /// The underlying platform rejection
    #[source]
    pub source: XrError,
}

/// The content collaborator could not supply an instance
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContentError {
    /// No content is registered under this identifier
    #[error("unknown content: {id}")]
    UnknownContent {
        /// Requested identifier
        id: String,
    },

    /// Scale must be finite and positive
    #[error("invalid scale {scale} for content {id}")]
    InvalidScale {
        /// Requested identifier
        id: String,
        /// Rejected scale
        scale: f32,
    },
}

/// A selection that passed the guard but could not be turned into a placement
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlacementError {
    /// Re-querying the selection frame raised
    #[error("hit-test query on selection failed: {0}")]
    HitTest(#[source] XrError),

    /// The content collaborator refused
    #[error(transparent)]
    Content(#[from] ContentError),
}
