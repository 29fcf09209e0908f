//! Reference space acquisition

use crate::error::{SpaceUnavailableError, XrError};
use crate::xr::{ReferenceSpace, ReferenceSpaceKind, XrSession};
use tracing::debug;

/// The pair of spaces a placement session runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSpaces {
    /// Hit-test ray origin
    pub viewer: ReferenceSpace,
    /// Basis for every placement and rendering pose
    pub local_floor: ReferenceSpace,
}

/// Acquires reference spaces from a session
pub struct ReferenceSpaceProvider;

impl ReferenceSpaceProvider {
    /// Acquire one space of `kind`
    ///
    /// A platform that answers with a different kind than requested is treated
    /// as refusing; there is no fallback to an unaligned space.
    pub async fn acquire(
        session: &mut dyn XrSession,
        kind: ReferenceSpaceKind,
    ) -> Result<ReferenceSpace, SpaceUnavailableError> {
        let space = session
            .request_reference_space(kind)
            .await
            .map_err(|source| SpaceUnavailableError { kind, source })?;

        if space.kind() != kind {
            return Err(SpaceUnavailableError {
                kind,
                source: XrError::new(format!("platform offered {:?} instead", space.kind())),
            });
        }

        debug!("Acquired {:?} reference space {}", kind, space.id());
        Ok(space)
    }

    /// Acquire the floor and viewer spaces. Floor first: it is the one a
    /// session cannot do without.
    pub async fn acquire_session_spaces(
        session: &mut dyn XrSession,
    ) -> Result<SessionSpaces, SpaceUnavailableError> {
        let local_floor = Self::acquire(session, ReferenceSpaceKind::LocalFloor).await?;
        let viewer = Self::acquire(session, ReferenceSpaceKind::Viewer).await?;
        Ok(SessionSpaces {
            viewer,
            local_floor,
        })
    }
}
