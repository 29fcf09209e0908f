//! Session, placement and diagnostics configuration

use crate::xr::{Feature, SessionMode};
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArConfig {
    /// Session negotiation
    #[serde(default)]
    pub session: SessionSettings,

    /// Placement policy
    #[serde(default)]
    pub placement: PlacementSettings,

    /// Diagnostics log
    #[serde(default)]
    pub diagnostics: DiagnosticsSettings,
}

/// Session negotiation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Mode requested from the platform
    #[serde(default = "default_mode")]
    pub mode: SessionMode,

    /// Features requested on top of floor space and hit-testing
    #[serde(default = "default_optional_features")]
    pub optional_features: Vec<Feature>,
}

/// Placement policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementSettings {
    /// Maximum objects per session. Zero places on every selection.
    #[serde(default = "default_max_placements")]
    pub max_placements: usize,

    /// Request a drift-correcting anchor for each placement
    #[serde(default = "default_true")]
    pub request_anchors: bool,

    /// Scale used when the content selection does not specify one
    #[serde(default = "default_scale")]
    pub default_scale: f32,
}

/// Diagnostics log settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsSettings {
    /// Records kept before the oldest is evicted
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Record one frame fault out of this many
    #[serde(default = "default_sample_every")]
    pub sample_every: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            optional_features: default_optional_features(),
        }
    }
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            max_placements: default_max_placements(),
            request_anchors: default_true(),
            default_scale: default_scale(),
        }
    }
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            sample_every: default_sample_every(),
        }
    }
}

fn default_mode() -> SessionMode { SessionMode::ImmersiveAr }
fn default_optional_features() -> Vec<Feature> { vec![Feature::Anchors, Feature::DomOverlay] }
fn default_max_placements() -> usize { 1 }
fn default_true() -> bool { true }
fn default_scale() -> f32 { 1.0 }
fn default_capacity() -> usize { 5 }
fn default_sample_every() -> u64 { 100 }
