//! Display-synchronized frame callback

use crate::diagnostics::{DiagnosticsSink, ErrorSampler};
use crate::error::FrameError;
use crate::session::SessionContext;
use crate::three_d::{Renderer, Scene3D};
use crate::xr::XrFrame;
use tracing::{trace, warn};

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Every view was rendered
    Rendered {
        /// Number of render passes issued
        views: usize,
        /// Whether the reticle ended the tick visible
        reticle_visible: bool,
    },
    /// No viewer pose this tick; nothing rendered
    TrackingLost,
    /// The tick raised a [`FrameError`]; the loop carries on
    Failed,
}

/// Running totals across a session's ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Ticks handled
    pub ticks: u64,
    /// Ticks that rendered every view
    pub rendered: u64,
    /// Ticks skipped for a tracking gap
    pub tracking_lost: u64,
    /// Ticks that raised
    pub failed: u64,
}

/// The per-frame callback
///
/// Holds no per-frame state between invocations; only the fault sampler and
/// counters persist.
#[derive(Debug, Clone)]
pub struct FrameSynchronizer {
    sampler: ErrorSampler,
    stats: FrameStats,
}

impl FrameSynchronizer {
    /// Record one frame fault out of `sample_every`
    pub fn new(sample_every: u64) -> Self {
        Self {
            sampler: ErrorSampler::new(sample_every),
            stats: FrameStats::default(),
        }
    }

    /// Counters so far
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Run one tick
    ///
    /// Faults never escape: they are sampled into `diagnostics` and reported
    /// as [`FrameOutcome::Failed`].
    pub fn on_frame(
        &mut self,
        context: &SessionContext,
        frame: &dyn XrFrame,
        timestamp: f64,
        scene: &mut Scene3D,
        renderer: &mut dyn Renderer,
        diagnostics: &mut DiagnosticsSink,
    ) -> FrameOutcome {
        self.stats.ticks += 1;

        let outcome = match Self::tick(context, frame, scene, renderer) {
            Ok(outcome) => outcome,
            Err(err) => {
                if self.sampler.admit() {
                    warn!("Frame {:.1} failed: {}", timestamp, err);
                    diagnostics.push(format!("frame {:.1}: {}", timestamp, err));
                } else {
                    trace!("Frame {:.1} failed (not sampled): {}", timestamp, err);
                }
                FrameOutcome::Failed
            }
        };

        match outcome {
            FrameOutcome::Rendered { .. } => self.stats.rendered += 1,
            FrameOutcome::TrackingLost => self.stats.tracking_lost += 1,
            FrameOutcome::Failed => self.stats.failed += 1,
        }
        outcome
    }

    fn tick(
        context: &SessionContext,
        frame: &dyn XrFrame,
        scene: &mut Scene3D,
        renderer: &mut dyn Renderer,
    ) -> Result<FrameOutcome, FrameError> {
        let layer = context.layer();
        renderer.bind_framebuffer(layer);

        let floor = context.spaces().local_floor;
        let Some(viewer) = frame.viewer_pose(&floor).map_err(FrameError::Pose)? else {
            trace!("No viewer pose, skipping render");
            return Ok(FrameOutcome::TrackingLost);
        };

        let hit = context
            .hit_test()
            .first_pose(frame, &floor)
            .map_err(FrameError::HitTest)?;
        scene.set_reticle(hit.as_ref());

        for (index, view) in viewer.views.iter().enumerate() {
            let viewport = layer
                .viewport(view)
                .ok_or(FrameError::MissingViewport { index })?;
            renderer.set_viewport(viewport);
            scene.camera.set_from_view(view);
            let camera = scene.camera;
            renderer.render(scene, &camera).map_err(FrameError::Render)?;
        }

        Ok(FrameOutcome::Rendered {
            views: viewer.views.len(),
            reticle_visible: hit.is_some(),
        })
    }
}
