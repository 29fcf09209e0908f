//! Replay command implementation
//!
//! Drives a full session against a recorded trace and reports what the
//! session did with each event.

use super::template_loader;
use crate::config::Config;
use anyhow::{Context, Result};
use arfloor_core::xr::simulated::{SimulatedPlatform, Trace};
use arfloor_core::xr::Pose;
use arfloor_core::{
    ContentSelection, DiagnosticRecord, Dispatched, FrameOutcome, FrameStats, RecordingRenderer,
    SelectOutcome, SessionManager,
};
use colored::*;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub content: Option<String>,
    pub scale: Option<f32>,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub object: u64,
    pub content_id: String,
    pub pose: Pose,
}

#[derive(Debug, Clone, Default)]
pub struct ReplaySummary {
    pub supported: bool,
    pub start_error: Option<String>,
    pub events: Vec<Dispatched>,
    pub placements: Vec<Placement>,
    pub frames: FrameStats,
    pub draws: usize,
    pub diagnostics: Vec<DiagnosticRecord>,
}

/// Load a trace file
pub fn load_trace(path: &Path) -> Result<Trace> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading trace {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing trace {}", path.display()))
}

/// Replay `trace` through a session manager
pub async fn replay_trace(
    trace: &Trace,
    options: &ReplayOptions,
    config: &Config,
) -> ReplaySummary {
    let renderer = RecordingRenderer::new();
    let log = renderer.log();
    let mut manager = SessionManager::new(
        Box::new(SimulatedPlatform::from_trace(trace)),
        Box::new(renderer),
        Box::new(template_loader(&config.replay)),
        config.ar.clone(),
    );

    let mut summary = ReplaySummary {
        supported: manager.check_support().await,
        ..ReplaySummary::default()
    };

    let content = options
        .content
        .clone()
        .unwrap_or_else(|| config.replay.content.clone());
    let mut selection = ContentSelection::new(content);
    if let Some(scale) = options.scale.or(config.replay.scale) {
        selection = selection.with_scale(scale);
    }

    if summary.supported {
        match manager.start(selection).await {
            Ok(()) => {
                let (events, placements) = (&mut summary.events, &mut summary.placements);
                manager
                    .run_with(|dispatched, manager| {
                        if let Dispatched::Select(SelectOutcome::Placed { object }) = dispatched {
                            if let Some(placed) =
                                manager.placement().objects().iter().find(|o| o.id == object)
                            {
                                placements.push(Placement {
                                    object,
                                    content_id: placed.content_id.clone(),
                                    pose: placed.pose,
                                });
                            }
                        }
                        events.push(dispatched);
                    })
                    .await;
            }
            Err(err) => summary.start_error = Some(err.to_string()),
        }
    }

    summary.frames = manager.frame_stats();
    summary.draws = log.borrow().draws.len();
    summary.diagnostics = manager.diagnostics().snapshot();
    info!(
        "Replay finished: {} event(s), {} placement(s)",
        summary.events.len(),
        summary.placements.len()
    );
    summary
}

/// Replay the trace at `path` and print a report
pub async fn replay(path: &Path, options: ReplayOptions, config: &Config) -> Result<ReplaySummary> {
    let trace = load_trace(path)?;
    println!("Replaying: {} ({} event(s))", path.display(), trace.events.len());

    let summary = replay_trace(&trace, &options, config).await;
    print_summary(&summary, options.verbose);
    Ok(summary)
}

fn print_summary(summary: &ReplaySummary, verbose: bool) {
    if !summary.supported {
        println!("  {} device does not support immersive AR", "✗".red());
        return;
    }
    if let Some(err) = &summary.start_error {
        println!("  {} session start failed: {}", "✗".red(), err);
    }

    if verbose {
        for (index, event) in summary.events.iter().enumerate() {
            println!("  {:>4} {}", index, describe(event));
        }
    }

    let frames = summary.frames;
    println!(
        "\n  frames: {} rendered, {} tracking lost, {} failed ({} draw call(s))",
        frames.rendered, frames.tracking_lost, frames.failed, summary.draws
    );

    for placement in &summary.placements {
        let p = placement.pose.position;
        println!(
            "  {} object {} ({}) at [{:.3}, {:.3}, {:.3}]",
            "✓".green(),
            placement.object,
            placement.content_id,
            p.x,
            p.y,
            p.z
        );
    }

    if !summary.diagnostics.is_empty() {
        println!("\n  {}", "diagnostics:".yellow().bold());
        for record in &summary.diagnostics {
            println!("    {} {}", record.timestamp.format("%H:%M:%S%.3f"), record.message);
        }
    }
}

fn describe(event: &Dispatched) -> String {
    match event {
        Dispatched::Frame(FrameOutcome::Rendered { views, reticle_visible }) => format!(
            "frame: {} view(s), reticle {}",
            views,
            if *reticle_visible { "shown" } else { "hidden" }
        ),
        Dispatched::Frame(FrameOutcome::TrackingLost) => "frame: tracking lost".to_string(),
        Dispatched::Frame(FrameOutcome::Failed) => "frame: failed".red().to_string(),
        Dispatched::Select(SelectOutcome::Placed { object }) => {
            format!("select: placed object {}", object).green().to_string()
        }
        Dispatched::Select(SelectOutcome::NoSurface) => "select: no surface".to_string(),
        Dispatched::Select(SelectOutcome::PolicyExhausted) => "select: limit reached".to_string(),
        Dispatched::SelectFailed => "select: failed".red().to_string(),
        Dispatched::AnchorResolved => "anchor resolved".to_string(),
        Dispatched::Ended => "session ended by device".to_string(),
        Dispatched::Dropped => "dropped".dimmed().to_string(),
    }
}
