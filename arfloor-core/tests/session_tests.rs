//! End-to-end session tests against the simulated platform

use arfloor_core::config::ArConfig;
use arfloor_core::three_d::RenderLog;
use arfloor_core::ui::instructions;
use arfloor_core::xr::simulated::{
    FrameFault, FrameSpec, PlatformFaults, SimulatedPlatform, TraceEvent,
};
use arfloor_core::xr::{Feature, Pose, ReferenceSpaceKind, Viewport};
use arfloor_core::{
    ContentSelection, Dispatched, FrameOutcome, PlacementState, RecordingRenderer, RecordingUi,
    SelectOutcome, SessionManager, SessionState, StartError, SupportStatus, TemplateLoader,
};
use glam::{Mat4, Vec3};
use std::cell::RefCell;
use std::rc::Rc;

const FLOOR_HEIGHT: f32 = 1.5;

fn floor_hit(x: f32, z: f32) -> Pose {
    Pose::from_position(Vec3::new(x, -FLOOR_HEIGHT, z))
}

fn tracked(timestamp: f64) -> FrameSpec {
    FrameSpec::tracked(timestamp, Pose::IDENTITY)
}

fn config(max_placements: Option<usize>, request_anchors: bool) -> ArConfig {
    let mut config = ArConfig::default();
    config.placement.max_placements = max_placements.unwrap_or(0);
    config.placement.request_anchors = request_anchors;
    config
}

type Harness = (SessionManager, Rc<RefCell<RenderLog>>);

fn session_manager(platform: &SimulatedPlatform, config: ArConfig) -> Harness {
    let renderer = RecordingRenderer::new();
    let log = renderer.log();
    let loader = TemplateLoader::new().with_model("duck");
    let manager = SessionManager::new(
        Box::new(platform.clone()),
        Box::new(renderer),
        Box::new(loader),
        config,
    );
    (manager, log)
}

async fn active(platform: &SimulatedPlatform, config: ArConfig) -> Harness {
    let (mut manager, log) = session_manager(platform, config);
    assert!(manager.check_support().await);
    manager.start(ContentSelection::new("duck")).await.unwrap();
    (manager, log)
}

fn platform() -> SimulatedPlatform {
    SimulatedPlatform::new().with_floor_height(FLOOR_HEIGHT)
}

#[tokio::test]
async fn test_unsupported_device_keeps_start_disabled() {
    let platform = SimulatedPlatform::unsupported();
    let (mut manager, _) = session_manager(&platform, ArConfig::default());

    assert!(!manager.check_support().await);
    let ui = manager.ui_state();
    assert!(!ui.start_enabled);
    assert!(!ui.ar_active);
    assert_eq!(ui.instructions, instructions::UNSUPPORTED);

    let err = manager.start(ContentSelection::new("duck")).await.unwrap_err();
    assert!(matches!(err, StartError::Capability { .. }));
    assert_eq!(platform.sessions_granted(), 0);
}

#[tokio::test]
async fn test_start_requires_capability_check() {
    let platform = platform();
    let (mut manager, _) = session_manager(&platform, ArConfig::default());

    assert_eq!(manager.support(), SupportStatus::Unknown);
    assert!(!manager.ui_state().start_enabled);
    let err = manager.start(ContentSelection::new("duck")).await.unwrap_err();
    assert!(matches!(err, StartError::SupportUnknown));
}

#[tokio::test]
async fn test_start_registers_everything() {
    let platform = platform();
    let (manager, log) = active(&platform, ArConfig::default()).await;

    assert_eq!(manager.state(), SessionState::Active);
    assert!(manager.is_frame_callback_registered());
    assert_eq!(platform.frame_callback_count(), 1);
    assert_eq!(platform.listener_count(), 2);
    assert_eq!(platform.active_hit_test_sources(), 1);
    assert!(platform.render_state_bound());
    assert!(log.borrow().xr_compatible);

    let features = platform.last_features().unwrap();
    assert_eq!(features.required, vec![Feature::LocalFloor, Feature::HitTest]);
    assert!(features.optional.contains(&Feature::Anchors));

    let context = manager.context().unwrap();
    assert_eq!(context.spaces().viewer.kind(), ReferenceSpaceKind::Viewer);
    assert_eq!(context.hit_test().source().unwrap().space().kind(), ReferenceSpaceKind::Viewer);

    let ui = manager.ui_state();
    assert!(ui.ar_active);
    assert!(!ui.start_enabled);
    assert_eq!(ui.instructions, instructions::SCANNING);
}

#[tokio::test]
async fn test_hit_test_refusal_unwinds_start() {
    let platform = platform().with_faults(PlatformFaults {
        refuse_hit_test: true,
        ..PlatformFaults::default()
    });
    let (mut manager, _) = session_manager(&platform, ArConfig::default());
    manager.check_support().await;

    let err = manager.start(ContentSelection::new("duck")).await.unwrap_err();
    assert!(matches!(err, StartError::HitTestUnsupported(_)));

    assert_eq!(manager.state(), SessionState::Idle);
    assert!(!manager.is_frame_callback_registered());
    assert_eq!(platform.frame_callback_count(), 0);
    assert_eq!(platform.listener_count(), 0);
    assert_eq!(platform.active_hit_test_sources(), 0);
    assert!(!platform.session_active());
    assert_eq!(platform.end_requests(), 1);

    let ui = manager.ui_state();
    assert!(ui.start_enabled);
    assert_eq!(ui.instructions, instructions::READY);
    assert_eq!(ui.diagnostics.len(), 1);
}

#[tokio::test]
async fn test_floor_space_refusal_is_fatal() {
    let platform = platform().with_faults(PlatformFaults {
        refuse_spaces: vec![ReferenceSpaceKind::LocalFloor],
        ..PlatformFaults::default()
    });
    let (mut manager, _) = session_manager(&platform, ArConfig::default());
    manager.check_support().await;

    match manager.start(ContentSelection::new("duck")).await {
        Err(StartError::SpaceUnavailable(err)) => {
            assert_eq!(err.kind, ReferenceSpaceKind::LocalFloor)
        }
        other => panic!("Expected SpaceUnavailable, got {:?}", other),
    }
    assert!(manager.context().is_none());
    assert_eq!(platform.frame_callback_count(), 0);
}

#[tokio::test]
async fn test_viewer_space_refusal_is_fatal() {
    let platform = platform().with_faults(PlatformFaults {
        refuse_spaces: vec![ReferenceSpaceKind::Viewer],
        ..PlatformFaults::default()
    });
    let (mut manager, _) = session_manager(&platform, ArConfig::default());
    manager.check_support().await;

    match manager.start(ContentSelection::new("duck")).await {
        Err(StartError::SpaceUnavailable(err)) => {
            assert_eq!(err.kind, ReferenceSpaceKind::Viewer)
        }
        other => panic!("Expected SpaceUnavailable, got {:?}", other),
    }
    assert_eq!(manager.state(), SessionState::Idle);
    assert_eq!(platform.frame_callback_count(), 0);
    assert_eq!(platform.active_hit_test_sources(), 0);
    assert_eq!(platform.end_requests(), 1);
    assert!(!platform.session_active());
    assert!(manager.ui_state().start_enabled);
}

#[tokio::test]
async fn test_layer_refusal_unwinds_start() {
    let platform = platform().with_faults(PlatformFaults {
        refuse_layer: true,
        ..PlatformFaults::default()
    });
    let (mut manager, _) = session_manager(&platform, ArConfig::default());
    manager.check_support().await;
    let err = manager.start(ContentSelection::new("duck")).await.unwrap_err();
    assert!(matches!(err, StartError::RenderSetup { .. }));
    assert!(!platform.session_active());
    assert!(manager.ui_state().start_enabled);
}

#[tokio::test]
async fn test_missing_required_feature_disables_start() {
    let platform = platform_with_missing_hit_test();
    let (mut manager, _) = session_manager(&platform, ArConfig::default());
    assert!(manager.check_support().await);

    let err = manager.start(ContentSelection::new("duck")).await.unwrap_err();
    assert!(matches!(err, StartError::Capability { .. }));
    assert_eq!(manager.state(), SessionState::Idle);
    assert_eq!(manager.support(), SupportStatus::Unsupported);

    let ui = manager.ui_state();
    assert!(!ui.start_enabled);
    assert_eq!(ui.instructions, instructions::UNSUPPORTED);

    // A second start is rejected before reaching the platform
    let err = manager.start(ContentSelection::new("duck")).await.unwrap_err();
    assert!(matches!(err, StartError::Capability { .. }));
    assert_eq!(platform.session_requests(), 1);
    assert_eq!(platform.sessions_granted(), 0);
}

#[tokio::test]
async fn test_declined_prompt_can_be_retried() {
    let platform = platform().with_faults(PlatformFaults {
        refuse_session: true,
        ..PlatformFaults::default()
    });
    let (mut manager, _) = session_manager(&platform, ArConfig::default());
    manager.check_support().await;

    let err = manager.start(ContentSelection::new("duck")).await.unwrap_err();
    assert!(matches!(err, StartError::SessionRefused { .. }));
    assert_eq!(manager.support(), SupportStatus::Supported);
    assert!(manager.ui_state().start_enabled);

    manager.start(ContentSelection::new("duck")).await.unwrap_err();
    assert_eq!(platform.session_requests(), 2);
    assert_eq!(manager.diagnostics().len(), 2);
}

fn platform_with_missing_hit_test() -> SimulatedPlatform {
    platform().with_faults(PlatformFaults {
        missing_features: vec![Feature::HitTest],
        ..PlatformFaults::default()
    })
}

#[tokio::test]
async fn test_reticle_hidden_without_hits() {
    let platform = platform();
    let (mut manager, _) = active(&platform, ArConfig::default()).await;

    let hits = vec![floor_hit(0.0, -1.0)];
    let shown = manager.dispatch(platform.frame_event(tracked(1.0).with_hits(hits)));
    assert_eq!(
        shown,
        Dispatched::Frame(FrameOutcome::Rendered { views: 1, reticle_visible: true })
    );

    for timestamp in 2..5 {
        let outcome = manager.dispatch(platform.frame_event(tracked(timestamp as f64)));
        assert_eq!(
            outcome,
            Dispatched::Frame(FrameOutcome::Rendered { views: 1, reticle_visible: false })
        );
        assert!(!manager.scene().reticle_visible());
    }
}

#[tokio::test]
async fn test_reticle_tracks_first_result_relative_to_floor() {
    let platform = platform();
    let (mut manager, _) = active(&platform, ArConfig::default()).await;

    let hits = vec![floor_hit(0.2, -1.0), floor_hit(0.0, -0.5)];
    manager.dispatch(platform.frame_event(tracked(1.0).with_hits(hits)));

    let reticle = manager.scene().reticle_pose().unwrap();
    assert!(reticle.abs_diff_eq(&Pose::from_position(Vec3::new(0.2, 0.0, -1.0)), 1e-5));
    assert_eq!(manager.ui_state().instructions, instructions::TAP_TO_PLACE);
}

#[tokio::test]
async fn test_tracking_gap_skips_rendering() {
    let platform = platform();
    let (mut manager, log) = active(&platform, ArConfig::default()).await;

    manager.dispatch(platform.frame_event(tracked(1.0).with_hits(vec![floor_hit(0.0, -1.0)])));
    let draws_before = log.borrow().draws.len();
    let binds_before = log.borrow().binds.len();

    let gap = FrameSpec {
        timestamp: 2.0,
        ..FrameSpec::default()
    };
    assert_eq!(
        manager.dispatch(platform.frame_event(gap)),
        Dispatched::Frame(FrameOutcome::TrackingLost)
    );
    assert_eq!(log.borrow().draws.len(), draws_before);

    // The layer is still bound so the compositor keeps its framebuffer
    let framebuffer = manager.context().unwrap().layer().framebuffer;
    assert_eq!(log.borrow().binds.len(), binds_before + 1);
    assert_eq!(log.borrow().binds.last(), Some(&framebuffer));
    assert!(manager.diagnostics().is_empty());
    assert_eq!(manager.frame_stats().tracking_lost, 1);
}

#[tokio::test]
async fn test_stereo_frame_renders_each_view_with_platform_matrices() {
    let platform = platform();
    let (mut manager, log) = active(&platform, ArConfig::default()).await;

    let outcome = manager.dispatch(platform.frame_event(tracked(1.0).stereo()));
    assert_eq!(
        outcome,
        Dispatched::Frame(FrameOutcome::Rendered { views: 2, reticle_visible: false })
    );

    let log = log.borrow();
    assert_eq!(log.draws.len(), 2);
    let framebuffer = manager.context().unwrap().layer().framebuffer;
    assert!(log.draws.iter().all(|draw| draw.framebuffer == Some(framebuffer)));

    assert_eq!(
        log.draws[0].viewport,
        Some(Viewport { x: 0, y: 0, width: 960, height: 1080 })
    );
    assert_eq!(
        log.draws[1].viewport,
        Some(Viewport { x: 960, y: 0, width: 960, height: 1080 })
    );

    let left = log.draws[0].camera_transform.w_axis.truncate();
    let right = log.draws[1].camera_transform.w_axis.truncate();
    assert!(left.abs_diff_eq(Vec3::new(-0.032, FLOOR_HEIGHT, 0.0), 1e-5));
    assert!(right.abs_diff_eq(Vec3::new(0.032, FLOOR_HEIGHT, 0.0), 1e-5));
    assert_eq!(log.draws[0].projection, log.draws[1].projection);
    assert_ne!(log.draws[0].projection, Mat4::IDENTITY);
}

#[tokio::test]
async fn test_select_without_reticle_is_noop() {
    let platform = platform();
    let (mut manager, _) = active(&platform, ArConfig::default()).await;

    manager.dispatch(platform.frame_event(tracked(1.0)));
    let hits = vec![floor_hit(0.0, -1.0)];
    let outcome = manager.dispatch(platform.select_event(tracked(1.0).with_hits(hits)));

    assert_eq!(outcome, Dispatched::Select(SelectOutcome::NoSurface));
    assert_eq!(manager.placement().state(), PlacementState::Empty);
    assert_eq!(manager.scene().len(), 1);
}

#[tokio::test]
async fn test_single_object_policy() {
    let platform = platform();
    let (mut manager, _) = active(&platform, config(Some(1), false)).await;

    let hits = vec![floor_hit(0.3, -1.2)];
    manager.dispatch(platform.frame_event(tracked(1.0).with_hits(hits.clone())));
    let reticle = manager.scene().reticle_pose().unwrap();

    let first = manager.dispatch(platform.select_event(tracked(1.0).with_hits(hits.clone())));
    assert!(matches!(first, Dispatched::Select(SelectOutcome::Placed { .. })));
    assert_eq!(manager.placement().state(), PlacementState::Placed(1));
    assert!(manager.placement().objects()[0].pose.abs_diff_eq(&reticle, 1e-5));
    assert_eq!(manager.scene().len(), 2);
    assert_eq!(manager.ui_state().instructions, instructions::PLACED);

    let second = manager.dispatch(platform.select_event(tracked(2.0).with_hits(hits)));
    assert_eq!(second, Dispatched::Select(SelectOutcome::PolicyExhausted));
    assert_eq!(manager.placement().state(), PlacementState::Placed(1));
    assert_eq!(manager.scene().len(), 2);
}

#[tokio::test]
async fn test_select_requeries_its_own_frame() {
    let platform = platform();
    let (mut manager, _) = active(&platform, ArConfig::default()).await;

    manager.dispatch(platform.frame_event(tracked(1.0).with_hits(vec![floor_hit(0.0, -1.0)])));
    assert!(manager.scene().reticle_visible());

    let lost = manager.dispatch(platform.select_event(tracked(1.5)));
    assert_eq!(lost, Dispatched::Select(SelectOutcome::NoSurface));

    let hits = vec![floor_hit(1.0, -2.0)];
    let moved = manager.dispatch(platform.select_event(tracked(1.5).with_hits(hits)));
    assert!(matches!(moved, Dispatched::Select(SelectOutcome::Placed { .. })));
    let pose = manager.placement().objects()[0].pose;
    assert!(pose.abs_diff_eq(&Pose::from_position(Vec3::new(1.0, 0.0, -2.0)), 1e-5));
}

#[tokio::test]
async fn test_multi_object_placement_and_end_clears_all() {
    let platform = platform();
    let (mut manager, _) = active(&platform, config(None, false)).await;

    manager.dispatch(platform.frame_event(tracked(1.0).with_hits(vec![floor_hit(0.0, -1.0)])));
    for i in 0..3 {
        let hit = floor_hit(i as f32 * 0.5, -1.0);
        manager.dispatch(platform.select_event(tracked(2.0).with_hits(vec![hit])));
    }
    assert_eq!(manager.placement().state(), PlacementState::Placed(3));
    assert_eq!(manager.scene().len(), 4);

    manager.end().await.unwrap();

    assert_eq!(manager.state(), SessionState::Idle);
    assert_eq!(manager.placement().state(), PlacementState::Empty);
    assert_eq!(manager.scene().len(), 1);
    assert!(!manager.scene().reticle_visible());
    assert_eq!(platform.active_hit_test_sources(), 0);
    assert_eq!(platform.frame_callback_count(), 0);
    assert_eq!(platform.listener_count(), 0);

    manager.start(ContentSelection::new("duck")).await.unwrap();
    assert_eq!(manager.placement().state(), PlacementState::Empty);
    assert_eq!(platform.sessions_granted(), 2);
}

#[tokio::test]
async fn test_end_is_idempotent() {
    let platform = platform();
    let (mut manager, _) = active(&platform, ArConfig::default()).await;

    manager.end().await.unwrap();
    manager.end().await.unwrap();
    assert_eq!(platform.end_requests(), 1);
    assert_eq!(manager.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_failed_termination_still_cleans_up() {
    let platform = platform().with_faults(PlatformFaults {
        fail_end: true,
        ..PlatformFaults::default()
    });
    let (mut manager, _) = active(&platform, ArConfig::default()).await;
    manager.dispatch(platform.frame_event(tracked(1.0).with_hits(vec![floor_hit(0.0, -1.0)])));
    manager.dispatch(platform.select_event(tracked(1.0).with_hits(vec![floor_hit(0.0, -1.0)])));

    assert!(manager.end().await.is_err());

    assert_eq!(manager.state(), SessionState::Idle);
    assert_eq!(manager.placement().state(), PlacementState::Empty);
    assert_eq!(platform.active_hit_test_sources(), 0);
    assert_eq!(platform.frame_callback_count(), 0);
    let last = manager.diagnostics().records().last().unwrap();
    assert!(last.message.starts_with("session end failed"));
}

#[tokio::test]
async fn test_platform_end_runs_same_cleanup() {
    let platform = platform();
    let (mut manager, _) = active(&platform, ArConfig::default()).await;
    manager.dispatch(platform.frame_event(tracked(1.0).with_hits(vec![floor_hit(0.0, -1.0)])));
    manager.dispatch(platform.select_event(tracked(1.0).with_hits(vec![floor_hit(0.0, -1.0)])));

    assert_eq!(manager.dispatch(arfloor_core::xr::XrEvent::End), Dispatched::Ended);

    assert_eq!(manager.state(), SessionState::Idle);
    assert_eq!(manager.scene().len(), 1);
    assert_eq!(platform.active_hit_test_sources(), 0);
    assert_eq!(platform.frame_callback_count(), 0);
    assert_eq!(platform.end_requests(), 0);

    let late = manager.dispatch(platform.frame_event(tracked(3.0)));
    assert_eq!(late, Dispatched::Dropped);
}

#[tokio::test]
async fn test_frame_faults_are_sampled_and_loop_continues() {
    let platform = platform();
    let mut config = ArConfig::default();
    config.diagnostics.sample_every = 2;
    let (mut manager, log) = active(&platform, config).await;

    log.borrow_mut().pending_failures = 3;
    for timestamp in 1..=3 {
        let outcome = manager.dispatch(platform.frame_event(tracked(timestamp as f64)));
        assert_eq!(outcome, Dispatched::Frame(FrameOutcome::Failed));
    }
    let faulty = tracked(4.0).with_fault(FrameFault::HitTest);
    let outcome = manager.dispatch(platform.frame_event(faulty));
    assert_eq!(outcome, Dispatched::Frame(FrameOutcome::Failed));
    let outcome = manager.dispatch(platform.frame_event(tracked(5.0).with_fault(FrameFault::Pose)));
    assert_eq!(outcome, Dispatched::Frame(FrameOutcome::Failed));

    let messages: Vec<_> = manager.diagnostics().records().map(|r| r.message.clone()).collect();
    assert_eq!(
        messages,
        vec![
            "frame 1.0: render failed: draw submitted with stale matrices".to_string(),
            "frame 3.0: render failed: draw submitted with stale matrices".to_string(),
            "frame 5.0: viewer pose query failed: pose queried during tracking transition"
                .to_string(),
        ]
    );

    let outcome = manager.dispatch(platform.frame_event(tracked(6.0)));
    assert!(matches!(outcome, Dispatched::Frame(FrameOutcome::Rendered { .. })));
    assert_eq!(manager.state(), SessionState::Active);
    assert!(manager.is_frame_callback_registered());
    assert_eq!(manager.frame_stats().failed, 5);
}

#[tokio::test]
async fn test_sustained_faults_stay_within_capacity() {
    let platform = platform();
    let mut config = ArConfig::default();
    config.diagnostics.sample_every = 1;
    let (mut manager, _) = active(&platform, config).await;

    for timestamp in 1..=20 {
        let faulty = tracked(timestamp as f64).with_fault(FrameFault::HitTest);
        manager.dispatch(platform.frame_event(faulty));
        assert!(manager.diagnostics().len() <= 5);
    }
    let first = manager.diagnostics().records().next().unwrap();
    assert!(first.message.starts_with("frame 16.0"));
    let last = manager.diagnostics().records().last().unwrap();
    assert!(last.message.starts_with("frame 20.0"));
}

#[tokio::test]
async fn test_anchor_rejection_keeps_placement() {
    let platform = platform().with_faults(PlatformFaults {
        reject_anchors: true,
        ..PlatformFaults::default()
    });
    let (mut manager, _) = active(&platform, config(Some(1), true)).await;

    let hits = vec![floor_hit(0.0, -1.0)];
    manager.dispatch(platform.frame_event(tracked(1.0).with_hits(hits.clone())));
    manager.dispatch(platform.select_event(tracked(1.0).with_hits(hits)));
    assert_eq!(manager.placement().pending_anchor_count(), 1);
    assert!(manager.diagnostics().is_empty());

    let resolved = platform.next_anchor_event().unwrap();
    assert_eq!(manager.dispatch(resolved), Dispatched::AnchorResolved);

    assert_eq!(manager.placement().state(), PlacementState::Placed(1));
    assert_eq!(manager.scene().len(), 2);
    assert!(manager.placement().objects()[0].anchor.is_none());
    assert_eq!(manager.diagnostics().len(), 1);
    let record = manager.diagnostics().records().next().unwrap();
    assert!(record.message.starts_with("anchor creation failed for placed object 1"));
}

#[tokio::test]
async fn test_anchor_updates_move_placed_object() {
    let platform = platform();
    let (mut manager, _) = active(&platform, config(Some(1), true)).await;

    let hits = vec![floor_hit(0.0, -1.0)];
    manager.dispatch(platform.frame_event(tracked(1.0).with_hits(hits.clone())));
    manager.dispatch(platform.select_event(tracked(1.0).with_hits(hits)));
    manager.dispatch(platform.next_anchor_event().unwrap());
    assert!(manager.placement().objects()[0].anchor.is_some());

    let mut corrected = tracked(2.0);
    corrected.anchor_shift = Some(Vec3::new(0.1, 0.0, 0.0));
    manager.dispatch(platform.frame_event(corrected));

    let object = &manager.placement().objects()[0];
    assert!(object.pose.abs_diff_eq(&Pose::from_position(Vec3::new(0.1, 0.0, -1.0)), 1e-5));
    let node = manager.scene().node(object.nodes().next().unwrap()).unwrap();
    assert!(node.transform.w_axis.truncate().abs_diff_eq(Vec3::new(0.1, 0.0, -1.0), 1e-5));

    manager.end().await.unwrap();
    assert_eq!(platform.live_anchor_count(), 0);
}

#[tokio::test]
async fn test_unknown_content_is_recorded_not_placed() {
    let platform = platform();
    let (mut manager, _) = session_manager(&platform, ArConfig::default());
    manager.check_support().await;
    manager.start(ContentSelection::new("teapot")).await.unwrap();

    let hits = vec![floor_hit(0.0, -1.0)];
    manager.dispatch(platform.frame_event(tracked(1.0).with_hits(hits.clone())));
    let outcome = manager.dispatch(platform.select_event(tracked(1.0).with_hits(hits)));

    assert_eq!(outcome, Dispatched::SelectFailed);
    assert_eq!(manager.placement().state(), PlacementState::Empty);
    assert_eq!(manager.diagnostics().len(), 1);
}

#[tokio::test]
async fn test_run_plays_scripted_session() {
    let platform = platform();
    let ui = RecordingUi::new();
    let history = ui.history();
    let (manager, _) = session_manager(&platform, config(Some(1), true));
    let mut manager = manager.with_ui(Box::new(ui));
    manager.check_support().await;
    manager.start(ContentSelection::new("duck").with_scale(0.5)).await.unwrap();

    let hits = vec![floor_hit(0.0, -1.0)];
    platform.push(TraceEvent::Frame(tracked(16.0)));
    platform.push(TraceEvent::Frame(tracked(32.0).with_hits(hits.clone())));
    platform.push(TraceEvent::Select(tracked(32.0).with_hits(hits.clone())));
    platform.push(TraceEvent::Frame(tracked(48.0).with_hits(hits)));
    platform.push(TraceEvent::End);

    manager.run().await;

    assert_eq!(manager.state(), SessionState::Idle);
    assert_eq!(manager.frame_stats().rendered, 3);
    assert_eq!(platform.live_anchor_count(), 0);

    let seen: Vec<String> = history.borrow().iter().map(|s| s.instructions.clone()).collect();
    assert_eq!(
        seen,
        vec![
            instructions::CHECKING,
            instructions::READY,
            instructions::STARTING,
            instructions::SCANNING,
            instructions::TAP_TO_PLACE,
            instructions::PLACED,
            instructions::READY,
        ]
    );
    assert!(history.borrow().iter().any(|s| s.ar_active));
    assert!(!history.borrow().last().unwrap().ar_active);
}
