//! Reticle behavior over arbitrary hit-test results

use arfloor_core::config::ArConfig;
use arfloor_core::xr::simulated::{FrameSpec, SimulatedPlatform};
use arfloor_core::xr::Pose;
use arfloor_core::{
    ContentSelection, Dispatched, FrameOutcome, RecordingRenderer, SessionManager, TemplateLoader,
};
use glam::{Quat, Vec3};
use proptest::prelude::*;

const FLOOR_HEIGHT: f32 = 1.5;

fn active_session(platform: &SimulatedPlatform) -> SessionManager {
    let mut manager = SessionManager::new(
        Box::new(platform.clone()),
        Box::new(RecordingRenderer::new()),
        Box::new(TemplateLoader::new().with_model("duck")),
        ArConfig::default(),
    );
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    runtime.block_on(async {
        assert!(manager.check_support().await);
        manager.start(ContentSelection::new("duck")).await.unwrap();
    });
    manager
}

fn hit() -> impl Strategy<Value = Pose> {
    (-5.0f32..5.0, -0.2f32..0.2, -5.0f32..5.0, -3.1f32..3.1).prop_map(|(x, y, z, yaw)| {
        Pose::new(Vec3::new(x, y - FLOOR_HEIGHT, z), Quat::from_rotation_y(yaw))
    })
}

fn viewer() -> impl Strategy<Value = Pose> {
    (-1.0f32..1.0, -0.5f32..0.5, -1.0f32..1.0)
        .prop_map(|(x, y, z)| Pose::from_position(Vec3::new(x, y, z)))
}

proptest! {
    #[test]
    fn prop_reticle_follows_first_hit(
        hits in prop::collection::vec(hit(), 0..6),
        viewer in viewer(),
    ) {
        let platform = SimulatedPlatform::new().with_floor_height(FLOOR_HEIGHT);
        let mut manager = active_session(&platform);

        let spec = FrameSpec::tracked(1.0, viewer).with_hits(hits.clone());
        let outcome = manager.dispatch(platform.frame_event(spec));

        let visible = !hits.is_empty();
        prop_assert_eq!(
            outcome,
            Dispatched::Frame(FrameOutcome::Rendered { views: 1, reticle_visible: visible })
        );
        prop_assert_eq!(manager.scene().reticle_visible(), visible);

        match hits.first() {
            Some(first) => {
                let floor_origin = Pose::from_position(Vec3::new(0.0, -FLOOR_HEIGHT, 0.0));
                let expected = first.relative_to(&floor_origin);
                let reticle = manager.scene().reticle_pose();
                prop_assert!(reticle.is_some());
                prop_assert!(reticle.unwrap().abs_diff_eq(&expected, 1e-4));
            }
            None => prop_assert!(manager.scene().reticle_pose().is_none()),
        }
    }

    #[test]
    fn prop_reticle_hides_after_hits_vanish(hits in prop::collection::vec(hit(), 1..6)) {
        let platform = SimulatedPlatform::new().with_floor_height(FLOOR_HEIGHT);
        let mut manager = active_session(&platform);

        let spec = FrameSpec::tracked(1.0, Pose::IDENTITY).with_hits(hits);
        manager.dispatch(platform.frame_event(spec));
        prop_assert!(manager.scene().reticle_visible());

        manager.dispatch(platform.frame_event(FrameSpec::tracked(2.0, Pose::IDENTITY)));
        prop_assert!(!manager.scene().reticle_visible());
    }
}
