//! Selection-driven placement state machine
//!
//! `Empty → Placed(1) → Placed(2) → …` until the policy's maximum is reached.
//! With `max_placements = Some(1)` the first placement is terminal.

use crate::config::PlacementSettings;
use crate::content::ContentLoader;
use crate::diagnostics::DiagnosticsSink;
use crate::error::{AnchorCreationError, PlacementError, XrError};
use crate::session::SessionContext;
use crate::three_d::{NodeId, Scene3D};
use crate::xr::{Anchor, AnchorRequestId, Pose, ReferenceSpace, XrFrame};
use glam::Mat4;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

/// How many objects may be placed and whether they are anchored
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementPolicy {
    /// `None` for unbounded
    pub max_placements: Option<usize>,
    /// Request an anchor for every placement
    pub request_anchors: bool,
    /// Scale used when the selection has none
    pub default_scale: f32,
}

impl PlacementPolicy {
    /// One object per session
    pub fn single() -> Self {
        Self {
            max_placements: Some(1),
            request_anchors: false,
            default_scale: 1.0,
        }
    }

    /// An object per selection
    pub fn unbounded() -> Self {
        Self {
            max_placements: None,
            ..Self::single()
        }
    }

    /// Same policy with anchoring switched on or off
    pub fn with_anchors(mut self, request_anchors: bool) -> Self {
        self.request_anchors = request_anchors;
        self
    }
}

impl From<&PlacementSettings> for PlacementPolicy {
    fn from(settings: &PlacementSettings) -> Self {
        Self {
            max_placements: match settings.max_placements {
                0 => None,
                max => Some(max),
            },
            request_anchors: settings.request_anchors,
            default_scale: settings.default_scale,
        }
    }
}

/// Placement state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementState {
    /// Nothing placed this session
    Empty,
    /// This many objects placed
    Placed(usize),
}

/// Content placed at a world pose
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedObject {
    /// Session-unique identifier
    pub id: u64,
    /// Content that was instantiated
    pub content_id: String,
    /// Pose relative to `local-floor`
    pub pose: Pose,
    /// Anchor correcting this object's pose, once created
    pub anchor: Option<Anchor>,
    instances: Vec<(NodeId, Mat4)>,
}

impl PlacedObject {
    /// Render-graph nodes making up this object
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.instances.iter().map(|(node, _)| *node)
    }

    fn move_to(&mut self, pose: Pose, scene: &mut Scene3D) {
        self.pose = pose;
        let world = pose.matrix();
        for (node, local) in &self.instances {
            if let Some(node) = scene.node_mut(*node) {
                node.transform = world * *local;
            }
        }
    }
}

/// Result of a selection that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// A new object was created
    Placed {
        /// Identifier of the new object
        object: u64,
    },
    /// No surface under the ray; nothing changed
    NoSurface,
    /// The policy allows no further placements; nothing changed
    PolicyExhausted,
}

/// Converts selections into placed objects
#[derive(Debug)]
pub struct PlacementController {
    policy: PlacementPolicy,
    objects: Vec<PlacedObject>,
    pending_anchors: FxHashMap<AnchorRequestId, u64>,
    next_id: u64,
}

impl PlacementController {
    /// Create an empty controller
    pub fn new(policy: PlacementPolicy) -> Self {
        Self {
            policy,
            objects: Vec::new(),
            pending_anchors: FxHashMap::default(),
            next_id: 1,
        }
    }

    /// Current state
    pub fn state(&self) -> PlacementState {
        match self.objects.len() {
            0 => PlacementState::Empty,
            n => PlacementState::Placed(n),
        }
    }

    /// Whether the policy allows another placement
    pub fn can_place(&self) -> bool {
        self.policy
            .max_placements
            .map_or(true, |max| self.objects.len() < max)
    }

    /// Placed objects, oldest first
    pub fn objects(&self) -> &[PlacedObject] {
        &self.objects
    }

    /// Policy in force
    pub fn policy(&self) -> &PlacementPolicy {
        &self.policy
    }

    /// Anchor requests still awaiting a result
    pub fn pending_anchor_count(&self) -> usize {
        self.pending_anchors.len()
    }

    /// Handle a selection event
    ///
    /// Guarded on the reticle being visible and the policy not being
    /// exhausted. The pose comes from re-querying the selection's own frame,
    /// not from the reticle transform.
    pub fn on_select(
        &mut self,
        frame: &dyn XrFrame,
        context: &SessionContext,
        loader: &dyn ContentLoader,
        scene: &mut Scene3D,
        diagnostics: &mut DiagnosticsSink,
    ) -> Result<SelectOutcome, PlacementError> {
        if !scene.reticle_visible() {
            debug!("Selection ignored: no surface under reticle");
            return Ok(SelectOutcome::NoSurface);
        }
        if !self.can_place() {
            debug!("Selection ignored: placement limit reached");
            return Ok(SelectOutcome::PolicyExhausted);
        }

        let floor = context.spaces().local_floor;
        let pose = match context
            .hit_test()
            .first_pose(frame, &floor)
            .map_err(PlacementError::HitTest)?
        {
            Some(pose) => pose,
            None => {
                debug!("Selection ignored: surface lost on selection frame");
                return Ok(SelectOutcome::NoSurface);
            }
        };

        let selection = context.selection();
        let scale = selection.scale.unwrap_or(self.policy.default_scale);
        let nodes = loader.instantiate(&selection.content_id, scale)?;

        let id = self.next_id;
        self.next_id += 1;

        let world = pose.matrix();
        let instances = nodes
            .into_iter()
            .map(|mut node| {
                let local = node.transform;
                node.transform = world * local;
                (scene.add_node(node), local)
            })
            .collect();

        self.objects.push(PlacedObject {
            id,
            content_id: selection.content_id.clone(),
            pose,
            anchor: None,
            instances,
        });
        info!(
            "Placed {} as object {} at {:?}",
            selection.content_id, id, pose.position
        );

        if self.policy.request_anchors {
            self.request_anchor(frame, id, &pose, &floor, diagnostics);
        }

        Ok(SelectOutcome::Placed { object: id })
    }

    fn request_anchor(
        &mut self,
        frame: &dyn XrFrame,
        object: u64,
        pose: &Pose,
        floor: &ReferenceSpace,
        diagnostics: &mut DiagnosticsSink,
    ) {
        match frame.create_anchor(pose, floor) {
            Ok(request) => {
                debug!("Requested anchor {:?} for object {}", request, object);
                self.pending_anchors.insert(request, object);
            }
            Err(source) => record_anchor_failure(object, source, diagnostics),
        }
    }

    /// Handle the asynchronous result of an anchor request
    ///
    /// Returns an anchor the caller must delete because its object no longer
    /// exists.
    pub fn on_anchor_created(
        &mut self,
        request: AnchorRequestId,
        result: Result<Anchor, XrError>,
        diagnostics: &mut DiagnosticsSink,
    ) -> Option<Anchor> {
        let object_id = self.pending_anchors.remove(&request);
        let object = object_id.and_then(|id| self.objects.iter_mut().find(|o| o.id == id));

        match (object, result) {
            (Some(object), Ok(anchor)) => {
                debug!("Anchor {} bound to object {}", anchor.id(), object.id);
                object.anchor = Some(anchor);
                None
            }
            (Some(object), Err(source)) => {
                record_anchor_failure(object.id, source, diagnostics);
                None
            }
            (None, Ok(anchor)) => {
                debug!("Anchor {} resolved for a cleared object", anchor.id());
                Some(anchor)
            }
            (None, Err(_)) => None,
        }
    }

    /// Move anchored objects to their tracked poses for this frame
    ///
    /// The only path that rewrites a placed object's pose. Returns how many
    /// objects moved.
    pub fn apply_anchor_updates(
        &mut self,
        frame: &dyn XrFrame,
        floor: &ReferenceSpace,
        scene: &mut Scene3D,
    ) -> usize {
        let mut moved = 0;
        for object in &mut self.objects {
            let Some(anchor) = object.anchor else { continue };
            if let Some(pose) = frame.anchor_pose(&anchor, floor) {
                if !pose.abs_diff_eq(&object.pose, 1e-6) {
                    object.move_to(pose, scene);
                    moved += 1;
                }
            }
        }
        moved
    }

    /// Remove every placed object from `scene` and reset to `Empty`
    ///
    /// Returns the anchors that were backing the removed objects.
    pub fn clear(&mut self, scene: &mut Scene3D) -> Vec<Anchor> {
        let mut anchors = Vec::new();
        for object in self.objects.drain(..) {
            for (node, _) in &object.instances {
                scene.remove_node(*node);
            }
            anchors.extend(object.anchor);
        }
        self.pending_anchors.clear();
        anchors
    }
}

fn record_anchor_failure(object: u64, source: XrError, diagnostics: &mut DiagnosticsSink) {
    let err = AnchorCreationError { object, source };
    warn!("{}", err);
    diagnostics.push(err.to_string());
}
