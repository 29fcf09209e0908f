//! Content-loading collaborator

use crate::error::ContentError;
use crate::three_d::Node3D;
use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Which content the current placement session places
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSelection {
    /// Identifier understood by the [`ContentLoader`]
    pub content_id: String,
    /// Uniform scale; the configured default when absent
    #[serde(default)]
    pub scale: Option<f32>,
}

impl ContentSelection {
    /// Select content at the configured default scale
    pub fn new(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            scale: None,
        }
    }

    /// Select content at an explicit scale
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Some(scale);
        self
    }
}

/// Supplies renderable instances for a content identifier
///
/// Each returned node carries a transform local to the placement pose; the
/// placement controller composes it with the hit pose.
pub trait ContentLoader {
    /// Produce fresh instances of `content_id` at `scale`
    fn instantiate(&self, content_id: &str, scale: f32) -> Result<Vec<Node3D>, ContentError>;
}

/// Loader over preloaded templates, cloned on each placement
#[derive(Debug, Clone, Default)]
pub struct TemplateLoader {
    templates: FxHashMap<String, Vec<Node3D>>,
}

impl TemplateLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template made of one or more nodes
    pub fn register(&mut self, content_id: impl Into<String>, nodes: Vec<Node3D>) {
        self.templates.insert(content_id.into(), nodes);
    }

    /// Register a single-node template named after its identifier
    pub fn with_model(mut self, content_id: &str) -> Self {
        self.register(content_id, vec![Node3D::new(content_id).with_content(content_id)]);
        self
    }
}

impl ContentLoader for TemplateLoader {
    fn instantiate(&self, content_id: &str, scale: f32) -> Result<Vec<Node3D>, ContentError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ContentError::InvalidScale {
                id: content_id.to_string(),
                scale,
            });
        }
        let template = self
            .templates
            .get(content_id)
            .ok_or_else(|| ContentError::UnknownContent {
                id: content_id.to_string(),
            })?;

        let scaling = Mat4::from_scale(Vec3::splat(scale));
        Ok(template
            .iter()
            .map(|node| {
                let mut instance = node.clone();
                instance.transform = scaling * node.transform;
                instance
            })
            .collect())
    }
}
