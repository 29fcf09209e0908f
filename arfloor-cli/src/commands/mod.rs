//! Command implementations

pub mod check;
pub mod config;
pub mod replay;

use crate::config::ReplayConfig;
use arfloor_core::TemplateLoader;

/// Loader offering every model named in the replay settings
pub fn template_loader(settings: &ReplayConfig) -> TemplateLoader {
    settings
        .models
        .iter()
        .fold(TemplateLoader::new(), |loader, model| loader.with_model(model))
}
