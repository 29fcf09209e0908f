//! Check command implementation

use super::template_loader;
use crate::config::Config;
use anyhow::Result;
use arfloor_core::xr::simulated::SimulatedPlatform;
use arfloor_core::{RecordingRenderer, SessionManager};
use colored::*;

/// Run the capability check against a simulated device
pub async fn check(unsupported: bool, config: &Config) -> Result<bool> {
    let platform = if unsupported {
        SimulatedPlatform::unsupported()
    } else {
        SimulatedPlatform::new()
    };
    let mut manager = SessionManager::new(
        Box::new(platform),
        Box::new(RecordingRenderer::new()),
        Box::new(template_loader(&config.replay)),
        config.ar.clone(),
    );

    let supported = manager.check_support().await;
    let ui = manager.ui_state();
    let mark = if supported { "✓".green().bold() } else { "✗".red().bold() };
    println!("{} {:?}: {}", mark, config.ar.session.mode, ui.instructions);
    println!(
        "  start button: {}",
        if ui.start_enabled { "enabled".green() } else { "disabled".yellow() }
    );
    Ok(supported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_reports_support() {
        let config = Config::default();
        assert!(check(false, &config).await.unwrap());
        assert!(!check(true, &config).await.unwrap());
    }
}
