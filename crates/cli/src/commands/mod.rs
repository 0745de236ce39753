//! Command implementations.

mod info;
mod run;
mod validate;

use std::path::Path;

use contracts::RoutingBlueprint;

use crate::error::{CliError, Result};

pub use info::run_info;
pub use run::run_engine;
pub use validate::run_validate;

/// Load and validate the blueprint at `path`
fn load_blueprint(path: &Path) -> Result<RoutingBlueprint> {
    if !path.exists() {
        return Err(CliError::config_not_found(path));
    }
    config_loader::ConfigLoader::load_from_path(path)
        .map_err(|e| CliError::config_load(format!("{}: {}", path.display(), e)))
}
