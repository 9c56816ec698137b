use std::path::Path;

use tracing::debug;

use crate::domain::{Result, TunnelError, TunnelSettings};

/// Loads tunnel settings from a TOML file. Missing keys take their default
/// value; a missing file is created with the defaults.
pub fn load_settings(path: Option<&Path>) -> Result<TunnelSettings> {
    let Some(path) = path else {
        return Ok(TunnelSettings::default());
    };
    let settings: TunnelSettings =
        confy::load_path(path).map_err(|e| TunnelError::Config(format!("{}: {}", path.display(), e)))?;
    debug!("loaded settings from {}: {:?}", path.display(), settings);
    Ok(settings)
}
