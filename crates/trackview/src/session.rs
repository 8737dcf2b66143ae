use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use viewdispatch::ViewMode;

/// Restores the mode saved by the previous run.
///
/// Returns `None` when no session exists or it cannot be decoded; the caller
/// falls back to the configured mode.
pub fn load(path: &Path) -> Option<ViewMode> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to open session file; ignoring");
            return None;
        }
    };

    match ViewMode::read_from(&mut BufReader::new(file)) {
        Ok(mode) => {
            debug!(%mode, "restored view mode from session");
            Some(mode)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "discarding unreadable session file");
            None
        }
    }
}

pub fn persist(path: &Path, mode: ViewMode) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create session directory {}", parent.display()))?;
    }
    let mut file = File::create(path)
        .with_context(|| format!("failed to create session file {}", path.display()))?;
    mode.write_to(&mut file)
        .with_context(|| format!("failed to write session file {}", path.display()))?;
    Ok(())
}
