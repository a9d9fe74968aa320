use std::path::PathBuf;

use crate::error::{Error, Result};

/// Resolve the workspace data directory, following the same priority order the
/// reference observability tooling this crate is grounded on uses for its own
/// workspace root resolution:
///
/// 1. Explicit path (with tilde expansion)
/// 2. `TWINRAVEN_PATH` environment variable (with tilde expansion)
/// 3. System data directory (recommended default)
/// 4. `~/.twinraven` (fallback for systems without a standard data directory)
pub fn resolve_workspace_path(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var("TWINRAVEN_PATH") {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("twinraven"));
    }

    if let Some(home) = std::env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".twinraven"));
    }

    Err(Error::Config(
        "could not determine a workspace data directory".to_string(),
    ))
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let resolved = resolve_workspace_path(Some("/tmp/explicit")).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/explicit"));
    }

    #[test]
    fn tilde_expands_against_home() {
        std::env::set_var("HOME", "/home/testuser");
        let resolved = resolve_workspace_path(Some("~/data")).unwrap();
        assert_eq!(resolved, PathBuf::from("/home/testuser/data"));
    }
}
