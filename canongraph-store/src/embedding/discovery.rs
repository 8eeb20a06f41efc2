//! Model cache discovery
//!
//! Finds where local embedding models are (or should be) stored.

use std::path::{Path, PathBuf};

/// Resolve the model cache directory with priority:
/// 1. CANONGRAPH_MODELS_PATH environment variable
/// 2. `models/` under the data directory, if given
/// 3. User home directory (~/.canongraph/models)
/// 4. `./.canongraph/models` relative to the working directory
pub fn find_model_cache_dir(data_dir: Option<&Path>) -> PathBuf {
    if let Ok(models_path) = std::env::var("CANONGRAPH_MODELS_PATH") {
        let path = PathBuf::from(&models_path);
        log::info!("Using CANONGRAPH_MODELS_PATH: {}", path.display());
        return path;
    }

    if let Some(dir) = data_dir {
        let path = dir.join("models");
        log::info!("Using data directory model cache: {}", path.display());
        return path;
    }

    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        let path = PathBuf::from(home).join(".canongraph").join("models");
        log::info!("Using user model cache: {}", path.display());
        return path;
    }

    log::warn!("No home directory found, caching models under ./.canongraph/models");
    PathBuf::from(".canongraph").join("models")
}
