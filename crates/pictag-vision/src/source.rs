//! Resolving a model identifier to files on disk

use hf_hub::{api::sync::Api, Repo, RepoType};
use pictag_core::{Error, Result};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";
const PREPROCESSOR_FILE: &str = "preprocessor_config.json";
const SAFETENSORS_FILE: &str = "model.safetensors";
const PYTORCH_FILE: &str = "pytorch_model.bin";

/// Source location for a model identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A directory on the local file system
    LocalDir(PathBuf),

    /// A model repository on the Hugging Face Hub
    HuggingFace { repo_id: String, revision: String },
}

/// Model weight file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightsFormat {
    /// SafeTensors format (recommended)
    SafeTensors,
    /// PyTorch pickle format
    PyTorch,
}

/// Files making up a model, resolved on local disk
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub preprocessor: Option<PathBuf>,
    pub weights: PathBuf,
    pub format: WeightsFormat,
}

impl ModelSource {
    /// Interpret a model identifier.
    ///
    /// Existing directories and anything written as a path (`./x`, `/x`, `~/x`,
    /// more than one `/`) are local; everything else is a Hub repository id.
    pub fn from_identifier(model_id: &str, revision: &str) -> Self {
        let path = Path::new(model_id);
        if path.is_dir() || looks_like_path(model_id) {
            Self::LocalDir(path.to_path_buf())
        } else {
            Self::HuggingFace {
                repo_id: model_id.to_string(),
                revision: revision.to_string(),
            }
        }
    }

    /// Locate (downloading if needed) the files for this source
    pub fn resolve(&self) -> Result<ModelFiles> {
        match self {
            Self::LocalDir(dir) => resolve_local(dir),
            Self::HuggingFace { repo_id, revision } => resolve_hub(repo_id, revision),
        }
    }
}

fn looks_like_path(model_id: &str) -> bool {
    model_id.starts_with('.')
        || model_id.starts_with('/')
        || model_id.starts_with('~')
        || model_id.contains('\\')
        || model_id.matches('/').count() > 1
}

fn resolve_local(dir: &Path) -> Result<ModelFiles> {
    if !dir.is_dir() {
        return Err(Error::config(format!(
            "Model directory not found: {}",
            dir.display()
        )));
    }

    let config = dir.join(CONFIG_FILE);
    if !config.is_file() {
        return Err(Error::config(format!(
            "Model config not found: {}",
            config.display()
        )));
    }

    let preprocessor = Some(dir.join(PREPROCESSOR_FILE)).filter(|p| p.is_file());

    let (weights, format) = [
        (SAFETENSORS_FILE, WeightsFormat::SafeTensors),
        (PYTORCH_FILE, WeightsFormat::PyTorch),
    ]
    .into_iter()
    .map(|(name, format)| (dir.join(name), format))
    .find(|(path, _)| path.is_file())
    .ok_or_else(|| {
        Error::config(format!(
            "No {} or {} in {}",
            SAFETENSORS_FILE,
            PYTORCH_FILE,
            dir.display()
        ))
    })?;

    Ok(ModelFiles {
        config,
        preprocessor,
        weights,
        format,
    })
}

fn resolve_hub(repo_id: &str, revision: &str) -> Result<ModelFiles> {
    tracing::info!("Fetching model from Hugging Face: {} @ {}", repo_id, revision);

    let api = Api::new()
        .map_err(|e| Error::config(format!("Failed to initialize HF API: {}", e)))?;
    let repo = api.repo(Repo::with_revision(
        repo_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    let config = repo
        .get(CONFIG_FILE)
        .map_err(|e| Error::config(format!("Failed to download {} from HF: {}", CONFIG_FILE, e)))?;

    let preprocessor = match repo.get(PREPROCESSOR_FILE) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::debug!("No {} for {}: {}", PREPROCESSOR_FILE, repo_id, e);
            None
        }
    };

    let (weights, format) = match repo.get(SAFETENSORS_FILE) {
        Ok(path) => (path, WeightsFormat::SafeTensors),
        Err(e) => {
            tracing::debug!("No {} for {}: {}", SAFETENSORS_FILE, repo_id, e);
            let path = repo.get(PYTORCH_FILE).map_err(|e| {
                Error::config(format!("Failed to download model weights from HF: {}", e))
            })?;
            (path, WeightsFormat::PyTorch)
        }
    };

    Ok(ModelFiles {
        config,
        preprocessor,
        weights,
        format,
    })
}
