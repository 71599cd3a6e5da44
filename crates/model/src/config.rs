use crate::ann::AnnConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk layout of the model artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// Pick by file extension: `.txt`/`.vec` are text, everything else binary.
    #[default]
    Auto,
    /// word2vec text: `"<count> <dim>"` header, then `key v1 .. vdim` per line.
    Text,
    /// word2vec binary: ASCII header line, then `key<space>` + `dim` little-endian f32.
    Binary,
}

impl ModelFormat {
    /// Resolve `Auto` against a concrete path.
    pub fn resolve(self, path: &Path) -> ModelFormat {
        match self {
            ModelFormat::Auto => {
                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_ascii_lowercase());
                match ext.as_deref() {
                    Some("txt") | Some("vec") => ModelFormat::Text,
                    _ => ModelFormat::Binary,
                }
            }
            other => other,
        }
    }
}

/// Where the model lives and how to read and index it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Directory holding the model artifact.
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Artifact file name inside `model_dir`.
    #[serde(default = "default_model_file")]
    pub model_file: String,

    #[serde(default)]
    pub format: ModelFormat,

    /// L2-normalize every vector at load. The table is read-only either way.
    #[serde(default = "default_true")]
    pub normalize: bool,

    #[serde(default)]
    pub ann: AnnConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            model_file: default_model_file(),
            format: ModelFormat::default(),
            normalize: true,
            ann: AnnConfig::default(),
        }
    }
}

impl ModelConfig {
    /// Config pointing at a single artifact path.
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self {
            model_dir: path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
            model_file: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: ModelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_ann(mut self, ann: AnnConfig) -> Self {
        self.ann = ann;
        self
    }

    /// Full path of the artifact.
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_file)
    }
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("/opt/ml/model")
}

fn default_model_file() -> String {
    "word2vec_2.model".to_string()
}

fn default_true() -> bool {
    true
}
