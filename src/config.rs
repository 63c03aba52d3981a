use std::net::SocketAddr;
use std::path::PathBuf;

use crate::store::UploadPolicy;

pub const DEFAULT_DATA_PATH: &str = "student_performance_60.csv";
pub const DEFAULT_MODEL_PATH: &str = "model_pipeline.json";
pub const DEFAULT_UPDATED_PATH: &str = "updated_student_performance.csv";
pub const DEFAULT_CURRENT_PATH: &str = "current_student_data.csv";
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// Everything the server needs once the CLI has been parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub data_path: PathBuf,
    pub model_path: PathBuf,
    /// Overwritten on every accepted upload.
    pub updated_path: PathBuf,
    /// Overwritten on every download request.
    pub current_path: PathBuf,
    pub upload_policy: UploadPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            updated_path: PathBuf::from(DEFAULT_UPDATED_PATH),
            current_path: PathBuf::from(DEFAULT_CURRENT_PATH),
            upload_policy: UploadPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bind_matches_constant() {
        let config = AppConfig::default();
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert!(!config.upload_policy.require_student_id);
    }
}
