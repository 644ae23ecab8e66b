//! JSON persistence for the catalog cache and the config file.

use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Reads and writes named JSON documents under a single base directory.
///
/// Saves go through a `.tmp` file followed by an atomic rename, so a crash
/// mid-write leaves the previous file intact.
pub struct StorageManager {
    pub base_dir: PathBuf,
}

impl StorageManager {
    /// Create a manager rooted at `dir` (relative to the working directory),
    /// creating the directory if it does not exist yet.
    pub async fn new<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let base_dir = dir.as_ref().to_path_buf();
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    /// Serialize `data` and save it as `{name}.json`.
    pub async fn save<T: Serialize>(&self, name: &str, data: &T) -> anyhow::Result<()> {
        let file_name = format!("{name}.json");
        let final_path = self.base_dir.join(&file_name);
        let tmp_path = self.base_dir.join(format!("{file_name}.tmp"));

        let json_bytes = serde_json::to_vec_pretty(data)?;
        fs::write(&tmp_path, json_bytes).await?;
        fs::rename(tmp_path, final_path).await?;

        Ok(())
    }

    /// Read `{name}.json` and deserialize it into `T`.
    pub async fn load<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        let path = self.base_dir.join(format!("{name}.json"));
        // Raw bytes straight into serde; no need for a UTF-8 validation pass.
        let content = fs::read(path).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }
}
