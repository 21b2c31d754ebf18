// File: ./src/context.rs
/*! Application context abstraction for filesystem paths.

`AppContext` encapsulates how the application determines its
data/config/cache directories. Two implementations:

- `StandardContext`: uses `directories::ProjectDirs`, or an override root
  (the CLI's `--root`).
- `TestContext`: a temporary directory for isolated tests, removed on drop.

Code that touches the filesystem receives a `&dyn AppContext` or a
`SharedContext`; there is no global path state.
*/

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Defines the file system context for the application.
pub trait AppContext: Send + Sync + std::fmt::Debug {
    fn get_data_dir(&self) -> Result<PathBuf>;
    fn get_config_dir(&self) -> Result<PathBuf>;
    fn get_cache_dir(&self) -> Result<PathBuf>;

    fn get_config_file_path(&self) -> Result<PathBuf> {
        Ok(self.get_config_dir()?.join("config.toml"))
    }

    fn get_log_file_path(&self) -> Result<PathBuf> {
        Ok(self.get_cache_dir()?.join("bigrocks.log"))
    }

    /// JSON file backing one entity collection of the local store.
    fn get_collection_path(&self, collection: &str) -> Result<PathBuf> {
        Ok(self.get_data_dir()?.join(format!("{}.json", collection)))
    }
}

// --- Production Implementation ---

#[derive(Clone, Debug)]
pub struct StandardContext {
    override_root: Option<PathBuf>,
}

impl StandardContext {
    /// When `override_root` is `Some(path)`, all directories are created
    /// under that root as `data`, `config` and `cache`.
    pub fn new(override_root: Option<PathBuf>) -> Self {
        Self { override_root }
    }

    fn ensure_exists(path: PathBuf) -> Result<PathBuf> {
        if !path.exists() {
            std::fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(path)
    }

    fn get_proj_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", "bigrocks", "bigrocks")
    }

    fn resolve(&self, subdir: &str, pick: fn(&ProjectDirs) -> PathBuf) -> Result<PathBuf> {
        if let Some(root) = &self.override_root {
            return Self::ensure_exists(root.join(subdir));
        }
        let proj = Self::get_proj_dirs().ok_or_else(|| anyhow::anyhow!("No home directory"))?;
        Self::ensure_exists(pick(&proj))
    }
}

impl AppContext for StandardContext {
    fn get_data_dir(&self) -> Result<PathBuf> {
        self.resolve("data", |p| p.data_dir().to_path_buf())
    }

    fn get_config_dir(&self) -> Result<PathBuf> {
        self.resolve("config", |p| p.config_dir().to_path_buf())
    }

    fn get_cache_dir(&self) -> Result<PathBuf> {
        self.resolve("cache", |p| p.cache_dir().to_path_buf())
    }
}

// --- Test Implementation ---

#[derive(Clone, Debug)]
pub struct TestContext {
    pub root: PathBuf,
}

impl TestContext {
    /// Creates a new TestContext backed by a unique temporary directory.
    pub fn new() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let root = std::env::temp_dir().join(format!("bigrocks_test_{}", uuid));
        std::fs::create_dir_all(&root).expect("failed to create TestContext temp dir");
        Self { root }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AppContext for TestContext {
    fn get_data_dir(&self) -> Result<PathBuf> {
        let p = self.root.join("data");
        std::fs::create_dir_all(&p)?;
        Ok(p)
    }

    fn get_config_dir(&self) -> Result<PathBuf> {
        let p = self.root.join("config");
        std::fs::create_dir_all(&p)?;
        Ok(p)
    }

    fn get_cache_dir(&self) -> Result<PathBuf> {
        let p = self.root.join("cache");
        std::fs::create_dir_all(&p)?;
        Ok(p)
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        // Best-effort cleanup; ignore errors.
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

pub type SharedContext = std::sync::Arc<dyn AppContext>;
