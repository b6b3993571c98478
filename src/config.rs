//! Configuration for Folio
//!
//! Centralized configuration with sensible defaults. `Config` describes one
//! engine instance (one data directory); `ModelConfig` describes the set of
//! stores the composing layer opens.

use std::path::PathBuf;

/// Configuration for a single engine instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files (WAL, SSTables, etc.)
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── sstables/        (SSTable files)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./folio_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Same settings, different data directory
    pub fn with_data_dir(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: path.into(),
            ..self.clone()
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

// =============================================================================
// Model Configuration
// =============================================================================

/// Configuration for the composing layer (`Model`)
///
/// Every store lives in its own engine directory:
/// ```text
///   {root}/
///     ├── article/
///     ├── tag/
///     ├── index/
///     └── idmap/     (only when `id_store` is enabled)
/// ```
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Root directory for the store directories
    pub root: PathBuf,

    /// Engine settings shared by every store (`data_dir` is replaced per store)
    pub engine: Config,

    /// Open the public id mapping store
    pub id_store: bool,

    /// Minimum length of generated public ids
    pub token_min_len: usize,

    /// Maximum length of generated public ids
    pub token_max_len: usize,

    /// Fixed seed for the public id generator (tests); `None` seeds from the OS
    pub token_seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./folio_data"),
            engine: Config::default(),
            id_store: false,
            token_min_len: 8,
            token_max_len: 8,
            token_seed: None,
        }
    }
}

impl ModelConfig {
    const ARTICLE_DIR: &'static str = "article";
    const TAG_DIR: &'static str = "tag";
    const INDEX_DIR: &'static str = "index";
    const IDMAP_DIR: &'static str = "idmap";

    /// Create a new model config builder
    pub fn builder() -> ModelConfigBuilder {
        ModelConfigBuilder::default()
    }

    pub fn article_dir(&self) -> PathBuf {
        self.root.join(Self::ARTICLE_DIR)
    }

    pub fn tag_dir(&self) -> PathBuf {
        self.root.join(Self::TAG_DIR)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join(Self::INDEX_DIR)
    }

    pub fn idmap_dir(&self) -> PathBuf {
        self.root.join(Self::IDMAP_DIR)
    }
}

/// Builder for ModelConfig
#[derive(Default)]
pub struct ModelConfigBuilder {
    config: ModelConfig,
}

impl ModelConfigBuilder {
    /// Set the root directory for all stores
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.root = path.into();
        self
    }

    /// Set the WAL sync strategy of every store
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.engine.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit of every store (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.engine.memtable_size_limit = size;
        self
    }

    /// Enable or disable the public id mapping store
    pub fn id_store(mut self, enabled: bool) -> Self {
        self.config.id_store = enabled;
        self
    }

    /// Set the length range of generated public ids
    pub fn token_len(mut self, min: usize, max: usize) -> Self {
        self.config.token_min_len = min;
        self.config.token_max_len = max;
        self
    }

    /// Seed the public id generator deterministically
    pub fn token_seed(mut self, seed: u64) -> Self {
        self.config.token_seed = Some(seed);
        self
    }

    pub fn build(self) -> ModelConfig {
        self.config
    }
}
