//! Configuration management.
//!
//! Configuration is an explicit object constructed once at startup and
//! passed into [`crate::Mind::open`]. There is no ambient global state.

use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration for memoria.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory under which every memory-space lives.
    ///
    /// A scope `(space, mind)` maps to `<data_dir>/<space>/<mind>/` with
    /// `commands/` (the journal) and `index/` (the document store) inside.
    pub data_dir: PathBuf,
    /// Fetcher settings.
    pub fetch: FetchConfig,
    /// Crawler settings.
    pub crawl: CrawlConfig,
    /// Background enhancement settings.
    pub enhance: EnhanceConfig,
    /// Default page size for `all()` listings.
    pub list_limit: usize,
}

/// Fetcher settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Timeout for a single HTTP fetch, in seconds.
    pub timeout_secs: u64,
    /// Upper bound on a fetched body, in bytes.
    pub max_body_bytes: u64,
    /// User-Agent header sent with HTTP fetches.
    pub user_agent: String,
}

/// Crawler settings.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Hard cap on resources visited in one crawl invocation.
    pub max_visits: usize,
}

/// Background enhancement settings.
#[derive(Debug, Clone)]
pub struct EnhanceConfig {
    /// Number of concurrent enhancement workers.
    pub workers: usize,
    /// Queue depth before enqueueing applies backpressure.
    pub queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = directories::ProjectDirs::from("dev", "memoria", "memoria")
            .map_or_else(|| PathBuf::from(".memoria"), |d| d.data_dir().to_path_buf());
        Self {
            data_dir,
            fetch: FetchConfig {
                timeout_secs: 30,
                max_body_bytes: 64 * 1024 * 1024,
                user_agent: concat!("memoria/", env!("CARGO_PKG_VERSION")).to_string(),
            },
            crawl: CrawlConfig { max_visits: 1000 },
            enhance: EnhanceConfig {
                workers: 2,
                queue_depth: 64,
            },
            list_limit: 10_000,
        }
    }
}

/// TOML shape of the configuration file. All fields optional.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    data_dir: Option<String>,
    list_limit: Option<usize>,
    fetch: Option<FetchFile>,
    crawl: Option<CrawlFile>,
    enhance: Option<EnhanceFile>,
}

#[derive(Debug, Deserialize)]
struct FetchFile {
    timeout_secs: Option<u64>,
    max_body_bytes: Option<u64>,
    user_agent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrawlFile {
    max_visits: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EnhanceFile {
    workers: Option<usize>,
    queue_depth: Option<usize>,
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::op("read_config_file", e))?;
        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| crate::Error::op("parse_config_file", e))?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location
    /// (`<config dir>/memoria/config.toml`), falling back to defaults when
    /// no file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };
        let path = base_dirs.config_dir().join("memoria").join("config.toml");
        if path.exists() {
            if let Ok(config) = Self::load_from_file(&path) {
                return config;
            }
        }
        Self::default()
    }

    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();
        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(limit) = file.list_limit {
            config.list_limit = limit;
        }
        if let Some(fetch) = file.fetch {
            if let Some(v) = fetch.timeout_secs {
                config.fetch.timeout_secs = v;
            }
            if let Some(v) = fetch.max_body_bytes {
                config.fetch.max_body_bytes = v;
            }
            if let Some(v) = fetch.user_agent {
                config.fetch.user_agent = v;
            }
        }
        if let Some(crawl) = file.crawl {
            if let Some(v) = crawl.max_visits {
                config.crawl.max_visits = v;
            }
        }
        if let Some(enhance) = file.enhance {
            if let Some(v) = enhance.workers {
                config.enhance.workers = v.max(1);
            }
            if let Some(v) = enhance.queue_depth {
                config.enhance.queue_depth = v.max(1);
            }
        }
        config
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }
}
