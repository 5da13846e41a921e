//! Centralized configuration for the model tracker.
//!
//! Crawl targets, network timeouts and query bounds live here so the
//! ingestion adapters, the query engine and the server agree on them.

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "AI Model Tracker";
    pub const DEFAULT_DB_FILENAME: &'static str = "model-tracker.db";
    pub const DB_PATH_ENV: &'static str = "MODEL_TRACKER_DB";
    pub const HF_TOKEN_ENV: &'static str = "HF_TOKEN";
}

/// Model hub crawl configuration.
pub struct HubConfig;

impl HubConfig {
    pub const API_BASE: &'static str = "https://huggingface.co/api";
    /// Pipeline tags (task types) crawled daily and accepted as query filters.
    pub const TARGET_PIPELINE_TAGS: &'static [&'static str] = &[
        "text-generation",
        "text2text-generation",
        "image-text-to-text",
        "text-to-image",
    ];
    /// Top-N by likes is enough to catch fast risers.
    pub const LIMIT_PER_TAG: u32 = 200;
    pub const PAUSE_BETWEEN_TAGS: Duration = Duration::from_secs(1);
}

/// Preprint feed crawl configuration.
pub struct ArxivConfig;

impl ArxivConfig {
    pub const API_URL: &'static str = "http://export.arxiv.org/api/query";
    /// Categories crawled daily and accepted as query filters.
    pub const CATEGORIES: &'static [&'static str] = &["cs.AI", "cs.LG", "cs.CL", "cs.CV", "stat.ML"];
    pub const PAPERS_PER_CATEGORY: u32 = 100;
    /// arXiv API terms ask for three seconds between calls.
    pub const PAUSE_BETWEEN_CATEGORIES: Duration = Duration::from_secs(3);
}

/// Crowd leaderboard crawl configuration.
pub struct ArenaConfig;

impl ArenaConfig {
    pub const SPACE_ID: &'static str = "lmarena-ai/lmarena-leaderboard";
    pub const RESOLVE_BASE: &'static str = "https://huggingface.co/spaces";
    pub const FILE_PATTERN: &'static str = r"^elo_results_(\d{8})\.json$";
    /// Upper bound on leaderboard files imported per run, newest first.
    pub const MAX_FILES_PER_RUN: usize = 3;
    /// How many stored dates to consult when skipping already-imported files.
    pub const IMPORTED_DATES_LOOKBACK: usize = 500;
}

/// Batch-level ingestion policy.
pub struct IngestConfig;

impl IngestConfig {
    /// A crawl whose per-record error rate exceeds this fails the run.
    pub const ERROR_RATE_THRESHOLD: f64 = 0.1;
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
    pub const USER_AGENT: &'static str = "model-tracker/0.1";
}

/// Inclusive bounds and defaults for read-API parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: u32,
    pub max: u32,
    pub default: u32,
}

/// Query parameter bounds shared by the query engine and the HTTP layer.
pub struct QueryLimits;

impl QueryLimits {
    pub const DAYS: Bounds = Bounds {
        min: 1,
        max: 90,
        default: 7,
    };
    pub const LIMIT: Bounds = Bounds {
        min: 1,
        max: 100,
        default: 20,
    };
    pub const HISTORY_LIMIT: Bounds = Bounds {
        min: 1,
        max: 180,
        default: 30,
    };
    pub const ARENA_LIMIT: Bounds = Bounds {
        min: 1,
        max: 500,
        default: 100,
    };
}

/// Check whether a pipeline tag is one the tracker crawls.
pub fn is_known_pipeline_tag(tag: &str) -> bool {
    HubConfig::TARGET_PIPELINE_TAGS.contains(&tag)
}

/// Check whether an arXiv category is one the tracker crawls.
pub fn is_known_category(category: &str) -> bool {
    ArxivConfig::CATEGORIES.contains(&category)
}
