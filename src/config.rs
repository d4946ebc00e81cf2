use std::path::PathBuf;

const CACHE_DIR: &str = "match_features";

pub const DEFAULT_FILE_PREFIX: &str = "backup_";
pub const DEFAULT_GAME_MODE: i64 = 22;
pub const DEFAULT_WINDOW: usize = 30;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub file_prefix: String,
    /// Only matches of this game mode are kept; `None` keeps everything.
    pub game_mode: Option<i64>,
    pub window_size: usize,
    /// Halt on the first rejected batch instead of skipping it.
    pub fail_fast: bool,
    pub build_pregame: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            game_mode: Some(DEFAULT_GAME_MODE),
            window_size: DEFAULT_WINDOW,
            fail_fast: false,
            build_pregame: false,
        }
    }
}

pub fn app_cache_dir() -> Option<PathBuf> {
    // Prefer XDG cache.
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn default_history_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("player_history.sqlite"))
}
