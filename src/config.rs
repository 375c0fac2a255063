use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A preset genre mapped to a public seed playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreSeed {
    pub genre: String,
    pub playlist_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_login_page_url")]
    pub login_page_url: String,
    #[serde(default = "default_token_lookup_url")]
    pub token_lookup_url: String,
    #[serde(default)]
    pub token_lookup_api_key: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_tab_settle_delay_ms")]
    pub tab_settle_delay_ms: u64,
    #[serde(default = "default_token_retry_interval_ms")]
    pub token_retry_interval_ms: u64,
    #[serde(default = "default_token_retry_max_interval_ms")]
    pub token_retry_max_interval_ms: u64,
    #[serde(default = "default_token_retry_backoff")]
    pub token_retry_backoff: f64,
    #[serde(default = "default_token_wait_timeout_secs")]
    pub token_wait_timeout_secs: u64,
    #[serde(default = "default_tab_search_base_url")]
    pub tab_search_base_url: String,
    #[serde(default = "default_tab_home_url")]
    pub tab_home_url: String,
    #[serde(default)]
    pub preferred_device_name: Option<String>,
    #[serde(default = "default_genre_playlists")]
    pub genre_playlists: Vec<GenreSeed>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_api_base_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_login_page_url() -> String {
    "https://tone-seer-spotify-login.vercel.app/".to_string()
}

fn default_token_lookup_url() -> String {
    "https://xxrxksifwmqvhdnumqxs.supabase.co/rest/v1/spotify_tokens".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_tab_settle_delay_ms() -> u64 {
    200
}

fn default_token_retry_interval_ms() -> u64 {
    3000
}

fn default_token_retry_max_interval_ms() -> u64 {
    12_000
}

fn default_token_retry_backoff() -> f64 {
    1.5
}

fn default_token_wait_timeout_secs() -> u64 {
    600
}

fn default_tab_search_base_url() -> String {
    "https://www.songsterr.com/a/wa/".to_string()
}

fn default_tab_home_url() -> String {
    "https://www.songsterr.com/".to_string()
}

fn default_user_agent() -> String {
    "ToneSeer/0.1.0".to_string()
}

pub fn default_genre_playlists() -> Vec<GenreSeed> {
    [
        ("Rock", "61jNo7WKLOIQkahju8i0hw"),
        ("Metal", "27gN69ebwiJRtXEboL12Ih"),
        ("Pop", "1WH6WVBwPBz35ZbWsgCpgr"),
        ("Funk", "2mo0m9v49zuZMvES6439WU"),
        ("Grunge", "7AE10X6PaavMljyunWz4gg"),
        ("Reggae", "71R43lBYQZ6JQXH6LmRo1I"),
        ("Jazz", "5rdgRwdMskt1IJKjNf0VWQ"),
        ("Country", "5bfQIfupNOYI9rmjhUrkSh"),
        ("Indie", "1PmwMQY86pJuAm7veFt3u2"),
        ("Punk", "5XEDGTA0v2FGh8O2Qid8BX"),
    ]
    .into_iter()
    .map(|(genre, id)| GenreSeed {
        genre: genre.to_string(),
        playlist_id: id.to_string(),
    })
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            login_page_url: default_login_page_url(),
            token_lookup_url: default_token_lookup_url(),
            token_lookup_api_key: String::new(),
            poll_interval_ms: default_poll_interval_ms(),
            tab_settle_delay_ms: default_tab_settle_delay_ms(),
            token_retry_interval_ms: default_token_retry_interval_ms(),
            token_retry_max_interval_ms: default_token_retry_max_interval_ms(),
            token_retry_backoff: default_token_retry_backoff(),
            token_wait_timeout_secs: default_token_wait_timeout_secs(),
            tab_search_base_url: default_tab_search_base_url(),
            tab_home_url: default_tab_home_url(),
            preferred_device_name: None,
            genre_playlists: default_genre_playlists(),
            user_agent: default_user_agent(),
        }
    }
}

impl AppConfig {
    pub fn config_dir() -> AppResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::Config("Cannot find home directory".into()))?;
        Ok(home.join(".toneseer"))
    }

    pub fn config_path() -> AppResult<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Config("Config file not found".into()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config, writing defaults first if the file does not exist.
    /// An existing file that fails to parse or validate is left untouched.
    pub fn load_or_init() -> AppResult<Self> {
        Self::load_or_init_at(&Self::config_path()?)
    }

    pub fn load_or_init_at(path: &Path) -> AppResult<Self> {
        if path.exists() {
            return Self::load_from(path);
        }
        log::warn!("No config at {}, writing defaults", path.display());
        let default_config = Self::default();
        if let Err(e) = default_config.save_to(path) {
            log::error!("Failed to save default config: {}", e);
        }
        Ok(default_config)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("apiBaseUrl", &self.api_base_url),
            ("loginPageUrl", &self.login_page_url),
            ("tokenLookupUrl", &self.token_lookup_url),
            ("tabSearchBaseUrl", &self.tab_search_base_url),
            ("tabHomeUrl", &self.tab_home_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| AppError::Config(format!("{} is not a valid URL: {}", name, e)))?;
        }
        if self.poll_interval_ms == 0 || self.token_retry_interval_ms == 0 {
            return Err(AppError::Config("Intervals must be non-zero".into()));
        }
        if self.token_retry_backoff < 1.0 {
            return Err(AppError::Config("tokenRetryBackoff must be >= 1.0".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tab_settle_delay(&self) -> Duration {
        Duration::from_millis(self.tab_settle_delay_ms)
    }

    pub fn token_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.token_wait_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "preferredDeviceName": "Living Room" }"#).unwrap();
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.tab_settle_delay_ms, 200);
        assert_eq!(config.genre_playlists.len(), 10);
        assert_eq!(config.preferred_device_name.as_deref(), Some("Living Room"));
        config.validate().unwrap();
    }

    #[test]
    fn rejects_bad_urls_and_zero_intervals() {
        let mut config = AppConfig {
            api_base_url: "not a url".into(),
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        config.api_base_url = default_api_base_url();
        config.poll_interval_ms = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("toneseer-{}", uuid::Uuid::new_v4()))
            .join("config.json")
    }

    #[test]
    fn invalid_file_is_reported_and_kept() {
        let path = scratch_path();
        let content = r#"{ "tokenLookupApiKey": "secret", "pollIntervalMs": 0 }"#;
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();

        assert!(matches!(
            AppConfig::load_or_init_at(&path),
            Err(AppError::Config(_))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::load_or_init_at(&path).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let path = scratch_path();
        let config = AppConfig::load_or_init_at(&path).unwrap();
        assert_eq!(config.poll_interval_ms, 1000);
        assert!(path.exists());

        let reloaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.api_base_url, config.api_base_url);

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
