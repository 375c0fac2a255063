#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication required")]
    AuthRequired,

    #[error("Token expired")]
    TokenExpired,

    #[error("Not ready: {0}")]
    NotReady(&'static str),

    #[error("Remote command failed with status {code}")]
    RemoteCommandFailed { code: u16 },

    #[error("Spotify API error: {status} - {message}")]
    SpotifyApi { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Timed out")]
    Timeout,

    #[error("Cancelled")]
    Cancelled,
}

impl AppError {
    pub fn kind(&self) -> &str {
        match self {
            AppError::Http(_) => "http",
            AppError::Json(_) => "json",
            AppError::Io(_) => "io",
            AppError::AuthRequired => "auth_required",
            AppError::TokenExpired => "token_expired",
            AppError::NotReady(_) => "not_ready",
            AppError::RemoteCommandFailed { .. } => "remote_command_failed",
            AppError::SpotifyApi { .. } => "spotify_api",
            AppError::NotFound(_) => "not_found",
            AppError::Config(_) => "config",
            AppError::Timeout => "timeout",
            AppError::Cancelled => "cancelled",
        }
    }

    /// Missing token or device. Callers treat these as silent no-ops.
    pub fn is_precondition(&self) -> bool {
        matches!(self, AppError::NotReady(_))
    }
}

pub type AppResult<T> = Result<T, AppError>;
