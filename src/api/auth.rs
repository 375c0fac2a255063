use crate::api::models::TokenRow;
use crate::error::{AppError, AppResult};
use crate::session::Session;
use chrono::DateTime;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// A pending login: the user opens `login_url` on a phone (usually via a QR
/// code) and the token shows up under `session_id` once they approve.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub session_id: String,
    pub login_url: String,
}

pub fn start_login(login_page_url: &str) -> LoginRequest {
    let session_id = uuid::Uuid::new_v4().to_string();
    let login_url = format!(
        "{}?session_id={}",
        login_page_url,
        urlencoding::encode(&session_id)
    );
    log::info!("Login URL: {}", login_url);
    LoginRequest {
        session_id,
        login_url,
    }
}

/// Retry cadence for the token lookup. Pending lookups retry at `interval`;
/// failed ones back off by `backoff` up to `max_interval`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_interval: Duration,
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(3000),
            max_interval: Duration::from_millis(12_000),
            backoff: 1.5,
        }
    }
}

impl RetryPolicy {
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.backoff).min(self.max_interval)
    }
}

/// Parse the token row's `expires_at` into epoch seconds.
///
/// Accepts RFC 3339 and the `+0000` offset form.
pub fn parse_expires_at(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|dt| dt.timestamp())
        .map_err(|e| log::warn!("Failed to parse expires_at {:?}: {}", raw, e))
        .ok()
}

/// Turn a token row into a session. Rows without an access token are not
/// ready yet. A bad expiry only drops the expiry.
pub fn session_from_row(row: TokenRow) -> Option<Session> {
    let access_token = row.access_token.filter(|t| !t.is_empty())?;
    Some(Session {
        access_token,
        refresh_token: row.refresh_token,
        expires_at_epoch_seconds: row.expires_at.as_deref().and_then(parse_expires_at),
        user_id: None,
    })
}

fn parse_token_rows(body: &str) -> Option<TokenRow> {
    let body = body.trim();
    if body.is_empty() || body == "null" {
        return None;
    }
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Failed to parse token lookup response: {}", e);
            return None;
        }
    };
    let first = match value {
        serde_json::Value::Array(rows) => rows.into_iter().next()?,
        row @ serde_json::Value::Object(_) => row,
        _ => return None,
    };
    serde_json::from_value(first)
        .map_err(|e| log::warn!("Unexpected token row shape: {}", e))
        .ok()
}

/// One lookup against the token table.
pub async fn lookup_session(
    http: &reqwest::Client,
    lookup_url: &str,
    api_key: &str,
    session_id: &str,
) -> AppResult<Option<Session>> {
    let session_filter = format!("eq.{}", session_id);
    let response = http
        .get(lookup_url)
        .header("apikey", api_key)
        .query(&[
            ("session_id", session_filter.as_str()),
            ("access_token", "not.is.null"),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(AppError::SpotifyApi {
            status: status.as_u16(),
            message: format!("Token lookup failed: {}", message),
        });
    }

    let body = response.text().await?;
    Ok(parse_token_rows(&body).and_then(session_from_row))
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender gone: nobody can cancel any more.
            std::future::pending::<()>().await;
        }
    }
}

/// Keep calling `lookup` until it yields a session, the `deadline` passes, or
/// `cancel` flips to `true`.
pub async fn wait_for_session<F, Fut>(
    mut lookup: F,
    policy: RetryPolicy,
    deadline: Duration,
    mut cancel: watch::Receiver<bool>,
) -> AppResult<Session>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<Option<Session>>>,
{
    let attempts = async {
        let mut delay = policy.interval;
        loop {
            if *cancel.borrow() {
                return Err(AppError::Cancelled);
            }

            match lookup().await {
                Ok(Some(session)) => return Ok(session),
                Ok(None) => {
                    log::debug!("Token not ready yet");
                    delay = policy.interval;
                }
                Err(e) => {
                    log::warn!("Token lookup failed ({}): {}", e.kind(), e);
                    delay = policy.next_delay(delay);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancelled(&mut cancel) => return Err(AppError::Cancelled),
            }
        }
    };

    tokio::time::timeout(deadline, attempts)
        .await
        .map_err(|_| AppError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn expiry_formats() {
        assert_eq!(parse_expires_at("1970-01-01T00:01:40+00:00"), Some(100));
        assert_eq!(parse_expires_at("1970-01-01T00:01:40+0000"), Some(100));
        assert_eq!(parse_expires_at("1970-01-01T00:01:40.250Z"), Some(100));
        assert_eq!(parse_expires_at("tomorrow"), None);
    }

    #[test]
    fn bad_expiry_does_not_block_the_token() {
        let row: TokenRow = serde_json::from_str(
            r#"{ "access_token": "abc", "refresh_token": "r", "expires_at": "garbage" }"#,
        )
        .unwrap();
        let session = session_from_row(row).unwrap();
        assert_eq!(session.access_token, "abc");
        assert_eq!(session.refresh_token.as_deref(), Some("r"));
        assert_eq!(session.expires_at_epoch_seconds, None);
    }

    #[test]
    fn token_rows_from_lookup_body() {
        assert!(parse_token_rows("[]").is_none());
        assert!(parse_token_rows("null").is_none());
        assert!(parse_token_rows("{oops").is_none());
        let row = parse_token_rows(r#"[{ "access_token": "abc" }]"#).unwrap();
        assert_eq!(row.access_token.as_deref(), Some("abc"));
    }

    #[test]
    fn login_url_carries_session_id() {
        let login = start_login("https://login.example.com/");
        assert_eq!(
            login.login_url,
            format!("https://login.example.com/?session_id={}", login.session_id)
        );
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        let mut delay = policy.interval;
        for _ in 0..10 {
            delay = policy.next_delay(delay);
        }
        assert_eq!(delay, policy.max_interval);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_until_token_arrives() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let counter = Arc::clone(&calls);
        let session = wait_for_session(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    match n {
                        0 => Ok(None),
                        1 => Err(AppError::Timeout),
                        _ => Ok(Some(Session::new("tok"))),
                    }
                }
            },
            RetryPolicy::default(),
            Duration::from_secs(60),
            cancel_rx,
        )
        .await
        .unwrap();

        assert_eq!(session.access_token, "tok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_deadline() {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let result = wait_for_session(
            || async { Ok(None) },
            RetryPolicy::default(),
            Duration::from_secs(10),
            cancel_rx,
        )
        .await;
        assert!(matches!(result, Err(AppError::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_waiting() {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let waiter = tokio::spawn(wait_for_session(
            || async { Ok(None) },
            RetryPolicy::default(),
            Duration::from_secs(600),
            cancel_rx,
        ));
        tokio::time::sleep(Duration::from_millis(4000)).await;
        cancel_tx.send(true).unwrap();
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(AppError::Cancelled)));
    }
}
