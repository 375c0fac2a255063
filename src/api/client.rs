use crate::error::{AppError, AppResult};
use crate::session::SessionStore;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Method;

const JSON_CONTENT_TYPE: &str = "application/json";

pub struct SpotifyClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
}

impl SpotifyClient {
    pub fn new(base_url: &str, user_agent: &str, session: SessionStore) -> AppResult<Self> {
        let http = reqwest::Client::builder().user_agent(user_agent).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    fn auth_headers(&self) -> AppResult<HeaderMap> {
        let session = self
            .session
            .current()
            .filter(|s| !s.access_token.is_empty())
            .ok_or(AppError::NotReady("no session token"))?;
        if session.is_expired(chrono::Utc::now()) {
            return Err(AppError::TokenExpired);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
        let auth_value = format!("Bearer {}", session.access_token);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| AppError::Config(e.to_string()))?,
        );
        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Build an authorized request. Fails with `NotReady` before any network
    /// activity when there is no token.
    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
    ) -> AppResult<reqwest::RequestBuilder> {
        let headers = self.auth_headers()?;
        let mut builder = self.http.request(method, self.url(path)).headers(headers);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        Ok(builder)
    }

    pub async fn get(&self, path: &str) -> AppResult<reqwest::Response> {
        self.get_with_query(path, &[]).await
    }

    pub async fn get_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> AppResult<reqwest::Response> {
        let response = self.request(Method::GET, path, query)?.send().await?;
        self.check_response(response).await
    }

    pub async fn post(&self, path: &str, body: &serde_json::Value) -> AppResult<reqwest::Response> {
        let response = self
            .request(Method::POST, path, &[])?
            .json(body)
            .send()
            .await?;
        self.check_response(response).await
    }

    pub async fn delete(&self, path: &str) -> AppResult<reqwest::Response> {
        let response = self.request(Method::DELETE, path, &[])?.send().await?;
        self.check_response(response).await
    }

    pub async fn delete_with_body(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> AppResult<reqwest::Response> {
        let response = self
            .request(Method::DELETE, path, &[])?
            .json(body)
            .send()
            .await?;
        self.check_response(response).await
    }

    /// Player commands. The service answers with an empty body, so only the
    /// status matters; any non-2xx becomes `RemoteCommandFailed`.
    pub async fn command(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> AppResult<()> {
        let mut builder = self.request(method, path, query)?;
        builder = match body {
            Some(body) => builder.json(body),
            // Content-Length: 0 is required by the service for empty PUT/POST
            None => builder.body(Vec::new()),
        };
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == reqwest::StatusCode::UNAUTHORIZED {
            Err(AppError::AuthRequired)
        } else {
            Err(AppError::RemoteCommandFailed {
                code: status.as_u16(),
            })
        }
    }

    async fn check_response(&self, response: reqwest::Response) -> AppResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if status == reqwest::StatusCode::UNAUTHORIZED {
            Err(AppError::AuthRequired)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Err(AppError::NotFound("Resource not found".into()))
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            Err(AppError::SpotifyApi {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    #[test]
    fn requests_without_token_are_not_ready() {
        let client =
            SpotifyClient::new("https://api.example.com/v1/", "test", SessionStore::new()).unwrap();
        let err = client.request(Method::GET, "/me", &[]).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn expired_token_is_rejected_before_sending() {
        let session = Session {
            expires_at_epoch_seconds: Some(1),
            ..Session::new("tok")
        };
        let client = SpotifyClient::new(
            "https://api.example.com/v1",
            "test",
            SessionStore::with_session(session),
        )
        .unwrap();
        assert!(matches!(
            client.request(Method::GET, "/me", &[]),
            Err(AppError::TokenExpired)
        ));
    }

    #[test]
    fn relative_and_absolute_urls() {
        let client = SpotifyClient::new(
            "https://api.example.com/v1/",
            "test",
            SessionStore::with_session(Session::new("tok")),
        )
        .unwrap();
        assert_eq!(client.url("/me/player"), "https://api.example.com/v1/me/player");
        assert_eq!(
            client.url("https://api.example.com/v1/me/playlists?offset=50"),
            "https://api.example.com/v1/me/playlists?offset=50"
        );

        let request = client
            .request(Method::GET, "/me/player", &[])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer tok"
        );
    }
}
