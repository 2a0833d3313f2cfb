//! Token endpoint exchanges: authorization code and refresh token.

use super::executor::RequestExecutor;
use crate::config::AuthConfig;
use crate::credentials::TokenPair;
use crate::error::{Error, Result};
use serde::Deserialize;
use tracing::{debug, warn};

/// Token endpoint response (standard OAuth 2.0).
///
/// Both token fields are optional here so a body missing either one is
/// reported as a failed exchange rather than a parse error.
#[derive(Deserialize, Debug)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Fully built token request: endpoint, headers, and form payload.
#[derive(Clone)]
pub struct OAuthRequestSpec {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub payload: Vec<(&'static str, String)>,
}

impl OAuthRequestSpec {
    #[cfg(test)]
    fn field(&self, name: &str) -> Option<&str> {
        self.payload
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// `application/x-www-form-urlencoded` body.
    pub fn form_body(&self) -> Result<String> {
        serde_urlencoded::to_string(&self.payload)
            .map_err(|e| Error::Authentication(format!("Failed to encode token request: {}", e)))
    }
}

impl std::fmt::Debug for OAuthRequestSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.payload.iter().map(|(key, _)| *key).collect();
        f.debug_struct("OAuthRequestSpec")
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("fields", &fields)
            .finish()
    }
}

/// One OAuth 2.0 exchange against the token endpoint.
#[derive(Clone)]
pub enum OAuthFlow {
    /// Authorization-code exchange, used when no credential exists.
    InitialAuth { auth: AuthConfig },
    /// Refresh-token exchange, used when the latest credential is stale.
    RefreshAuth {
        auth: AuthConfig,
        refresh_token: String,
    },
}

impl OAuthFlow {
    pub fn initial(auth: &AuthConfig) -> Self {
        OAuthFlow::InitialAuth { auth: auth.clone() }
    }

    pub fn refresh(auth: &AuthConfig, refresh_token: impl Into<String>) -> Self {
        OAuthFlow::RefreshAuth {
            auth: auth.clone(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn grant_type(&self) -> &'static str {
        match self {
            OAuthFlow::InitialAuth { .. } => "authorization_code",
            OAuthFlow::RefreshAuth { .. } => "refresh_token",
        }
    }

    /// Builds the request for this exchange. A new payload every call.
    pub fn request_spec(&self, token_url: &str) -> OAuthRequestSpec {
        let payload = match self {
            OAuthFlow::InitialAuth { auth } => vec![
                ("grant_type", self.grant_type().to_string()),
                ("client_id", auth.client_id.clone()),
                ("client_secret", auth.client_secret.clone()),
                ("code", auth.code.clone()),
                ("redirect_uri", auth.redirect_uri.clone()),
            ],
            OAuthFlow::RefreshAuth {
                auth,
                refresh_token,
            } => vec![
                ("grant_type", self.grant_type().to_string()),
                ("client_id", auth.client_id.clone()),
                ("client_secret", auth.client_secret.clone()),
                ("redirect_uri", auth.redirect_uri.clone()),
                ("refresh_token", refresh_token.clone()),
            ],
        };

        OAuthRequestSpec {
            url: token_url.to_string(),
            headers: vec![
                ("accept".to_string(), "application/json".to_string()),
                (
                    "content-type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ),
            ],
            payload,
        }
    }

    /// Sends the exchange and returns the issued token pair.
    ///
    /// # Returns
    /// * `Ok(Some(TokenPair))` - Status 200 with both tokens in the body
    /// * `Ok(None)` - Any other status, or a body missing either token
    /// * `Err(Error::Authentication)` - The endpoint could not be reached
    pub async fn execute(
        &self,
        token_url: &str,
        executor: &dyn RequestExecutor,
    ) -> Result<Option<TokenPair>> {
        let spec = self.request_spec(token_url);
        let body = spec.form_body()?;

        debug!(grant_type = self.grant_type(), url = %spec.url, "Requesting token");

        let response = executor.post(&spec.url, &spec.headers, body).await?;

        if response.status != 200 {
            warn!(
                grant_type = self.grant_type(),
                status = response.status,
                "Token endpoint rejected the request"
            );
            return Ok(None);
        }

        Ok(parse_token_body(&response.body))
    }
}

impl std::fmt::Debug for OAuthFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthFlow")
            .field("grant_type", &self.grant_type())
            .finish_non_exhaustive()
    }
}

fn parse_token_body(body: &str) -> Option<TokenPair> {
    let response: TokenResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Token response is not valid JSON");
            return None;
        }
    };

    debug!(
        token_type = ?response.token_type,
        expires_in = ?response.expires_in,
        "Token response received"
    );

    match (response.access_token, response.refresh_token) {
        (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
            Some(TokenPair::new(access, refresh))
        }
        _ => {
            warn!("Token response is missing access_token or refresh_token");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::executor::HttpExecutor;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn auth() -> AuthConfig {
        AuthConfig {
            client_id: "123".to_string(),
            client_secret: "s3cr3t".to_string(),
            redirect_uri: "https://example.com/cb".to_string(),
            code: "TG-abc".to_string(),
        }
    }

    fn executor() -> HttpExecutor {
        HttpExecutor::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_initial_payload() {
        let spec = OAuthFlow::initial(&auth()).request_spec("https://x/oauth/token");
        let keys: Vec<&str> = spec.payload.iter().map(|(k, _)| *k).collect();

        assert_eq!(
            keys,
            vec!["grant_type", "client_id", "client_secret", "code", "redirect_uri"]
        );
        assert_eq!(spec.field("grant_type"), Some("authorization_code"));
        assert_eq!(spec.field("code"), Some("TG-abc"));
        assert_eq!(spec.field("refresh_token"), None);
    }

    #[test]
    fn test_refresh_payload() {
        let spec = OAuthFlow::refresh(&auth(), "TG-refresh").request_spec("https://x/oauth/token");
        let keys: Vec<&str> = spec.payload.iter().map(|(k, _)| *k).collect();

        assert_eq!(
            keys,
            vec!["grant_type", "client_id", "client_secret", "redirect_uri", "refresh_token"]
        );
        assert_eq!(spec.field("grant_type"), Some("refresh_token"));
        assert_eq!(spec.field("refresh_token"), Some("TG-refresh"));
        assert_eq!(spec.field("code"), None);
    }

    #[test]
    fn test_refresh_flows_do_not_share_payloads() {
        let first = OAuthFlow::refresh(&auth(), "one").request_spec("u");
        let second = OAuthFlow::refresh(&auth(), "two").request_spec("u");

        assert_eq!(first.field("refresh_token"), Some("one"));
        assert_eq!(second.field("refresh_token"), Some("two"));
    }

    #[test]
    fn test_form_body_encoding() {
        let spec = OAuthFlow::initial(&auth()).request_spec("u");
        let body = spec.form_body().unwrap();

        assert_eq!(
            body,
            "grant_type=authorization_code&client_id=123&client_secret=s3cr3t&code=TG-abc&redirect_uri=https%3A%2F%2Fexample.com%2Fcb"
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let flow = OAuthFlow::refresh(&auth(), "TG-refresh");
        let spec = flow.request_spec("u");

        for rendered in [format!("{:?}", flow), format!("{:?}", spec)] {
            assert!(!rendered.contains("s3cr3t"));
            assert!(!rendered.contains("TG-refresh"));
        }
    }

    #[test]
    fn test_token_response_deserialization() {
        let pair = parse_token_body(
            r#"{
                "access_token": "APP_USR-1",
                "token_type": "Bearer",
                "expires_in": 21600,
                "scope": "offline_access read",
                "user_id": 42,
                "refresh_token": "TG-2"
            }"#,
        )
        .unwrap();

        assert_eq!(pair, TokenPair::new("APP_USR-1", "TG-2"));
    }

    #[test]
    fn test_token_response_missing_fields() {
        assert!(parse_token_body(r#"{"access_token": "only"}"#).is_none());
        assert!(parse_token_body(r#"{"refresh_token": "only"}"#).is_none());
        assert!(parse_token_body(r#"{"access_token": "", "refresh_token": "r"}"#).is_none());
        assert!(parse_token_body("<html>oops</html>").is_none());
    }

    #[tokio::test]
    async fn test_execute_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .match_header("accept", "application/json")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "abc".into()),
                Matcher::UrlEncoded("client_id".into(), "123".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "T1", "refresh_token": "abc2"}"#)
            .create_async()
            .await;

        let url = format!("{}/oauth/token", server.url());
        let pair = OAuthFlow::refresh(&auth(), "abc")
            .execute(&url, &executor())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(pair, Some(TokenPair::new("T1", "abc2")));
    }

    #[tokio::test]
    async fn test_execute_rejected_is_absent() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth/token")
            .with_status(400)
            .with_body(r#"{"message": "invalid_grant", "error": "invalid_grant"}"#)
            .create_async()
            .await;

        let url = format!("{}/oauth/token", server.url());
        let pair = OAuthFlow::initial(&auth())
            .execute(&url, &executor())
            .await
            .unwrap();

        assert!(pair.is_none());
    }

    #[tokio::test]
    async fn test_execute_malformed_body_is_absent() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_body(r#"{"access_token": "T1"}"#)
            .create_async()
            .await;

        let url = format!("{}/oauth/token", server.url());
        let pair = OAuthFlow::initial(&auth())
            .execute(&url, &executor())
            .await
            .unwrap();

        assert!(pair.is_none());
    }
}
