//! OAuth2 authorization flows against Google's identity endpoints.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken,
    Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::oneshot;
use url::Url;

use stocksheet_common::{Error, Result};

use super::credentials::{Credential, IdentityProvider};

/// OAuth2 authorization endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// OAuth2 token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// How long the interactive flow waits for the consent callback.
const CALLBACK_TIMEOUT_SECS: u64 = 180;

/// Page shown in the browser once the consent callback has been received.
const CONSENT_OK_HTML: &str = "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>stocksheet</title></head>\
<body><h1>Authorization complete</h1>\
<p>You can close this page and return to the terminal.</p></body></html>";

/// Page shown when the user denied consent.
const CONSENT_DENIED_HTML: &str = "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>stocksheet</title></head>\
<body><h1>Authorization failed</h1>\
<p>Consent was not granted. You can close this page.</p></body></html>";

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// OAuth2 client configuration, as exported by the Google console for an
/// installed application (`client_secret.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Client ID.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Authorization endpoint.
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    /// Token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ClientConfig {
    /// Load a client configuration from a `client_secret.json` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Authorization(format!(
                "Failed to read client configuration {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    /// Parse a client configuration from JSON.
    ///
    /// Console exports wrap the fields in an `installed` section; a flat
    /// object is accepted as well.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| Error::Authorization(format!("Malformed client configuration: {}", e)))?;
        let section = value.get("installed").unwrap_or(&value);
        serde_json::from_value(section.clone())
            .map_err(|e| Error::Authorization(format!("Malformed client configuration: {}", e)))
    }
}

/// Identity provider implementation over Google's OAuth2 endpoints.
pub struct AuthManager {
    config: ClientConfig,
}

impl AuthManager {
    /// Create an auth manager from a client configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn oauth_client(&self, redirect_url: Option<&str>) -> Result<BasicClient> {
        let mut client = BasicClient::new(
            ClientId::new(self.config.client_id.clone()),
            Some(ClientSecret::new(self.config.client_secret.clone())),
            AuthUrl::new(self.config.auth_uri.clone())
                .map_err(|e| Error::Authorization(format!("Invalid auth URL: {}", e)))?,
            Some(
                TokenUrl::new(self.config.token_uri.clone())
                    .map_err(|e| Error::Authorization(format!("Invalid token URL: {}", e)))?,
            ),
        );

        if let Some(redirect) = redirect_url {
            client = client.set_redirect_uri(
                RedirectUrl::new(redirect.to_string())
                    .map_err(|e| Error::Authorization(format!("Invalid redirect URL: {}", e)))?,
            );
        }

        Ok(client)
    }

    /// Generate the consent URL for the user to visit.
    ///
    /// Offline access with a forced consent prompt, so a refresh token is
    /// issued even on re-authorization.
    fn consent_url(client: &BasicClient, scopes: &[String]) -> (Url, CsrfToken) {
        let mut request = client.authorize_url(CsrfToken::new_random);
        for scope in scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        request
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url()
    }

    /// Run the interactive authorization flow.
    ///
    /// Binds a callback listener on an ephemeral local port, opens the
    /// consent URL in a browser, and blocks until the redirect arrives or
    /// the wait times out.
    ///
    /// # Errors
    /// - Callback listener could not be bound
    /// - Consent denied, callback timeout, or CSRF state mismatch
    /// - Code exchange rejected by the token endpoint
    pub async fn authorize_interactive(&self, scopes: &[String]) -> Result<Credential> {
        let server = tiny_http::Server::http("127.0.0.1:0").map_err(|e| {
            Error::Authorization(format!("Failed to bind the callback listener: {}", e))
        })?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| {
                Error::Authorization("Callback listener has no TCP address".to_string())
            })?;
        let redirect = format!("http://127.0.0.1:{}", port);

        let client = self.oauth_client(Some(&redirect))?;
        let (auth_url, csrf_state) = Self::consent_url(&client, scopes);

        let (tx, rx) = oneshot::channel();
        let acceptor = std::thread::spawn(move || accept_callback(server, tx));

        tracing::info!("Waiting for consent, visit {} if no browser opens", auth_url);
        if let Err(e) = open::that(auth_url.as_str()) {
            tracing::warn!("Failed to open a browser: {}", e);
        }

        let callback = tokio::time::timeout(
            std::time::Duration::from_secs(CALLBACK_TIMEOUT_SECS),
            rx,
        )
        .await
        .map_err(|_| {
            Error::Authorization("Timed out waiting for the consent callback".to_string())
        })?;

        // The sender is dropped when the acceptor exits, so a receive error
        // means the thread finished with the real cause.
        let accepted = acceptor
            .join()
            .map_err(|_| Error::Authorization("Callback listener panicked".to_string()))?;
        let (code, state) = match callback {
            Ok(pair) => {
                accepted?;
                pair
            }
            Err(_) => {
                return Err(accepted.err().unwrap_or_else(|| {
                    Error::Authorization("Consent callback channel closed".to_string())
                }))
            }
        };

        if state != csrf_state.secret().as_str() {
            return Err(Error::Authorization(
                "CSRF state mismatch in the consent callback".to_string(),
            ));
        }

        let token = client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| Error::Authorization(format!("Code exchange failed: {}", e)))?;

        Ok(credential_from_response(&token, scopes, None))
    }

    /// Exchange a refresh token for a renewed access token.
    ///
    /// The refresh response may omit the refresh token; the prior one is
    /// carried over in that case.
    pub async fn refresh_credential(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::Refresh("No refresh token to exchange".to_string()))?;

        let client = self.oauth_client(None)?;
        let token = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| Error::Refresh(format!("Refresh exchange failed: {}", e)))?;

        Ok(credential_from_response(
            &token,
            &credential.scopes,
            credential.refresh_token.clone(),
        ))
    }
}

#[async_trait]
impl IdentityProvider for AuthManager {
    async fn authorize(&self, scopes: &[String]) -> Result<Credential> {
        self.authorize_interactive(scopes).await
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        self.refresh_credential(credential).await
    }
}

fn credential_from_response(
    token: &BasicTokenResponse,
    requested_scopes: &[String],
    prior_refresh: Option<String>,
) -> Credential {
    let refresh_token = token
        .refresh_token()
        .map(|t| t.secret().clone())
        .or(prior_refresh);

    let expires_in = token
        .expires_in()
        .unwrap_or_else(|| std::time::Duration::from_secs(3600));
    let expires_at = Utc::now() + Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1));

    // The token endpoint reports the granted scopes; fall back to the
    // requested set when it stays silent.
    let scopes = token
        .scopes()
        .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
        .unwrap_or_else(|| requested_scopes.to_vec());

    Credential {
        access_token: token.access_token().secret().clone(),
        refresh_token,
        expires_at,
        scopes,
    }
}

/// Accept loop for the consent redirect.
///
/// Answers the one request carrying `code` and `state`, ignoring stray
/// requests such as favicon fetches.
fn accept_callback(
    server: tiny_http::Server,
    tx: oneshot::Sender<(String, String)>,
) -> Result<()> {
    let mut tx = Some(tx);

    for request in server.incoming_requests() {
        let url = Url::parse(&format!("http://127.0.0.1{}", request.url()))
            .map_err(|e| Error::Authorization(format!("Malformed callback request: {}", e)))?;
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        if let Some(denied) = params.get("error") {
            let denied = denied.clone();
            respond_html(request, CONSENT_DENIED_HTML);
            return Err(Error::Authorization(format!(
                "Consent was not granted: {}",
                denied
            )));
        }

        let (code, state) = match (params.get("code"), params.get("state")) {
            (Some(code), Some(state)) => (code.clone(), state.clone()),
            _ => {
                let _ = request.respond(tiny_http::Response::empty(404));
                continue;
            }
        };

        respond_html(request, CONSENT_OK_HTML);
        if let Some(tx) = tx.take() {
            let _ = tx.send((code, state));
        }
        return Ok(());
    }

    Err(Error::Authorization(
        "Callback listener shut down before a code arrived".to_string(),
    ))
}

fn respond_html(request: tiny_http::Request, body: &str) {
    let header = tiny_http::Header::from_bytes(
        &b"Content-Type"[..],
        &b"text/html; charset=utf-8"[..],
    )
    .expect("static header is valid");
    let response = tiny_http::Response::from_string(body).with_header(header);
    if let Err(e) = request.respond(response) {
        tracing::warn!("Failed to answer the consent callback: {}", e);
    }
}
