// Appliance cloud HTTP client
//
// Wraps `reqwest::Client` with service URL construction, envelope
// unwrapping, and bearer-token management. Endpoint groups (auth,
// devices, monitor) are implemented as inherent methods in separate
// files to keep this module focused on transport mechanics.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{Envelope, RC_NOT_LOGGED_IN, RC_OK};
use crate::transport::TransportConfig;

/// Client for the appliance cloud API.
///
/// Cheaply cloneable via `Arc`. Handles the `{ resultCode, result }`
/// envelope and versioned URL construction; all methods return unwrapped
/// `result` payloads -- the envelope is stripped before the caller sees it.
///
/// The access token lives behind a lock so `refresh()` can renew the
/// session in place while callers hold `&self`.
#[derive(Clone, Debug)]
pub struct ThinqClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    access_token: RwLock<Option<String>>,
    refresh_token: RwLock<Option<String>>,
}

impl ThinqClient {
    /// Create an unauthenticated client from a `TransportConfig`.
    ///
    /// Call [`login()`](Self::login) before using any device endpoint.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Resume a previously established session from saved tokens.
    pub fn with_session(
        base_url: Url,
        access_token: String,
        refresh_token: String,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let client = Self::new(base_url, transport)?;
        client.set_tokens(access_token, Some(refresh_token));
        Ok(client)
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                access_token: RwLock::new(None),
                refresh_token: RwLock::new(None),
            }),
        }
    }

    /// The service base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The underlying HTTP client (for auth flows that need direct access).
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    // ── Token management ─────────────────────────────────────────────

    /// Store session tokens. `refresh_token` is left untouched when
    /// `None` (token refresh rotates only the access token).
    pub(crate) fn set_tokens(&self, access: String, refresh: Option<String>) {
        debug!("storing session tokens");
        *self
            .inner
            .access_token
            .write()
            .expect("token lock poisoned") = Some(access);
        if let Some(refresh) = refresh {
            *self
                .inner
                .refresh_token
                .write()
                .expect("token lock poisoned") = Some(refresh);
        }
    }

    /// The current refresh token, if a session is established.
    pub(crate) fn refresh_token(&self) -> Option<String> {
        self.inner
            .refresh_token
            .read()
            .expect("token lock poisoned")
            .clone()
    }

    /// Apply the bearer token to a request builder.
    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let guard = self.inner.access_token.read().expect("token lock poisoned");
        match guard.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Build a full URL for a versioned API path:
    /// `{base}/v1/{path}`
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let full = format!("{base}/v1/{path}");
        Url::parse(&full).map_err(Error::InvalidUrl)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and unwrap the service envelope.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let builder = self.apply_auth(self.inner.http.get(url));
        let resp = builder.send().await.map_err(Error::Transport)?;

        Self::parse_envelope(resp).await
    }

    /// Send a POST request with JSON body and unwrap the service envelope.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("POST {}", url);

        let builder = self.apply_auth(self.inner.http.post(url).json(body));
        let resp = builder.send().await.map_err(Error::Transport)?;

        Self::parse_envelope(resp).await
    }

    /// Parse the `{ resultCode, result }` envelope, returning `result` on
    /// success, `Error::NotAuthenticated` on result code `0102`, or an
    /// `Error::Api` for any other non-zero code.
    pub(crate) async fn parse_envelope<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::NotAuthenticated);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                code: status.as_u16().to_string(),
                message: body_preview(&body).to_owned(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            let preview = body_preview(&body);
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })?;

        match envelope.result_code.as_str() {
            RC_OK => envelope.result.ok_or_else(|| Error::Deserialization {
                message: "envelope is missing the result payload".into(),
                body,
            }),
            RC_NOT_LOGGED_IN => Err(Error::NotAuthenticated),
            code => Err(Error::Api {
                code: code.to_owned(),
                message: envelope
                    .result_message
                    .unwrap_or_else(|| format!("resultCode={code}")),
            }),
        }
    }
}

/// First chunk of a response body for error messages, truncated on a
/// char boundary so multibyte bodies cannot cause a slice panic.
fn body_preview(body: &str) -> &str {
    const LIMIT: usize = 200;
    if body.len() <= LIMIT {
        return body;
    }
    let mut end = LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_preview_respects_char_boundaries() {
        // Byte 200 falls inside the first multibyte character.
        let body = format!("{}日本語エラー", "x".repeat(198));
        let preview = body_preview(&body);
        assert_eq!(preview, "x".repeat(198));

        let short = "plain ascii error";
        assert_eq!(body_preview(short), short);
    }
}
