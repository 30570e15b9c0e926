// Session authentication
//
// Token-based login and in-place refresh. The login endpoint returns an
// access/refresh token pair; the refresh endpoint rotates the access
// token while the refresh token stays valid.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::client::ThinqClient;
use crate::error::Error;

#[derive(Debug, Deserialize)]
struct LoginResult {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResult {
    #[serde(rename = "accessToken")]
    access_token: String,
}

impl ThinqClient {
    /// Authenticate with username/password.
    ///
    /// On success the token pair is stored in the client and used for all
    /// subsequent requests. Rejected credentials are fatal -- the caller
    /// must not retry login in a loop.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.api_url("auth/login")?;

        debug!("logging in at {}", url);

        let body = json!({
            "username": username,
            "password": password.expose_secret(),
        });

        let resp = self
            .http()
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let result: LoginResult = match Self::parse_envelope(resp).await {
            Ok(result) => result,
            // Any service-level rejection of a login is an authentication
            // failure, including a 0102 on the login endpoint itself.
            Err(Error::Api { code, message }) => {
                return Err(Error::Authentication {
                    message: format!("login rejected (code {code}): {message}"),
                });
            }
            Err(Error::NotAuthenticated) => {
                return Err(Error::Authentication {
                    message: "login rejected".into(),
                });
            }
            Err(e) => return Err(e),
        };

        self.set_tokens(result.access_token, Some(result.refresh_token));
        debug!("login successful");
        Ok(())
    }

    /// Renew the access token in place using the stored refresh token.
    ///
    /// Idempotent: refreshing an already-fresh session simply rotates the
    /// access token again. Any rejection is fatal (`Error::Authentication`)
    /// -- a refresh token the service will not accept cannot recover.
    pub async fn refresh(&self) -> Result<(), Error> {
        let refresh_token = self.refresh_token().ok_or_else(|| Error::Authentication {
            message: "no session to refresh -- login first".into(),
        })?;

        let url = self.api_url("auth/refresh")?;

        debug!("refreshing session at {}", url);

        let resp = self
            .http()
            .post(url)
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .map_err(Error::Transport)?;

        let result: RefreshResult = match Self::parse_envelope(resp).await {
            Ok(result) => result,
            Err(Error::Api { code, message }) => {
                return Err(Error::Authentication {
                    message: format!("refresh rejected (code {code}): {message}"),
                });
            }
            Err(Error::NotAuthenticated) => {
                return Err(Error::Authentication {
                    message: "refresh token rejected".into(),
                });
            }
            Err(e) => return Err(e),
        };

        self.set_tokens(result.access_token, None);
        debug!("session refreshed");
        Ok(())
    }
}
