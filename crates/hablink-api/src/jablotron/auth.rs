// Jablotron session handling
//
// Login posts the web form; the cloud answers with a JSON status and sets
// PHPSESSID in the jar. After every login the service page must be loaded
// once, otherwise the panel endpoints keep answering "no session".

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::JablotronClient;
use super::models::LoginResponse;
use crate::error::Error;

impl JablotronClient {
    /// Log in with the account credentials.
    ///
    /// On success the session cookie is stored in the client's jar and
    /// returned (the opaque token for the session store). When the cloud
    /// doesn't expose the cookie to us, an empty token is returned; the jar
    /// still carries whatever it received.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<String, Error> {
        let url = self.url("ajax/login.php")?;
        debug!("logging in at {}", url);

        let form = [
            ("login", username),
            ("heslo", password.expose_secret()),
            ("aStatus", "200"),
            ("loginType", "Login"),
        ];

        let resp = Self::ajax(self.http().post(url), self.base_url())
            .form(&form)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }
        if !status.is_success() {
            // An outage, not bad credentials.
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        let parsed: LoginResponse =
            serde_json::from_str(&body).map_err(|e| Error::decode(&e, &body))?;

        if !parsed.is_ok() {
            return Err(Error::Authentication {
                message: format!("login rejected with status {}", parsed.status),
            });
        }

        debug!("login successful");
        Ok(self.session_cookie().unwrap_or_default())
    }

    /// Load the service page so the panel endpoints accept the session.
    pub async fn initialize_service(&self) -> Result<(), Error> {
        let url = self.service_url()?;
        debug!(service = %self.service_id(), "initializing service at {}", url);

        let resp = self
            .http()
            .get(url)
            .header(reqwest::header::REFERER, self.base_url().as_str())
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::OK {
            debug!(service = %self.service_id(), "service initialized");
            return Ok(());
        }
        if status.is_redirection() {
            return Err(Error::SessionExpired);
        }
        Err(Error::UnexpectedStatus {
            status: status.as_u16(),
            body: format!("cannot initialize {} service {}", self.kind(), self.service_id()),
        })
    }

    /// End the current session. Bounded by [`super::LOGOUT_TIMEOUT`].
    pub async fn logout(&self) -> Result<(), Error> {
        let url = self.url("logout")?;
        debug!("logging out at {}", url);

        let referer = self.service_url()?;
        let resp = self
            .http()
            .get(url)
            .header(reqwest::header::REFERER, referer.as_str())
            .timeout(super::LOGOUT_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::from_send(e, super::LOGOUT_TIMEOUT))?;

        debug!(status = %resp.status(), "logout complete");
        Ok(())
    }
}
