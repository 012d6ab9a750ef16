// Philips TV JointSPACE client
//
// JSON endpoints under `{base}/{api version}/`. TVs with pairing enabled
// expect the paired device id / key as HTTP credentials; they are sent as
// basic auth when configured.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// JointSPACE port.
pub const DEFAULT_PORT: u16 = 1925;

/// API version used when none is configured.
pub const DEFAULT_API_VERSION: u8 = 6;

/// Power states reported by the TV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum PowerState {
    On,
    Standby,
}

impl PowerState {
    fn from_wire(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("on") {
            Self::On
        } else {
            Self::Standby
        }
    }
}

/// `audio/volume` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub current: i64,
    pub muted: bool,
}

#[derive(Debug, Deserialize)]
struct PowerStateBody {
    powerstate: String,
}

/// Android component that identifies an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppComponent {
    pub package_name: String,
    #[serde(default)]
    pub class_name: String,
}

/// One launchable app from the TV's `applications` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub label: String,
    pub component: AppComponent,
}

#[derive(Debug, Deserialize)]
struct ApplicationList {
    #[serde(default)]
    applications: Vec<ApplicationEntry>,
}

#[derive(Debug, Deserialize)]
struct ApplicationEntry {
    label: String,
    intent: IntentBody,
}

#[derive(Debug, Deserialize)]
struct IntentBody {
    component: AppComponent,
}

/// `activities/current` payload.
#[derive(Debug, Deserialize)]
struct CurrentActivity {
    component: AppComponent,
}

/// Paired credentials for TVs that require them.
#[derive(Debug, Clone)]
pub struct TvCredentials {
    pub username: String,
    pub password: SecretString,
}

/// HTTP client for one TV.
pub struct PhilipsTvClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<TvCredentials>,
    timeout: std::time::Duration,
}

impl PhilipsTvClient {
    /// `base_url` is the TV root (e.g. `https://192.168.1.20:1925/`); the
    /// API version segment is appended here.
    pub fn new(
        base_url: &Url,
        api_version: u8,
        credentials: Option<TvCredentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let base_url = base_url.join(&format!("{api_version}/"))?;
        Ok(Self {
            http: transport.build_client()?,
            base_url,
            credentials,
            timeout: transport.timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, Error> {
        let url = self.base_url.join(path)?;
        debug!("{} {}", method, url);
        let builder = self.http.request(method, url);
        Ok(match &self.credentials {
            Some(creds) => {
                builder.basic_auth(&creds.username, Some(creds.password.expose_secret()))
            }
            None => builder,
        })
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<String, Error> {
        let resp = builder
            .send()
            .await
            .map_err(|e| Error::from_send(e, self.timeout))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "TV rejected the paired credentials".into(),
            });
        }
        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_send(e, self.timeout))?;
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let body = self.send(self.request(reqwest::Method::GET, path)?).await?;
        serde_json::from_str(&body).map_err(|e| Error::decode(&e, &body))
    }

    async fn post_json(&self, path: &str, payload: &serde_json::Value) -> Result<(), Error> {
        let builder = self.request(reqwest::Method::POST, path)?.json(payload);
        self.send(builder).await.map(|_| ())
    }

    // ── Endpoints ────────────────────────────────────────────────────

    pub async fn power_state(&self) -> Result<PowerState, Error> {
        let body: PowerStateBody = self.get_json("powerstate").await?;
        Ok(PowerState::from_wire(&body.powerstate))
    }

    pub async fn set_power_state(&self, state: PowerState) -> Result<(), Error> {
        self.post_json("powerstate", &json!({ "powerstate": state.to_string() }))
            .await
    }

    pub async fn volume(&self) -> Result<Volume, Error> {
        self.get_json("audio/volume").await
    }

    /// Set the volume; always unmutes, as the remote does.
    pub async fn set_volume(&self, level: i64) -> Result<(), Error> {
        self.post_json("audio/volume", &json!({ "muted": false, "current": level }))
            .await
    }

    /// Send a remote-control key (`Mute`, `Standby`, ...).
    pub async fn send_key(&self, key: &str) -> Result<(), Error> {
        self.post_json("input/key", &json!({ "key": key })).await
    }

    /// Apps installed on the TV, in the order it lists them.
    pub async fn applications(&self) -> Result<Vec<Application>, Error> {
        let body: ApplicationList = self.get_json("applications").await?;
        Ok(body
            .applications
            .into_iter()
            .map(|entry| Application {
                label: entry.label,
                component: entry.intent.component,
            })
            .collect())
    }

    /// Package name of the app in the foreground.
    pub async fn current_app(&self) -> Result<String, Error> {
        let body: CurrentActivity = self.get_json("activities/current").await?;
        Ok(body.component.package_name)
    }

    pub async fn launch_app(&self, app: &AppComponent) -> Result<(), Error> {
        let payload = json!({
            "intent": {
                "action": "empty",
                "component": app,
            }
        });
        self.post_json("activities/launch", &payload).await
    }

    /// Open the TV's global search for `query`.
    pub async fn search_content(&self, query: &str) -> Result<(), Error> {
        let payload = json!({
            "intent": {
                "action": "android.search.action.GLOBAL_SEARCH",
                "extras": { "query": query },
            }
        });
        self.post_json("activities/launch", &payload).await
    }
}
