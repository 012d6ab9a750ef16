// Vektiva Smarwi local client
//
// Plain-HTTP device on the LAN. No authentication; commands are GETs under
// `/cmd/` that answer `OK` when accepted.

mod status;

use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

pub use status::{NOT_AVAILABLE, StatusLines};

/// Body the device returns for an accepted command.
pub const RESPONSE_OK: &str = "OK";

/// Movement commands understood by `/cmd/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmarwiCommand {
    Open,
    Close,
    Stop,
    /// Open to the given percentage.
    OpenTo(u8),
}

impl SmarwiCommand {
    /// Path below `/cmd/`.
    pub fn path(self) -> String {
        match self {
            Self::Open => "open".into(),
            Self::Close => "close".into(),
            Self::Stop => "stop".into(),
            Self::OpenTo(pct) => format!("open/{pct}"),
        }
    }
}

/// HTTP client for one Smarwi unit.
pub struct SmarwiClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: std::time::Duration,
}

impl SmarwiClient {
    /// Create a client for the device at `host` (IP or hostname).
    pub fn new(host: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let base_url = Url::parse(&format!("http://{host}/"))?;
        Self::with_base_url(base_url, transport)
    }

    /// Create a client against an explicit base URL.
    pub fn with_base_url(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            base_url,
            timeout: transport.timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `ws://{host}/ws`, the push channel endpoint.
    pub fn push_url(&self) -> Result<Url, Error> {
        let mut url = self.base_url.join("ws")?;
        let scheme = if self.base_url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::WebSocketConnect(format!("cannot derive push URL from {url}")))?;
        Ok(url)
    }

    async fn get_text(&self, path: &str) -> Result<String, Error> {
        let url = self.base_url.join(path)?;
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::from_send(e, self.timeout))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_send(e, self.timeout))?;
        trace!(body = %body, "smarwi response");

        if status != reqwest::StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// Raw `/statusn` body.
    pub async fn status_text(&self) -> Result<String, Error> {
        self.get_text("statusn").await
    }

    /// Decoded `/statusn`.
    pub async fn status(&self) -> Result<StatusLines, Error> {
        Ok(StatusLines::parse(&self.status_text().await?))
    }

    /// Issue a movement command; returns the trimmed response body.
    pub async fn command(&self, cmd: SmarwiCommand) -> Result<String, Error> {
        let body = self.get_text(&format!("cmd/{}", cmd.path())).await?;
        Ok(body.trim().to_owned())
    }
}
