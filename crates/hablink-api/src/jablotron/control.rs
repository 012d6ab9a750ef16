// Panel control (`ovladani.php`)
//
// Arming goes through the virtual "STATE" section: the first request carries
// no code and status 1; if the panel answers with result 4 the stored user
// code is sent in a second request with an empty status.

use tracing::{debug, info};

use super::JablotronClient;
use super::models::ControlResponse;
use crate::error::Error;

/// Section used for the user-code (arm/disarm) flow.
pub const STATE_SECTION: &str = "STATE";

impl JablotronClient {
    /// Post one control request.
    pub async fn control(
        &self,
        section: &str,
        status: &str,
        code: &str,
    ) -> Result<ControlResponse, Error> {
        let url = self.ajax_url("ovladani.php")?;
        debug!(section, status, "POST {}", url);

        let referer = self.service_url()?;
        let form = [("section", section), ("status", status), ("code", code)];
        let resp = Self::ajax(self.http().post(url), &referer)
            .form(&form)
            .send()
            .await
            .map_err(Error::Transport)?;

        let body = Self::read_body(resp, crate::transport::DEFAULT_TIMEOUT).await?;
        info!(response = %body, "control response");
        serde_json::from_str(&body).map_err(|e| Error::decode(&e, &body))
    }

    /// Send a user code through the STATE section.
    ///
    /// An empty code asks whether a code is needed (status "1"); a
    /// non-empty code answers a code prompt (empty status).
    pub async fn send_user_code(&self, code: &str) -> Result<ControlResponse, Error> {
        let status = if code.is_empty() { "1" } else { "" };
        self.control(STATE_SECTION, status, code).await
    }

    /// Switch a section or PGM output (`PGX`, `PGY`, `PGM_7`, ...).
    pub async fn control_section(&self, section: &str, on: bool) -> Result<ControlResponse, Error> {
        self.control(section, if on { "1" } else { "0" }, "").await
    }
}
