// Panel status polling (`stav.php`)

use tracing::{debug, trace};

use super::models::StatusResponse;
use super::{JablotronClient, STATUS_TIMEOUT};
use crate::error::Error;

impl JablotronClient {
    /// Fetch the raw status body of the panel.
    ///
    /// The body is returned undecoded so the caller can classify the
    /// cloud's status codes (busy, no session, in service) itself.
    pub async fn status_body(&self) -> Result<String, Error> {
        let url = Self::with_timestamp(self.ajax_url("stav.php")?);
        debug!("GET {}", url);

        let referer = self.service_url()?;
        let resp = Self::ajax(self.http().get(url), &referer)
            .timeout(STATUS_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::from_send(e, STATUS_TIMEOUT))?;

        let body = Self::read_body(resp, STATUS_TIMEOUT).await?;
        trace!(body = %body, "status response");
        Ok(body)
    }

    /// Fetch and decode the panel status.
    pub async fn status(&self) -> Result<StatusResponse, Error> {
        let body = self.status_body().await?;
        StatusResponse::from_body(&body)
    }
}
