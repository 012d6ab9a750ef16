// Service discovery (`ajax/widget-new.php`)

use tracing::{debug, warn};

use super::JablotronClient;
use super::models::{ServiceWidget, WidgetsResponse};
use crate::error::Error;

impl JablotronClient {
    /// List the services (panels) registered on the logged-in account.
    ///
    /// Requires a prior [`login`](Self::login); the client's own service id
    /// is irrelevant here.
    pub async fn list_services(&self) -> Result<Vec<ServiceWidget>, Error> {
        let url = Self::with_timestamp(self.url("ajax/widget-new.php")?);
        debug!("GET {}", url);

        let referer = self.url("cloud")?;
        let resp = Self::ajax(self.http().get(url), &referer)
            .send()
            .await
            .map_err(Error::Transport)?;

        let body = Self::read_body(resp, crate::transport::DEFAULT_TIMEOUT).await?;
        let parsed: WidgetsResponse =
            serde_json::from_str(&body).map_err(|e| Error::decode(&e, &body))?;

        if parsed.status != super::models::STATUS_OK {
            warn!(status = parsed.status, "invalid widgets response");
            return Err(Error::Vendor {
                code: parsed.status,
                message: "service listing rejected".into(),
            });
        }

        Ok(parsed.widgets)
    }
}
