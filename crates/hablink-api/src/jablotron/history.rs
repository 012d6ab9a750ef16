// Event history (`historie.php`)

use tracing::debug;

use super::models::{Ja100History, OasisHistory, PanelEvent};
use super::{JablotronClient, PanelKind, STATUS_TIMEOUT};
use crate::error::Error;

impl JablotronClient {
    /// Events of the current month, newest first as the cloud lists them.
    pub async fn history(&self) -> Result<Vec<PanelEvent>, Error> {
        let url = self.ajax_url("historie.php")?;
        debug!("POST {}", url);

        let form = [
            ("from", "this_month"),
            ("to", ""),
            ("gps", "0"),
            ("log", "0"),
            ("header", "0"),
        ];
        let resp = Self::ajax(self.http().post(url), self.base_url())
            .form(&form)
            .timeout(STATUS_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::from_send(e, STATUS_TIMEOUT))?;

        let body = Self::read_body(resp, STATUS_TIMEOUT).await?;
        let events = match self.kind() {
            PanelKind::Oasis => serde_json::from_str::<OasisHistory>(&body)
                .map_err(|e| Error::decode(&e, &body))?
                .into_events(),
            PanelKind::Ja100 => serde_json::from_str::<Ja100History>(&body)
                .map_err(|e| Error::decode(&e, &body))?
                .into_events(),
        };
        debug!(count = events.len(), "history retrieved");
        Ok(events)
    }
}
