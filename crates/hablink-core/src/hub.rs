// ── Device hub ──
//
// Owns every configured device actor, keyed by device id, and the
// publisher they all report through. Host-facing operations route to the
// right actor by id.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::Stream;
use hablink_api::jablotron::ServiceWidget;
use hablink_api::{EfergyClient, JablotronClient, PhilipsTvClient, SmarwiClient};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info};

use crate::channel::{Availability, BroadcastPublisher, Publisher, Update};
use crate::clock::SystemClock;
use crate::command::HostCommand;
use crate::config::{DeviceConfig, DeviceKind, VendorSettings};
use crate::device::DeviceHandle;
use crate::error::CoreError;
use crate::machine::{DispatchReport, MachineState, PollReport};
use crate::vendor::{EfergyVendor, JablotronVendor, PhilipsTvVendor, SmarwiVendor};

/// Point-in-time view of one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub id: String,
    pub label: String,
    pub kind: DeviceKind,
    pub state: MachineState,
    pub availability: Option<Availability>,
}

pub struct Hub {
    devices: DashMap<String, DeviceHandle>,
    publisher: BroadcastPublisher,
}

impl Hub {
    pub fn new(publisher: BroadcastPublisher) -> Self {
        Self {
            devices: DashMap::new(),
            publisher,
        }
    }

    /// Build and start a device for every config.
    pub fn from_configs(
        configs: impl IntoIterator<Item = DeviceConfig>,
        publisher: BroadcastPublisher,
    ) -> Result<Self, CoreError> {
        let configs: Vec<DeviceConfig> = configs.into_iter().collect();
        let mut seen = HashSet::new();
        for config in &configs {
            if !seen.insert(config.id.as_str()) {
                return Err(duplicate(&config.id));
            }
        }

        let hub = Self::new(publisher);
        for config in &configs {
            if let Err(e) = hub.add(config) {
                hub.cancel_all();
                return Err(e);
            }
        }
        Ok(hub)
    }

    /// Build the vendor for `config` and start its actor.
    pub fn add(&self, config: &DeviceConfig) -> Result<DeviceHandle, CoreError> {
        if self.devices.contains_key(&config.id) {
            return Err(duplicate(&config.id));
        }
        let publisher: Arc<dyn Publisher> = Arc::new(self.publisher.clone());
        let handle = spawn_device(config, publisher)?;
        info!(device = %config.id, kind = %config.kind(), "device added");
        self.devices.insert(config.id.clone(), handle.clone());
        Ok(handle)
    }

    pub fn device(&self, id: &str) -> Result<DeviceHandle, CoreError> {
        self.devices
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: id.to_owned(),
            })
    }

    pub async fn handle_command(
        &self,
        device: &str,
        channel: &str,
        command: HostCommand,
    ) -> Result<DispatchReport, CoreError> {
        self.device(device)?.handle_command(channel, command).await
    }

    pub async fn poll_now(&self, device: &str) -> Result<PollReport, CoreError> {
        self.device(device)?.poll_now().await
    }

    /// Dispose every device and forget them.
    pub async fn dispose_all(&self) {
        let handles: Vec<DeviceHandle> = self
            .devices
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.devices.clear();
        for handle in handles {
            handle.dispose().await;
        }
    }

    /// Stop every device without waiting for logout.
    fn cancel_all(&self) {
        for entry in &self.devices {
            entry.value().cancel();
        }
        self.devices.clear();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Update> {
        self.publisher.subscribe()
    }

    /// Updates as a stream; updates missed by a slow consumer are skipped.
    pub fn updates(&self) -> impl Stream<Item = Update> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(Result::ok)
    }

    /// All devices, sorted by id.
    pub fn devices(&self) -> Vec<DeviceSummary> {
        let mut summaries: Vec<DeviceSummary> = self
            .devices
            .iter()
            .map(|entry| {
                let handle = entry.value();
                DeviceSummary {
                    id: handle.id().to_owned(),
                    label: handle.label().to_owned(),
                    kind: handle.kind(),
                    state: handle.state(),
                    availability: handle.availability(),
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

fn duplicate(id: &str) -> CoreError {
    CoreError::Config {
        message: format!("duplicate device id '{id}'"),
    }
}

fn spawn_device(
    config: &DeviceConfig,
    publisher: Arc<dyn Publisher>,
) -> Result<DeviceHandle, CoreError> {
    let transport = config.transport();
    let handle = match &config.settings {
        VendorSettings::Jablotron {
            panel,
            base_url,
            username,
            password,
            service_id,
            service_url,
            code,
        } => {
            let mut client =
                JablotronClient::new(base_url.clone(), *panel, service_id.clone(), &transport)?;
            if let Some(page) = service_url {
                client = client.with_service_page(page.clone());
            }
            let vendor =
                JablotronVendor::new(client, username.clone(), password.clone(), code.clone());
            DeviceHandle::spawn(config, vendor, publisher, SystemClock)
        }
        VendorSettings::Efergy {
            base_url,
            token,
            utc_offset,
        } => {
            let client = EfergyClient::new(base_url.clone(), token.clone(), *utc_offset, &transport)?;
            DeviceHandle::spawn(config, EfergyVendor::new(client), publisher, SystemClock)
        }
        VendorSettings::Smarwi { host, websocket } => {
            let client = SmarwiClient::new(host, &transport)?;
            DeviceHandle::spawn(
                config,
                SmarwiVendor::new(client, *websocket),
                publisher,
                SystemClock,
            )
        }
        VendorSettings::PhilipsTv {
            base_url,
            api_version,
            credentials,
        } => {
            let client =
                PhilipsTvClient::new(base_url, *api_version, credentials.clone(), &transport)?;
            DeviceHandle::spawn(config, PhilipsTvVendor::new(client), publisher, SystemClock)
        }
    };
    Ok(handle)
}

/// Log in to the Jablotron cloud with `config`'s account and list the
/// services it can see.
pub async fn discover_services(config: &DeviceConfig) -> Result<Vec<ServiceWidget>, CoreError> {
    let VendorSettings::Jablotron {
        panel,
        base_url,
        username,
        password,
        service_id,
        ..
    } = &config.settings
    else {
        return Err(CoreError::Config {
            message: format!("'{}' is not a Jablotron device", config.id),
        });
    };

    let client =
        JablotronClient::new(base_url.clone(), *panel, service_id.clone(), &config.transport())?;
    client.login(username, password).await?;
    let services = client.list_services().await;
    if let Err(e) = client.logout().await {
        debug!(error = %e, "logout after discovery failed");
    }
    Ok(services?)
}
