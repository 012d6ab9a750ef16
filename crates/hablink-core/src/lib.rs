// hablink-core: Session, polling and command engine between hablink-api and consumers (CLI).

pub mod channel;
pub mod clock;
pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod hub;
pub mod machine;
pub mod outcome;
pub mod session;
pub mod vendor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use channel::{
    Availability, BroadcastPublisher, ChannelState, DeviceStatus, Publisher, StatusDetail, Update,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{HostCommand, PendingCommand};
pub use config::{DeviceConfig, DeviceKind, TlsVerification, VendorSettings};
pub use device::DeviceHandle;
pub use error::CoreError;
pub use hub::{DeviceSummary, Hub, discover_services};
pub use machine::{DispatchReport, MachineState, PollMachine, PollReport};
pub use outcome::{Confirm, ControlResult, OutcomeKind, PollOutcome};
pub use session::SessionStore;
pub use vendor::Vendor;
