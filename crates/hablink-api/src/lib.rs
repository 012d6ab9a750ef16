// hablink-api: Async clients for cloud and local home-automation device APIs
//
// Each vendor module wraps a `reqwest::Client` built from a shared
// `TransportConfig`. Clients return raw bodies or typed wire models; deciding
// what a response *means* for a device (busy, expired session, ...) is left
// to `hablink-core`.

pub mod efergy;
pub mod error;
pub mod jablotron;
pub mod philips;
pub mod smarwi;
pub mod transport;
pub mod websocket;

pub use efergy::EfergyClient;
pub use error::Error;
pub use jablotron::{JablotronClient, PanelKind};
pub use philips::{PhilipsTvClient, PowerState, TvCredentials};
pub use smarwi::{SmarwiClient, SmarwiCommand};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{PushChannel, PushMessage};
