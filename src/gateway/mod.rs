// ABOUTME: SMPP transceiver-gateway engine: session/bind lifecycle, MO/MT pipelines,
// ABOUTME: throttling, correlation stash, and the external bus boundary

pub mod bus;
pub mod charset;
pub mod clock;
pub mod config;
pub mod mo;
pub mod mt;
pub mod session;
pub mod stash;
pub mod throttle;
pub mod transport;
pub mod types;

pub use bus::{BusConnector, BusPublisher, ChannelBus};
pub use charset::{CharsetTable, Codec};
pub use clock::{Clock, SystemClock, VirtualClock};
pub use config::{BindMode, ConfigError, GatewayConfig, ProcessorConfig};
pub use mo::MoProcessor;
pub use mt::{MtError, MtProcessor};
pub use session::{Session, SessionError, SessionState};
pub use stash::{MemoryStash, MessageStash, StashError};
pub use throttle::{Admission, Throttler};
pub use transport::TransportService;
pub use types::{BusRecord, DeliveryStatus, EventType, OutboundMessage, SessionEvent, TransportType};
