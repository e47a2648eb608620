pub mod alerts;
pub mod clock;
pub mod consumption;
pub mod error;
pub mod escalation;
pub mod hold;
pub mod monitor;
pub mod status;
pub mod store;

pub use alerts::{AlertSink, LogAlertSink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use consumption::{compute_consumption, Consumption};
pub use error::SlaError;
pub use escalation::{evaluate, Escalation};
pub use monitor::{SlaMonitor, TickSummary};
pub use status::SlaStatus;
pub use store::{MemStore, PgSlaStore, SlaStore, SlaUpdate};
