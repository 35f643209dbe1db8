//! Source polling: ports, the per-source pass and the sweep scheduler.

pub mod ports;
pub mod scheduler;
pub mod source_poller;

pub use ports::{Delivery, MessageSource, OffsetStore, RecipientStore};
pub use scheduler::{Scheduler, request_shutdown};
pub use source_poller::{PollReport, PollerPorts, SourcePoller};
