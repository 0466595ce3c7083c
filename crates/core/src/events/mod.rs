//! Pipeline events and the bus that distributes them to observers.

mod bus;
mod types;

pub use bus::{EventBus, EventHandler, EventPattern, HandlerError, SubscriptionId};
pub use types::PipelineEvent;
