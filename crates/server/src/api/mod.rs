pub mod diagnostics;
pub mod handlers;
pub mod items;
pub mod middleware;
pub mod orchestrator;
pub mod routes;
pub mod settings;
pub mod ws;

pub use routes::create_router;
pub use ws::{forward_events, WsBroadcaster, WsMessage};
