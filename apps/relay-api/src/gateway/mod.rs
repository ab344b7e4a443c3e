//! The relay core: session registry, channel resolution, message fanout,
//! and membership synchronization over a WebSocket transport.

pub mod channel;
pub mod events;
pub mod fanout;
pub mod handler;
pub mod membership;
pub mod presence;
pub mod registry;
pub mod server;
