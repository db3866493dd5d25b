//! Host-facing event types.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a host can
//! forward them as JSON (logs, a websocket, a chat channel).

pub mod events;
