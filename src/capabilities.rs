//! Capability wiring.
//!
//! The core uses Crux's built-in capabilities only: HTTP for the backend,
//! key-value storage for the persisted token, and Render for view updates.

pub use crux_core::render::Render;
pub use crux_http::Http;
pub use crux_kv::KeyValue;

use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub key_value: KeyValue<Event>,
    pub render: Render<Event>,
}
