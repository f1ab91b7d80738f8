//! In-process publish/subscribe for the conversion client.
//!
//! - [`EventBus`]: typed fan-out hub backed by `tokio::sync::broadcast`.
//! - [`LocalSignal`]: payload-free signals exchanged between components
//!   of one session (never sent over the wire).

pub mod bus;

pub use bus::{EventBus, LocalSignal, Subscription};
