//! Session composition for the conversion client: configuration, the
//! conversion coordinator, the safety-net refresh and terminal rendering
//! used by the `fileconv` binary.

pub mod config;
pub mod coordinator;
pub mod render;
pub mod safety_net;

pub use config::{AppConfig, ConfigError};
pub use coordinator::{ConversionCoordinator, SelectionState};
