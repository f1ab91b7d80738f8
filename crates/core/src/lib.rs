//! Domain model for the file-conversion client.
//!
//! Pure data and pure functions only: the conversion table, request and
//! listing types, push-channel job events, user notices and the error
//! taxonomy shared by every other crate. Nothing here performs I/O.

pub mod conversion;
pub mod error;
pub mod files;
pub mod job_events;
pub mod notice;
pub mod types;
