//! Skyquery - natural-language inspection of a cloud account
//!
//! A reasoning engine answers operator questions by calling a fixed catalog
//! of read-only inspection tools, a few bounded round trips at a time. The
//! tools run against either the live account or a deterministic simulated
//! one, selected for the lifetime of a session.

pub mod agent;
pub mod backend;
pub mod environment;
pub mod error;
pub mod llm;
pub mod session;
pub mod tools;

pub use error::{Result, SkyqueryError};
