//! txwatch-http — HTTP event-stream and status-polling source for txwatch.
//!
//! [`HttpStatusSource`] implements [`txwatch_core::StatusSource`] over
//! `reqwest`: the event stream is exposed as raw body chunks for the core's
//! incremental parser, and polls decode one JSON status snapshot.

pub mod client;

pub use client::{HttpSourceConfig, HttpStatusSource};
