//! Loopback HTTP control surface.
//!
//! A tiny request/response interface bound to `127.0.0.1` only. Commands
//! either read supervisor state, schedule a reconcile in the background, or
//! tear things down. Every response is `200 text/plain` and completes
//! immediately; whether the underlying action eventually succeeds is a
//! separate matter, visible only in the logs.

mod server;

pub use server::{ControlError, ControlServer, DEFAULT_CONTROL_PORT};
