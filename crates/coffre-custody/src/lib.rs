//! `coffre-custody` — Process-isolated key custody for Coffre.
//!
//! The DEK lives in a dedicated worker process (`coffre-custodyd`)
//! that speaks newline-delimited JSON over stdin/stdout. This crate
//! carries the wire protocol, the worker service loop, the async
//! controller client, and the session/lock state machine built on
//! `coffre-vault`'s storage traits.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod proto;

pub mod worker;

pub mod client;

pub mod session;

pub use client::CustodyClient;
pub use proto::{Action, Request, Response, WireError, WireHint};
pub use session::{
    SessionConfig, SessionManager, SessionStatus, DEFAULT_AUTO_LOCK, MIN_AUTO_LOCK,
};
pub use worker::{serve, CustodyWorker};
