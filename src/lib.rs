#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # workshop-operator
//!
//! Turns workshop requests into credentialed workshop sessions and tears
//! them down again.
//!
//! The binary replays scenarios of request events against an in-memory
//! store; the reconcilers themselves live in `workshop-reconciler`.

pub use workshop_core;
pub use workshop_reconciler;

pub mod cli;
pub mod commands;
pub mod retry;
pub mod runner;
pub mod scenario;
