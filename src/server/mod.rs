//! HTTP host for the slot registry.
//!
//! Plays the part of the device registration: one process owns the
//! registry, and other processes (the `message_sender` and `message_reader`
//! utilities) open handles on it over HTTP.
//!
//! # Endpoints
//!
//! - `GET    /health`                   — Liveness probe
//! - `GET    /slots`                    — Registry snapshot
//! - `POST   /slots/:slot/handles`      — Open a handle on a slot
//! - `POST   /handles/:handle/channel`  — Select a channel
//! - `POST   /handles/:handle/message`  — Write the raw request body
//! - `GET    /handles/:handle/message`  — Read (`?capacity=n`)
//! - `DELETE /handles/:handle`          — Close a handle

pub mod routes;

pub use routes::{app_router, AppState, ErrorBody};
