//! Adapter utilities for the `recycler` crate.
//!
//! The `recycler` crate is UI-agnostic and focuses on the core realize/recycle
//! state machine. This crate provides small, framework-neutral helpers
//! commonly needed by adapters:
//!
//! - A [`Controller`] that serializes the host events driving the engine
//!   (viewport size, scroll, collection mutations) and drains deferred
//!   balance work on ticks
//! - Bring-into-view scrolling built on the engine's offset estimation
//!
//! This crate is intentionally framework-agnostic (no ratatui/egui bindings).
#![forbid(unsafe_code)]

mod controller;


pub use controller::Controller;
