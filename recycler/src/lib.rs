//! A headless windowing and recycling engine for virtualized collections.
//!
//! For adapter-level utilities (event serialization, bring-into-view), see the
//! `recycler-adapter` crate.
//!
//! This crate focuses on the core algorithms needed to render an effectively
//! unbounded ordered collection through a small, bounded set of realized
//! slots: a doubly-linked realized chain over an arena, buffer-threshold
//! realize/recycle loops, three layout policies (linear stack, flow wrap,
//! fixed-column grid), scrollable-bounds accounting, and deferred balance
//! work drained on host ticks.
//!
//! It is UI-agnostic. A TUI/GUI layer is expected to provide:
//! - viewport size (width/height)
//! - scroll offset
//! - per-item measurement under a constraint
//! - playback of the add/remove animations the engine schedules
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod error;
mod grid;
mod item;
mod options;
mod policy;
mod recycler;
mod stack;
mod types;
mod window;
mod wrap;

#[cfg(test)]
mod tests;

pub use error::ConfigError;
pub use options::{
    ItemStateCallback, LayoutConfig, MeasureItemCallback, OnChangeCallback, RecyclerOptions,
};
pub use recycler::Recycler;
pub use types::{
    AnimationTicket, AsyncBalanceMode, ContainerId, EPSILON, ItemAnimationMode, ItemId, ItemState,
    Orientation, RealizedSnapshot, ReorderMode, Size, WrapLineAlignment,
};

pub(crate) use types::{are_close, are_close_with};
