//! # IronBook Channel
//!
//! Buffering primitives used between the feed and its consumers.
//!
//! This crate provides:
//! - [`ring`] - Bounded FIFO that drops its oldest entry on overflow
//! - [`broadcast`] - Lossy one-to-many channel with async receive

pub mod broadcast;
pub mod ring;

pub use broadcast::{BroadcastReceiver, BroadcastSender, RecvError, TryRecvError};
pub use ring::BoundedRing;
