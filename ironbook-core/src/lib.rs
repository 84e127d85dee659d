//! # IronBook Core
//!
//! Core types for order book reconstruction from a push feed.
//!
//! This crate provides:
//! - Normalized instrument identifiers and the wire-order translation
//! - Fixed-point book rows and timestamps
//! - Pure frame decoding and snapshot/diff classification
//! - Hub invocation encoding for subscriptions and snapshot queries
//! - Error types shared by the higher layers

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod message;
pub mod types;

pub use decoder::{FrameClass, classify, decode_frame, decode_payload};
pub use encoder::{HubInvocation, compress_payload};
pub use error::{Error, Result};
pub use message::{MessageKind, OrderBookMessage};
pub use types::{BookRow, Decimal, InstrumentId, Nonce, Side, Timestamp};
