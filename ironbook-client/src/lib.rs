//! # IronBook Client
//!
//! Push feed session for order book reconstruction.
//!
//! This crate provides:
//! - Session builder with configuration options
//! - Inactivity-bounded frame stream and idempotent connect
//! - Exponential reconnection backoff
//! - WebSocket and in-memory transports
//! - Request signing

pub mod auth;
pub mod builder;
pub mod error;
pub mod memory;
pub mod reconnect;
pub mod session;
pub mod ws;

pub use auth::FeedAuth;
pub use builder::{SessionBuilder, SessionConfig};
pub use error::{AuthError, ClientError};
pub use memory::MemoryConnector;
pub use reconnect::{ReconnectConfig, ReconnectState};
pub use session::{Connector, FeedConnection, FeedFrame, FeedSession, SubscriptionSource};
pub use ws::{WsConnector, WsConnection};
