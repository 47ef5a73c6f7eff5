//! Publish/subscribe channel that pushes occupancy changes to dashboard
//! sessions.
//!
//! Sessions join broadcast scopes keyed by hospital (optionally narrowed to
//! one department). Delivery is best effort: nothing is queued for sessions
//! that are not connected, and a session whose buffer is full misses the
//! update and is expected to re-fetch current state.

pub mod error;
pub mod hub;
pub mod publisher;
pub mod types;

pub use error::NotificationError;
pub use hub::{NotificationHub, SessionHandle, SessionId};
pub use publisher::Publisher;
pub use types::{ClientMessage, Notification, ServerMessage};
