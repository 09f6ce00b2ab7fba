//! Real-time notification core: durable ledger + live connection registry.

pub mod hub;
pub mod registry;

pub use hub::{NewNotification, NotificationHub};
pub use registry::{ConnectionRegistry, NotificationPush, PushEvent};
