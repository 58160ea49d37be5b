// Notification composition and delivery

pub mod channel;
pub mod composer;
pub mod types;

pub use channel::{LogChannel, NotificationChannel, NotificationError};
pub use composer::{NotificationComposer, NotificationSettings};
pub use types::{DeliveryStatus, Message};
