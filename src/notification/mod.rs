pub mod dispatcher;
pub mod email;
pub mod notification_handlers;
pub mod notification_models;
pub mod notification_repository;
pub mod templates;

pub use dispatcher::{DeliveryReport, NotificationDispatcher};
pub use email::{DeliveryError, EmailConfig, EmailTransport, SmtpEmailTransport};
pub use notification_models::{Notification, NotificationEvent};
pub use notification_repository::{NotificationRepository, NotificationStore};
