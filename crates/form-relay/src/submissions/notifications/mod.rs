//! Notification rendering and delivery.

pub mod dispatcher;
pub mod mailer;
pub mod template;
pub mod templates;

pub use dispatcher::{
    DispatchOutcome, DispatchSettings, DispatcherState, EmailContent, EmailOptions,
    NotificationDispatcher,
};
pub use mailer::{DeliveryReceipt, Email, EmailBody, MailError, Mailer, SmtpMailer};
pub use template::{
    CompiledTemplate, EmailTemplate, Escaping, RenderedNotification, TemplateData, TemplateError,
};
pub use templates::{notification_data, NotificationTemplates};
