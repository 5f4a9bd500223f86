use serde::{Deserialize, Serialize};

use crate::constants::{STYLE_ERROR, STYLE_SUCCESS};

/// User facing message with the style class it is rendered with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub text: String,
    pub style_class: String,
}

impl Notification {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style_class: STYLE_SUCCESS.to_owned(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style_class: STYLE_ERROR.to_owned(),
        }
    }

    /// Empty message, clears the notification panel.
    pub fn clear() -> Self {
        Self::default()
    }

    pub fn is_error(&self) -> bool {
        self.style_class == STYLE_ERROR
    }
}

/// Synchronous receiver of notifications.
pub trait NotificationSink {
    fn notify(&self, notification: Notification);
}

impl<F> NotificationSink for F
where
    F: Fn(Notification),
{
    fn notify(&self, notification: Notification) {
        self(notification)
    }
}

/// Sink dropping every notification.
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _: Notification) {}
}
