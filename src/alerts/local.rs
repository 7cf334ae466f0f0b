//! Local alert sinks: structured log lines and the terminal bell.

use super::{AlertError, AlertSink};
use crate::events::EventType;
use std::io::Write;

/// Emits a desktop-style notification as a log record.
#[derive(Debug, Clone)]
pub struct LogAlertSink {
    brand: String,
}

impl LogAlertSink {
    pub fn new(brand: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
        }
    }

    /// Title and message of the notification.
    pub fn render(&self, event_type: EventType, confidence: Option<f32>) -> (String, String) {
        match event_type {
            EventType::Tamper => (
                format!("{} Alert - Tamper Detected", self.brand),
                "Camera obstruction detected.".to_string(),
            ),
            EventType::Object => (
                format!("{} Alert - Object Detected", self.brand),
                match confidence {
                    Some(c) => format!("Object detected (confidence {c:.2})"),
                    None => "Object detected".to_string(),
                },
            ),
            EventType::Motion => (
                format!("{} Alert - Motion Recorded", self.brand),
                "Recording session completed.".to_string(),
            ),
        }
    }
}

impl AlertSink for LogAlertSink {
    fn notify(&mut self, event_type: EventType, confidence: Option<f32>) -> Result<(), AlertError> {
        let (title, message) = self.render(event_type, confidence);
        tracing::warn!(%event_type, title = %title, "{}", message);
        Ok(())
    }
}

/// Rings the terminal bell on tamper alerts.
pub struct BellAlertSink {
    out: Box<dyn Write + Send>,
}

impl BellAlertSink {
    /// Bell on standard error.
    pub fn stderr() -> Self {
        Self::with_writer(std::io::stderr())
    }

    /// Bell on an arbitrary writer.
    pub fn with_writer(out: impl Write + Send + 'static) -> Self {
        Self { out: Box::new(out) }
    }
}

impl AlertSink for BellAlertSink {
    fn notify(&mut self, event_type: EventType, _confidence: Option<f32>) -> Result<(), AlertError> {
        if event_type != EventType::Tamper {
            return Ok(());
        }
        self.out.write_all(b"\x07")?;
        self.out.flush()?;
        Ok(())
    }
}
