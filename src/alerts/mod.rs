//! Outbound alert delivery.
//!
//! Alerts are fire-and-forget from the pipeline's point of view: a sink
//! that fails is logged and skipped, never retried, and never stops frame
//! processing.

mod email;
mod local;

pub use email::{compose_message, EmailAlertSink, EmailConfig, EmailMessage};
pub use local::{BellAlertSink, LogAlertSink};

use crate::capture::ConfigError;
use crate::events::EventType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while delivering an alert.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("alert delivery rejected: {0}")]
    Delivery(String),
    #[error("{failed} of {total} alert sinks failed; first error: {first}")]
    Partial {
        failed: usize,
        total: usize,
        first: String,
    },
}

/// Destination for alarm notifications.
pub trait AlertSink {
    /// Notifies about the start of an alarm condition.
    fn notify(&mut self, event_type: EventType, confidence: Option<f32>) -> Result<(), AlertError>;
}

impl<S: AlertSink + ?Sized> AlertSink for Box<S> {
    fn notify(&mut self, event_type: EventType, confidence: Option<f32>) -> Result<(), AlertError> {
        (**self).notify(event_type, confidence)
    }
}

/// Delivers every alert to each inner sink.
///
/// A failing sink does not prevent delivery to the others.
#[derive(Default)]
pub struct AlertFanout {
    sinks: Vec<Box<dyn AlertSink + Send>>,
}

impl AlertFanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink.
    pub fn with(mut self, sink: impl AlertSink + Send + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Number of inner sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true if there are no sinks.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AlertSink for AlertFanout {
    fn notify(&mut self, event_type: EventType, confidence: Option<f32>) -> Result<(), AlertError> {
        let total = self.sinks.len();
        let mut errors = self
            .sinks
            .iter_mut()
            .filter_map(|sink| sink.notify(event_type, confidence).err());

        let Some(first) = errors.next() else {
            return Ok(());
        };
        let failed = 1 + errors.count();

        Err(AlertError::Partial {
            failed,
            total,
            first: first.to_string(),
        })
    }
}

/// Records notifications in memory.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    pub received: Vec<(EventType, Option<f32>)>,
}

impl AlertSink for MemoryAlertSink {
    fn notify(&mut self, event_type: EventType, confidence: Option<f32>) -> Result<(), AlertError> {
        self.received.push((event_type, confidence));
        Ok(())
    }
}

/// Alert configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Product name used in notification titles.
    pub brand: String,
    /// Ring the terminal bell on tamper.
    pub bell: bool,
    /// Email delivery, disabled when absent.
    pub email: Option<EmailConfig>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            brand: "Sentinel".into(),
            bell: true,
            email: None,
        }
    }
}

impl AlertsConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(email) = &self.email {
            email.validate()?;
        }
        Ok(())
    }

    /// Builds the sink set described by this configuration.
    pub fn build(&self) -> AlertFanout {
        let mut fanout = AlertFanout::new().with(LogAlertSink::new(self.brand.clone()));
        if self.bell {
            fanout = fanout.with(BellAlertSink::stderr());
        }
        if let Some(email) = &self.email {
            fanout = fanout.with(EmailAlertSink::new(email.clone(), self.brand.clone()));
        }
        fanout
    }
}
