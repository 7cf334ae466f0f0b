//! Email alerts delivered through a sendmail-compatible program.

use super::{AlertError, AlertSink};
use crate::capture::ConfigError;
use crate::events::{EventType, TIMESTAMP_FORMAT};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread;

/// Email delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Sender address.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Program that accepts a full message on stdin (`sendmail -t`).
    #[serde(default = "default_sendmail")]
    pub sendmail: PathBuf,
}

fn default_sendmail() -> PathBuf {
    PathBuf::from("/usr/sbin/sendmail")
}

impl EmailConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.from.is_empty() || !self.from.contains('@') {
            return Err(ConfigError::InvalidValue {
                field: "alerts.email.from",
                reason: "must be an email address".into(),
            });
        }
        if self.to.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "alerts.email.to",
                reason: "needs at least one recipient".into(),
            });
        }
        Ok(())
    }
}

/// A composed plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    /// Renders the message with RFC 5322 headers.
    pub fn to_rfc5322(&self, from: &str, to: &[String]) -> String {
        let mut out = String::new();
        out.push_str(&format!("From: {}\r\n", from));
        out.push_str(&format!("To: {}\r\n", to.join(", ")));
        out.push_str(&format!("Subject: {}\r\n", self.subject));
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        out.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
        out.push_str(&self.body);
        out
    }
}

/// Builds the alert message for an event.
pub fn compose_message(
    brand: &str,
    event_type: EventType,
    confidence: Option<f32>,
    at: NaiveDateTime,
) -> EmailMessage {
    let name = event_type.as_str();
    let capitalized = name[..1].to_uppercase() + &name[1..];
    let confidence = confidence
        .map(|c| format!("{c:.2}"))
        .unwrap_or_else(|| "N/A".to_string());

    EmailMessage {
        subject: format!("[{} Alert] {} Detected", brand, name.to_uppercase()),
        body: format!(
            "Alert Type: {}\nTimestamp: {}\nConfidence: {}\n",
            capitalized,
            at.format(TIMESTAMP_FORMAT),
            confidence
        ),
    }
}

/// Messages waiting for the delivery worker.
const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Sends each alert as an email.
///
/// `notify` only queues the message. A worker thread pipes it to the mail
/// program, so a slow or hung `sendmail` never holds up the caller. When the
/// queue is full the alert is dropped and `notify` reports it.
#[derive(Debug)]
pub struct EmailAlertSink {
    queue: SyncSender<EmailMessage>,
    brand: String,
}

impl EmailAlertSink {
    pub fn new(config: EmailConfig, brand: impl Into<String>) -> Self {
        Self::with_capacity(config, brand, DEFAULT_QUEUE_CAPACITY)
    }

    /// Creates a sink whose worker holds at most `capacity` pending messages.
    pub fn with_capacity(config: EmailConfig, brand: impl Into<String>, capacity: usize) -> Self {
        let (queue, pending) = mpsc::sync_channel(capacity);

        let spawned = thread::Builder::new()
            .name("email-alerts".into())
            .spawn(move || deliver_all(&config, pending));
        if let Err(e) = spawned {
            // The receiver is gone, so every notify reports a stopped worker.
            tracing::warn!("Failed to start email worker: {}", e);
        }

        Self {
            queue,
            brand: brand.into(),
        }
    }
}

impl AlertSink for EmailAlertSink {
    fn notify(&mut self, event_type: EventType, confidence: Option<f32>) -> Result<(), AlertError> {
        let message = compose_message(&self.brand, event_type, confidence, Local::now().naive_local());

        self.queue.try_send(message).map_err(|e| match e {
            TrySendError::Full(message) => {
                AlertError::Delivery(format!("email queue full, dropped \"{}\"", message.subject))
            }
            TrySendError::Disconnected(_) => AlertError::Delivery("email worker stopped".into()),
        })
    }
}

/// Worker loop: delivers queued messages until every sender is dropped.
fn deliver_all(config: &EmailConfig, pending: Receiver<EmailMessage>) {
    for message in pending {
        match deliver(config, &message) {
            Ok(()) => tracing::info!(subject = %message.subject, "Email alert sent"),
            Err(e) => tracing::warn!(subject = %message.subject, "Email alert failed: {}", e),
        }
    }
    tracing::debug!("Email worker stopped");
}

/// Pipes one message to `sendmail -t` and waits for it to exit.
fn deliver(config: &EmailConfig, message: &EmailMessage) -> Result<(), AlertError> {
    let raw = message.to_rfc5322(&config.from, &config.to);

    let mut child = Command::new(&config.sendmail)
        .arg("-t")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    // The child is reaped even when writing its input fails.
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(raw.as_bytes()),
        None => Ok(()),
    };
    let output = child.wait_with_output()?;
    written?;

    if !output.status.success() {
        return Err(AlertError::Delivery(format!(
            "{} exited with {}: {}",
            config.sendmail.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}
