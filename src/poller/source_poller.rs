//! Single-source poll pass.
//!
//! Flow per source:
//! 1. Read the checkpoint from the offset store
//! 2. Fetch messages newer than it, ascending
//! 3. Per message: cutoff and empty-text filters, classify, decide,
//!    then format and fan out to the current recipients on Forward
//! 4. Persist the highest id observed, if it advanced
//!
//! Delivery is at-least-once: the checkpoint is written after the pass, so a
//! crash mid-pass re-delivers the messages that were already sent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::config::PollerConfig;
use crate::error::PollError;
use crate::pipeline::format::build_payload;
use crate::pipeline::types::{Decision, Message};
use crate::pipeline::{Classifier, DecisionEngine};
use crate::poller::ports::{Delivery, MessageSource, OffsetStore, RecipientStore};

/// Outcome of one pass over a source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Messages returned by the source.
    pub fetched: usize,
    /// Messages that passed the decision and were fanned out.
    pub forwarded: usize,
    /// Messages filtered out or skipped by the decision engine.
    pub skipped: usize,
    /// Checkpoint after the pass.
    pub last_id: i64,
    /// Stopped early because shutdown was requested.
    pub interrupted: bool,
}

/// What happened to a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageOutcome {
    Forwarded,
    Skipped,
}

/// The collaborators a poller talks to.
#[derive(Clone)]
pub struct PollerPorts {
    pub source: Arc<dyn MessageSource>,
    pub offsets: Arc<dyn OffsetStore>,
    pub recipients: Arc<dyn RecipientStore>,
    pub delivery: Arc<dyn Delivery>,
}

/// Runs poll passes over one source at a time.
pub struct SourcePoller {
    classifier: Arc<Classifier>,
    engine: DecisionEngine,
    config: PollerConfig,
    ports: PollerPorts,
    shutdown: Arc<AtomicBool>,
}

impl SourcePoller {
    pub fn new(
        classifier: Arc<Classifier>,
        config: PollerConfig,
        ports: PollerPorts,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let engine = DecisionEngine::new(classifier.has_category_rules());
        Self {
            classifier,
            engine,
            config,
            ports,
            shutdown,
        }
    }

    /// Process every unseen message of `source` and advance its checkpoint.
    pub async fn poll_source(&self, source: &str) -> Result<PollReport, PollError> {
        let last_id = self
            .ports
            .offsets
            .get_last_id(source)
            .await
            .map_err(|e| PollError::Offset {
                source_id: source.to_string(),
                reason: e.to_string(),
            })?;

        let messages = self.ports.source.list_new_messages(source, last_id).await?;
        debug!(source, last_id, count = messages.len(), "Fetched messages");

        let mut report = PollReport {
            fetched: messages.len(),
            ..Default::default()
        };
        let mut max_id = last_id;

        for message in &messages {
            if self.shutdown.load(Ordering::SeqCst) {
                info!(source, last_id = max_id, "Shutdown requested; stopping poll pass");
                report.interrupted = true;
                break;
            }

            // Never act on anything at or below the checkpoint.
            if message.id <= last_id {
                continue;
            }

            match self.process_message(source, message).await {
                Ok(MessageOutcome::Forwarded) => report.forwarded += 1,
                Ok(MessageOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    // Keep what was fully processed; the failing message is retried.
                    self.persist_offset(source, last_id, max_id).await?;
                    return Err(e);
                }
            }
            max_id = max_id.max(message.id);
        }

        self.persist_offset(source, last_id, max_id).await?;
        report.last_id = max_id;

        if report.fetched > 0 {
            info!(
                source,
                fetched = report.fetched,
                forwarded = report.forwarded,
                skipped = report.skipped,
                last_id = report.last_id,
                "Source polled"
            );
        }
        Ok(report)
    }

    async fn process_message(
        &self,
        source: &str,
        message: &Message,
    ) -> Result<MessageOutcome, PollError> {
        if let (Some(cutoff), Some(ts)) = (self.config.start_date, message.timestamp)
            && ts < cutoff
        {
            debug!(source, message_id = message.id, "Message before start date");
            return Ok(MessageOutcome::Skipped);
        }

        if message.text.trim().is_empty() {
            debug!(source, message_id = message.id, "Message has no text");
            return Ok(MessageOutcome::Skipped);
        }

        let result = self.classifier.classify(&message.text);
        let decision = self.engine.decide(&result);
        debug!(
            source,
            message_id = message.id,
            city = result.city.as_deref().unwrap_or("-"),
            categories = ?result.categories,
            decision = decision.label(),
            "Message classified"
        );

        if let Decision::Skip(_) = decision {
            return Ok(MessageOutcome::Skipped);
        }

        let payload = build_payload(
            message,
            &result.categories,
            self.config.display_zone,
            self.config.forward_with_link,
        );

        // Read fresh so /start and /stop take effect on the next forwarded post.
        let recipients = self
            .ports
            .recipients
            .list_active_recipients()
            .await
            .map_err(|e| PollError::Recipients {
                source_id: source.to_string(),
                reason: e.to_string(),
            })?;

        let mut delivered = 0usize;
        for recipient in &recipients {
            match self.ports.delivery.deliver(*recipient, &payload).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    source,
                    message_id = message.id,
                    recipient = *recipient,
                    reason = %e,
                    "Delivery failed"
                ),
            }
        }

        info!(
            source,
            message_id = message.id,
            delivered,
            recipients = recipients.len(),
            "Message forwarded"
        );
        Ok(MessageOutcome::Forwarded)
    }

    async fn persist_offset(
        &self,
        source: &str,
        previous: i64,
        max_id: i64,
    ) -> Result<(), PollError> {
        if max_id <= previous {
            return Ok(());
        }
        self.ports
            .offsets
            .set_last_id(source, max_id)
            .await
            .map_err(|e| PollError::Offset {
                source_id: source.to_string(),
                reason: e.to_string(),
            })
    }
}
