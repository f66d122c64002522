//! Routes one message to every eligible recipient on every enabled channel.
//!
//! Channels are visited in fixed priority order and recipients strictly one
//! after another, with the pacing delay after every attempt. One recipient's
//! failure never stops the batch.

use std::sync::Arc;
use std::time::Instant;

use textcast_core::{ChannelKind, ConfigSnapshot, Message, Recipient};

use crate::channels::build_enabled;
use crate::pacing::{Clock, Pacing};
use crate::traits::{AttemptRecord, BatchReport, ChannelAdapter, SendOutcome};

/// One planned (channel, recipient) attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSend {
    pub channel: ChannelKind,
    pub recipient: Recipient,
}

/// Ordered attempts for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchPlan {
    sends: Vec<PlannedSend>,
}

impl DispatchPlan {
    pub fn len(&self) -> usize {
        self.sends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sends.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlannedSend> {
        self.sends.iter()
    }
}

/// Dispatches a message across the adapters it was built with.
pub struct Dispatcher {
    /// Adapters in priority order.
    channels: Vec<Box<dyn ChannelAdapter>>,
    pacing: Pacing,
}

impl Dispatcher {
    /// Create a dispatcher; adapters are put in priority order.
    pub fn new(mut channels: Vec<Box<dyn ChannelAdapter>>, pacing: Pacing) -> Self {
        channels.sort_by_key(|c| c.channel());
        channels.dedup_by_key(|c| c.channel());
        Self { channels, pacing }
    }

    /// Build adapters for every enabled and constructible channel in
    /// `snapshot`, pacing with its send delay on `clock`.
    pub fn from_snapshot(snapshot: &ConfigSnapshot, clock: Arc<dyn Clock>) -> Self {
        let channels = build_enabled(snapshot, Arc::clone(&clock));
        Self::new(channels, Pacing::new(snapshot.send_delay, clock))
    }

    /// Channels this dispatcher will use, in order.
    pub fn channels(&self) -> Vec<ChannelKind> {
        self.channels.iter().map(|c| c.channel()).collect()
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    /// Pair each channel with the recipients whose address kind it accepts.
    pub fn plan(&self, recipients: &[Recipient]) -> DispatchPlan {
        let sends = self
            .channels
            .iter()
            .flat_map(|adapter| {
                recipients
                    .iter()
                    .filter(move |r| r.kind() == adapter.address_kind())
                    .map(move |r| PlannedSend {
                        channel: adapter.channel(),
                        recipient: r.clone(),
                    })
            })
            .collect();
        DispatchPlan { sends }
    }

    /// Run one batch to completion. Every outcome is logged; the report is
    /// informational.
    pub async fn run_batch(&self, recipients: &[Recipient], message: &Message) -> BatchReport {
        let plan = self.plan(recipients);
        tracing::info!(
            channels = ?self.channels(),
            recipients = recipients.len(),
            attempts = plan.len(),
            message_len = message.len(),
            "starting batch"
        );

        let mut report = BatchReport::default();
        for planned in plan.iter() {
            let Some(adapter) = self.adapter(planned.channel) else {
                continue;
            };

            let start = Instant::now();
            let outcome = adapter.send(&planned.recipient, message).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            log_outcome(planned.channel, &planned.recipient, &outcome, duration_ms);
            report.record(AttemptRecord {
                channel: planned.channel,
                recipient: planned.recipient.redacted(),
                outcome,
                duration_ms,
            });

            // Unconditional, failures included.
            self.pacing.pause().await;
        }

        tracing::info!(
            attempts = report.total(),
            delivered = report.delivered,
            rejected = report.rejected,
            transient_failures = report.transient_failures,
            invalid_addresses = report.invalid_addresses,
            "batch complete"
        );
        report
    }

    /// Send to a single recipient through the first enabled channel that
    /// accepts its address kind. No pacing.
    pub async fn send_first_enabled(&self, recipient: &Recipient, message: &Message) -> SendOutcome {
        let Some(adapter) = self
            .channels
            .iter()
            .find(|c| c.address_kind() == recipient.kind())
        else {
            tracing::warn!(
                recipient = %recipient.redacted(),
                kind = %recipient.kind(),
                "no enabled channel for recipient"
            );
            return SendOutcome::Rejected("no enabled channel".to_string());
        };

        let start = Instant::now();
        let outcome = adapter.send(recipient, message).await;
        log_outcome(
            adapter.channel(),
            recipient,
            &outcome,
            start.elapsed().as_millis() as u64,
        );
        outcome
    }

    fn adapter(&self, kind: ChannelKind) -> Option<&dyn ChannelAdapter> {
        self.channels
            .iter()
            .find(|c| c.channel() == kind)
            .map(|c| c.as_ref())
    }
}

/// Run one batch against a pinned snapshot. Reloads that happen while the
/// batch runs do not affect it.
pub async fn run_batch(
    snapshot: &ConfigSnapshot,
    recipients: &[Recipient],
    message: &Message,
    clock: Arc<dyn Clock>,
) -> BatchReport {
    Dispatcher::from_snapshot(snapshot, clock)
        .run_batch(recipients, message)
        .await
}

fn log_outcome(channel: ChannelKind, recipient: &Recipient, outcome: &SendOutcome, duration_ms: u64) {
    let recipient = recipient.redacted();
    match outcome {
        SendOutcome::Delivered { provider_id } => tracing::info!(
            channel = %channel,
            recipient = %recipient,
            outcome = outcome.label(),
            provider_id = provider_id.as_deref().unwrap_or("-"),
            duration_ms,
            "message delivered"
        ),
        SendOutcome::Rejected(reason)
        | SendOutcome::TransientFailure(reason)
        | SendOutcome::InvalidAddress(reason) => tracing::warn!(
            channel = %channel,
            recipient = %recipient,
            outcome = outcome.label(),
            error = %reason,
            duration_ms,
            "message not delivered"
        ),
    }
}
