//! Builds channel adapters from a configuration snapshot.

use std::sync::Arc;

use textcast_core::{ChannelConfig, ChannelKind, ConfigSnapshot};

use crate::onesignal::OneSignalAdapter;
use crate::pacing::Clock;
use crate::smtp::SmtpAdapter;
use crate::sns::SnsAdapter;
use crate::traits::{ChannelAdapter, NotifyError};
use crate::twilio::TwilioAdapter;
use crate::vonage::VonageAdapter;

fn settings<T>(config: &ChannelConfig<T>) -> Result<&T, NotifyError> {
    config
        .settings
        .as_ref()
        .map_err(|e| NotifyError::Config(e.to_string()))
}

/// Construct the adapter for one channel from `snapshot`, whether or not it
/// is enabled. `clock` paces the SNS retry loop.
pub fn build_adapter(
    kind: ChannelKind,
    snapshot: &ConfigSnapshot,
    clock: Arc<dyn Clock>,
) -> Result<Box<dyn ChannelAdapter>, NotifyError> {
    Ok(match kind {
        ChannelKind::Twilio => Box::new(TwilioAdapter::from_settings(settings(&snapshot.twilio)?)?),
        ChannelKind::Vonage => Box::new(VonageAdapter::from_settings(settings(&snapshot.vonage)?)?),
        ChannelKind::OneSignal => Box::new(OneSignalAdapter::from_settings(settings(
            &snapshot.onesignal,
        )?)?),
        ChannelKind::Smtp => Box::new(SmtpAdapter::from_settings(settings(&snapshot.smtp)?)?),
        ChannelKind::AwsSns => Box::new(SnsAdapter::from_settings(
            settings(&snapshot.aws_sns)?,
            clock,
        )?),
    })
}

/// Build every enabled channel in priority order. A channel that cannot be
/// constructed is logged and left out; the others are unaffected.
pub fn build_enabled(snapshot: &ConfigSnapshot, clock: Arc<dyn Clock>) -> Vec<Box<dyn ChannelAdapter>> {
    let mut adapters = Vec::new();
    for kind in snapshot.enabled_channels() {
        match build_adapter(kind, snapshot, Arc::clone(&clock)) {
            Ok(adapter) => adapters.push(adapter),
            Err(e) => {
                tracing::error!(channel = %kind, error = %e, "channel disabled: cannot construct adapter");
            }
        }
    }
    adapters
}
