use std::fmt;

use serde::{Deserialize, Serialize};

use crate::recipient::AddressKind;

/// Notification providers known to the dispatch engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Twilio,
    Vonage,
    OneSignal,
    Smtp,
    AwsSns,
}

impl ChannelKind {
    /// Order in which channels are visited during a batch.
    pub const PRIORITY: [ChannelKind; 5] = [
        ChannelKind::Twilio,
        ChannelKind::Vonage,
        ChannelKind::OneSignal,
        ChannelKind::Smtp,
        ChannelKind::AwsSns,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Twilio => "twilio",
            Self::Vonage => "vonage",
            Self::OneSignal => "onesignal",
            Self::Smtp => "smtp",
            Self::AwsSns => "aws_sns",
        }
    }

    /// Addressing scheme recipients must use on this channel.
    pub fn address_kind(self) -> AddressKind {
        match self {
            Self::Smtp => AddressKind::EmailGateway,
            Self::Twilio | Self::Vonage | Self::OneSignal | Self::AwsSns => AddressKind::PhoneE164,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
