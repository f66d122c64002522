//! Recipient addressing: phone numbers in E.164 form and carrier email gateways.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// `+` is optional, first digit 1-9, 1 to 14 further digits.
static E164: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?[1-9][0-9]{1,14}$").unwrap());

/// Addressing scheme a recipient string must satisfy for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    /// International phone number, e.g. `+14155552671`.
    PhoneE164,
    /// Carrier email-to-SMS gateway, e.g. `5551234567@txt.carrier.com`.
    EmailGateway,
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PhoneE164 => f.write_str("phone_e164"),
            Self::EmailGateway => f.write_str("email_gateway"),
        }
    }
}

/// A destination address tagged with the scheme it was loaded under.
///
/// The kind comes from the list the address was read from, not from its
/// shape, so a malformed gateway address still reaches the gateway channel
/// and is rejected there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipient {
    address: String,
    kind: AddressKind,
}

impl Recipient {
    pub fn new(address: impl Into<String>, kind: AddressKind) -> Self {
        Self {
            address: address.into().trim().to_string(),
            kind,
        }
    }

    pub fn phone(address: impl Into<String>) -> Self {
        Self::new(address, AddressKind::PhoneE164)
    }

    pub fn gateway(address: impl Into<String>) -> Self {
        Self::new(address, AddressKind::EmailGateway)
    }

    /// Classify a bare address by shape: anything with `@` is a gateway.
    pub fn infer(address: impl Into<String>) -> Self {
        let address = address.into();
        let kind = if address.contains('@') {
            AddressKind::EmailGateway
        } else {
            AddressKind::PhoneE164
        };
        Self::new(address, kind)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// Masked form safe for log lines.
    pub fn redacted(&self) -> String {
        redact(&self.address)
    }
}

/// An address that passed validation for a given kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidAddress {
    value: String,
    kind: AddressKind,
}

impl ValidAddress {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// Gateway domain, for email gateway addresses.
    pub fn domain(&self) -> Option<&str> {
        match self.kind {
            AddressKind::EmailGateway => self.value.rsplit_once('@').map(|(_, d)| d),
            AddressKind::PhoneE164 => None,
        }
    }
}

impl fmt::Display for ValidAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Why an address was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidAddress {
    #[error("not an E.164 phone number: {0}")]
    NotE164(String),

    #[error("gateway address must be <local>@<domain>: {0}")]
    NotGateway(String),
}

/// Validate `address` against the scheme `kind`.
///
/// Pure; no normalization beyond trimming surrounding whitespace.
pub fn validate(address: &str, kind: AddressKind) -> Result<ValidAddress, InvalidAddress> {
    let trimmed = address.trim();
    match kind {
        AddressKind::PhoneE164 => {
            if E164.is_match(trimmed) {
                Ok(ValidAddress {
                    value: trimmed.to_string(),
                    kind,
                })
            } else {
                Err(InvalidAddress::NotE164(redact(trimmed)))
            }
        }
        AddressKind::EmailGateway => match trimmed.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(ValidAddress {
                    value: trimmed.to_string(),
                    kind,
                })
            }
            _ => Err(InvalidAddress::NotGateway(redact(trimmed))),
        },
    }
}

/// Keep the last four characters of the local/number part, mask the rest.
///
/// The gateway domain is left intact since it only names the carrier.
pub fn redact(address: &str) -> String {
    let (local, domain) = match address.split_once('@') {
        Some((l, d)) => (l, Some(d)),
        None => (address, None),
    };
    let chars: Vec<char> = local.chars().collect();
    let keep = chars.len().min(4);
    let mut masked: String = "*".repeat(chars.len() - keep);
    masked.extend(&chars[chars.len() - keep..]);
    match domain {
        Some(d) => format!("{masked}@{d}"),
        None => masked,
    }
}
