//! Shared types for the textcast dispatch engine: recipients and their
//! validation, the message payload, the configuration snapshot with its
//! hot-reload store, and the CSV data loader.

pub mod channel;
pub mod config;
pub mod error;
pub mod loader;
pub mod message;
pub mod recipient;
pub mod snapshot;

pub use channel::ChannelKind;
pub use config::{ChannelConfig, ConfigSnapshot, ConfigSource, Secret};
pub use error::*;
pub use loader::{load_data, DataSet};
pub use message::Message;
pub use recipient::{validate, AddressKind, InvalidAddress, Recipient, ValidAddress};
pub use snapshot::{ConfigWatcher, SnapshotStore};
