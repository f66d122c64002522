use std::fmt;

use serde::{Deserialize, Serialize};

/// Text used when no message was supplied for the run.
pub const FALLBACK_MESSAGE: &str = "Default message";

/// Immutable text payload delivered to every recipient of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message(String);

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Pick the first supplied message, or the fallback literal when there is none.
    pub fn select<S: AsRef<str>>(messages: &[S]) -> Self {
        match messages.first() {
            Some(first) => Self::new(first.as_ref()),
            None => {
                tracing::warn!("no messages supplied, using the default message");
                Self::new(FALLBACK_MESSAGE)
            }
        }
    }

    pub fn text(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_takes_first() {
        let msg = Message::select(&["first", "second"]);
        assert_eq!(msg.text(), "first");
    }

    #[test]
    fn select_falls_back_when_empty() {
        let none: [&str; 0] = [];
        assert_eq!(Message::select(&none).text(), "Default message");
    }
}
