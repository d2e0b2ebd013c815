//! Event topic identifiers used for listener routing and metrics labels.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of public event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    /// `transfer.added`
    #[serde(rename = "transfer.added")]
    TransferAdded,
    /// `transfer.add_failed`
    #[serde(rename = "transfer.add_failed")]
    TransferAddFailed,
    /// `transfer.finished`
    #[serde(rename = "transfer.finished")]
    TransferFinished,
    /// `transfer.paused`
    #[serde(rename = "transfer.paused")]
    TransferPaused,
    /// `transfer.removed`
    #[serde(rename = "transfer.removed")]
    TransferRemoved,
    /// `transfers.updated`
    #[serde(rename = "transfers.updated")]
    TransfersUpdated,
    /// `transfers.statistics`
    #[serde(rename = "transfers.statistics")]
    TransfersStatistics,
    /// `session.statistics`
    #[serde(rename = "session.statistics")]
    SessionStatistics,
}

impl EventKind {
    /// Every event kind, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::TransferAdded,
        Self::TransferAddFailed,
        Self::TransferFinished,
        Self::TransferPaused,
        Self::TransferRemoved,
        Self::TransfersUpdated,
        Self::TransfersStatistics,
        Self::SessionStatistics,
    ];

    /// Dotted event name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TransferAdded => "transfer.added",
            Self::TransferAddFailed => "transfer.add_failed",
            Self::TransferFinished => "transfer.finished",
            Self::TransferPaused => "transfer.paused",
            Self::TransferRemoved => "transfer.removed",
            Self::TransfersUpdated => "transfers.updated",
            Self::TransfersStatistics => "transfers.statistics",
            Self::SessionStatistics => "session.statistics",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == value)
            .ok_or_else(|| UnknownEventKind {
                name: value.to_string(),
            })
    }
}

/// Raised when parsing an event name outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind")]
pub struct UnknownEventKind {
    /// Name that failed to parse.
    pub name: String,
}
