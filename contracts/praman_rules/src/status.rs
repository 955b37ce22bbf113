//! Batch lifecycle.
//!
//! ```text
//! Created ──► InTransit ──► Received ──► Completed
//!                 ▲             │
//!                 └─────────────┘   (next custody hop)
//! ```
//!
//! Each custody hop is `InTransit → Received`; a received batch may be sent on
//! by its holder, or closed out as `Completed` by a terminal-role holder.

use core::fmt;
use core::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum BatchStatus {
    Created,
    InTransit,
    Received,
    Completed,
}

impl BatchStatus {
    pub const ALL: [BatchStatus; 4] = [
        BatchStatus::Created,
        BatchStatus::InTransit,
        BatchStatus::Received,
        BatchStatus::Completed,
    ];

    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (BatchStatus::Created, BatchStatus::InTransit)
                | (BatchStatus::InTransit, BatchStatus::Received)
                | (BatchStatus::Received, BatchStatus::InTransit)
                | (BatchStatus::Received, BatchStatus::Completed)
        )
    }

    /// A batch can be dispatched only while it sits with a holder.
    pub fn is_dispatchable(self) -> bool {
        self.can_transition_to(BatchStatus::InTransit)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Created => "created",
            BatchStatus::InTransit => "in_transit",
            BatchStatus::Received => "received",
            BatchStatus::Completed => "completed",
        }
    }
}

impl FromStr for BatchStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BatchStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
