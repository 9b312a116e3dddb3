//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod chat;
mod exemption;
mod expiry;
mod message;
mod outcome;
mod stats;

pub use chat::{ChatBucket, ChatKind, ConversationRef, MembershipStatus};
pub use exemption::ExemptionSet;
pub use expiry::{ExpiryCutoffs, ThresholdConfig, Verdict, classify};
pub use message::{AuthorKind, MessageRef};
pub use outcome::{DeletionOutcome, OutcomeVerdict};
pub use stats::{ChatStats, SweepStats, progress_percent};
