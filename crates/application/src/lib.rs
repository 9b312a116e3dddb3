//! Application services and ports.

#![forbid(unsafe_code)]

mod chat_sweeper;
mod deletion_history_service;
mod expiry_service;
mod indexed_chat_registry;
mod indexed_message_deleter;
mod membership_service;
mod operator_alert_service;
mod sweep_ports;
mod update_ingest_service;

#[cfg(test)]
mod test_support;

pub use chat_sweeper::{
    ChatSweepEnd, ChatSweepFailure, ChatSweepReport, ChatSweeper,
    DEFAULT_MAX_CONSECUTIVE_DELETE_FAILURES,
};
pub use deletion_history_service::{DeletionHistoryService, DeletionHistorySummary};
pub use expiry_service::{ExpiryService, SWEEP_LEASE_SCOPE, SweepRun, SweepRunStatus};
pub use indexed_chat_registry::IndexedChatRegistry;
pub use indexed_message_deleter::{DEFAULT_MAX_DELETE_REFUSALS, IndexedMessageDeleter};
pub use membership_service::{ChatVerificationSummary, MembershipChange, MembershipService};
pub use operator_alert_service::OperatorAlertService;
pub use sweep_ports::{
    BotPermissions, ChatInfoProvider, ChatLookup, ChatRegistry, ChatUpdate, DeleteMessageError,
    DeletionHistoryCounts, DeletionHistoryRepository, DeletionLogSink, MessageDeleter,
    MessageIndexWriter, MessageSource, MessageStream, OperatorAlert, OperatorAlertSink,
    ProgressSink, RateLimitGauge, SweepConfig, SweepLease, SweepLeaseCoordinator, SweepProgress,
    SweepSettingsRepository, UpdateBatch, UpdateSource,
};
pub use update_ingest_service::UpdateIngestService;
