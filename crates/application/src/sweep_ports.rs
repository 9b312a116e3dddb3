mod alerts;
mod audit;
mod chat_info;
mod deleter;
mod lease;
mod messages;
mod progress;
mod registry;
mod settings;
mod updates;

pub use alerts::{OperatorAlert, OperatorAlertSink, RateLimitGauge};
pub use audit::{DeletionHistoryCounts, DeletionHistoryRepository, DeletionLogSink};
pub use chat_info::{BotPermissions, ChatInfoProvider, ChatLookup};
pub use deleter::{DeleteMessageError, MessageDeleter};
pub use lease::{SweepLease, SweepLeaseCoordinator};
pub use messages::{MessageIndexWriter, MessageSource, MessageStream};
pub use progress::{ProgressSink, SweepProgress};
pub use registry::ChatRegistry;
pub use settings::{SweepConfig, SweepSettingsRepository};
pub use updates::{ChatUpdate, UpdateBatch, UpdateSource};
