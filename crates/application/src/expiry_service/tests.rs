use std::sync::Arc;
use std::time::Duration;

use teleclean_core::ChatId;
use teleclean_domain::{AuthorKind, ChatKind};
use tokio_util::sync::CancellationToken;

use crate::chat_sweeper::ChatSweeper;
use crate::operator_alert_service::OperatorAlertService;
use crate::sweep_ports::OperatorAlert;
use crate::test_support::{
    ChatScript, FakeChatInfo, FakeChatRegistry, FakeDeleter, FakeLeaseCoordinator,
    FakeMessageSource, RecordingAlertSink, RecordingDeletionLog, RecordingProgressSink,
    ScriptedRateLimitGauge, config, message,
};

use super::{ExpiryService, SweepRunStatus};

struct Fleet {
    chat_info: Arc<FakeChatInfo>,
    messages: Arc<FakeMessageSource>,
    deleter: Arc<FakeDeleter>,
    registry: Arc<FakeChatRegistry>,
    progress: Arc<RecordingProgressSink>,
}

impl Fleet {
    fn new() -> Self {
        Self {
            chat_info: Arc::new(FakeChatInfo::default()),
            messages: Arc::new(FakeMessageSource::default()),
            deleter: Arc::new(FakeDeleter::default()),
            registry: Arc::new(FakeChatRegistry::default()),
            progress: Arc::new(RecordingProgressSink::default()),
        }
    }

    fn service(&self, progress_interval: Duration) -> ExpiryService {
        let sweeper = ChatSweeper::new(
            self.chat_info.clone(),
            self.messages.clone(),
            self.deleter.clone(),
            self.registry.clone(),
            Arc::new(RecordingDeletionLog::default()),
        );

        ExpiryService::new(
            self.registry.clone(),
            sweeper,
            self.progress.clone(),
            progress_interval,
        )
    }

    async fn add_chat(&self, id: i64, kind: ChatKind, old_user_messages: i64) -> ChatId {
        let chat_id = ChatId::new(id);
        self.registry.track(chat_id, kind).await;
        self.chat_info.script(chat_id, ChatScript::Found(kind)).await;
        self.messages
            .put(
                chat_id,
                (1..=old_user_messages)
                    .map(|message_id| message(message_id, 100 + message_id, AuthorKind::User, 5000))
                    .collect(),
            )
            .await;
        chat_id
    }
}

#[tokio::test]
async fn run_sweep_continues_after_a_failing_chat() {
    let fleet = Fleet::new();
    fleet.add_chat(-1001, ChatKind::Supergroup, 2).await;
    let failing = fleet.add_chat(-1002, ChatKind::Supergroup, 3).await;
    fleet.add_chat(-1003, ChatKind::Supergroup, 4).await;
    fleet.messages.fail_after(failing, 1).await;

    let run = fleet
        .service(Duration::from_secs(3600))
        .run_sweep(&config(60, 1440, false), &CancellationToken::new())
        .await;

    assert!(run.is_ok());
    let run = run.unwrap_or_else(|_| unreachable!());
    assert_eq!(run.status, SweepRunStatus::Completed);
    assert_eq!(run.total_chats, 3);
    assert_eq!(run.failed_chats, 1);
    assert_eq!(run.stats.chats_processed, 3);
    assert_eq!(run.stats.total_messages, 7);
    assert_eq!(run.stats.deleted_messages, 7);
    assert!(run.stats.is_consistent());
    assert_eq!(fleet.deleter.call_count().await, 7);
}

#[tokio::test]
async fn empty_fleet_returns_zero_stats_without_progress() {
    let fleet = Fleet::new();

    let run = fleet
        .service(Duration::ZERO)
        .run_sweep(&config(60, 1440, false), &CancellationToken::new())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(run.status, SweepRunStatus::Completed);
    assert_eq!(run.stats, teleclean_domain::SweepStats::zero());
    assert!(fleet.progress.snapshots.lock().await.is_empty());
}

#[tokio::test]
async fn registry_failure_is_returned() {
    let fleet = Fleet::new();
    fleet.add_chat(-1001, ChatKind::Supergroup, 1).await;
    *fleet.registry.fail_listing.lock().await = true;

    let run = fleet
        .service(Duration::ZERO)
        .run_sweep(&config(60, 1440, false), &CancellationToken::new())
        .await;

    assert!(run.is_err());
    assert_eq!(fleet.deleter.call_count().await, 0);
}

#[tokio::test]
async fn long_interval_emits_only_initial_and_final_snapshots() {
    let fleet = Fleet::new();
    for id in 1..=4 {
        fleet.add_chat(id, ChatKind::Private, 1).await;
    }

    fleet
        .service(Duration::from_secs(3600))
        .run_sweep(&config(60, 1440, false), &CancellationToken::new())
        .await
        .unwrap_or_else(|_| unreachable!());

    let snapshots = fleet.progress.snapshots.lock().await;
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].completed_chats, 0);
    assert!(snapshots[0].in_progress);
    assert_eq!(snapshots[1].completed_chats, 4);
    assert_eq!(snapshots[1].total_chats, 4);
    assert!(!snapshots[1].in_progress);
    assert!((snapshots[1].percent() - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn zero_interval_emits_after_every_chat_but_the_last() {
    let fleet = Fleet::new();
    for id in 1..=3 {
        fleet.add_chat(id, ChatKind::Private, 1).await;
    }

    fleet
        .service(Duration::ZERO)
        .run_sweep(&config(60, 1440, false), &CancellationToken::new())
        .await
        .unwrap_or_else(|_| unreachable!());

    let snapshots = fleet.progress.snapshots.lock().await;
    let completed: Vec<u64> = snapshots
        .iter()
        .map(|snapshot| snapshot.completed_chats)
        .collect();
    assert_eq!(completed, vec![0, 1, 2, 3]);
    assert_eq!(
        snapshots.iter().filter(|snapshot| !snapshot.in_progress).count(),
        1
    );
}

#[tokio::test]
async fn cancelled_run_stops_before_the_next_chat() {
    let fleet = Fleet::new();
    for id in 1..=3 {
        fleet.add_chat(id, ChatKind::Private, 1).await;
    }
    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let run = fleet
        .service(Duration::ZERO)
        .run_sweep(&config(60, 1440, false), &cancellation)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(run.status, SweepRunStatus::Cancelled);
    assert_eq!(run.stats.chats_processed, 0);
    assert_eq!(run.total_chats, 3);
    assert_eq!(fleet.deleter.call_count().await, 0);

    let snapshots = fleet.progress.snapshots.lock().await;
    assert_eq!(snapshots.last().map(|snapshot| snapshot.in_progress), Some(false));
}

#[tokio::test]
async fn held_lease_skips_the_run() {
    let fleet = Fleet::new();
    fleet.add_chat(1, ChatKind::Private, 1).await;
    let coordinator = Arc::new(FakeLeaseCoordinator::default());
    *coordinator.holder.lock().await = Some("worker-b".to_owned());

    let run = fleet
        .service(Duration::ZERO)
        .with_lease_coordinator(coordinator.clone(), "worker-a", 900)
        .run_sweep(&config(60, 1440, false), &CancellationToken::new())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(run.status, SweepRunStatus::Skipped);
    assert_eq!(fleet.deleter.call_count().await, 0);
    assert_eq!(*coordinator.releases.lock().await, 0);
}

#[tokio::test]
async fn acquired_lease_is_released_after_the_run() {
    let fleet = Fleet::new();
    fleet.add_chat(1, ChatKind::Private, 2).await;
    let coordinator = Arc::new(FakeLeaseCoordinator::default());

    let run = fleet
        .service(Duration::ZERO)
        .with_lease_coordinator(coordinator.clone(), "worker-a", 900)
        .run_sweep(&config(60, 1440, false), &CancellationToken::new())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(run.status, SweepRunStatus::Completed);
    assert_eq!(run.stats.deleted_messages, 2);
    assert_eq!(*coordinator.releases.lock().await, 1);
    assert!(coordinator.holder.lock().await.is_none());
}

#[tokio::test]
async fn failed_run_alerts_the_owner() {
    let fleet = Fleet::new();
    *fleet.registry.fail_listing.lock().await = true;
    let alerts = Arc::new(RecordingAlertSink::default());
    let service = fleet
        .service(Duration::from_secs(3600))
        .with_operator_alerts(OperatorAlertService::new(alerts.clone()));

    let run = service
        .run_sweep(&config(60, 1440, false), &CancellationToken::new())
        .await;

    assert!(run.is_err());
    assert_eq!(
        alerts.alerts.lock().await.as_slice(),
        &[OperatorAlert::SweepFailed {
            context: "sweep run".to_owned(),
            error: "unavailable: registry offline".to_owned(),
        }]
    );
}

#[tokio::test]
async fn throttling_during_a_run_alerts_the_owner() {
    let fleet = Fleet::new();
    fleet.add_chat(-1001, ChatKind::Supergroup, 2).await;
    let alerts = Arc::new(RecordingAlertSink::default());
    let gauge = Arc::new(ScriptedRateLimitGauge::default());
    if let Ok(mut throttled) = gauge.throttled.lock() {
        *throttled = 2;
    }
    let service = fleet.service(Duration::from_secs(3600)).with_operator_alerts(
        OperatorAlertService::new(alerts.clone()).with_rate_limit_gauge(gauge),
    );

    let first = service
        .run_sweep(&config(60, 1440, false), &CancellationToken::new())
        .await;
    let second = service
        .run_sweep(&config(60, 1440, false), &CancellationToken::new())
        .await;

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(
        alerts.alerts.lock().await.as_slice(),
        &[OperatorAlert::RateLimited { throttled_calls: 2 }]
    );
}
