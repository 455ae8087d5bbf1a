use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{watch, Mutex};
use utoipa::ToSchema;

use super::alert_config::AlertConfigStore;
use super::alert_models::{AlertConfig, AlertSeverity, AlertType, NewAlert};
use super::alert_repository::AlertStore;
use super::collectors::{CollectorSnapshot, MetricSource, ProjectRiskInputs};
use super::rate_limit::DailyRateLimiter;
use crate::notification::{NotificationDispatcher, NotificationEvent};

/// Outcome of one scan, shared by every caller that was coalesced onto it.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ScanSummary {
    pub candidates: usize,
    pub created: usize,
    pub suppressed_cooldown: usize,
    pub suppressed_rate_limit: usize,
    pub collector_failures: usize,
    pub store_failures: usize,
}

/// Severity of an overdue task scales with how late it is.
fn overdue_severity(days_overdue: i64) -> AlertSeverity {
    if days_overdue > 7 {
        AlertSeverity::Critical
    } else if days_overdue > 2 {
        AlertSeverity::High
    } else {
        AlertSeverity::Medium
    }
}

/// Weighted risk score: overdue ratio dominates, each blocked task adds a
/// fixed contribution.
pub(crate) fn project_risk_score(inputs: &ProjectRiskInputs) -> f64 {
    if inputs.total_tasks == 0 {
        return 0.0;
    }
    let overdue_ratio = inputs.overdue_tasks as f64 / inputs.total_tasks as f64;
    70.0 * overdue_ratio + 10.0 * inputs.blocked_tasks as f64
}

/// Evaluate every enabled rule against the snapshot, in the fixed rule
/// order. Pure: dedup, rate limiting and persistence happen in the scan
/// pipeline around this.
pub fn evaluate(
    configs: &[AlertConfig],
    snapshot: &CollectorSnapshot,
    now: DateTime<Utc>,
) -> Vec<NewAlert> {
    let mut candidates = Vec::new();

    for alert_type in AlertType::RULE_ORDER {
        let Some(config) = configs
            .iter()
            .find(|c| c.alert_type == alert_type && c.is_enabled)
        else {
            continue;
        };

        match alert_type {
            AlertType::TaskOverdue => {
                for task in snapshot.overdue.iter().flatten() {
                    let days_overdue = (now - task.due_date).num_days();
                    candidates.push(NewAlert {
                        alert_type,
                        severity: overdue_severity(days_overdue),
                        title: format!("Task overdue: {}", task.title),
                        message: format!(
                            "Task \"{}\" is {} day(s) overdue",
                            task.title, days_overdue
                        ),
                        subject_user_id: task.assignee_id,
                        subject_project_id: task.project_id,
                        subject_task_id: Some(task.task_id),
                        data: json!({
                            "days_overdue": days_overdue,
                            "due_date": task.due_date,
                        }),
                    });
                }
            }
            AlertType::StudentInactive => {
                for student in snapshot.inactive.iter().flatten() {
                    candidates.push(NewAlert {
                        alert_type,
                        severity: AlertSeverity::High,
                        title: format!("Student inactive: {}", student.username),
                        message: format!(
                            "{} has no recorded activity in the last {} days",
                            student.username, config.thresholds.inactivity_days
                        ),
                        subject_user_id: Some(student.user_id),
                        subject_project_id: None,
                        subject_task_id: None,
                        data: json!({
                            "last_activity_at": student.last_activity_at,
                        }),
                    });
                }
            }
            AlertType::ProjectRisk => {
                for project in snapshot.project_risk.iter().flatten() {
                    let score = project_risk_score(project);
                    if score < config.thresholds.risk_score {
                        continue;
                    }
                    let severity = if score >= config.thresholds.risk_score * 1.5 {
                        AlertSeverity::High
                    } else {
                        AlertSeverity::Medium
                    };
                    candidates.push(NewAlert {
                        alert_type,
                        severity,
                        title: format!("Project at risk: {}", project.name),
                        message: format!(
                            "Project \"{}\" risk score {:.1} exceeds threshold {:.1}",
                            project.name, score, config.thresholds.risk_score
                        ),
                        subject_user_id: None,
                        subject_project_id: Some(project.project_id),
                        subject_task_id: None,
                        data: json!({
                            "risk_score": score,
                            "total_tasks": project.total_tasks,
                            "overdue_tasks": project.overdue_tasks,
                            "blocked_tasks": project.blocked_tasks,
                        }),
                    });
                }
            }
            AlertType::VelocityDrop => {
                for stat in snapshot.velocity.iter().flatten() {
                    if stat.previous_count == 0 {
                        continue;
                    }
                    let ratio = stat.current_count as f64 / stat.previous_count as f64;
                    if ratio >= config.thresholds.drop_ratio {
                        continue;
                    }
                    candidates.push(NewAlert {
                        alert_type,
                        severity: AlertSeverity::Medium,
                        title: format!("Velocity drop: {}", stat.username),
                        message: format!(
                            "{} logged {} activities this period, down from {}",
                            stat.username, stat.current_count, stat.previous_count
                        ),
                        subject_user_id: Some(stat.user_id),
                        subject_project_id: None,
                        subject_task_id: None,
                        data: json!({
                            "current_count": stat.current_count,
                            "previous_count": stat.previous_count,
                        }),
                    });
                }
            }
            AlertType::TaskBlocked => {
                for task in snapshot.blocked.iter().flatten() {
                    let hours_blocked = (now - task.blocked_at).num_hours();
                    candidates.push(NewAlert {
                        alert_type,
                        severity: AlertSeverity::High,
                        title: format!("Task blocked: {}", task.title),
                        message: format!(
                            "Task \"{}\" has been blocked for {} hour(s)",
                            task.title, hours_blocked
                        ),
                        subject_user_id: task.assignee_id,
                        subject_project_id: None,
                        subject_task_id: Some(task.task_id),
                        data: json!({
                            "blocked_at": task.blocked_at,
                            "hours_blocked": hours_blocked,
                        }),
                    });
                }
            }
        }
    }

    candidates
}

/// Periodic and on-demand scanning over the collector signals.
///
/// Scans are serialized by a single-flight guard: a trigger that arrives
/// while a scan is running joins the in-flight scan and receives its
/// summary instead of starting a second one.
pub struct AlertEngine {
    configs: Arc<dyn AlertConfigStore>,
    metrics: Arc<dyn MetricSource>,
    store: Arc<dyn AlertStore>,
    dispatcher: Arc<NotificationDispatcher>,
    limiter: Mutex<DailyRateLimiter>,
    flight: std::sync::Mutex<Option<watch::Receiver<Option<ScanSummary>>>>,
}

impl AlertEngine {
    pub fn new(
        configs: Arc<dyn AlertConfigStore>,
        metrics: Arc<dyn MetricSource>,
        store: Arc<dyn AlertStore>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            configs,
            metrics,
            store,
            dispatcher,
            limiter: Mutex::new(DailyRateLimiter::new(Utc::now().date_naive())),
            flight: std::sync::Mutex::new(None),
        }
    }

    /// Run a scan, or join the one already in flight.
    pub async fn run_scan(&self) -> ScanSummary {
        loop {
            enum FlightRole {
                Leader(watch::Sender<Option<ScanSummary>>),
                Follower(watch::Receiver<Option<ScanSummary>>),
            }

            let role = {
                let mut slot = self.flight.lock().unwrap();
                match &*slot {
                    Some(rx) => FlightRole::Follower(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        *slot = Some(rx);
                        FlightRole::Leader(tx)
                    }
                }
            };

            match role {
                FlightRole::Leader(tx) => {
                    let summary = self.scan_once().await;
                    // Clear the slot before publishing so the next trigger
                    // starts a fresh scan.
                    *self.flight.lock().unwrap() = None;
                    let _ = tx.send(Some(summary.clone()));
                    return summary;
                }
                FlightRole::Follower(mut rx) => {
                    loop {
                        let finished = rx.borrow().clone();
                        if let Some(summary) = finished {
                            return summary;
                        }
                        if rx.changed().await.is_err() {
                            // Leader went away without publishing; retry.
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Wait for an in-flight scan to finish. Used on shutdown so a running
    /// scan completes rather than being cut off mid-write.
    pub async fn wait_idle(&self) {
        let rx = self.flight.lock().unwrap().clone();
        if let Some(mut rx) = rx {
            while rx.borrow().is_none() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
    }

    async fn scan_once(&self) -> ScanSummary {
        let mut summary = ScanSummary::default();

        let configs = match self.configs.load_all().await {
            Ok(configs) => configs,
            Err(e) => {
                tracing::error!("Failed to load alert configurations: {:?}", e);
                summary.store_failures += 1;
                return summary;
            }
        };

        let snapshot = CollectorSnapshot::gather(self.metrics.as_ref(), &configs).await;
        summary.collector_failures = snapshot.collector_failures;

        let now = Utc::now();
        let candidates = evaluate(&configs, &snapshot, now);
        summary.candidates = candidates.len();

        let mut limiter = self.limiter.lock().await;

        for candidate in candidates {
            let Some(config) = configs.iter().find(|c| c.alert_type == candidate.alert_type)
            else {
                continue;
            };

            let subject_key = candidate.subject_key();
            let cooldown_start = now - Duration::hours(config.cooldown_hours as i64);

            match self
                .store
                .find_unresolved(candidate.alert_type, &subject_key, cooldown_start)
                .await
            {
                Ok(Some(_)) => {
                    summary.suppressed_cooldown += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Dedup lookup failed for {}: {:?}", subject_key, e);
                    summary.store_failures += 1;
                    continue;
                }
            }

            if !limiter.try_acquire(
                now.date_naive(),
                candidate.alert_type,
                &subject_key,
                config.max_alerts_per_day.max(0) as u32,
            ) {
                summary.suppressed_rate_limit += 1;
                continue;
            }

            match self.store.save(candidate).await {
                Ok(alert) => {
                    summary.created += 1;
                    tracing::info!(
                        alert_type = %alert.alert_type,
                        severity = %alert.severity,
                        subject = %alert.subject_key,
                        "Alert created"
                    );
                    // Alerts are the durable record; delivery is best-effort
                    // and must not hold up the scan.
                    let dispatcher = self.dispatcher.clone();
                    tokio::spawn(async move {
                        dispatcher
                            .dispatch(NotificationEvent::AlertRaised { alert })
                            .await;
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to persist alert for {}: {:?}", subject_key, e);
                    summary.store_failures += 1;
                }
            }
        }

        tracing::info!(
            candidates = summary.candidates,
            created = summary.created,
            suppressed_cooldown = summary.suppressed_cooldown,
            suppressed_rate_limit = summary.suppressed_rate_limit,
            "Alert scan finished"
        );

        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use axum::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::alert::alert_repository::{AlertFilters, AlertStats};
    use crate::alert::collectors::{
        BlockedTask, InactiveStudent, OverdueTask, VelocityStat,
    };
    use crate::alert::Alert;
    use crate::error::{AppError, Result};
    use crate::notification::dispatcher::test_support::noop_dispatcher;

    fn config(alert_type: AlertType, max_per_day: i32, cooldown_hours: i32) -> AlertConfig {
        AlertConfig {
            alert_type,
            is_enabled: true,
            thresholds: Default::default(),
            channel_in_app: true,
            channel_email: false,
            max_alerts_per_day: max_per_day,
            cooldown_hours,
            updated_at: Utc::now(),
        }
    }

    fn overdue_task(days_overdue: i64) -> OverdueTask {
        OverdueTask {
            task_id: Uuid::new_v4(),
            project_id: None,
            assignee_id: Some(Uuid::new_v4()),
            title: "Write thesis chapter".to_string(),
            due_date: Utc::now() - Duration::days(days_overdue),
        }
    }

    struct MemoryConfigStore {
        configs: Vec<AlertConfig>,
    }

    #[async_trait]
    impl AlertConfigStore for MemoryConfigStore {
        async fn load_all(&self) -> Result<Vec<AlertConfig>> {
            Ok(self.configs.clone())
        }

        async fn find(&self, alert_type: AlertType) -> Result<Option<AlertConfig>> {
            Ok(self
                .configs
                .iter()
                .find(|c| c.alert_type == alert_type)
                .cloned())
        }
    }

    #[derive(Default)]
    struct MemoryAlertStore {
        alerts: StdMutex<Vec<Alert>>,
    }

    impl MemoryAlertStore {
        fn count(&self) -> usize {
            self.alerts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AlertStore for MemoryAlertStore {
        async fn save(&self, alert: NewAlert) -> Result<Alert> {
            let subject_key = alert.subject_key();
            let now = Utc::now();
            let saved = Alert {
                id: Uuid::new_v4(),
                alert_type: alert.alert_type,
                severity: alert.severity,
                title: alert.title,
                message: alert.message,
                subject_user_id: alert.subject_user_id,
                subject_project_id: alert.subject_project_id,
                subject_task_id: alert.subject_task_id,
                subject_key,
                data: alert.data,
                is_resolved: false,
                resolution_reason: None,
                created_at: now,
                updated_at: now,
            };
            self.alerts.lock().unwrap().push(saved.clone());
            Ok(saved)
        }

        async fn find_unresolved(
            &self,
            alert_type: AlertType,
            subject_key: &str,
            since: DateTime<Utc>,
        ) -> Result<Option<Alert>> {
            Ok(self
                .alerts
                .lock()
                .unwrap()
                .iter()
                .find(|a| {
                    a.alert_type == alert_type
                        && a.subject_key == subject_key
                        && !a.is_resolved
                        && a.created_at >= since
                })
                .cloned())
        }

        async fn resolve(&self, id: Uuid, reason: Option<&str>) -> Result<Alert> {
            let mut alerts = self.alerts.lock().unwrap();
            let alert = alerts
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| AppError::NotFound("Alert not found".to_string()))?;
            if !alert.is_resolved {
                alert.is_resolved = true;
                alert.resolution_reason = reason.map(str::to_string);
                alert.updated_at = Utc::now();
            }
            Ok(alert.clone())
        }

        async fn list(&self, _filters: AlertFilters) -> Result<Vec<Alert>> {
            Ok(self.alerts.lock().unwrap().clone())
        }

        async fn stats(&self) -> Result<AlertStats> {
            Ok(AlertStats::default())
        }
    }

    /// A metric source with one fixed overdue task, optionally slow, that
    /// counts how often it was queried.
    struct CannedMetrics {
        overdue: Vec<OverdueTask>,
        blocked: Vec<BlockedTask>,
        fail_overdue: bool,
        delay_ms: u64,
        calls: AtomicUsize,
    }

    impl CannedMetrics {
        fn with_overdue(overdue: Vec<OverdueTask>) -> Self {
            Self {
                overdue,
                blocked: Vec::new(),
                fail_overdue: false,
                delay_ms: 0,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MetricSource for CannedMetrics {
        async fn overdue_tasks(&self) -> Result<Vec<OverdueTask>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail_overdue {
                return Err(AppError::InternalError);
            }
            Ok(self.overdue.clone())
        }

        async fn inactive_students(&self, _since_days: i32) -> Result<Vec<InactiveStudent>> {
            Ok(Vec::new())
        }

        async fn project_risk_inputs(&self) -> Result<Vec<ProjectRiskInputs>> {
            Ok(Vec::new())
        }

        async fn velocity_stats(&self, _window_days: i32) -> Result<Vec<VelocityStat>> {
            Ok(Vec::new())
        }

        async fn blocked_tasks(&self, _blocked_hours: i32) -> Result<Vec<BlockedTask>> {
            Ok(self.blocked.clone())
        }
    }

    fn engine(
        configs: Vec<AlertConfig>,
        metrics: CannedMetrics,
    ) -> (Arc<AlertEngine>, Arc<MemoryAlertStore>) {
        let store = Arc::new(MemoryAlertStore::default());
        let engine = Arc::new(AlertEngine::new(
            Arc::new(MemoryConfigStore { configs }),
            Arc::new(metrics),
            store.clone(),
            noop_dispatcher(),
        ));
        (engine, store)
    }

    #[test]
    fn overdue_severity_scales_with_lateness() {
        assert_eq!(overdue_severity(1), AlertSeverity::Medium);
        assert_eq!(overdue_severity(2), AlertSeverity::Medium);
        assert_eq!(overdue_severity(3), AlertSeverity::High);
        assert_eq!(overdue_severity(7), AlertSeverity::High);
        assert_eq!(overdue_severity(8), AlertSeverity::Critical);
    }

    #[test]
    fn evaluate_skips_disabled_rules() {
        let mut cfg = config(AlertType::TaskOverdue, 5, 24);
        cfg.is_enabled = false;
        let snapshot = CollectorSnapshot {
            overdue: Some(vec![overdue_task(3)]),
            ..Default::default()
        };

        let candidates = evaluate(&[cfg], &snapshot, Utc::now());
        assert!(candidates.is_empty());
    }

    #[test]
    fn three_days_overdue_yields_one_high_candidate() {
        let snapshot = CollectorSnapshot {
            overdue: Some(vec![overdue_task(3)]),
            ..Default::default()
        };

        let candidates = evaluate(&[config(AlertType::TaskOverdue, 5, 24)], &snapshot, Utc::now());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].severity, AlertSeverity::High);
        assert!(candidates[0].subject_key().starts_with("task:"));
    }

    #[test]
    fn velocity_drop_needs_a_prior_baseline() {
        let mut cfg = config(AlertType::VelocityDrop, 5, 24);
        cfg.thresholds.drop_ratio = 0.5;
        let snapshot = CollectorSnapshot {
            velocity: Some(vec![
                VelocityStat {
                    user_id: Uuid::new_v4(),
                    username: "fresh".to_string(),
                    current_count: 0,
                    previous_count: 0,
                },
                VelocityStat {
                    user_id: Uuid::new_v4(),
                    username: "slowed".to_string(),
                    current_count: 2,
                    previous_count: 10,
                },
            ]),
            ..Default::default()
        };

        let candidates = evaluate(&[cfg], &snapshot, Utc::now());
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].title.contains("slowed"));
    }

    #[test]
    fn project_risk_severity_scales_with_margin() {
        let mut cfg = config(AlertType::ProjectRisk, 5, 24);
        cfg.thresholds.risk_score = 40.0;

        let at_threshold = ProjectRiskInputs {
            project_id: Uuid::new_v4(),
            name: "genomics".to_string(),
            total_tasks: 10,
            overdue_tasks: 6,
            blocked_tasks: 0,
        };
        // 70 * 0.6 = 42 >= 40, below 60 => medium
        let far_over = ProjectRiskInputs {
            project_id: Uuid::new_v4(),
            name: "robotics".to_string(),
            total_tasks: 10,
            overdue_tasks: 8,
            blocked_tasks: 2,
        };
        // 70 * 0.8 + 20 = 76 >= 60 => high

        let snapshot = CollectorSnapshot {
            project_risk: Some(vec![at_threshold, far_over]),
            ..Default::default()
        };

        let candidates = evaluate(&[cfg], &snapshot, Utc::now());
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].severity, AlertSeverity::Medium);
        assert_eq!(candidates[1].severity, AlertSeverity::High);
    }

    #[tokio::test]
    async fn rerunning_within_cooldown_creates_no_duplicate() {
        let (engine, store) = engine(
            vec![config(AlertType::TaskOverdue, 5, 24)],
            CannedMetrics::with_overdue(vec![overdue_task(3)]),
        );

        let first = engine.run_scan().await;
        assert_eq!(first.created, 1);

        let second = engine.run_scan().await;
        assert_eq!(second.created, 0);
        assert_eq!(second.suppressed_cooldown, 1);
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn resolved_alerts_no_longer_suppress_candidates() {
        let (engine, store) = engine(
            vec![config(AlertType::TaskOverdue, 5, 24)],
            CannedMetrics::with_overdue(vec![overdue_task(3)]),
        );

        engine.run_scan().await;
        let id = store.alerts.lock().unwrap()[0].id;
        store.resolve(id, Some("student caught up")).await.unwrap();

        let summary = engine.run_scan().await;
        assert_eq!(summary.created, 1);
        assert_eq!(store.count(), 2);
    }

    #[tokio::test]
    async fn daily_budget_drops_the_excess_candidate() {
        // Cooldown of zero lets every scan pass dedup, so only the daily
        // budget is in play.
        let (engine, store) = engine(
            vec![config(AlertType::TaskOverdue, 2, 0)],
            CannedMetrics::with_overdue(vec![overdue_task(3)]),
        );

        assert_eq!(engine.run_scan().await.created, 1);
        assert_eq!(engine.run_scan().await.created, 1);

        let third = engine.run_scan().await;
        assert_eq!(third.created, 0);
        assert_eq!(third.suppressed_rate_limit, 1);
        assert_eq!(store.count(), 2);
    }

    #[tokio::test]
    async fn resolving_twice_is_a_no_op_success() {
        let (engine, store) = engine(
            vec![config(AlertType::TaskOverdue, 5, 24)],
            CannedMetrics::with_overdue(vec![overdue_task(3)]),
        );

        engine.run_scan().await;
        let id = store.alerts.lock().unwrap()[0].id;

        let first = store.resolve(id, Some("done")).await.unwrap();
        assert!(first.is_resolved);
        let second = store.resolve(id, None).await.unwrap();
        assert!(second.is_resolved);
        assert_eq!(second.resolution_reason.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn one_failing_collector_does_not_silence_the_others() {
        let blocked = BlockedTask {
            task_id: Uuid::new_v4(),
            assignee_id: Some(Uuid::new_v4()),
            title: "Calibrate sensor rig".to_string(),
            blocked_at: Utc::now() - Duration::hours(72),
        };
        let metrics = CannedMetrics {
            overdue: vec![overdue_task(3)],
            blocked: vec![blocked],
            fail_overdue: true,
            delay_ms: 0,
            calls: AtomicUsize::new(0),
        };
        let (engine, store) = engine(
            vec![
                config(AlertType::TaskOverdue, 5, 24),
                config(AlertType::TaskBlocked, 5, 24),
            ],
            metrics,
        );

        let summary = engine.run_scan().await;
        assert_eq!(summary.collector_failures, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(store.count(), 1);
        assert_eq!(
            store.alerts.lock().unwrap()[0].alert_type,
            AlertType::TaskBlocked
        );
    }

    #[tokio::test]
    async fn concurrent_triggers_coalesce_into_one_scan() {
        let mut metrics = CannedMetrics::with_overdue(vec![overdue_task(3)]);
        metrics.delay_ms = 100;
        let (engine, store) = engine(vec![config(AlertType::TaskOverdue, 5, 24)], metrics);

        let (a, b) = tokio::join!(
            {
                let engine = engine.clone();
                async move { engine.run_scan().await }
            },
            {
                let engine = engine.clone();
                async move { engine.run_scan().await }
            }
        );

        // One scan ran; both callers observed its result.
        assert_eq!(store.count(), 1);
        assert_eq!(a.created, 1);
        assert_eq!(b.created, 1);
    }
}
