use std::sync::Arc;

use serde::Serialize;

use super::email::EmailTransport;
use super::notification_models::NotificationEvent;
use super::notification_repository::NotificationStore;
use super::templates;
use crate::alert::AlertConfigStore;
use crate::error::Result;
use crate::realtime::{topics, HubHandle, ServerMessage};
use crate::user::{Role, User, UserDirectory};

/// Per-event summary of what was attempted and what stuck. Failures are
/// counted, never propagated: alert/schedule persistence already succeeded
/// by the time the dispatcher runs.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy)]
struct Channels {
    in_app: bool,
    email: bool,
}

/// Turns a domain event into channel-specific deliveries: a durable
/// notification row plus a realtime push for the in-app channel, a
/// templated email for the email channel.
pub struct NotificationDispatcher {
    users: Arc<dyn UserDirectory>,
    store: Arc<dyn NotificationStore>,
    configs: Arc<dyn AlertConfigStore>,
    hub: HubHandle,
    mailer: Option<Arc<dyn EmailTransport>>,
}

impl NotificationDispatcher {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        store: Arc<dyn NotificationStore>,
        configs: Arc<dyn AlertConfigStore>,
        hub: HubHandle,
        mailer: Option<Arc<dyn EmailTransport>>,
    ) -> Self {
        Self {
            users,
            store,
            configs,
            hub,
            mailer,
        }
    }

    pub async fn dispatch(&self, event: NotificationEvent) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let recipients = match self.resolve_recipients(&event).await {
            Ok(recipients) => recipients,
            Err(e) => {
                tracing::error!(
                    event_type = event.event_type(),
                    "Failed to resolve recipients: {:?}",
                    e
                );
                report.failed += 1;
                return report;
            }
        };

        if recipients.is_empty() {
            tracing::warn!(
                event_type = event.event_type(),
                "No recipients resolved for event"
            );
            return report;
        }

        let channels = self.resolve_channels(&event).await;
        let message = templates::in_app_message(&event);
        let payload = serde_json::to_value(&event).unwrap_or_else(|_| serde_json::json!({}));

        for recipient in &recipients {
            if channels.in_app {
                report.attempted += 1;
                match self
                    .store
                    .insert(recipient.id, event.event_type(), &message, &payload)
                    .await
                {
                    Ok(_) => {
                        report.delivered += 1;
                        // Alerts are pushed once to the shared feed below;
                        // everything else goes to the recipient's own topic.
                        if !matches!(event, NotificationEvent::AlertRaised { .. }) {
                            self.hub.publish_to_user(
                                recipient.id,
                                ServerMessage::Notification {
                                    event_type: event.event_type().to_string(),
                                    data: payload.clone(),
                                },
                            );
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            "In-app delivery to {} failed: {:?}",
                            recipient.id,
                            e
                        );
                        report.failed += 1;
                    }
                }
            }

            if channels.email {
                // A missing transport or an opted-out recipient is a skip,
                // not a failure.
                let Some(mailer) = &self.mailer else { continue };
                if !recipient.notification_enabled {
                    continue;
                }

                report.attempted += 1;
                let (subject, body) = templates::render_email(&event, recipient.role);
                match mailer.send(&recipient.email, &subject, &body).await {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        tracing::warn!(
                            "Email delivery to {} failed: {:?}",
                            recipient.email,
                            e
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        if channels.in_app {
            if let NotificationEvent::AlertRaised { .. } = &event {
                self.hub.publish(
                    topics::TOPIC_ALERTS,
                    ServerMessage::Notification {
                        event_type: event.event_type().to_string(),
                        data: payload,
                    },
                );
            }
        }

        tracing::info!(
            event_type = event.event_type(),
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "Notification dispatch finished"
        );

        report
    }

    /// Recipient set per event kind: alert-derived and submission events go
    /// to the operator roles, everything else to its subject user.
    async fn resolve_recipients(&self, event: &NotificationEvent) -> Result<Vec<User>> {
        match event {
            NotificationEvent::AlertRaised { .. } | NotificationEvent::ScheduleSubmitted { .. } => {
                self.users
                    .find_by_roles(&[Role::Professor, Role::Admin])
                    .await
            }
            NotificationEvent::ScheduleApproved { student_id, .. }
            | NotificationEvent::ScheduleRejected { student_id, .. } => {
                Ok(self.users.find_by_id(*student_id).await?.into_iter().collect())
            }
            NotificationEvent::DirectMessage { recipient_id, .. } => {
                Ok(self.users.find_by_id(*recipient_id).await?.into_iter().collect())
            }
            NotificationEvent::TaskAssigned { assignee_id, .. }
            | NotificationEvent::TaskOverdue { assignee_id, .. } => {
                Ok(self.users.find_by_id(*assignee_id).await?.into_iter().collect())
            }
        }
    }

    /// Alert-derived events take their channels from the alert's
    /// configuration row; the rest have fixed channel sets.
    async fn resolve_channels(&self, event: &NotificationEvent) -> Channels {
        match event {
            NotificationEvent::AlertRaised { alert } => {
                match self.configs.find(alert.alert_type).await {
                    Ok(Some(config)) => Channels {
                        in_app: config.channel_in_app,
                        email: config.channel_email,
                    },
                    Ok(None) => Channels {
                        in_app: true,
                        email: false,
                    },
                    Err(e) => {
                        tracing::warn!(
                            "Failed to load channels for {}: {:?}",
                            alert.alert_type,
                            e
                        );
                        Channels {
                            in_app: true,
                            email: false,
                        }
                    }
                }
            }
            NotificationEvent::ScheduleApproved { .. }
            | NotificationEvent::ScheduleRejected { .. }
            | NotificationEvent::TaskOverdue { .. } => Channels {
                in_app: true,
                email: true,
            },
            NotificationEvent::ScheduleSubmitted { .. }
            | NotificationEvent::DirectMessage { .. }
            | NotificationEvent::TaskAssigned { .. } => Channels {
                in_app: true,
                email: false,
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex as StdMutex;

    use axum::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::alert::{AlertConfig, AlertType};
    use crate::notification::notification_models::Notification;

    pub struct EmptyDirectory;

    #[async_trait]
    impl UserDirectory for EmptyDirectory {
        async fn find_by_id(&self, _id: Uuid) -> Result<Option<User>> {
            Ok(None)
        }

        async fn find_by_roles(&self, _roles: &[Role]) -> Result<Vec<User>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    pub struct MemoryNotificationStore {
        pub rows: StdMutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationStore for MemoryNotificationStore {
        async fn insert(
            &self,
            user_id: Uuid,
            event_type: &str,
            message: &str,
            data: &serde_json::Value,
        ) -> Result<Notification> {
            let notification = Notification {
                id: Uuid::new_v4(),
                user_id,
                event_type: event_type.to_string(),
                message: message.to_string(),
                data: data.clone(),
                is_read: false,
                created_at: Utc::now(),
            };
            self.rows.lock().unwrap().push(notification.clone());
            Ok(notification)
        }
    }

    pub struct EmptyConfigStore;

    #[async_trait]
    impl AlertConfigStore for EmptyConfigStore {
        async fn load_all(&self) -> Result<Vec<AlertConfig>> {
            Ok(Vec::new())
        }

        async fn find(&self, _alert_type: AlertType) -> Result<Option<AlertConfig>> {
            Ok(None)
        }
    }

    /// A dispatcher over empty collaborators, for engine tests that only
    /// care about scan behavior.
    pub fn noop_dispatcher() -> Arc<NotificationDispatcher> {
        Arc::new(NotificationDispatcher::new(
            Arc::new(EmptyDirectory),
            Arc::new(MemoryNotificationStore::default()),
            Arc::new(EmptyConfigStore),
            HubHandle::spawn(),
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use axum::async_trait;
    use chrono::Utc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::test_support::{EmptyConfigStore, MemoryNotificationStore};
    use super::*;
    use crate::alert::{Alert, AlertConfig, AlertSeverity, AlertType};
    use crate::notification::email::DeliveryError;

    struct MemoryDirectory {
        users: Vec<User>,
    }

    #[async_trait]
    impl UserDirectory for MemoryDirectory {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
            Ok(self.users.iter().find(|u| u.id == id).cloned())
        }

        async fn find_by_roles(&self, roles: &[Role]) -> Result<Vec<User>> {
            Ok(self
                .users
                .iter()
                .filter(|u| roles.contains(&u.role))
                .cloned()
                .collect())
        }
    }

    struct SingleConfigStore {
        config: AlertConfig,
    }

    #[async_trait]
    impl AlertConfigStore for SingleConfigStore {
        async fn load_all(&self) -> Result<Vec<AlertConfig>> {
            Ok(vec![self.config.clone()])
        }

        async fn find(&self, alert_type: AlertType) -> Result<Option<AlertConfig>> {
            Ok((self.config.alert_type == alert_type).then(|| self.config.clone()))
        }
    }

    #[derive(Default)]
    struct MockMailer {
        sent: StdMutex<Vec<String>>,
        fail_address: Option<String>,
    }

    #[async_trait]
    impl EmailTransport for MockMailer {
        async fn send(
            &self,
            to_address: &str,
            _subject: &str,
            _html_body: &str,
        ) -> std::result::Result<(), DeliveryError> {
            if self.fail_address.as_deref() == Some(to_address) {
                return Err(DeliveryError::Build("smtp down".to_string()));
            }
            self.sent.lock().unwrap().push(to_address.to_string());
            Ok(())
        }
    }

    fn user(role: Role, email: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: email.split('@').next().unwrap().to_string(),
            email: email.to_string(),
            role,
            notification_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn alert() -> Alert {
        let now = Utc::now();
        Alert {
            id: Uuid::new_v4(),
            alert_type: AlertType::TaskOverdue,
            severity: AlertSeverity::High,
            title: "Task overdue: Prepare poster".to_string(),
            message: "Task \"Prepare poster\" is 3 day(s) overdue".to_string(),
            subject_user_id: None,
            subject_project_id: None,
            subject_task_id: Some(Uuid::new_v4()),
            subject_key: "task:x".to_string(),
            data: serde_json::json!({}),
            is_resolved: false,
            resolution_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn overdue_config(in_app: bool, email: bool) -> AlertConfig {
        AlertConfig {
            alert_type: AlertType::TaskOverdue,
            is_enabled: true,
            thresholds: Default::default(),
            channel_in_app: in_app,
            channel_email: email,
            max_alerts_per_day: 10,
            cooldown_hours: 24,
            updated_at: Utc::now(),
        }
    }

    async fn recv(
        rx: &mut mpsc::UnboundedReceiver<ServerMessage>,
    ) -> Option<ServerMessage> {
        tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn alert_fans_out_to_operators_with_one_failure_counted() {
        let professor_a = user(Role::Professor, "ada@lab.edu");
        let professor_b = user(Role::Professor, "grace@lab.edu");
        let student = user(Role::Student, "sam@lab.edu");

        let store = Arc::new(MemoryNotificationStore::default());
        let mailer = Arc::new(MockMailer {
            sent: StdMutex::new(Vec::new()),
            fail_address: Some("grace@lab.edu".to_string()),
        });
        let hub = HubHandle::spawn();

        // A professor watching the live alerts feed.
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.register(Uuid::new_v4(), professor_a.id, Role::Professor, tx);
        assert!(matches!(
            recv(&mut rx).await,
            Some(ServerMessage::Authenticated { .. })
        ));

        let dispatcher = NotificationDispatcher::new(
            Arc::new(MemoryDirectory {
                users: vec![professor_a.clone(), professor_b.clone(), student],
            }),
            store.clone(),
            Arc::new(SingleConfigStore {
                config: overdue_config(true, true),
            }),
            hub,
            Some(mailer.clone()),
        );

        let report = dispatcher
            .dispatch(NotificationEvent::AlertRaised { alert: alert() })
            .await;

        // Two operators, two channels each; one email bounced.
        assert_eq!(report.attempted, 4);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, 1);

        let rows = store.rows.lock().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.event_type == "alert_raised"));
        drop(rows);

        assert_eq!(mailer.sent.lock().unwrap().as_slice(), ["ada@lab.edu"]);

        // The connected professor saw the live push on the alerts feed.
        assert!(matches!(
            recv(&mut rx).await,
            Some(ServerMessage::Notification { ref event_type, .. }) if event_type == "alert_raised"
        ));
    }

    #[tokio::test]
    async fn schedule_decision_targets_the_student_alone() {
        let student = user(Role::Student, "sam@lab.edu");
        let professor = user(Role::Professor, "ada@lab.edu");

        let store = Arc::new(MemoryNotificationStore::default());
        let mailer = Arc::new(MockMailer::default());
        let hub = HubHandle::spawn();

        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.register(Uuid::new_v4(), student.id, Role::Student, tx);
        assert!(matches!(
            recv(&mut rx).await,
            Some(ServerMessage::Authenticated { .. })
        ));

        let dispatcher = NotificationDispatcher::new(
            Arc::new(MemoryDirectory {
                users: vec![student.clone(), professor],
            }),
            store.clone(),
            Arc::new(EmptyConfigStore),
            hub,
            Some(mailer.clone()),
        );

        let report = dispatcher
            .dispatch(NotificationEvent::ScheduleApproved {
                schedule_id: Uuid::new_v4(),
                student_id: student.id,
                week_start_date: "2026-03-02".parse().unwrap(),
            })
            .await;

        assert_eq!(report.failed, 0);
        let rows = store.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, student.id);
        drop(rows);

        assert_eq!(mailer.sent.lock().unwrap().as_slice(), ["sam@lab.edu"]);
        assert!(matches!(
            recv(&mut rx).await,
            Some(ServerMessage::Notification { ref event_type, .. }) if event_type == "schedule_approved"
        ));
    }

    #[tokio::test]
    async fn missing_transport_skips_email_without_failing() {
        let student = user(Role::Student, "sam@lab.edu");
        let store = Arc::new(MemoryNotificationStore::default());

        let dispatcher = NotificationDispatcher::new(
            Arc::new(MemoryDirectory {
                users: vec![student.clone()],
            }),
            store.clone(),
            Arc::new(EmptyConfigStore),
            HubHandle::spawn(),
            None,
        );

        let report = dispatcher
            .dispatch(NotificationEvent::ScheduleRejected {
                schedule_id: Uuid::new_v4(),
                student_id: student.id,
                week_start_date: "2026-03-02".parse().unwrap(),
                reason: None,
            })
            .await;

        // Only the in-app write was attempted.
        assert_eq!(report.attempted, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn opted_out_recipients_get_no_email() {
        let mut student = user(Role::Student, "sam@lab.edu");
        student.notification_enabled = false;

        let mailer = Arc::new(MockMailer::default());
        let dispatcher = NotificationDispatcher::new(
            Arc::new(MemoryDirectory {
                users: vec![student.clone()],
            }),
            Arc::new(MemoryNotificationStore::default()),
            Arc::new(EmptyConfigStore),
            HubHandle::spawn(),
            Some(mailer.clone()),
        );

        dispatcher
            .dispatch(NotificationEvent::TaskOverdue {
                task_id: Uuid::new_v4(),
                assignee_id: student.id,
                title: "Clean bench".to_string(),
                days_overdue: 2,
            })
            .await;

        assert!(mailer.sent.lock().unwrap().is_empty());
    }
}
