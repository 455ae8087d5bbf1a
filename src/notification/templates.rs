use super::notification_models::NotificationEvent;
use crate::user::Role;

/// Short text for the durable in-app record and the live push.
pub fn in_app_message(event: &NotificationEvent) -> String {
    match event {
        NotificationEvent::AlertRaised { alert } => alert.message.clone(),
        NotificationEvent::ScheduleSubmitted {
            week_start_date, ..
        } => format!("A schedule for the week of {week_start_date} was submitted for review"),
        NotificationEvent::ScheduleApproved {
            week_start_date, ..
        } => format!("Your schedule for the week of {week_start_date} was approved"),
        NotificationEvent::ScheduleRejected {
            week_start_date,
            reason,
            ..
        } => match reason {
            Some(reason) => format!(
                "Your schedule for the week of {week_start_date} was rejected: {reason}"
            ),
            None => format!("Your schedule for the week of {week_start_date} was rejected"),
        },
        NotificationEvent::DirectMessage {
            sender_name,
            preview,
            ..
        } => format!("New message from {sender_name}: {preview}"),
        NotificationEvent::TaskAssigned { title, .. } => {
            format!("You have been assigned to \"{title}\"")
        }
        NotificationEvent::TaskOverdue {
            title,
            days_overdue,
            ..
        } => format!("Your task \"{title}\" is {days_overdue} day(s) overdue"),
    }
}

/// Render the email for an event, phrased for the recipient's role.
/// Returns `(subject, html_body)`.
pub fn render_email(event: &NotificationEvent, recipient_role: Role) -> (String, String) {
    let audience = match recipient_role {
        Role::Student => "your lab work",
        Role::Professor | Role::Admin => "the lab",
    };

    match event {
        NotificationEvent::AlertRaised { alert } => (
            format!("[Lab Manager] {} alert: {}", alert.severity, alert.title),
            format!(
                "<h3>{}</h3>\
                 <p>{}</p>\
                 <p>Severity: <strong>{}</strong></p>\
                 <p>This alert concerns {audience}. It remains open until an operator resolves it.</p>",
                alert.title, alert.message, alert.severity
            ),
        ),
        NotificationEvent::ScheduleSubmitted {
            student_id,
            week_start_date,
            ..
        } => (
            format!("[Lab Manager] Schedule submitted for week of {week_start_date}"),
            format!(
                "<p>Student {student_id} submitted their weekly schedule \
                 (week of {week_start_date}) for review.</p>"
            ),
        ),
        NotificationEvent::ScheduleApproved {
            week_start_date, ..
        } => (
            format!("[Lab Manager] Schedule approved for week of {week_start_date}"),
            format!(
                "<p>Your weekly schedule for the week of {week_start_date} has been approved.</p>"
            ),
        ),
        NotificationEvent::ScheduleRejected {
            week_start_date,
            reason,
            ..
        } => {
            let reason_html = match reason {
                Some(reason) => format!("<p>Reason: {reason}</p>"),
                None => String::new(),
            };
            (
                format!("[Lab Manager] Schedule rejected for week of {week_start_date}"),
                format!(
                    "<p>Your weekly schedule for the week of {week_start_date} was rejected. \
                     Please revise and resubmit.</p>{reason_html}"
                ),
            )
        }
        NotificationEvent::DirectMessage {
            sender_name,
            preview,
            ..
        } => (
            format!("[Lab Manager] New message from {sender_name}"),
            format!("<p><strong>{sender_name}</strong> wrote:</p><p>{preview}</p>"),
        ),
        NotificationEvent::TaskAssigned { title, .. } => (
            format!("[Lab Manager] Task assigned: {title}"),
            format!("<p>You have been assigned to the task \"{title}\".</p>"),
        ),
        NotificationEvent::TaskOverdue {
            title,
            days_overdue,
            ..
        } => (
            format!("[Lab Manager] Task overdue: {title}"),
            format!(
                "<p>The task \"{title}\" is {days_overdue} day(s) overdue. \
                 Please update its status or talk to your advisor.</p>"
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::alert::{Alert, AlertSeverity, AlertType};

    fn sample_alert() -> Alert {
        let now = Utc::now();
        Alert {
            id: Uuid::new_v4(),
            alert_type: AlertType::TaskOverdue,
            severity: AlertSeverity::High,
            title: "Task overdue: Write thesis chapter".to_string(),
            message: "Task \"Write thesis chapter\" is 3 day(s) overdue".to_string(),
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

    #[test]
    fn alert_email_carries_severity_and_title() {
        let event = NotificationEvent::AlertRaised {
            alert: sample_alert(),
        };
        let (subject, body) = render_email(&event, Role::Professor);
        assert!(subject.contains("high"));
        assert!(subject.contains("Write thesis chapter"));
        assert!(body.contains("3 day(s) overdue"));
    }

    #[test]
    fn rejection_email_includes_the_reason_when_given() {
        let event = NotificationEvent::ScheduleRejected {
            schedule_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            week_start_date: "2026-03-02".parse().unwrap(),
            reason: Some("too few lab hours".to_string()),
        };
        let (_, body) = render_email(&event, Role::Student);
        assert!(body.contains("too few lab hours"));
    }

    #[test]
    fn in_app_message_for_alert_reuses_the_alert_message() {
        let alert = sample_alert();
        let expected = alert.message.clone();
        let event = NotificationEvent::AlertRaised { alert };
        assert_eq!(in_app_message(&event), expected);
    }
}
