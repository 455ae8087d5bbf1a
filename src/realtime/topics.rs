use uuid::Uuid;

use crate::user::Role;

/// Lab-wide alert feed, pushed to operators.
pub const TOPIC_ALERTS: &str = "alerts";

/// Lab-wide aggregate statistics feed.
pub const TOPIC_LAB_STATS: &str = "lab:stats";

/// Every user's personal topic; point-to-point deliveries go here.
pub fn user_topic(user_id: Uuid) -> String {
    format!("user:{user_id}")
}

/// Topics a connection is subscribed to immediately after authenticating.
pub fn default_topics(role: Role, user_id: Uuid) -> Vec<String> {
    match role {
        Role::Student => vec![user_topic(user_id)],
        Role::Professor | Role::Admin => vec![
            user_topic(user_id),
            TOPIC_ALERTS.to_string(),
            TOPIC_LAB_STATS.to_string(),
        ],
    }
}

/// Whether a role may subscribe to a topic. Students only see their own
/// topic; professors additionally get the lab-wide feeds; admins anything.
pub fn is_authorized(role: Role, user_id: Uuid, topic: &str) -> bool {
    match role {
        Role::Admin => true,
        Role::Professor => {
            topic == TOPIC_ALERTS || topic == TOPIC_LAB_STATS || topic == user_topic(user_id)
        }
        Role::Student => topic == user_topic(user_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn students_may_only_follow_their_own_topic() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(is_authorized(Role::Student, me, &user_topic(me)));
        assert!(!is_authorized(Role::Student, me, &user_topic(other)));
        assert!(!is_authorized(Role::Student, me, TOPIC_ALERTS));
        assert!(!is_authorized(Role::Student, me, TOPIC_LAB_STATS));
    }

    #[test]
    fn professors_get_lab_feeds_but_not_other_users() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(is_authorized(Role::Professor, me, TOPIC_ALERTS));
        assert!(is_authorized(Role::Professor, me, TOPIC_LAB_STATS));
        assert!(is_authorized(Role::Professor, me, &user_topic(me)));
        assert!(!is_authorized(Role::Professor, me, &user_topic(other)));
    }

    #[test]
    fn admins_may_follow_anything() {
        let me = Uuid::new_v4();
        assert!(is_authorized(Role::Admin, me, &user_topic(Uuid::new_v4())));
        assert!(is_authorized(Role::Admin, me, TOPIC_ALERTS));
    }

    #[test]
    fn default_topics_match_role() {
        let id = Uuid::new_v4();
        assert_eq!(default_topics(Role::Student, id), vec![user_topic(id)]);
        assert_eq!(default_topics(Role::Professor, id).len(), 3);
    }
}
