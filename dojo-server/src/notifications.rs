use anyhow::Result;

use dojo_types::{
    AttendanceStatus, Notification, NotificationKind, NotificationSummary, Role, User, UserStatus,
};

use crate::db::repositories::{AttendanceRepository, GraduationRepository, UserRepository};
use crate::db::Database;

/// Counts the notification rules depend on
#[derive(Debug, Clone, Default)]
pub struct NotificationFacts {
    pub unnotified_approved_attendance: i64,
    pub unnotified_graduations: i64,
    pub has_graduation: bool,
    pub pending_attendance: i64,
    pub pending_users: i64,
}

impl NotificationFacts {
    pub fn load(db: &Database, user: &User) -> Result<Self> {
        let mut facts = NotificationFacts::default();

        if user.is_student() {
            let attendance = AttendanceRepository::new(db.pool.clone());
            let graduations = GraduationRepository::new(db.pool.clone());
            facts.unnotified_approved_attendance = attendance.count_unnotified_approved(&user.id)?;
            facts.unnotified_graduations = graduations.count_unnotified(&user.id)?;
            facts.has_graduation = graduations.current(&user.id)?.is_some();
        }

        if user.is_staff() {
            facts.pending_attendance = AttendanceRepository::new(db.pool.clone())
                .count_with_status(AttendanceStatus::Pending)?;
            facts.pending_users = UserRepository::new(db.pool.clone())
                .count(None, Some(UserStatus::Pending))?;
        }

        Ok(facts)
    }
}

fn note(title: &str, text: String, target: &str, kind: NotificationKind) -> Notification {
    Notification {
        title: title.to_string(),
        text,
        target: target.to_string(),
        kind,
    }
}

/// Build the notification list for an active user
pub fn build(user: &User, facts: &NotificationFacts) -> NotificationSummary {
    if user.status != UserStatus::Active {
        return NotificationSummary::default();
    }

    let mut notifications = Vec::new();
    let mut count: u32 = 0;
    let mut bump = |n: i64| count += u32::try_from(n).unwrap_or(u32::MAX);

    if user.role == Role::Student {
        if facts.unnotified_approved_attendance > 0 {
            bump(facts.unnotified_approved_attendance);
            notifications.push(note(
                "Attendance approved",
                format!("{} attendance request(s) approved.", facts.unnotified_approved_attendance),
                "attendance",
                NotificationKind::Info,
            ));
        }
        if facts.unnotified_graduations > 0 {
            bump(facts.unnotified_graduations);
            notifications.push(note(
                "New graduation",
                "Congratulations! You have a new graduation.".to_string(),
                "graduations",
                NotificationKind::Success,
            ));
        }
    }

    if user.is_staff() {
        if facts.pending_attendance > 0 {
            bump(facts.pending_attendance);
            notifications.push(note(
                "Attendance requests",
                format!("{} request(s) pending.", facts.pending_attendance),
                "attendance/pending",
                NotificationKind::Warning,
            ));
        }
        if facts.pending_users > 0 {
            bump(facts.pending_users);
            notifications.push(note(
                "New users",
                format!("{} user(s) awaiting approval.", facts.pending_users),
                "users?status=PENDING",
                NotificationKind::Warning,
            ));
        }
    }

    let profile_fields = [
        ("First name", user.first_name.trim().is_empty()),
        ("Last name", user.last_name.trim().is_empty()),
        ("E-mail", user.email.trim().is_empty()),
        ("WhatsApp", user.whatsapp.as_deref().map_or(true, |w| w.trim().is_empty())),
        ("Birthday", user.birthday.is_none()),
        ("Profile photo", user.photo.trim().is_empty()),
    ];
    for (label, missing) in profile_fields {
        if missing {
            bump(1);
            notifications.push(note(
                "Profile data",
                format!("The field \"{}\" is required.", label),
                "profile/edit",
                NotificationKind::Danger,
            ));
        }
    }

    if user.role == Role::Student {
        if !facts.has_graduation {
            bump(1);
            notifications.push(note(
                "Profile data",
                "Tell us your belt and degree.".to_string(),
                "profile/edit",
                NotificationKind::Danger,
            ));
        }

        let kimono_fields = [
            ("your height", user.height_cm.is_none()),
            ("your weight", user.weight_kg.is_none()),
            ("your kimono size", user.kimono_size.is_none()),
            ("your belt size", user.belt_size.is_none()),
        ];
        for (label, missing) in kimono_fields {
            if missing {
                bump(1);
                notifications.push(note(
                    "My kimono",
                    format!("Please provide {}.", label),
                    "profile",
                    NotificationKind::Danger,
                ));
            }
        }
    }

    NotificationSummary {
        has_pending_tasks: !notifications.is_empty(),
        notifications,
        count,
    }
}

/// Load the facts for `user` and build their notifications
pub fn for_user(db: &Database, user: &User) -> Result<NotificationSummary> {
    let facts = NotificationFacts::load(db, user)?;
    Ok(build(user, &facts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use dojo_types::{GearSize, DEFAULT_PHOTO};
    use uuid::Uuid;

    fn complete_student() -> User {
        User {
            id: Uuid::new_v4(),
            username: "ana@x.io".to_string(),
            email: "ana@x.io".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Lima".to_string(),
            birthday: NaiveDate::from_ymd_opt(2000, 1, 1),
            role: Role::Student,
            status: UserStatus::Active,
            is_active: true,
            photo: DEFAULT_PHOTO.to_string(),
            height_cm: Some(170),
            weight_kg: Some(70),
            kimono_size: Some(GearSize::A2),
            belt_size: Some(GearSize::A2),
            whatsapp: Some("(11) 98765-4321".to_string()),
            responsible_id: None,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn test_complete_student_without_events_has_nothing() {
        let facts = NotificationFacts { has_graduation: true, ..Default::default() };
        let summary = build(&complete_student(), &facts);
        assert!(summary.notifications.is_empty());
        assert!(!summary.has_pending_tasks);
        assert_eq!(summary.count, 0);
    }

    #[test]
    fn test_student_events_and_missing_data() {
        let mut user = complete_student();
        user.whatsapp = None;
        user.weight_kg = None;
        let facts = NotificationFacts {
            unnotified_approved_attendance: 3,
            unnotified_graduations: 1,
            has_graduation: false,
            ..Default::default()
        };
        let summary = build(&user, &facts);

        // 3 attendances + 1 graduation + whatsapp + belt/degree + weight
        assert_eq!(summary.count, 7);
        assert_eq!(summary.notifications.len(), 5);
        assert_eq!(summary.notifications[0].text, "3 attendance request(s) approved.");
        assert!(summary
            .notifications
            .iter()
            .any(|n| n.text == "The field \"WhatsApp\" is required."));
    }

    #[test]
    fn test_staff_sees_pending_work_only() {
        let mut user = complete_student();
        user.role = Role::Instructor;
        user.height_cm = None;
        let facts = NotificationFacts {
            unnotified_approved_attendance: 9,
            pending_attendance: 2,
            pending_users: 1,
            ..Default::default()
        };
        let summary = build(&user, &facts);
        assert_eq!(summary.count, 3);
        assert!(summary.notifications.iter().all(|n| n.kind == NotificationKind::Warning));
    }

    #[test]
    fn test_inactive_user_gets_nothing() {
        let mut user = complete_student();
        user.status = UserStatus::Inactive;
        let facts = NotificationFacts { pending_users: 4, ..Default::default() };
        assert_eq!(build(&user, &facts).count, 0);
    }
}
