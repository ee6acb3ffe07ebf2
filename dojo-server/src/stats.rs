use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Weekday};
use uuid::Uuid;

use dojo_types::{
    AttendanceCell, AttendanceRequest, AttendanceSummary, ClassType, Goal, GoalProgress,
    GoalReport, GoalStatus, StatusCounts, User,
};

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Aggregate attendance requests by weekday and class type.
///
/// Requests outside `[from, to]` are ignored. Every weekday/class-type
/// pair is present in `cells`, Monday first, so clients can render a
/// fixed grid.
pub fn attendance_summary(
    requests: &[AttendanceRequest],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> AttendanceSummary {
    let mut grid: HashMap<(Weekday, ClassType), StatusCounts> = HashMap::new();
    let mut totals = StatusCounts::default();

    let in_range = requests.iter().filter(|r| {
        from.map_or(true, |f| r.attendance_date >= f) && to.map_or(true, |t| r.attendance_date <= t)
    });
    for request in in_range {
        grid.entry((request.attendance_date.weekday(), request.class_type))
            .or_default()
            .record(request.status);
        totals.record(request.status);
    }

    let mut cells = Vec::with_capacity(WEEK.len() * ClassType::ALL.len());
    let mut by_weekday = Vec::with_capacity(WEEK.len());
    for weekday in WEEK {
        let mut day_counts = StatusCounts::default();
        for class_type in ClassType::ALL {
            let counts = grid.get(&(weekday, *class_type)).cloned().unwrap_or_default();
            merge(&mut day_counts, &counts);
            cells.push(AttendanceCell {
                weekday,
                class_type: *class_type,
                counts,
            });
        }
        by_weekday.push((weekday, day_counts));
    }

    let by_class_type = ClassType::ALL
        .iter()
        .map(|class_type| {
            let mut counts = StatusCounts::default();
            for weekday in WEEK {
                if let Some(c) = grid.get(&(weekday, *class_type)) {
                    merge(&mut counts, c);
                }
            }
            (*class_type, counts)
        })
        .collect();

    AttendanceSummary {
        from,
        to,
        cells,
        by_weekday,
        by_class_type,
        totals,
    }
}

fn merge(into: &mut StatusCounts, other: &StatusCounts) {
    into.approved += other.approved;
    into.pending += other.pending;
    into.rejected += other.rejected;
    into.cancelled += other.cancelled;
}

/// Frequency against the goal target, capped at 100
pub fn frequency_pct(attended: i32, target: i32) -> i32 {
    if target <= 0 {
        return 0;
    }
    (attended.saturating_mul(100) / target).min(100)
}

pub fn goal_status(goal: &Goal, attended: i32) -> GoalStatus {
    if attended >= goal.target_classes {
        GoalStatus::GoalReached
    } else if attended >= goal.minimum_classes
        && frequency_pct(attended, goal.target_classes) >= goal.minimum_frequency_pct
    {
        GoalStatus::OnTrack
    } else {
        GoalStatus::BelowMinimum
    }
}

/// Progress of every student towards a goal; `attended` maps student ids
/// to approved attendance days inside the goal window.
pub fn goal_report(goal: Goal, students: &[User], attended: &HashMap<Uuid, i64>) -> GoalReport {
    let students = students
        .iter()
        .map(|student| {
            let count = attended
                .get(&student.id)
                .copied()
                .map(|c| i32::try_from(c).unwrap_or(i32::MAX))
                .unwrap_or(0);
            GoalProgress {
                student_id: student.id,
                student_name: student.full_name(),
                attended: count,
                frequency_pct: frequency_pct(count, goal.target_classes),
                status: goal_status(&goal, count),
            }
        })
        .collect();

    GoalReport { goal, students }
}

/// Rank students by score, highest first.
///
/// Equal scores share a position (dense ranking) and are listed by name.
pub fn dense_rank(mut entries: Vec<(Uuid, String, i64)>) -> Vec<(Uuid, i32, f64)> {
    entries.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.1.cmp(&b.1)));

    let mut ranked = Vec::with_capacity(entries.len());
    let mut position = 0;
    let mut last_score = None;
    for (student_id, _, score) in entries {
        if last_score != Some(score) {
            position += 1;
            last_score = Some(score);
        }
        ranked.push((student_id, position, score as f64));
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dojo_types::{AttendanceStatus, Role, UserStatus, DEFAULT_PHOTO};

    fn request(date: NaiveDate, class_type: ClassType, status: AttendanceStatus) -> AttendanceRequest {
        AttendanceRequest {
            id: Uuid::new_v4(),
            student_id: Uuid::nil(),
            student_name: String::new(),
            class_id: Uuid::nil(),
            class_name: String::new(),
            attendance_date: date,
            class_type,
            reason: String::new(),
            status,
            rejection_reason: String::new(),
            processed_at: None,
            processed_by: None,
            notified: false,
        }
    }

    fn student(first: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: format!("{}@x.io", first),
            email: format!("{}@x.io", first),
            first_name: first.to_string(),
            last_name: String::new(),
            birthday: None,
            role: Role::Student,
            status: UserStatus::Active,
            is_active: true,
            photo: DEFAULT_PHOTO.to_string(),
            height_cm: None,
            weight_kg: None,
            kimono_size: None,
            belt_size: None,
            whatsapp: None,
            responsible_id: None,
            date_joined: Utc::now(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        // March 2025: the 3rd is a Monday
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_summary_groups_by_weekday_and_type() {
        let requests = vec![
            request(day(3), ClassType::Gi, AttendanceStatus::Approved),
            request(day(10), ClassType::Gi, AttendanceStatus::Pending),
            request(day(3), ClassType::NoGi, AttendanceStatus::Rejected),
            request(day(5), ClassType::Both, AttendanceStatus::Cancelled),
            request(day(28), ClassType::Gi, AttendanceStatus::Approved),
        ];
        let summary = attendance_summary(&requests, Some(day(1)), Some(day(20)));

        assert_eq!(summary.cells.len(), 21);
        let monday_gi = summary
            .cells
            .iter()
            .find(|c| c.weekday == Weekday::Mon && c.class_type == ClassType::Gi)
            .unwrap();
        assert_eq!(monday_gi.counts.approved, 1);
        assert_eq!(monday_gi.counts.pending, 1);

        assert_eq!(summary.by_weekday[0], (Weekday::Mon, StatusCounts { approved: 1, pending: 1, rejected: 1, cancelled: 0 }));
        assert_eq!(summary.by_weekday[2].1.cancelled, 1);
        assert_eq!(summary.totals.total(), 4);

        let gi = summary.by_class_type.iter().find(|(t, _)| *t == ClassType::Gi).unwrap();
        assert_eq!(gi.1.total(), 2);
    }

    #[test]
    fn test_frequency_is_capped() {
        assert_eq!(frequency_pct(6, 12), 50);
        assert_eq!(frequency_pct(20, 12), 100);
        assert_eq!(frequency_pct(3, 0), 0);
    }

    #[test]
    fn test_goal_statuses() {
        let goal = Goal {
            id: Uuid::new_v4(),
            instructor_id: Uuid::new_v4(),
            title: "Q1".to_string(),
            start_date: day(1),
            end_date: day(31),
            target_classes: 10,
            minimum_classes: 5,
            minimum_frequency_pct: 60,
        };
        assert_eq!(goal_status(&goal, 10), GoalStatus::GoalReached);
        assert_eq!(goal_status(&goal, 6), GoalStatus::OnTrack);
        assert_eq!(goal_status(&goal, 5), GoalStatus::BelowMinimum);

        let ana = student("Ana");
        let bia = student("Bia");
        let attended = HashMap::from([(ana.id, 12)]);
        let report = goal_report(goal, &[ana, bia], &attended);
        assert_eq!(report.students[0].frequency_pct, 100);
        assert_eq!(report.students[1].attended, 0);
        assert_eq!(report.students[1].status, GoalStatus::BelowMinimum);
    }

    #[test]
    fn test_dense_rank_ties_by_name() {
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let ranked = dense_rank(vec![
            (a, "Caio".to_string(), 5),
            (b, "Ana".to_string(), 8),
            (c, "Bia".to_string(), 5),
            (d, "Duda".to_string(), 1),
        ]);
        assert_eq!(
            ranked,
            vec![(b, 1, 8.0), (c, 2, 5.0), (a, 2, 5.0), (d, 3, 1.0)]
        );
    }
}
