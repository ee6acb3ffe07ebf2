use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{
    AttendanceStatus, Belt, ClassType, Decision, GearSize, GoalStatus, ItemKind, LogStatus,
    NotificationKind, OrderStatus, RankingKind, ReviewStatus, Role, UserStatus,
};

/// Photo assigned to accounts that never uploaded one.
pub const DEFAULT_PHOTO: &str = "photos/default_profile.png";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<NaiveDate>,
    pub role: Role,
    pub status: UserStatus,
    /// Always `status == Active`; kept on the wire for clients.
    pub is_active: bool,
    pub photo: String,
    pub height_cm: Option<i32>,
    pub weight_kg: Option<i32>,
    pub kimono_size: Option<GearSize>,
    pub belt_size: Option<GearSize>,
    pub whatsapp: Option<String>,
    /// Guardian account for dependents (children registered by a parent)
    pub responsible_id: Option<Uuid>,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn has_custom_photo(&self) -> bool {
        !self.photo.is_empty() && self.photo != DEFAULT_PHOTO
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingClass {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub instructor_id: Option<Uuid>,
    #[serde(default)]
    pub instructor_name: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub class_id: Uuid,
    pub class_name: String,
    pub student_id: Uuid,
    pub student_name: String,
    pub status: ReviewStatus,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRequest {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub class_id: Uuid,
    pub class_name: String,
    pub attendance_date: NaiveDate,
    pub class_type: ClassType,
    pub reason: String,
    pub status: AttendanceStatus,
    pub rejection_reason: String,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<Uuid>,
    pub notified: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub approved: u32,
    pub pending: u32,
    pub rejected: u32,
    pub cancelled: u32,
}

impl StatusCounts {
    pub fn record(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Approved => self.approved += 1,
            AttendanceStatus::Pending => self.pending += 1,
            AttendanceStatus::Rejected => self.rejected += 1,
            AttendanceStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.approved + self.pending + self.rejected + self.cancelled
    }
}

/// One weekday/class-type bucket of an attendance summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceCell {
    pub weekday: Weekday,
    pub class_type: ClassType,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub cells: Vec<AttendanceCell>,
    pub by_weekday: Vec<(Weekday, StatusCounts)>,
    pub by_class_type: Vec<(ClassType, StatusCounts)>,
    pub totals: StatusCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graduation {
    pub id: Uuid,
    pub student_id: Uuid,
    pub belt: Belt,
    pub degree: i32,
    pub graduation_date: NaiveDate,
    pub notified: bool,
}

impl Graduation {
    pub fn label(&self) -> String {
        format!("{} belt, degree {}", self.belt.display_name(), self.degree)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraduationDateChange {
    pub id: Uuid,
    pub graduation_id: Uuid,
    pub student_id: Uuid,
    pub new_date: NaiveDate,
    pub reason: String,
    pub status: ReviewStatus,
    pub rejection_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonPlan {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub instructor_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub class_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<LessonPlanItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonPlanItem {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub topic: String,
    pub lesson_date: NaiveDate,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ranking {
    pub id: Uuid,
    pub title: String,
    pub kind: RankingKind,
    pub class_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub positions: Vec<RankingPosition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingPosition {
    pub ranking_id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub position: i32,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub target_classes: i32,
    pub minimum_classes: i32,
    pub minimum_frequency_pct: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalProgress {
    pub student_id: Uuid,
    pub student_name: String,
    pub attended: i32,
    pub frequency_pct: i32,
    pub status: GoalStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalReport {
    pub goal: Goal,
    pub students: Vec<GoalProgress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub kind: ItemKind,
    /// Unit price in cents
    pub price_cents: Option<i64>,
    pub stock: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub item_id: Uuid,
    pub item_name: String,
    pub quantity: i32,
    pub status: OrderStatus,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub final_value_cents: Option<i64>,
}

/// Outcome of the pending-order expiration sweep for a single order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiredOrder {
    pub order_id: Uuid,
    pub item_name: String,
    pub quantity_returned: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    /// `None` for entries written by the system itself
    pub user_name: Option<String>,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub status: LogStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub text: String,
    /// Client-side destination the notification links to
    pub target: String,
    pub kind: NotificationKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationSummary {
    pub notifications: Vec<Notification>,
    pub count: u32,
    pub has_pending_tasks: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub pending_attendance: i64,
    pub active_students: i64,
    pub pending_enrollments: i64,
    pub pending_orders: i64,
    pub pending_users: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountOverview {
    pub user: User,
    /// Guardian the session started as, when acting for a dependent
    pub original_user_id: Option<Uuid>,
    pub dependents: Vec<User>,
}

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub whatsapp: String,
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
    #[serde(default)]
    pub has_responsible: bool,
    #[serde(default)]
    pub responsible_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub session_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub whatsapp: String,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub belt: Option<Belt>,
    #[serde(default)]
    pub degree: Option<i32>,
    #[serde(default)]
    pub height_cm: Option<i32>,
    #[serde(default)]
    pub weight_kg: Option<i32>,
    #[serde(default)]
    pub kimono_size: Option<GearSize>,
    #[serde(default)]
    pub belt_size: Option<GearSize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStatusRequest {
    pub status: UserStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Defaults to the instructor creating the class
    #[serde(default)]
    pub instructor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAttendanceRequest {
    pub class_id: Uuid,
    pub dates: Vec<NaiveDate>,
    #[serde(default)]
    pub class_type: ClassType,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAttendanceResponse {
    pub created: Vec<AttendanceRequest>,
    /// Dates that already had a request for the same class and type
    pub skipped: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraduationRequest {
    /// Required for staff; ignored when a student records their own
    #[serde(default)]
    pub student_id: Option<Uuid>,
    pub belt: Belt,
    pub degree: i32,
    pub graduation_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateChangeRequest {
    pub new_date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonPlanRequest {
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub class_id: Option<Uuid>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonPlanItemRequest {
    pub topic: String,
    pub lesson_date: NaiveDate,
    #[serde(default = "default_position")]
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingRequest {
    pub title: String,
    pub kind: RankingKind,
    #[serde(default)]
    pub class_id: Option<Uuid>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingPositionRequest {
    pub student_id: Uuid,
    pub position: i32,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalRequest {
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub target_classes: i32,
    pub minimum_classes: i32,
    pub minimum_frequency_pct: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRequest {
    pub name: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub stock: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub item_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTransitionRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_position() -> i32 {
    1
}

fn default_quantity() -> i32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "ana@example.com".to_string(),
            email: "ana@example.com".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Souza".to_string(),
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

    #[test]
    fn test_full_name_and_photo() {
        let mut user = sample_user();
        assert_eq!(user.full_name(), "Ana Souza");
        assert!(!user.has_custom_photo());
        user.photo = "photos/abc_1.png".to_string();
        assert!(user.has_custom_photo());
    }

    #[test]
    fn test_status_counts() {
        let mut counts = StatusCounts::default();
        counts.record(AttendanceStatus::Approved);
        counts.record(AttendanceStatus::Approved);
        counts.record(AttendanceStatus::Cancelled);
        assert_eq!(counts.approved, 2);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_place_order_defaults_to_one() {
        let id = Uuid::new_v4();
        let req: PlaceOrderRequest =
            serde_json::from_str(&format!(r#"{{"item_id":"{}"}}"#, id)).unwrap();
        assert_eq!(req.quantity, 1);
    }

    #[test]
    fn test_graduation_label() {
        let g = Graduation {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            belt: Belt::Purple,
            degree: 2,
            graduation_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            notified: false,
        };
        assert_eq!(g.label(), "Purple belt, degree 2");
    }
}
