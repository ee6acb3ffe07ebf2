use serde::{Deserialize, Serialize};

/// Declares a fieldless enum that is stored and transmitted as a fixed
/// upper-case code. Generates `as_str`, `parse` and `ALL`.
macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $code:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $code)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $code ),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $( $code => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

code_enum! {
    pub enum Role {
        Student => "STUDENT",
        Instructor => "INSTRUCTOR",
        Admin => "ADMIN",
    }
}

impl Role {
    /// Instructors and admins share the staff permissions.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Instructor | Role::Admin)
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Student
    }
}

code_enum! {
    pub enum UserStatus {
        Active => "ACTIVE",
        Inactive => "INACTIVE",
        Pending => "PENDING",
    }
}

impl Default for UserStatus {
    fn default() -> Self {
        UserStatus::Pending
    }
}

code_enum! {
    /// Kimono and belt sizes share the same adult scale.
    pub enum GearSize {
        A0 => "A0",
        A1 => "A1",
        A2 => "A2",
        A3 => "A3",
        A4 => "A4",
        A5 => "A5",
        A6 => "A6",
    }
}

code_enum! {
    /// Status of enrollments and graduation date-change requests.
    pub enum ReviewStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
    }
}

code_enum! {
    pub enum AttendanceStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
        Cancelled => "CANCELLED",
    }
}

code_enum! {
    pub enum ClassType {
        Gi => "GI",
        NoGi => "NOGI",
        Both => "BOTH",
    }
}

impl Default for ClassType {
    fn default() -> Self {
        ClassType::Both
    }
}

code_enum! {
    /// Belts in promotion order, kids' belts first.
    pub enum Belt {
        White => "WHITE",
        GrayWhite => "GRAY_WHITE",
        Gray => "GRAY",
        GrayBlack => "GRAY_BLACK",
        YellowWhite => "YELLOW_WHITE",
        Yellow => "YELLOW",
        YellowBlack => "YELLOW_BLACK",
        OrangeWhite => "ORANGE_WHITE",
        Orange => "ORANGE",
        OrangeBlack => "ORANGE_BLACK",
        GreenWhite => "GREEN_WHITE",
        Green => "GREEN",
        GreenBlack => "GREEN_BLACK",
        Blue => "BLUE",
        Purple => "PURPLE",
        Brown => "BROWN",
        Black => "BLACK",
    }
}

impl Belt {
    pub const MAX_DEGREE: i32 = 6;

    pub fn display_name(&self) -> &'static str {
        match self {
            Belt::White => "White",
            Belt::GrayWhite => "Gray and White",
            Belt::Gray => "Gray",
            Belt::GrayBlack => "Gray and Black",
            Belt::YellowWhite => "Yellow and White",
            Belt::Yellow => "Yellow",
            Belt::YellowBlack => "Yellow and Black",
            Belt::OrangeWhite => "Orange and White",
            Belt::Orange => "Orange",
            Belt::OrangeBlack => "Orange and Black",
            Belt::GreenWhite => "Green and White",
            Belt::Green => "Green",
            Belt::GreenBlack => "Green and Black",
            Belt::Blue => "Blue",
            Belt::Purple => "Purple",
            Belt::Brown => "Brown",
            Belt::Black => "Black",
        }
    }

    /// Position in the promotion order (white = 0).
    pub fn rank(&self) -> usize {
        Belt::ALL.iter().position(|b| b == self).unwrap_or(0)
    }
}

code_enum! {
    pub enum RankingKind {
        FewestAbsences => "FEWEST_ABSENCES",
        Championship => "CHAMPIONSHIP",
        StandoutStudent => "STANDOUT_STUDENT",
    }
}

code_enum! {
    pub enum ItemKind {
        Kimono => "KIMONO",
        Belt => "BELT",
        Rashguard => "RASHGUARD",
        Fee => "FEE",
    }
}

code_enum! {
    pub enum OrderStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Cancelled => "CANCELLED",
        Rejected => "REJECTED",
        AwaitingDelivery => "AWAITING_DELIVERY",
        Finished => "FINISHED",
    }
}

impl OrderStatus {
    /// Whether the reserved stock is still held by an order in this status.
    pub fn holds_stock(&self) -> bool {
        !matches!(self, OrderStatus::Cancelled | OrderStatus::Rejected)
    }

    /// Allowed lifecycle moves.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Approved, Rejected)
                | (Approved, AwaitingDelivery)
                | (AwaitingDelivery, Finished)
        )
    }
}

code_enum! {
    pub enum LogStatus {
        Success => "SUCCESS",
        Failure => "FAILURE",
    }
}

code_enum! {
    pub enum GoalStatus {
        GoalReached => "GOAL_REACHED",
        OnTrack => "ON_TRACK",
        BelowMinimum => "BELOW_MINIMUM",
    }
}

code_enum! {
    pub enum NotificationKind {
        Info => "INFO",
        Success => "SUCCESS",
        Warning => "WARNING",
        Danger => "DANGER",
    }
}

/// A staff decision on a reviewable request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn review_status(&self) -> ReviewStatus {
        match self {
            Decision::Approve => ReviewStatus::Approved,
            Decision::Reject => ReviewStatus::Rejected,
        }
    }

    pub fn attendance_status(&self) -> AttendanceStatus {
        match self {
            Decision::Approve => AttendanceStatus::Approved,
            Decision::Reject => AttendanceStatus::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_codes_round_trip_through_parse() {
        for belt in Belt::ALL {
            assert_eq!(Belt::parse(belt.as_str()), Some(*belt));
        }
        assert_eq!(OrderStatus::parse("awaiting_delivery"), Some(OrderStatus::AwaitingDelivery));
        assert_eq!(Role::parse(" admin "), Some(Role::Admin));
        assert_eq!(ClassType::parse("no-gi"), None);
    }

    #[test]
    fn test_serde_uses_codes() {
        let json = serde_json::to_string(&ClassType::NoGi).unwrap();
        assert_eq!(json, "\"NOGI\"");
        let status: OrderStatus = serde_json::from_str("\"AWAITING_DELIVERY\"").unwrap();
        assert_eq!(status, OrderStatus::AwaitingDelivery);
    }

    #[test]
    fn test_belt_rank_follows_promotion_order() {
        assert_eq!(Belt::White.rank(), 0);
        assert!(Belt::Blue.rank() < Belt::Purple.rank());
        assert_eq!(Belt::Black.rank(), Belt::ALL.len() - 1);
    }

    #[test]
    fn test_order_lifecycle() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Approved));
        assert!(OrderStatus::Approved.can_transition_to(OrderStatus::AwaitingDelivery));
        assert!(OrderStatus::AwaitingDelivery.can_transition_to(OrderStatus::Finished));
        assert!(!OrderStatus::Finished.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Approved.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.holds_stock());
        assert!(OrderStatus::AwaitingDelivery.holds_stock());
    }

    #[test]
    fn test_staff_roles() {
        assert!(Role::Instructor.is_staff());
        assert!(Role::Admin.is_staff());
        assert!(!Role::Student.is_staff());
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(s in "\\PC*") {
            let _ = Belt::parse(&s);
            let _ = OrderStatus::parse(&s);
        }
    }
}
