//! Platform statistics for the admin dashboard.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformStats {
    pub total_users: i64,
    pub total_teachers: i64,
    pub total_students: i64,
    pub total_classes: i64,
    /// Classes still marked scheduled with a start time in the future
    pub upcoming_classes: i64,
}
