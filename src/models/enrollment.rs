use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: String,
    pub user_id: i64,
    pub program_id: i64,
    pub order_id: String,
    pub status: String,
    pub enrolled_at: i64,
}

/// Aggregate progress for module/lesson programs. Seeded once, then owned by
/// course delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramProgress {
    pub user_id: i64,
    pub program_id: i64,
    pub total_modules: i64,
    pub completed_modules: i64,
    pub total_lessons: i64,
    pub completed_lessons: i64,
    pub progress_percentage: i64,
    pub current_module_id: Option<i64>,
    pub current_lesson_id: Option<i64>,
    pub started_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DayStatus {
    Locked,
    Available,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayProgress {
    pub user_id: i64,
    pub program_id: i64,
    pub day_id: i64,
    pub day_number: i32,
    pub status: DayStatus,
    pub created_at: i64,
}
