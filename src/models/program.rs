use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Content shape of a program; decides which progress rows get seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProgramKind {
    /// Fixed sequence of days unlocked one after another
    Days,
    /// Modules containing lessons
    Modules,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub kind: ProgramKind,
    pub price_cents: i64,
    /// Where the client should land after buying this program
    pub post_purchase_path: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProgram {
    pub slug: String,
    pub name: String,
    pub kind: ProgramKind,
    pub price_cents: i64,
    #[serde(default)]
    pub post_purchase_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDay {
    pub id: i64,
    pub program_id: i64,
    pub day_number: i32,
}

/// Catalog totals used to seed aggregate progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgramOutline {
    pub total_modules: i64,
    pub total_lessons: i64,
    pub first_module_id: Option<i64>,
    pub first_lesson_id: Option<i64>,
}
