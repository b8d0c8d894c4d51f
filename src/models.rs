use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct School {
    pub id: Uuid,
    pub name: String,
    pub state: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Semester {
    pub id: Uuid,
    pub season: String,
    pub year: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct Student {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub school_id: Option<Uuid>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub course_number: Option<String>,
    pub professor: Option<String>,
    pub description: String,
    pub semester_id: Uuid,
    pub student_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub points_possible: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub points_received: Option<Decimal>,
    pub description: Option<String>,
}

/// Point values of one assignment, as the grade aggregator sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentRecord {
    pub points_possible: Decimal,
    /// `None` until the assignment has been scored.
    pub points_received: Option<Decimal>,
}

/// Point values as untrusted text, e.g. CSV cells or request fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAssignment {
    pub points_possible: String,
    #[serde(default)]
    pub points_received: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeSummary {
    pub final_grade: f64,
    pub final_grade_string: String,
    #[serde(rename = "number_of_ungraded_assignments")]
    pub ungraded_count: usize,
    #[serde(rename = "total_points_earned", with = "rust_decimal::serde::float")]
    pub total_earned: Decimal,
    #[serde(rename = "total_points_possible", with = "rust_decimal::serde::float")]
    pub total_possible: Decimal,
}
