//! Grade tracking for schools, students, semesters, courses and assignments.
//!
//! [`grade::aggregate`] turns a course's assignments into a [`models::GradeSummary`];
//! [`db`] is the Postgres store the CLI resolves courses through.

pub mod db;
pub mod grade;
pub mod models;
pub mod report;
