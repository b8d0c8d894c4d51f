use std::fmt::Write;

use chrono::NaiveDate;

use crate::grade::GradeError;
use crate::models::{Course, GradeSummary, Student};

/// A course together with the outcome of grading it.
pub type CourseGrade = (Course, Result<GradeSummary, GradeError>);

fn course_label(course: &Course) -> String {
    match &course.course_number {
        Some(number) => format!("{} ({})", course.title, number),
        None => course.title.clone(),
    }
}

/// Courses with ungraded work, most ungraded assignments first.
pub fn needs_grading(courses: &[CourseGrade]) -> Vec<(&Course, usize)> {
    let mut pending: Vec<(&Course, usize)> = courses
        .iter()
        .filter_map(|(course, grade)| match grade {
            Ok(summary) if summary.ungraded_count > 0 => Some((course, summary.ungraded_count)),
            _ => None,
        })
        .collect();

    pending.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.title.cmp(&b.0.title)));
    pending
}

pub fn build_report(student: &Student, generated_on: NaiveDate, courses: &[CourseGrade]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Grade Report");
    let _ = writeln!(
        output,
        "Generated for {} ({}) on {}",
        student.full_name(),
        student.username,
        generated_on
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Course Grades");

    if courses.is_empty() {
        let _ = writeln!(output, "No courses recorded for this student.");
    } else {
        for (course, grade) in courses {
            match grade {
                Ok(summary) => {
                    let _ = writeln!(
                        output,
                        "- {}: {} ({} of {} points, {} ungraded)",
                        course_label(course),
                        summary.final_grade_string,
                        summary.total_earned.normalize(),
                        summary.total_possible.normalize(),
                        summary.ungraded_count
                    );
                }
                Err(GradeError::NoGradedAssignments) => {
                    let _ = writeln!(output, "- {}: no graded assignments yet", course_label(course));
                }
                Err(err) => {
                    let _ = writeln!(output, "- {}: unable to grade ({})", course_label(course), err);
                }
            }
        }
    }

    let pending = needs_grading(courses);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs Grading");

    if pending.is_empty() {
        let _ = writeln!(output, "Every graded course is fully scored.");
    } else {
        for (course, count) in pending {
            let _ = writeln!(output, "- {}: {} ungraded", course_label(course), count);
        }
    }

    output
}
