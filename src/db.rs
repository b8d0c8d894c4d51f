use std::io::Read;
use std::path::Path;

use anyhow::Context;
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool, Row};
use uuid::Uuid;

use crate::models::{
    Assignment, AssignmentRecord, Course, RawAssignment, School, Semester, Student,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to create my_grades schema")?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    let school = School {
        id: Uuid::parse_str("6b0e8f4c-1d2a-4c53-9a57-0f3c7d1e2b44")?,
        name: "Nashville State Community College".to_string(),
        state: Some("TN".to_string()),
        city: Some("Nashville".to_string()),
    };

    sqlx::query(
        r#"
        INSERT INTO my_grades.schools (id, name, state, city)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(school.id)
    .bind(&school.name)
    .bind(&school.state)
    .bind(&school.city)
    .execute(&mut *tx)
    .await?;

    let semester = Semester {
        id: Uuid::parse_str("a4c2d9e1-7b3f-4f0a-8e6d-2c5b9a1f3e70")?,
        season: "Fall".to_string(),
        year: Some(2026),
    };
    let semester_id = upsert_semester(&mut *tx, &semester).await?;

    let students = vec![
        Student {
            id: Uuid::parse_str("e1f7c3a2-5d4b-4e9c-b8a1-9f2d6c0e7b15")?,
            username: "mlawson".to_string(),
            first_name: "Maya".to_string(),
            last_name: "Lawson".to_string(),
            school_id: Some(school.id),
        },
        Student {
            id: Uuid::parse_str("2c9b4e6f-8a1d-4f3c-a7e2-5b0d9c8f1a63")?,
            username: "tokafor".to_string(),
            first_name: "Tobi".to_string(),
            last_name: "Okafor".to_string(),
            school_id: Some(school.id),
        },
    ];

    let mut student_ids = Vec::with_capacity(students.len());
    for student in &students {
        student_ids.push(upsert_student(&mut *tx, student).await?);
    }

    let courses = vec![
        (
            "7f3a1c9e-2b6d-4a8f-9e0c-1d5b7a3c9f28",
            student_ids[0],
            "Intro to Programming",
            "CS 1010",
            "Dr. Reyes",
            vec![
                ("b1e0c7a4-3f2d-4e8b-9c6a-5d1f0e7b2a31", "Hello World", "10", Some("10")),
                ("d6a3f8b2-9e1c-4b7d-a0f5-2c8e4b9d1a76", "Loops Lab", "20", Some("17.5")),
                ("4f8c2e1a-7d3b-4a9f-8e6c-0b5d1f9a3c82", "Midterm", "100", None),
            ],
        ),
        (
            "c8d2e5f1-4a7b-4c9e-8f3d-6a1b0e2c7d94",
            student_ids[0],
            "College Algebra",
            "MATH 1130",
            "Prof. Hart",
            vec![
                ("9e2b5d7f-1a4c-4f8e-b3d6-7c0a2e9f5b14", "Quiz 1", "15", Some("0")),
                ("3a7d1f9c-5e2b-4c8a-9f0e-6b4d8a2c1e59", "Quiz 2", "15", Some("12")),
            ],
        ),
        (
            "0a5e9b3d-6c1f-4d7a-b2e8-3f9c4a6d1b57",
            student_ids[1],
            "English Composition",
            "ENGL 1010",
            "Dr. Whitfield",
            vec![("8c1f4a6e-2d9b-4e3a-a7c5-1f0b6d8e4a23", "Personal Essay", "50", None)],
        ),
    ];

    for (id, student_id, title, number, professor, assignments) in courses {
        let course = Course {
            id: Uuid::parse_str(id)?,
            title: title.to_string(),
            course_number: Some(number.to_string()),
            professor: Some(professor.to_string()),
            description: String::new(),
            semester_id,
            student_id,
        };
        let course_id = upsert_course(&mut *tx, &course).await?;

        for (id, title, possible, received) in assignments {
            let record = AssignmentRecord::try_from(&RawAssignment {
                points_possible: possible.to_string(),
                points_received: received.map(str::to_string),
            })?;

            sqlx::query(
                r#"
                INSERT INTO my_grades.assignments
                (id, course_id, title, points_possible, points_received, description)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(Uuid::parse_str(id)?)
            .bind(course_id)
            .bind(title)
            .bind(record.points_possible)
            .bind(record.points_received)
            .bind(None::<String>)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

async fn upsert_semester<'e>(
    executor: impl PgExecutor<'e>,
    semester: &Semester,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO my_grades.semesters (id, season, year)
        VALUES ($1, $2, $3)
        ON CONFLICT (season, year) DO UPDATE SET season = EXCLUDED.season
        RETURNING id
        "#,
    )
    .bind(semester.id)
    .bind(&semester.season)
    .bind(semester.year)
    .fetch_one(executor)
    .await?
    .get("id");

    Ok(id)
}

async fn upsert_student<'e>(
    executor: impl PgExecutor<'e>,
    student: &Student,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO my_grades.students (id, username, first_name, last_name, school_id)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (username) DO UPDATE
        SET first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name
        RETURNING id
        "#,
    )
    .bind(student.id)
    .bind(&student.username)
    .bind(&student.first_name)
    .bind(&student.last_name)
    .bind(student.school_id)
    .fetch_one(executor)
    .await?
    .get("id");

    Ok(id)
}

/// Returns the id of the course already holding (student, semester, title), if any.
async fn upsert_course<'e>(executor: impl PgExecutor<'e>, course: &Course) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO my_grades.courses
        (id, title, course_number, professor, description, semester_id, student_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (student_id, semester_id, title) DO UPDATE
        SET course_number = COALESCE(EXCLUDED.course_number, my_grades.courses.course_number),
            professor = COALESCE(EXCLUDED.professor, my_grades.courses.professor)
        RETURNING id
        "#,
    )
    .bind(course.id)
    .bind(&course.title)
    .bind(&course.course_number)
    .bind(&course.professor)
    .bind(&course.description)
    .bind(course.semester_id)
    .bind(course.student_id)
    .fetch_one(executor)
    .await?
    .get("id");

    Ok(id)
}

pub async fn fetch_course(pool: &PgPool, course_id: Uuid) -> anyhow::Result<Option<Course>> {
    let row = sqlx::query(
        "SELECT id, title, course_number, professor, description, semester_id, student_id \
         FROM my_grades.courses WHERE id = $1",
    )
    .bind(course_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| course_from_row(&row)))
}

pub async fn fetch_student(pool: &PgPool, username: &str) -> anyhow::Result<Option<Student>> {
    let row = sqlx::query(
        "SELECT id, username, first_name, last_name, school_id \
         FROM my_grades.students WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Student {
        id: row.get("id"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        school_id: row.get("school_id"),
    }))
}

pub async fn fetch_student_courses(pool: &PgPool, username: &str) -> anyhow::Result<Vec<Course>> {
    let rows = sqlx::query(
        "SELECT c.id, c.title, c.course_number, c.professor, c.description, \
         c.semester_id, c.student_id \
         FROM my_grades.courses c \
         JOIN my_grades.students s ON s.id = c.student_id \
         WHERE s.username = $1 \
         ORDER BY c.title",
    )
    .bind(username)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(course_from_row).collect())
}

pub async fn fetch_assignments(pool: &PgPool, course_id: Uuid) -> anyhow::Result<Vec<Assignment>> {
    let rows = sqlx::query(
        "SELECT id, course_id, title, points_possible, points_received, description \
         FROM my_grades.assignments WHERE course_id = $1 ORDER BY title",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    let mut assignments = Vec::new();

    for row in rows {
        assignments.push(Assignment {
            id: row.get("id"),
            course_id: row.get("course_id"),
            title: row.get("title"),
            points_possible: row.get::<Decimal, _>("points_possible"),
            points_received: row.get::<Option<Decimal>, _>("points_received"),
            description: row.get("description"),
        });
    }

    Ok(assignments)
}

pub async fn fetch_assignment_records(
    pool: &PgPool,
    course_id: Uuid,
) -> anyhow::Result<Vec<AssignmentRecord>> {
    let rows = sqlx::query(
        "SELECT points_possible, points_received \
         FROM my_grades.assignments WHERE course_id = $1",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());

    for row in rows {
        records.push(AssignmentRecord {
            points_possible: row.try_get("points_possible")?,
            points_received: row.try_get("points_received")?,
        });
    }

    Ok(records)
}

fn course_from_row(row: &sqlx::postgres::PgRow) -> Course {
    Course {
        id: row.get("id"),
        title: row.get("title"),
        course_number: row.get("course_number"),
        professor: row.get("professor"),
        description: row.get("description"),
        semester_id: row.get("semester_id"),
        student_id: row.get("student_id"),
    }
}

/// One line of an assignment import file.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CsvRow {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub season: String,
    pub year: Option<i32>,
    pub course_title: String,
    pub course_number: Option<String>,
    pub professor: Option<String>,
    pub assignment_title: String,
    pub points_possible: String,
    pub points_received: Option<String>,
    pub description: Option<String>,
}

impl CsvRow {
    pub fn raw_points(&self) -> RawAssignment {
        RawAssignment {
            points_possible: self.points_possible.clone(),
            points_received: self.points_received.clone(),
        }
    }
}

/// Decodes import rows and validates their point cells.
pub fn read_assignment_rows<R: Read>(
    reader: R,
) -> anyhow::Result<Vec<(CsvRow, AssignmentRecord)>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("invalid CSV row on line {line}"))?;
        let record = AssignmentRecord::try_from(&row.raw_points())
            .with_context(|| format!("invalid points on line {line}"))?;
        rows.push((row, record));
    }

    Ok(rows)
}

/// Imports every row or none: the whole file runs in one transaction.
pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let rows = read_assignment_rows(file)?;
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for (index, (row, record)) in rows.into_iter().enumerate() {
        let line = index + 2;

        let student_id = upsert_student(
            &mut *tx,
            &Student {
                id: Uuid::new_v4(),
                username: row.username.clone(),
                first_name: row.first_name.clone(),
                last_name: row.last_name.clone(),
                school_id: None,
            },
        )
        .await
        .with_context(|| format!("failed to store student on line {line}"))?;

        let semester_id = upsert_semester(
            &mut *tx,
            &Semester {
                id: Uuid::new_v4(),
                season: row.season.clone(),
                year: row.year,
            },
        )
        .await
        .with_context(|| format!("failed to store semester on line {line}"))?;

        let course_id = upsert_course(
            &mut *tx,
            &Course {
                id: Uuid::new_v4(),
                title: row.course_title.clone(),
                course_number: row.course_number.clone(),
                professor: row.professor.clone(),
                description: String::new(),
                semester_id,
                student_id,
            },
        )
        .await
        .with_context(|| format!("failed to store course on line {line}"))?;

        let result = sqlx::query(
            r#"
            INSERT INTO my_grades.assignments
            (id, course_id, title, points_possible, points_received, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(&row.assignment_title)
        .bind(record.points_possible)
        .bind(record.points_received)
        .bind(&row.description)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to store assignment on line {line}"))?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tx.commit().await?;
    tracing::info!(inserted, path = %csv_path.display(), "imported assignments");
    Ok(inserted)
}
