use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde_json::{json, Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    AttendanceEvent, ClassRecord, CourseContext, Identity, StudentRecord, SubjectRecord,
    sort_by_week, TimetableSlot, PRESENT, STUDENT_ROLE,
};
use crate::store::RecordStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed record store over the `campus_records` schema.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn metadata_from(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn student_from_row(row: &PgRow) -> anyhow::Result<StudentRecord> {
    let class = match row.try_get::<Option<Uuid>, _>("joined_class_id")? {
        Some(id) => Some(ClassRecord {
            id,
            name: row.try_get("class_name")?,
            batch: row.try_get("batch")?,
            semester: row.try_get("class_semester")?,
            tutor_id: row.try_get("tutor_id")?,
            tutor_name: row.try_get("tutor_name")?,
        }),
        None => None,
    };

    Ok(StudentRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        full_name: row.try_get("full_name")?,
        admission_number: row.try_get("admission_number")?,
        department: row.try_get("department")?,
        semester: row.try_get("semester")?,
        class_id: row.try_get("class_id")?,
        class,
        face_registered: row.try_get("face_registered")?,
    })
}

fn slot_from_row(row: &PgRow) -> anyhow::Result<TimetableSlot> {
    Ok(TimetableSlot {
        id: row.try_get("id")?,
        class_id: row.try_get("class_id")?,
        subject_id: row.try_get("subject_id")?,
        staff_id: row.try_get("staff_id")?,
        day_of_week: row.try_get("day_of_week")?,
        period: row.try_get("period")?,
        subject_name: row.try_get("subject_name")?,
        subject_code: row.try_get("subject_code")?,
        staff_name: row.try_get("staff_name")?,
    })
}

#[async_trait]
impl RecordStore for PgStore {
    async fn find_student_by_identity(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Option<StudentRecord>> {
        let row = sqlx::query(
            r#"
            SELECT s.id, s.user_id, s.admission_number, s.department, s.semester,
                   s.class_id, s.face_registered,
                   u.metadata->>'full_name' AS full_name,
                   c.id AS joined_class_id, c.name AS class_name, c.batch,
                   c.semester AS class_semester, c.tutor_id,
                   t.metadata->>'full_name' AS tutor_name
            FROM campus_records.students s
            LEFT JOIN campus_records.identities u ON u.id = s.user_id
            LEFT JOIN campus_records.classes c ON c.id = s.class_id
            LEFT JOIN campus_records.identities t ON t.id = c.tutor_id
            WHERE s.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(student_from_row).transpose()
    }

    async fn find_student_course_context(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Option<CourseContext>> {
        let row = sqlx::query(
            r#"
            SELECT s.department, s.semester, s.class_id, c.semester AS class_semester
            FROM campus_records.students s
            LEFT JOIN campus_records.classes c ON c.id = s.class_id
            WHERE s.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(CourseContext {
            department: row.try_get("department")?,
            semester: row.try_get("semester")?,
            class_semester: row.try_get("class_semester")?,
            class_id: row.try_get("class_id")?,
        }))
    }

    async fn list_attendance(&self, student_id: Uuid) -> anyhow::Result<Vec<AttendanceEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, student_id, subject_id, status, recorded_on
            FROM campus_records.attendance
            WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(AttendanceEvent {
                id: row.try_get("id")?,
                student_id: row.try_get("student_id")?,
                subject_id: row.try_get("subject_id")?,
                status: row.try_get("status")?,
                recorded_on: row.try_get("recorded_on")?,
            });
        }

        Ok(events)
    }

    async fn list_subjects(
        &self,
        department: &str,
        semester: i32,
    ) -> anyhow::Result<Vec<SubjectRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, department, semester, name, code
            FROM campus_records.subjects
            WHERE department = $1 AND semester = $2
            ORDER BY code
            "#,
        )
        .bind(department)
        .bind(semester)
        .fetch_all(&self.pool)
        .await?;

        let mut subjects = Vec::with_capacity(rows.len());
        for row in rows {
            subjects.push(SubjectRecord {
                id: row.try_get("id")?,
                department: row.try_get("department")?,
                semester: row.try_get("semester")?,
                name: row.try_get("name")?,
                code: row.try_get("code")?,
            });
        }

        Ok(subjects)
    }

    async fn list_timetable(&self, class_id: Uuid) -> anyhow::Result<Vec<TimetableSlot>> {
        let rows = sqlx::query(
            r#"
            SELECT tt.id, tt.class_id, tt.subject_id, tt.staff_id, tt.day_of_week, tt.period,
                   sub.name AS subject_name, sub.code AS subject_code,
                   st.metadata->>'full_name' AS staff_name
            FROM campus_records.timetables tt
            LEFT JOIN campus_records.subjects sub ON sub.id = tt.subject_id
            LEFT JOIN campus_records.identities st ON st.id = tt.staff_id
            WHERE tt.class_id = $1
            "#,
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        let mut slots = rows
            .iter()
            .map(slot_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        sort_by_week(&mut slots);
        Ok(slots)
    }

    async fn list_all_student_identities(&self) -> anyhow::Result<Vec<Identity>> {
        let rows = sqlx::query(
            r#"
            SELECT id, email, roles, metadata
            FROM campus_records.identities
            WHERE $1 = ANY(roles)
            "#,
        )
        .bind(STUDENT_ROLE)
        .fetch_all(&self.pool)
        .await?;

        let mut identities = Vec::with_capacity(rows.len());
        for row in rows {
            identities.push(Identity {
                id: row.try_get("id")?,
                email: row.try_get("email")?,
                roles: row.try_get("roles")?,
                metadata: metadata_from(row.try_get("metadata")?),
            });
        }

        debug!(count = identities.len(), "listed student identities");
        Ok(identities)
    }

    async fn update_identity_semester(&self, id: Uuid, semester: &str) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE campus_records.identities
            SET metadata = jsonb_set(metadata, '{semester}', to_jsonb($2::text), true)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(semester)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("identity {id} not found");
        }
        Ok(())
    }

    async fn delete_identity(&self, id: Uuid) -> anyhow::Result<()> {
        let result = sqlx::query("DELETE FROM campus_records.identities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            bail!("identity {id} not found");
        }
        Ok(())
    }

    async fn create_identity(
        &self,
        email: &str,
        roles: &[String],
        metadata: &Map<String, Value>,
    ) -> anyhow::Result<Uuid> {
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO campus_records.identities (id, email, roles, metadata)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(roles)
        .bind(Value::Object(metadata.clone()))
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to create identity for {email}"))?
        .try_get("id")?;

        Ok(id)
    }

    async fn count_identities(&self) -> anyhow::Result<i64> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM campus_records.identities")
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;
        Ok(total)
    }

    async fn register_face(&self, student_id: Uuid, embedding: &[f32]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO campus_records.student_face_data (student_id, embedding)
            VALUES ($1, $2)
            ON CONFLICT (student_id) DO UPDATE
            SET embedding = EXCLUDED.embedding, updated_at = NOW()
            "#,
        )
        .bind(student_id)
        .bind(embedding)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE campus_records.students SET face_registered = TRUE WHERE id = $1")
            .bind(student_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let tutor_id = Uuid::parse_str("5b1d6f2e-8c1a-4e0f-9a57-0d1f4c6b7a10")?;
    let staff_id = Uuid::parse_str("a4c2e9b1-3f6d-4b8e-8d21-6e9f0b3c5d22")?;
    let class_id = Uuid::parse_str("c7e3a1d5-9b2f-4c6a-8e10-2f4d6b8a0c33")?;

    let identities = vec![
        (tutor_id, "meera.rao@campus.edu", "STAFF", json!({"full_name": "Dr. Meera Rao"})),
        (staff_id, "arun.iyer@campus.edu", "STAFF", json!({"full_name": "Prof. Arun Iyer"})),
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "avery.lee@campus.edu",
            STUDENT_ROLE,
            json!({"full_name": "Avery Lee", "semester": "3rd Semester"}),
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "jules.moreno@campus.edu",
            STUDENT_ROLE,
            json!({"full_name": "Jules Moreno", "semester": 3}),
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "kiara.patel@campus.edu",
            STUDENT_ROLE,
            json!({"full_name": "Kiara Patel", "semester": "8th Semester"}),
        ),
    ];

    for (id, email, role, metadata) in &identities {
        sqlx::query(
            r#"
            INSERT INTO campus_records.identities (id, email, roles, metadata)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE SET metadata = EXCLUDED.metadata
            "#,
        )
        .bind(*id)
        .bind(*email)
        .bind(vec![role.to_string()])
        .bind(metadata)
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO campus_records.classes (id, name, batch, semester, tutor_id)
        VALUES ($1, 'CS-A', '2024-2028', 3, $2)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(class_id)
    .bind(tutor_id)
    .execute(pool)
    .await?;

    let subjects = vec![
        (Uuid::parse_str("11111111-1a2b-4c3d-8e4f-000000000001")?, "Data Structures", "CS301"),
        (Uuid::parse_str("11111111-1a2b-4c3d-8e4f-000000000002")?, "Operating Systems", "CS302"),
        (Uuid::parse_str("11111111-1a2b-4c3d-8e4f-000000000003")?, "Discrete Mathematics", "CS303"),
    ];

    for (id, name, code) in &subjects {
        sqlx::query(
            r#"
            INSERT INTO campus_records.subjects (id, department, semester, name, code)
            VALUES ($1, 'CS', 3, $2, $3)
            ON CONFLICT (department, semester, code) DO NOTHING
            "#,
        )
        .bind(*id)
        .bind(*name)
        .bind(*code)
        .execute(pool)
        .await?;
    }

    sqlx::query("DELETE FROM campus_records.timetables WHERE class_id = $1")
        .bind(class_id)
        .execute(pool)
        .await?;

    let days = ["MON", "TUE"];
    for (index, (subject_id, _, _)) in subjects.iter().take(2).enumerate() {
        sqlx::query(
            r#"
            INSERT INTO campus_records.timetables
            (id, class_id, subject_id, staff_id, day_of_week, period)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(class_id)
        .bind(*subject_id)
        .bind(staff_id)
        .bind(days[index])
        .bind(index as i32 + 1)
        .execute(pool)
        .await?;
    }

    let first_day = NaiveDate::from_ymd_opt(2026, 2, 2).context("invalid date")?;
    let enrolled = [
        (identities[2].0, "ADM-2024-001", Some(3)),
        (identities[3].0, "ADM-2024-002", None),
    ];

    for (offset, (user_id, admission, semester)) in enrolled.into_iter().enumerate() {
        let student_id: Uuid = sqlx::query(
            r#"
            INSERT INTO campus_records.students
            (id, user_id, admission_number, department, semester, class_id)
            VALUES ($1, $2, $3, 'CS', $4, $5)
            ON CONFLICT (user_id) DO UPDATE SET admission_number = EXCLUDED.admission_number
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(admission)
        .bind(semester)
        .bind(class_id)
        .fetch_one(pool)
        .await?
        .try_get("id")?;

        sqlx::query("DELETE FROM campus_records.attendance WHERE student_id = $1")
            .bind(student_id)
            .execute(pool)
            .await?;

        for day in 0..4usize {
            for (subject_index, (subject_id, _, _)) in subjects.iter().enumerate() {
                let status = if (day + subject_index + offset) % 3 == 0 {
                    "ABSENT"
                } else {
                    PRESENT
                };

                sqlx::query(
                    r#"
                    INSERT INTO campus_records.attendance
                    (id, student_id, subject_id, status, recorded_on)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(student_id)
                .bind(*subject_id)
                .bind(status)
                .bind(first_day + Duration::days(day as i64))
                .execute(pool)
                .await?;
            }
        }
    }

    Ok(())
}
