use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::{
    AttendanceEvent, CourseContext, Identity, StudentRecord, SubjectRecord, TimetableSlot,
};

#[cfg(test)]
pub mod memory;

/// Query surface over the student records and the identity directory.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Looks a student up by identity id, with name, class and tutor joined in.
    async fn find_student_by_identity(&self, user_id: Uuid)
        -> anyhow::Result<Option<StudentRecord>>;

    async fn find_student_course_context(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Option<CourseContext>>;

    async fn list_attendance(&self, student_id: Uuid) -> anyhow::Result<Vec<AttendanceEvent>>;

    async fn list_subjects(
        &self,
        department: &str,
        semester: i32,
    ) -> anyhow::Result<Vec<SubjectRecord>>;

    async fn list_timetable(&self, class_id: Uuid) -> anyhow::Result<Vec<TimetableSlot>>;

    /// Every identity holding the student role. Must not be truncated.
    async fn list_all_student_identities(&self) -> anyhow::Result<Vec<Identity>>;

    /// Replaces only the `semester` metadata key.
    async fn update_identity_semester(&self, id: Uuid, semester: &str) -> anyhow::Result<()>;

    async fn delete_identity(&self, id: Uuid) -> anyhow::Result<()>;

    async fn create_identity(
        &self,
        email: &str,
        roles: &[String],
        metadata: &Map<String, Value>,
    ) -> anyhow::Result<Uuid>;

    async fn count_identities(&self) -> anyhow::Result<i64>;

    /// Upserts the embedding for a student and sets their face-registered flag.
    async fn register_face(&self, student_id: Uuid, embedding: &[f32]) -> anyhow::Result<()>;
}
