use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::RecordStore;
use crate::models::{
    AttendanceEvent, CourseContext, Identity, StudentRecord, SubjectRecord, TimetableSlot,
};

/// In-memory store for engine tests, with switches to make individual calls fail.
#[derive(Default)]
pub struct MemoryStore {
    pub students: Mutex<Vec<StudentRecord>>,
    pub subjects: Vec<SubjectRecord>,
    pub attendance: Vec<AttendanceEvent>,
    pub timetable: Vec<TimetableSlot>,
    pub identities: Mutex<Vec<Identity>>,
    pub faces: Mutex<HashMap<Uuid, Vec<f32>>>,
    pub fail_attendance: bool,
    pub fail_subjects: bool,
    pub fail_timetable: bool,
    pub fail_listing: bool,
    pub failing_mutations: HashSet<Uuid>,
}

impl MemoryStore {
    pub fn identity(&self, id: Uuid) -> Option<Identity> {
        self.identities
            .lock()
            .unwrap()
            .iter()
            .find(|identity| identity.id == id)
            .cloned()
    }

    fn check_mutation(&self, id: Uuid) -> anyhow::Result<()> {
        if self.failing_mutations.contains(&id) {
            bail!("directory rejected mutation for {id}");
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_student_by_identity(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Option<StudentRecord>> {
        Ok(self
            .students
            .lock()
            .unwrap()
            .iter()
            .find(|student| student.user_id == user_id)
            .cloned())
    }

    async fn find_student_course_context(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Option<CourseContext>> {
        Ok(self
            .find_student_by_identity(user_id)
            .await?
            .map(|student| student.course_context()))
    }

    async fn list_attendance(&self, student_id: Uuid) -> anyhow::Result<Vec<AttendanceEvent>> {
        if self.fail_attendance {
            bail!("attendance unavailable");
        }
        Ok(self
            .attendance
            .iter()
            .filter(|event| event.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn list_subjects(
        &self,
        department: &str,
        semester: i32,
    ) -> anyhow::Result<Vec<SubjectRecord>> {
        if self.fail_subjects {
            bail!("subjects unavailable");
        }
        Ok(self
            .subjects
            .iter()
            .filter(|subject| subject.department == department && subject.semester == semester)
            .cloned()
            .collect())
    }

    async fn list_timetable(&self, class_id: Uuid) -> anyhow::Result<Vec<TimetableSlot>> {
        if self.fail_timetable {
            bail!("timetable unavailable");
        }
        Ok(self
            .timetable
            .iter()
            .filter(|slot| slot.class_id == class_id)
            .cloned()
            .collect())
    }

    async fn list_all_student_identities(&self) -> anyhow::Result<Vec<Identity>> {
        if self.fail_listing {
            bail!("directory unavailable");
        }
        Ok(self
            .identities
            .lock()
            .unwrap()
            .iter()
            .filter(|identity| identity.is_student())
            .cloned()
            .collect())
    }

    async fn update_identity_semester(&self, id: Uuid, semester: &str) -> anyhow::Result<()> {
        self.check_mutation(id)?;
        let mut identities = self.identities.lock().unwrap();
        let identity = identities
            .iter_mut()
            .find(|identity| identity.id == id)
            .ok_or_else(|| anyhow!("identity {id} not found"))?;
        identity
            .metadata
            .insert("semester".to_string(), Value::String(semester.to_string()));
        Ok(())
    }

    async fn delete_identity(&self, id: Uuid) -> anyhow::Result<()> {
        self.check_mutation(id)?;
        let mut identities = self.identities.lock().unwrap();
        let before = identities.len();
        identities.retain(|identity| identity.id != id);
        if identities.len() == before {
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
        let mut identities = self.identities.lock().unwrap();
        if identities.iter().any(|identity| identity.email == email) {
            bail!("email {email} already registered");
        }
        let id = Uuid::new_v4();
        identities.push(Identity {
            id,
            email: email.to_string(),
            roles: roles.to_vec(),
            metadata: metadata.clone(),
        });
        Ok(id)
    }

    async fn count_identities(&self) -> anyhow::Result<i64> {
        Ok(self.identities.lock().unwrap().len() as i64)
    }

    async fn register_face(&self, student_id: Uuid, embedding: &[f32]) -> anyhow::Result<()> {
        let mut students = self.students.lock().unwrap();
        let student = students
            .iter_mut()
            .find(|student| student.id == student_id)
            .ok_or_else(|| anyhow!("student {student_id} not found"))?;
        student.face_registered = true;
        self.faces
            .lock()
            .unwrap()
            .insert(student_id, embedding.to_vec());
        Ok(())
    }
}
