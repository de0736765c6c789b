use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{RecordError, RecordResult};
use crate::models::{DirectoryStats, EnrollmentError, EnrollmentResult, NewIdentity};
use crate::store::RecordStore;

async fn enroll_one(store: &dyn RecordStore, entry: &NewIdentity) -> anyhow::Result<Uuid> {
    if entry.email.trim().is_empty() || entry.role.trim().is_empty() {
        anyhow::bail!("email and role are required");
    }

    // Caller-supplied metadata overrides the derived keys.
    let mut metadata = Map::new();
    if let Some(name) = &entry.name {
        metadata.insert("full_name".to_string(), Value::String(name.clone()));
    }
    metadata.insert("role".to_string(), Value::String(entry.role.clone()));
    metadata.extend(entry.metadata.clone());

    store
        .create_identity(&entry.email, &[entry.role.clone()], &metadata)
        .await
}

/// Creates each account independently; one bad entry never stops the rest.
pub async fn enroll_identities(
    store: &dyn RecordStore,
    entries: &[NewIdentity],
) -> EnrollmentResult {
    let mut result = EnrollmentResult::default();

    for entry in entries {
        match enroll_one(store, entry).await {
            Ok(id) => {
                info!(%id, email = %entry.email, role = %entry.role, "identity created");
                result.success += 1;
            }
            Err(err) => {
                warn!(email = %entry.email, error = %err, "identity creation failed");
                result.failed += 1;
                result.errors.push(EnrollmentError {
                    email: entry.email.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    result
}

pub async fn directory_stats(store: &dyn RecordStore) -> RecordResult<DirectoryStats> {
    Ok(DirectoryStats {
        total_users: store.count_identities().await?,
    })
}

pub async fn register_face(
    store: &dyn RecordStore,
    user_id: Uuid,
    embedding: &[f32],
) -> RecordResult<()> {
    if embedding.is_empty() {
        return Err(RecordError::InvalidInput(
            "face embedding must not be empty".to_string(),
        ));
    }

    let student = store
        .find_student_by_identity(user_id)
        .await?
        .ok_or_else(|| RecordError::not_found(format!("student {user_id}")))?;

    store.register_face(student.id, embedding).await?;
    info!(student_id = %student.id, dimensions = embedding.len(), "face registered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StudentRecord;
    use crate::store::memory::MemoryStore;
    use serde_json::json;
    use std::sync::Mutex;

    fn entries() -> Vec<NewIdentity> {
        serde_json::from_value(json!([
            {"email": "kiara@campus.edu", "name": "Kiara Patel", "role": "STUDENT",
             "metadata": {"semester": "1st Semester", "department": "CS"}},
            {"email": "rao@campus.edu", "name": "Dr. Rao", "role": "STAFF"},
            {"email": "", "role": "STUDENT"},
            {"email": "kiara@campus.edu", "name": "Duplicate", "role": "STUDENT"}
        ]))
        .unwrap()
    }

    #[tokio::test]
    async fn bulk_enrollment_isolates_bad_entries() {
        let store = MemoryStore::default();
        let result = enroll_identities(&store, &entries()).await;

        assert_eq!(result.success, 2);
        assert_eq!(result.failed, 2);
        assert_eq!(result.errors[1].email, "kiara@campus.edu");

        let identities = store.identities.lock().unwrap();
        let kiara = identities
            .iter()
            .find(|identity| identity.email == "kiara@campus.edu")
            .unwrap();
        assert!(kiara.is_student());
        assert_eq!(kiara.metadata["full_name"], json!("Kiara Patel"));
        assert_eq!(kiara.metadata["semester"], json!("1st Semester"));
        assert_eq!(kiara.metadata["role"], json!("STUDENT"));
    }

    #[tokio::test]
    async fn explicit_metadata_wins_over_name_and_role() {
        let store = MemoryStore::default();
        let entries: Vec<NewIdentity> = serde_json::from_value(json!([
            {"email": "sam@campus.edu", "name": "Sam", "role": "STUDENT",
             "metadata": {"full_name": "Samira Khan", "role": "CLASS_REP"}}
        ]))
        .unwrap();

        let result = enroll_identities(&store, &entries).await;
        assert_eq!(result.success, 1);

        let identities = store.identities.lock().unwrap();
        assert_eq!(identities[0].metadata["full_name"], json!("Samira Khan"));
        assert_eq!(identities[0].metadata["role"], json!("CLASS_REP"));
        assert_eq!(identities[0].roles, vec!["STUDENT".to_string()]);
    }

    #[tokio::test]
    async fn stats_count_every_identity() {
        let store = MemoryStore::default();
        enroll_identities(&store, &entries()).await;
        let stats = directory_stats(&store).await.unwrap();
        assert_eq!(stats.total_users, 2);
    }

    #[tokio::test]
    async fn face_registration_flags_student() {
        let user_id = Uuid::new_v4();
        let student_id = Uuid::new_v4();
        let store = MemoryStore {
            students: Mutex::new(vec![StudentRecord {
                id: student_id,
                user_id,
                full_name: None,
                admission_number: None,
                department: "CS".to_string(),
                semester: Some(1),
                class_id: None,
                class: None,
                face_registered: false,
            }]),
            ..Default::default()
        };

        register_face(&store, user_id, &[0.1, 0.2, 0.3]).await.unwrap();
        assert!(store.students.lock().unwrap()[0].face_registered);
        assert_eq!(store.faces.lock().unwrap()[&student_id].len(), 3);

        let err = register_face(&store, user_id, &[]).await.unwrap_err();
        assert!(matches!(err, RecordError::InvalidInput(_)));

        let err = register_face(&store, Uuid::new_v4(), &[0.5]).await.unwrap_err();
        assert!(matches!(err, RecordError::NotFound(_)));
    }
}
