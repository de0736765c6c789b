use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RecordError, RecordResult};
use crate::models::{
    AcademicSummary, Academics, AttendanceEvent, CourseContext, Profile, StudentRecord,
    SubjectRecord, SubjectStats, TimetableSlot, NOT_ASSIGNED,
};
use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    total: u32,
    present: u32,
}

/// Rounded half-up share of `present` in `total`, or 0 when there is nothing to count.
pub fn attendance_percentage(present: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (present, total) = (u64::from(present), u64::from(total));
    ((present * 200 + total) / (total * 2)) as u32
}

/// Joins one student's collections into a summary. Subjects outside the catalog
/// contribute nothing, and the first slot per subject names its faculty.
pub fn build_summary(
    student: &StudentRecord,
    semester: Option<i32>,
    attendance: &[AttendanceEvent],
    subjects: Vec<SubjectRecord>,
    timetable: Vec<TimetableSlot>,
) -> AcademicSummary {
    let mut tallies: HashMap<Uuid, Tally> = HashMap::new();
    for event in attendance {
        let entry = tallies.entry(event.subject_id).or_default();
        entry.total += 1;
        if event.is_present() {
            entry.present += 1;
        }
    }

    let mut faculty: HashMap<Uuid, &TimetableSlot> = HashMap::new();
    for slot in &timetable {
        faculty.entry(slot.subject_id).or_insert(slot);
    }

    let mut overall = Tally::default();
    let subject_stats: Vec<SubjectStats> = subjects
        .into_iter()
        .map(|subject| {
            let tally = tallies.get(&subject.id).copied().unwrap_or_default();
            overall.total += tally.total;
            overall.present += tally.present;

            let faculty_name = faculty
                .get(&subject.id)
                .and_then(|slot| slot.staff_name.clone())
                .unwrap_or_else(|| NOT_ASSIGNED.to_string());

            SubjectStats {
                subject,
                total: tally.total,
                present: tally.present,
                percentage: attendance_percentage(tally.present, tally.total),
                faculty: faculty_name,
            }
        })
        .collect();

    let class = student.class.as_ref();
    let profile = Profile {
        name: student
            .full_name
            .clone()
            .unwrap_or_else(|| "Student".to_string()),
        admission: student.admission_number.clone(),
        department: student.department.clone(),
        semester,
        batch: class.and_then(|class| class.batch.clone()),
        tutor: class
            .and_then(|class| class.tutor_name.clone())
            .unwrap_or_else(|| NOT_ASSIGNED.to_string()),
        class_name: class.map(|class| class.name.clone()),
        face_registered: student.face_registered,
    };

    AcademicSummary {
        profile,
        academics: Academics {
            overall_attendance: attendance_percentage(overall.present, overall.total),
            subject_stats,
        },
        timetable,
    }
}

async fn catalog_for(
    store: &dyn RecordStore,
    context: &CourseContext,
) -> anyhow::Result<Vec<SubjectRecord>> {
    match context.effective_semester() {
        Some(semester) => store.list_subjects(&context.department, semester).await,
        None => Ok(Vec::new()),
    }
}

async fn timetable_for(
    store: &dyn RecordStore,
    context: &CourseContext,
) -> anyhow::Result<Vec<TimetableSlot>> {
    match context.class_id {
        Some(class_id) => store.list_timetable(class_id).await,
        None => Ok(Vec::new()),
    }
}

fn or_empty<T>(result: anyhow::Result<Vec<T>>, collection: &str, student_id: Uuid) -> Vec<T> {
    result.unwrap_or_else(|err| {
        warn!(%student_id, collection, error = %err, "falling back to empty collection");
        Vec::new()
    })
}

pub async fn compute_summary(
    store: &dyn RecordStore,
    user_id: Uuid,
) -> RecordResult<AcademicSummary> {
    let student = store
        .find_student_by_identity(user_id)
        .await?
        .ok_or_else(|| RecordError::not_found(format!("student profile for {user_id}")))?;

    let context = student.course_context();
    let semester = context.effective_semester();

    let (attendance, subjects, timetable) = tokio::join!(
        store.list_attendance(student.id),
        catalog_for(store, &context),
        timetable_for(store, &context),
    );
    let attendance = or_empty(attendance, "attendance", student.id);
    let subjects = or_empty(subjects, "subjects", student.id);
    let timetable = or_empty(timetable, "timetable", student.id);

    debug!(
        student_id = %student.id,
        events = attendance.len(),
        subjects = subjects.len(),
        slots = timetable.len(),
        "aggregating academic summary"
    );

    Ok(build_summary(
        &student,
        semester,
        &attendance,
        subjects,
        timetable,
    ))
}

pub async fn compute_courses(
    store: &dyn RecordStore,
    user_id: Uuid,
) -> RecordResult<Vec<SubjectRecord>> {
    let context = store
        .find_student_course_context(user_id)
        .await?
        .ok_or_else(|| RecordError::not_found(format!("student {user_id}")))?;

    Ok(catalog_for(store, &context).await?)
}

pub async fn compute_timetable(
    store: &dyn RecordStore,
    user_id: Uuid,
) -> RecordResult<Vec<TimetableSlot>> {
    let context = store
        .find_student_course_context(user_id)
        .await?
        .ok_or_else(|| RecordError::not_found(format!("student {user_id}")))?;

    Ok(timetable_for(store, &context).await?)
}
