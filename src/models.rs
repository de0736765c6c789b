use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub const STUDENT_ROLE: &str = "STUDENT";
pub const PRESENT: &str = "PRESENT";
pub const NOT_ASSIGNED: &str = "Not Assigned";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: Uuid,
    pub name: String,
    pub batch: Option<String>,
    pub semester: Option<i32>,
    pub tutor_id: Option<Uuid>,
    pub tutor_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub admission_number: Option<String>,
    pub department: String,
    pub semester: Option<i32>,
    pub class_id: Option<Uuid>,
    pub class: Option<ClassRecord>,
    pub face_registered: bool,
}

impl StudentRecord {
    pub fn course_context(&self) -> CourseContext {
        CourseContext {
            department: self.department.clone(),
            semester: self.semester,
            class_semester: self.class.as_ref().and_then(|class| class.semester),
            class_id: self.class_id,
        }
    }
}

/// The slice of a student needed to resolve their catalog and timetable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseContext {
    pub department: String,
    pub semester: Option<i32>,
    pub class_semester: Option<i32>,
    pub class_id: Option<Uuid>,
}

impl CourseContext {
    /// The student's own semester wins; the class semester fills in when it is unset.
    pub fn effective_semester(&self) -> Option<i32> {
        self.semester.or(self.class_semester)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub id: Uuid,
    pub department: String,
    pub semester: i32,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub status: String,
    pub recorded_on: NaiveDate,
}

impl AttendanceEvent {
    pub fn is_present(&self) -> bool {
        self.status == PRESENT
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimetableSlot {
    pub id: Uuid,
    pub class_id: Uuid,
    pub subject_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub day_of_week: Option<String>,
    pub period: Option<i32>,
    pub subject_name: Option<String>,
    pub subject_code: Option<String>,
    pub staff_name: Option<String>,
}

const WEEKDAYS: [&str; 7] = ["MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

impl TimetableSlot {
    /// Calendar position: weekday first (`MON` or `Monday` style, unknown days last),
    /// then period.
    pub fn week_position(&self) -> (usize, i32) {
        let day = self
            .day_of_week
            .as_deref()
            .map(|day| day.trim().to_ascii_uppercase())
            .and_then(|day| WEEKDAYS.iter().position(|name| day.starts_with(name)))
            .unwrap_or(WEEKDAYS.len());
        (day, self.period.unwrap_or(i32::MAX))
    }
}

/// Orders slots Monday through Sunday; ties keep their store order.
pub fn sort_by_week(slots: &mut [TimetableSlot]) {
    slots.sort_by_key(TimetableSlot::week_position);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Identity {
    pub fn is_student(&self) -> bool {
        self.roles.iter().any(|role| role == STUDENT_ROLE)
    }

    pub fn semester_value(&self) -> Option<&Value> {
        self.metadata.get("semester")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIdentity {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub name: String,
    pub admission: Option<String>,
    pub department: String,
    pub semester: Option<i32>,
    pub batch: Option<String>,
    pub tutor: String,
    pub class_name: Option<String>,
    pub face_registered: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectStats {
    #[serde(flatten)]
    pub subject: SubjectRecord,
    pub total: u32,
    pub present: u32,
    pub percentage: u32,
    pub faculty: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Academics {
    pub overall_attendance: u32,
    pub subject_stats: Vec<SubjectStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcademicSummary {
    pub profile: Profile,
    pub academics: Academics,
    pub timetable: Vec<TimetableSlot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PromotionResult {
    pub promoted: usize,
    pub graduated: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentError {
    pub email: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrollmentResult {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<EnrollmentError>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryStats {
    pub total_users: i64,
}
