use std::fmt::Write;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{AcademicSummary, SubjectStats};

pub const LOW_ATTENDANCE_THRESHOLD: u32 = 75;

pub fn build_report(summary: &AcademicSummary, generated_on: NaiveDate) -> String {
    let profile = &summary.profile;
    let academics = &summary.academics;
    let mut output = String::new();

    let _ = writeln!(output, "# Academic Summary: {}", profile.name);
    let _ = writeln!(output, "Generated on {}", generated_on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Profile");
    let _ = writeln!(
        output,
        "- Admission: {}",
        profile.admission.as_deref().unwrap_or("-")
    );
    let _ = writeln!(output, "- Department: {}", profile.department);
    let _ = writeln!(
        output,
        "- Semester: {}",
        profile
            .semester
            .map(|semester| semester.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(
        output,
        "- Class: {} (batch {})",
        profile.class_name.as_deref().unwrap_or("-"),
        profile.batch.as_deref().unwrap_or("-")
    );
    let _ = writeln!(output, "- Tutor: {}", profile.tutor);
    let _ = writeln!(
        output,
        "- Face registered: {}",
        if profile.face_registered { "yes" } else { "no" }
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Attendance");
    let _ = writeln!(output, "Overall attendance: {}%", academics.overall_attendance);
    let _ = writeln!(output);

    if academics.subject_stats.is_empty() {
        let _ = writeln!(output, "No subjects found for this semester.");
    } else {
        let _ = writeln!(output, "| Code | Subject | Present | Total | % | Faculty |");
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for stats in &academics.subject_stats {
            let flag = if stats.total > 0 && stats.percentage < LOW_ATTENDANCE_THRESHOLD {
                " (low)"
            } else {
                ""
            };
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {}{} | {} |",
                stats.subject.code,
                stats.subject.name,
                stats.present,
                stats.total,
                stats.percentage,
                flag,
                stats.faculty
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Timetable");

    if summary.timetable.is_empty() {
        let _ = writeln!(output, "No timetable assigned.");
    } else {
        for slot in &summary.timetable {
            let _ = writeln!(
                output,
                "- {} period {}: {} ({})",
                slot.day_of_week.as_deref().unwrap_or("-"),
                slot.period
                    .map(|period| period.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                slot.subject_name.as_deref().unwrap_or("-"),
                slot.staff_name.as_deref().unwrap_or("Not Assigned")
            );
        }
    }

    output
}

#[derive(Serialize)]
struct SubjectRow<'a> {
    code: &'a str,
    name: &'a str,
    present: u32,
    total: u32,
    percentage: u32,
    faculty: &'a str,
}

impl<'a> From<&'a SubjectStats> for SubjectRow<'a> {
    fn from(stats: &'a SubjectStats) -> Self {
        Self {
            code: &stats.subject.code,
            name: &stats.subject.name,
            present: stats.present,
            total: stats.total,
            percentage: stats.percentage,
            faculty: &stats.faculty,
        }
    }
}

pub fn write_subject_csv<W: std::io::Write>(
    writer: W,
    stats: &[SubjectStats],
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in stats {
        writer.serialize(SubjectRow::from(row))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_subject_csv(path: &Path, stats: &[SubjectStats]) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    write_subject_csv(file, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Academics, Profile, SubjectRecord};
    use uuid::Uuid;

    fn summary(stats: Vec<SubjectStats>) -> AcademicSummary {
        AcademicSummary {
            profile: Profile {
                name: "Avery Lee".to_string(),
                admission: Some("ADM-1".to_string()),
                department: "CS".to_string(),
                semester: Some(3),
                batch: Some("2024-2028".to_string()),
                tutor: "Dr. Rao".to_string(),
                class_name: Some("CS-A".to_string()),
                face_registered: true,
            },
            academics: Academics {
                overall_attendance: 67,
                subject_stats: stats,
            },
            timetable: Vec::new(),
        }
    }

    fn stats(code: &str, present: u32, total: u32, percentage: u32) -> SubjectStats {
        SubjectStats {
            subject: SubjectRecord {
                id: Uuid::new_v4(),
                department: "CS".to_string(),
                semester: 3,
                name: format!("{code} name"),
                code: code.to_string(),
            },
            total,
            present,
            percentage,
            faculty: "Prof. Iyer".to_string(),
        }
    }

    #[test]
    fn report_flags_low_attendance_subjects() {
        let report = build_report(
            &summary(vec![stats("SUB1", 3, 4, 75), stats("SUB2", 1, 2, 50)]),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        );

        assert!(report.contains("Overall attendance: 67%"));
        assert!(report.contains("| SUB1 | SUB1 name | 3 | 4 | 75 | Prof. Iyer |"));
        assert!(report.contains("| SUB2 | SUB2 name | 1 | 2 | 50 (low) | Prof. Iyer |"));
        assert!(report.contains("No timetable assigned."));
    }

    #[test]
    fn report_handles_empty_catalog() {
        let report = build_report(
            &summary(Vec::new()),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        );
        assert!(report.contains("No subjects found for this semester."));
    }

    #[test]
    fn csv_export_writes_header_and_rows() {
        let mut buffer = Vec::new();
        write_subject_csv(&mut buffer, &[stats("SUB1", 3, 4, 75)]).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("code,name,present,total,percentage,faculty")
        );
        assert_eq!(lines.next(), Some("SUB1,SUB1 name,3,4,75,Prof. Iyer"));
    }
}
