use serde_json::Value;

pub const TERMINAL_SEMESTER: u32 = 8;

/// What a promotion sweep does to a student at a given semester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advance { to: u32 },
    Graduate,
}

pub fn transition_for(semester: u32) -> Transition {
    if semester >= TERMINAL_SEMESTER {
        Transition::Graduate
    } else {
        Transition::Advance { to: semester + 1 }
    }
}

/// Reads a semester out of identity metadata. Numbers are taken as-is (fractions
/// truncate) and strings are read up to the first non-digit, so `"3rd Semester"`
/// and `"3"` both give 3. Values past `u32::MAX` clamp to it; anything that is not
/// a positive integer is rejected.
pub fn parse_semester(value: &Value) -> Option<u32> {
    let parsed = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(text) => parse_leading_int(text),
        _ => None,
    }?;

    if parsed <= 0 {
        return None;
    }
    Some(u32::try_from(parsed).unwrap_or(u32::MAX))
}

fn parse_leading_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }

    let magnitude = rest[..digits_end].bytes().fold(0i64, |acc, digit| {
        acc.saturating_mul(10).saturating_add(i64::from(digit - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}

pub fn ordinal_suffix(n: u32) -> &'static str {
    if matches!(n % 100, 11..=13) {
        return "th";
    }

    match n % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

pub fn format_semester(n: u32) -> String {
    format!("{n}{} Semester", ordinal_suffix(n))
}
