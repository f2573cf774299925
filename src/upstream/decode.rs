//! Decoding of upstream JSON into [`College`] records.
//!
//! Field extraction is lenient: a missing or mistyped field becomes its zero
//! value (empty string, 0, empty list). Only a payload that is not a JSON
//! object at all is rejected as malformed.

use serde_json::{Map, Value};

use crate::error::UpstreamError;
use crate::models::{College, FeesInfo, GenderRatio, StatisticItem};

/// Pulls the JSON document out of a model completion, dropping a
/// surrounding markdown code fence if present.
pub fn extract_json_text(text: &str) -> &str {
    let text = text.trim();
    if !text.starts_with("```") {
        return text;
    }

    match text.split("```").nth(1) {
        Some(inner) => inner.strip_prefix("json").unwrap_or(inner).trim(),
        None => text,
    }
}

/// Parses completion text into a record.
pub fn college_from_text(text: &str) -> Result<College, UpstreamError> {
    let json = extract_json_text(text);
    let value: Value = serde_json::from_str(json)
        .map_err(|e| UpstreamError::malformed(format!("invalid JSON: {}", e)))?;
    college_from_value(&value)
}

/// Maps a JSON object onto a record with default-on-missing semantics.
pub fn college_from_value(value: &Value) -> Result<College, UpstreamError> {
    let data = value
        .as_object()
        .ok_or_else(|| UpstreamError::malformed("expected a JSON object"))?;

    Ok(College {
        college_name: string_field(data, "college_name"),
        country: string_field(data, "country"),
        about: string_field(data, "about"),
        location: string_field(data, "location"),
        summary: string_field(data, "summary"),
        ug_programs: string_list(data, "ug_programs"),
        pg_programs: string_list(data, "pg_programs"),
        phd_programs: string_list(data, "phd_programs"),
        fees: fees(data.get("fees")),
        scholarships: string_list(data, "scholarships"),
        student_gender_ratio: gender_ratio(data.get("student_gender_ratio")),
        faculty_staff: int_field(data, "faculty_staff"),
        international_students: int_field(data, "international_students"),
        global_ranking: string_field(data, "global_ranking"),
        departments: string_list(data, "departments"),
        student_statistics: statistics(data.get("student_statistics")),
        additional_details: statistics(data.get("additional_details")),
        sources: string_list(data, "sources"),
    })
}

fn string_field(data: &Map<String, Value>, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Integers may arrive as numbers (possibly fractional) or as strings with
/// a leading integer such as "500+".
fn int_field(data: &Map<String, Value>, key: &str) -> i64 {
    match data.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Some(Value::String(s)) => leading_int(s),
        _ => 0,
    }
}

fn leading_int(s: &str) -> i64 {
    let s = s.trim();
    let end = s
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().unwrap_or_default()
}

fn string_list(data: &Map<String, Value>, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn fees(value: Option<&Value>) -> FeesInfo {
    let Some(data) = value.and_then(Value::as_object) else {
        return FeesInfo::default();
    };

    FeesInfo {
        ug_yearly_min: int_field(data, "ug_yearly_min"),
        ug_yearly_max: int_field(data, "ug_yearly_max"),
        pg_yearly_min: int_field(data, "pg_yearly_min"),
        pg_yearly_max: int_field(data, "pg_yearly_max"),
        phd_yearly_min: int_field(data, "phd_yearly_min"),
        phd_yearly_max: int_field(data, "phd_yearly_max"),
    }
}

fn gender_ratio(value: Option<&Value>) -> GenderRatio {
    let Some(data) = value.and_then(Value::as_object) else {
        return GenderRatio::default();
    };

    GenderRatio {
        male_percentage: int_field(data, "male_percentage"),
        female_percentage: int_field(data, "female_percentage"),
    }
}

/// Non-object items are skipped; the value keeps its JSON type.
fn statistics(value: Option<&Value>) -> Vec<StatisticItem> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|item| StatisticItem {
                    category: string_field(item, "category"),
                    value: item.get("value").cloned().unwrap_or(Value::Null),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamErrorKind;
    use serde_json::json;

    #[test]
    fn test_extract_plain_json() {
        assert_eq!(extract_json_text("  {\"a\": 1} \n"), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_fenced_json() {
        let text = "```json\n{\"college_name\": \"MIT\"}\n```";
        assert_eq!(extract_json_text(text), "{\"college_name\": \"MIT\"}");

        let bare = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json_text(bare), "{\"a\": 1}");
    }

    #[test]
    fn test_decode_full_record() {
        let value = json!({
            "college_name": "MIT",
            "country": "United States",
            "faculty_staff": 1000,
            "international_students": "3500+",
            "ug_programs": ["  B.S. Physics ", "", 42],
            "fees": {"ug_yearly_min": 55000.0, "ug_yearly_max": "60000"},
            "student_gender_ratio": {"male_percentage": 52, "female_percentage": 48},
            "student_statistics": [
                {"category": "Total students (2025)", "value": 11800},
                "not an object",
                {"category": "Placement rate", "value": "94%"}
            ]
        });

        let college = college_from_value(&value).unwrap();
        assert_eq!(college.college_name, "MIT");
        assert_eq!(college.faculty_staff, 1000);
        assert_eq!(college.international_students, 3500);
        assert_eq!(college.ug_programs, vec!["B.S. Physics".to_string()]);
        assert_eq!(college.fees.ug_yearly_min, 55000);
        assert_eq!(college.fees.ug_yearly_max, 60000);
        assert_eq!(college.student_gender_ratio.female_percentage, 48);
        assert_eq!(college.student_statistics.len(), 2);
        assert_eq!(college.student_statistics[0].value, json!(11800));
        assert_eq!(college.student_statistics[1].value, json!("94%"));
    }

    #[test]
    fn test_missing_fields_default() {
        let college = college_from_value(&json!({"college_name": "Alpha U"})).unwrap();
        assert_eq!(college.country, "");
        assert_eq!(college.faculty_staff, 0);
        assert!(college.sources.is_empty());
        assert_eq!(college.fees, FeesInfo::default());
    }

    #[test]
    fn test_non_object_is_malformed() {
        let err = college_from_value(&json!(["MIT"])).unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::MalformedResponse);
    }

    #[test]
    fn test_invalid_text_is_malformed() {
        let err = college_from_text("Sorry, I cannot help with that.").unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::MalformedResponse);
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("500"), 500);
        assert_eq!(leading_int("-12 units"), -12);
        assert_eq!(leading_int("about 5"), 0);
    }
}
