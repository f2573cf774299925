//! College Record Model
//!
//! The domain record served by every endpoint and pushed to live subscribers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == College ==
/// Statistics for a single college.
///
/// Identity is the college name compared case-insensitively. Records are
/// treated as immutable once fetched; a refresh produces a new value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct College {
    pub college_name: String,
    pub country: String,
    pub about: String,
    pub location: String,
    pub summary: String,
    pub ug_programs: Vec<String>,
    pub pg_programs: Vec<String>,
    pub phd_programs: Vec<String>,
    pub fees: FeesInfo,
    pub scholarships: Vec<String>,
    pub student_gender_ratio: GenderRatio,
    pub faculty_staff: i64,
    pub international_students: i64,
    pub global_ranking: String,
    pub departments: Vec<String>,
    pub student_statistics: Vec<StatisticItem>,
    pub additional_details: Vec<StatisticItem>,
    pub sources: Vec<String>,
}

/// Yearly fee ranges per programme level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeesInfo {
    pub ug_yearly_min: i64,
    pub ug_yearly_max: i64,
    pub pg_yearly_min: i64,
    pub pg_yearly_max: i64,
    pub phd_yearly_min: i64,
    pub phd_yearly_max: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenderRatio {
    pub male_percentage: i64,
    pub female_percentage: i64,
}

// == Statistic Item ==
/// A labelled value. Values keep whatever JSON type the source produced
/// (numbers for counts, strings for rankings and salaries).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticItem {
    pub category: String,
    pub value: Value,
}

impl StatisticItem {
    pub fn new(category: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            category: category.into(),
            value: value.into(),
        }
    }
}

impl College {
    /// Creates a record with just a name and country set.
    pub fn named(name: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            college_name: name.into(),
            country: country.into(),
            ..Self::default()
        }
    }

    /// Builder-style helper for attaching student statistics.
    pub fn with_statistics(mut self, statistics: Vec<StatisticItem>) -> Self {
        self.student_statistics = statistics;
        self
    }

    // == Statistics Changed ==
    /// Returns true when the student statistics of `other` differ from ours.
    ///
    /// The comparison is positional: a length mismatch, or a different
    /// category or value at any index, counts as a change. Reordering the
    /// same items is therefore reported as a change.
    pub fn statistics_changed(&self, other: &College) -> bool {
        if self.student_statistics.len() != other.student_statistics.len() {
            return true;
        }

        self.student_statistics
            .iter()
            .zip(&other.student_statistics)
            .any(|(old, new)| {
                old.category != new.category || !same_value(&old.value, &new.value)
            })
    }
}

/// Structural equality, except that numbers compare by numeric value so an
/// integer and the equal float (`100` and `100.0`) match.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}
