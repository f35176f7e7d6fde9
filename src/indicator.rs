//! The indicator record model (§3) and its defensive field-read helpers (§4.A rule 5).

use std::fmt;

use serde_json::Value;

/// One metric for one cohort, decoded from a `primary`/`secondary` pair in
/// the upstream JSON payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Indicator {
    pub indicator_id: u64,
    pub indicator_category: IndicatorCategory,
    pub cds_code: String,
    pub status: f64,
    pub change: f64,
    pub change_id: i64,
    pub status_id: i64,
    pub performance: i64,
    pub total_groups: u64,
    pub school_year_id: u64,
    pub red: i64,
    pub orange: i64,
    pub yellow: i64,
    pub green: i64,
    pub blue: i64,
    pub count: i64,
    pub student_group: String,
    pub is_private_data: bool,
    /// The `primary` object, retained verbatim for downstream diff/replay.
    pub primary_raw: Value,
    /// The `secondary` value, retained verbatim (may be null).
    pub secondary_raw: Value,
}

impl Indicator {
    /// An indicator with every field at its default, used when `primary` is
    /// present but not a JSON object (§4.A rule 7, open question preserved).
    fn bare(indicator_id: u64, indicator_category: IndicatorCategory, secondary_raw: Value) -> Self {
        Indicator {
            indicator_id,
            indicator_category,
            cds_code: String::new(),
            status: 0.0,
            change: 0.0,
            change_id: 0,
            status_id: 0,
            performance: 0,
            total_groups: 0,
            school_year_id: 0,
            red: 0,
            orange: 0,
            yellow: 0,
            green: 0,
            blue: 0,
            count: 0,
            student_group: String::new(),
            is_private_data: false,
            primary_raw: Value::Null,
            secondary_raw,
        }
    }
}

/// The closed indicator-id → category table from §6. Unknown ids classify
/// as [`IndicatorCategory::Unknown`], which `Display`s as `"UNKNOWN"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndicatorCategory {
    ChronicAbsenteeism,
    SuspensionRate,
    EnglishLearnerProgress,
    GraduationRate,
    CollegeCareerIndicator,
    ElaPointsAboveBelow,
    Mathematics,
    Science,
    /// `indicatorId` was not in the closed table (§3 invariant 3, §9 open
    /// question: the source does not distinguish "new but valid id" from
    /// "malformed id" — both classify here, silently, by design).
    Unknown,
}

impl IndicatorCategory {
    pub fn from_id(id: u64) -> Self {
        match id {
            1 => IndicatorCategory::ChronicAbsenteeism,
            2 => IndicatorCategory::SuspensionRate,
            3 => IndicatorCategory::EnglishLearnerProgress,
            4 => IndicatorCategory::GraduationRate,
            5 => IndicatorCategory::CollegeCareerIndicator,
            6 => IndicatorCategory::ElaPointsAboveBelow,
            7 => IndicatorCategory::Mathematics,
            8 => IndicatorCategory::Science,
            _ => IndicatorCategory::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorCategory::ChronicAbsenteeism => "CHRONIC_ABSENTEEISM",
            IndicatorCategory::SuspensionRate => "SUSPENSION_RATE",
            IndicatorCategory::EnglishLearnerProgress => "ENGLISH_LEARNER_PROGRESS",
            IndicatorCategory::GraduationRate => "GRADUATION_RATE",
            IndicatorCategory::CollegeCareerIndicator => "COLLEGE_CAREER_INDICATOR",
            IndicatorCategory::ElaPointsAboveBelow => "ELA_POINTS_ABOVE_BELOW",
            IndicatorCategory::Mathematics => "MATHEMATICS",
            IndicatorCategory::Science => "SCIENCE",
            IndicatorCategory::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for IndicatorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads `primary.indicatorId` (actually the top-level `indicatorId`) as an
/// unsigned integer, defaulting to 0 on any mismatch (§4.A rule 5).
fn read_u64(obj: &serde_json::Map<String, Value>, key: &str) -> u64 {
    match obj.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

fn read_i64(obj: &serde_json::Map<String, Value>, key: &str) -> i64 {
    match obj.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        _ => 0,
    }
}

fn read_f64(obj: &serde_json::Map<String, Value>, key: &str) -> f64 {
    match obj.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn read_bool(obj: &serde_json::Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

/// Reads a string field, stringifying non-string JSON values via
/// serialization rather than coercing numbers to strings by formatting
/// (§4.A rule 5: "string field accepting non-string → stringify via JSON
/// serialization of the value").
fn read_string(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Decodes one entry of the top-level JSON array into an [`Indicator`].
///
/// `entry` must be a JSON object (callers skip non-object entries per §4.A
/// rule 3 before calling this).
pub fn decode_indicator(entry: &serde_json::Map<String, Value>) -> Indicator {
    let indicator_id = read_u64(entry, "indicatorId");
    let category = IndicatorCategory::from_id(indicator_id);
    let secondary_raw = entry.get("secondary").cloned().unwrap_or(Value::Null);

    match entry.get("primary") {
        Some(Value::Object(primary)) => Indicator {
            indicator_id,
            indicator_category: category,
            cds_code: read_string(primary, "cdsCode"),
            status: read_f64(primary, "status"),
            change: read_f64(primary, "change"),
            change_id: read_i64(primary, "changeId"),
            status_id: read_i64(primary, "statusId"),
            performance: read_i64(primary, "performance"),
            total_groups: read_u64(primary, "totalGroups"),
            school_year_id: read_u64(primary, "schoolYearId"),
            red: read_i64(primary, "red"),
            orange: read_i64(primary, "orange"),
            yellow: read_i64(primary, "yellow"),
            green: read_i64(primary, "green"),
            blue: read_i64(primary, "blue"),
            count: read_i64(primary, "count"),
            student_group: read_string(primary, "studentGroup"),
            is_private_data: read_bool(primary, "isPrivateData"),
            primary_raw: Value::Object(primary.clone()),
            secondary_raw,
        },
        Some(Value::Null) | None => {
            tracing::warn!(indicator_id, "entry missing 'primary' object");
            Indicator::bare(indicator_id, category, secondary_raw)
        }
        Some(_) => {
            tracing::warn!(indicator_id, "'primary' present but not an object");
            Indicator::bare(indicator_id, category, secondary_raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> serde_json::Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn unknown_id_maps_to_unknown_category() {
        assert_eq!(IndicatorCategory::from_id(99), IndicatorCategory::Unknown);
        assert_eq!(IndicatorCategory::from_id(99).as_str(), "UNKNOWN");
    }

    #[test]
    fn known_ids_map_to_documented_names() {
        assert_eq!(IndicatorCategory::from_id(1).as_str(), "CHRONIC_ABSENTEEISM");
        assert_eq!(IndicatorCategory::from_id(7).as_str(), "MATHEMATICS");
        assert_eq!(IndicatorCategory::from_id(8).as_str(), "SCIENCE");
    }

    #[test]
    fn null_numeric_field_defaults() {
        let entry = obj(json!({
            "indicatorId": 7,
            "primary": {"status": null, "count": null, "red": 5},
            "secondary": null,
        }));
        let indicator = decode_indicator(&entry);
        assert_eq!(indicator.status, 0.0);
        assert_eq!(indicator.count, 0);
        assert_eq!(indicator.red, 5);
        assert_eq!(indicator.indicator_category.as_str(), "MATHEMATICS");
    }

    #[test]
    fn number_stringifies_into_string_field() {
        let entry = obj(json!({
            "indicatorId": 1,
            "primary": {"cdsCode": 12345},
        }));
        let indicator = decode_indicator(&entry);
        assert_eq!(indicator.cds_code, "12345");
    }

    #[test]
    fn primary_present_but_not_object_yields_bare_indicator() {
        let entry = obj(json!({
            "indicatorId": 4,
            "primary": "not-an-object",
        }));
        let indicator = decode_indicator(&entry);
        assert_eq!(indicator.indicator_id, 4);
        assert_eq!(indicator.indicator_category.as_str(), "GRADUATION_RATE");
        assert_eq!(indicator.cds_code, "");
        assert_eq!(indicator.count, 0);
    }

    #[test]
    fn missing_primary_yields_bare_indicator() {
        let entry = obj(json!({"indicatorId": 2}));
        let indicator = decode_indicator(&entry);
        assert_eq!(indicator.indicator_id, 2);
        assert_eq!(indicator.indicator_category.as_str(), "SUSPENSION_RATE");
    }
}
