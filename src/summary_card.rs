//! [`SummaryCard`] — the per-(school, year) output of one fetch — and its
//! total decoder (§3, §4.A).

use std::collections::HashMap;

use bytes::Bytes;

use crate::indicator::{decode_indicator, Indicator};

/// All indicators returned for one (school, year) fetch.
#[derive(Clone, Debug, Default)]
pub struct SummaryCard {
    /// Raw response bytes, retained for diagnostics and replay. Never
    /// mutated after the first successful decode (invariant 4).
    pub raw_body: Bytes,
    /// Indicators in JSON array order (invariant: mirrors source order).
    pub indicators: Vec<Indicator>,
    /// Category name → index into `indicators` of the *last* indicator
    /// observed with that category during decode (invariant 5).
    pub category_index: HashMap<String, usize>,
    /// Set by the enrichment pass (§4.F); empty until then.
    pub school_name: String,
    /// Set by the enrichment pass (§4.F); empty until then.
    pub year: u32,
}

impl SummaryCard {
    /// A fresh, empty card — the state every output slot starts in before a
    /// worker writes its result.
    pub fn empty() -> Self {
        SummaryCard::default()
    }
}

/// Decodes a complete response body into a [`SummaryCard`]. Total: always
/// returns a card, even on malformed input (§4.A contract). Parse failures
/// leave `indicators` empty and are logged, never propagated as an error.
///
/// Callers are expected to have already rejected bodies that don't start
/// with `{` or `[` upstream (§4.D step 6); this function still handles that
/// case defensively since it is also exercised directly in tests.
pub fn decode_card(raw_body: Bytes) -> SummaryCard {
    let top_level: serde_json::Value = match serde_json::from_slice(&raw_body) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "failed to parse response body as JSON");
            return SummaryCard {
                raw_body,
                ..SummaryCard::default()
            };
        }
    };

    let entries: Vec<serde_json::Value> = match top_level {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Object(_) => vec![top_level],
        _ => {
            tracing::warn!("top-level JSON value was neither an array nor an object");
            Vec::new()
        }
    };

    let mut indicators = Vec::with_capacity(entries.len());
    let mut category_index = HashMap::new();

    for entry in entries {
        match entry {
            serde_json::Value::Object(obj) => {
                let indicator = decode_indicator(&obj);
                let category = indicator.indicator_category.to_string();
                indicators.push(indicator);
                category_index.insert(category, indicators.len() - 1);
            }
            _ => {
                tracing::warn!("skipping non-object entry in indicator array");
            }
        }
    }

    SummaryCard {
        raw_body,
        indicators,
        category_index,
        school_name: String::new(),
        year: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_array_body_decodes_to_empty_card() {
        let card = decode_card(Bytes::from_static(b"[]"));
        assert!(card.indicators.is_empty());
        assert_eq!(card.raw_body.as_ref(), b"[]");
    }

    #[test]
    fn single_object_top_level_is_treated_as_one_element_array() {
        let body = br#"{"indicatorId":1,"primary":{"cdsCode":"X","status":50.0,"count":12}, "secondary":null}"#;
        let card = decode_card(Bytes::from_static(body));
        assert_eq!(card.indicators.len(), 1);
        let indicator = &card.indicators[0];
        assert_eq!(indicator.indicator_category.as_str(), "CHRONIC_ABSENTEEISM");
        assert_eq!(indicator.status, 50.0);
        assert_eq!(indicator.count, 12);
        assert_eq!(indicator.change, 0.0);
        assert_eq!(indicator.red, 0);
    }

    #[test]
    fn non_object_entries_are_skipped() {
        let body = br#"[{"indicatorId":1,"primary":{}}, "garbage", 42, {"indicatorId":2,"primary":{}}]"#;
        let card = decode_card(Bytes::from_static(body));
        assert_eq!(card.indicators.len(), 2);
    }

    #[test]
    fn category_index_reflects_last_entry_with_duplicate_category() {
        let body = br#"[
            {"indicatorId":7,"primary":{"count":1}},
            {"indicatorId":7,"primary":{"count":2}}
        ]"#;
        let card = decode_card(Bytes::copy_from_slice(body));
        let idx = card.category_index["MATHEMATICS"];
        assert_eq!(card.indicators[idx].count, 2);
    }

    #[test]
    fn malformed_json_yields_empty_indicators_but_retains_raw_body() {
        let body = Bytes::from_static(b"<html>not json</html>");
        let card = decode_card(body.clone());
        assert!(card.indicators.is_empty());
        assert_eq!(card.raw_body, body);
    }

    #[test]
    fn decoding_twice_is_idempotent() {
        let body = br#"[{"indicatorId":3,"primary":{"cdsCode":"A","count":9}}]"#;
        let first = decode_card(Bytes::from_static(body));
        let second = decode_card(Bytes::from_static(body));
        assert_eq!(first.indicators, second.indicators);
    }
}
