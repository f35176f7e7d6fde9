//! URL intake and validation (§4.G).

use crate::error::IntakeError;

/// The three schemes the upstream API is ever reachable over.
const ACCEPTED_SCHEMES: [&str; 3] = ["http://", "https://", "ftp://"];

/// Validates one candidate URL, returning the specific [`IntakeError`] that
/// rejects it, if any.
fn validate(candidate: &str) -> Result<(), IntakeError> {
    if candidate.is_empty() {
        return Err(IntakeError::Empty);
    }

    if !ACCEPTED_SCHEMES.iter().any(|scheme| candidate.starts_with(scheme)) {
        return Err(IntakeError::UnsupportedScheme(candidate.to_string()));
    }

    Ok(())
}

/// Filters `candidates`, appending survivors to `accepted` (move semantics).
/// Each rejection is classified via [`IntakeError`] and logged through it;
/// callers only see the aggregate `bool` per the §4.G/§6 interface contract.
/// Returns `true` iff at least one URL survived.
pub fn load_urls(candidates: Vec<String>, accepted: &mut Vec<String>) -> bool {
    let mut any_accepted = false;

    for candidate in candidates {
        match validate(&candidate) {
            Ok(()) => {
                any_accepted = true;
                accepted.push(candidate);
            }
            Err(err) => tracing::warn!(error = %err, "rejecting candidate URL during intake"),
        }
    }

    any_accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_https_and_ftp() {
        let mut accepted = Vec::new();
        let ok = load_urls(
            vec![
                "http://a.example/x".to_string(),
                "https://b.example/y".to_string(),
                "ftp://c.example/z".to_string(),
            ],
            &mut accepted,
        );
        assert!(ok);
        assert_eq!(accepted.len(), 3);
    }

    #[test]
    fn rejects_empty_and_unsupported_scheme() {
        let mut accepted = Vec::new();
        let ok = load_urls(
            vec![
                "".to_string(),
                "ws://not-supported".to_string(),
                "not-a-url".to_string(),
            ],
            &mut accepted,
        );
        assert!(!ok);
        assert!(accepted.is_empty());
    }

    #[test]
    fn survivors_are_appended_not_replaced() {
        let mut accepted = vec!["http://existing.example".to_string()];
        let ok = load_urls(vec!["https://new.example".to_string()], &mut accepted);
        assert!(ok);
        assert_eq!(accepted.len(), 2);
    }

    #[test]
    fn returns_false_when_nothing_new_is_accepted_even_if_list_already_has_entries() {
        let mut accepted = vec!["http://existing.example".to_string()];
        let ok = load_urls(vec!["bad-scheme".to_string()], &mut accepted);
        assert!(!ok);
        assert_eq!(accepted.len(), 1);
    }
}
