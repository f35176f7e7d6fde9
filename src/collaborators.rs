//! Collaborator seams (§4.K): stable traits the core depends on without
//! implementing. Roster ingestion, fuzzy school matching, and URL templating
//! all live outside the fetch engine; these traits are the boundary.

use url::Url;

/// One roster row: a school's identity as known to an external source
/// (typically a CSV extract), independent of any single year's fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterEntry {
    pub cds_code: String,
    pub school_name: String,
}

/// Supplies the roster of known schools. CSV parsing, network calls, or any
/// other ingestion mechanism lives entirely in the implementation; the core
/// only ever sees the resulting list.
#[async_trait::async_trait]
pub trait RosterSource: Send + Sync + 'static {
    type Error: std::error::Error + std::fmt::Display;

    async fn schools(&self) -> Result<Vec<RosterEntry>, Self::Error>;
}

/// Resolves a free-text school name query against a roster. Exact,
/// substring, and fuzzy (edit-distance) matching strategies all live in the
/// implementation.
pub trait SchoolMatcher: Send + Sync + 'static {
    fn resolve(&self, query: &str, roster: &[RosterEntry]) -> Option<RosterEntry>;
}

/// Builds the per-(school, year) fetch URL. The year-to-internal-id table
/// and the upstream endpoint template both live in the implementation; the
/// core only ever receives finished URLs through [`crate::intake::load_urls`].
pub trait UrlBuilder: Send + Sync + 'static {
    fn build(&self, cds_code: &str, year: u32) -> Option<Url>;
}

/// A roster source backed by an in-memory list, standing in for whatever CSV
/// or network-backed source a real deployment would supply. Used by the
/// demonstration binary and by tests that need sample roster data.
pub struct StaticRosterSource {
    entries: Vec<RosterEntry>,
}

impl StaticRosterSource {
    pub fn new(entries: Vec<RosterEntry>) -> Self {
        StaticRosterSource { entries }
    }
}

#[async_trait::async_trait]
impl RosterSource for StaticRosterSource {
    type Error = std::convert::Infallible;

    async fn schools(&self) -> Result<Vec<RosterEntry>, Self::Error> {
        Ok(self.entries.clone())
    }
}

/// Matches a query only against an exact, case-insensitive CDS code or
/// school name. No substring or fuzzy fallback — a trivial stand-in, not a
/// matching engine.
pub struct ExactSchoolMatcher;

impl SchoolMatcher for ExactSchoolMatcher {
    fn resolve(&self, query: &str, roster: &[RosterEntry]) -> Option<RosterEntry> {
        roster
            .iter()
            .find(|entry| {
                entry.cds_code.eq_ignore_ascii_case(query) || entry.school_name.eq_ignore_ascii_case(query)
            })
            .cloned()
    }
}

/// Templates the fetch URL against a single fixed base, with `cds_code` and
/// `year` as query parameters. A trivial stand-in for whatever
/// year-to-internal-id table a real deployment maintains.
pub struct TemplateUrlBuilder {
    base_url: Url,
}

impl TemplateUrlBuilder {
    pub fn new(base_url: Url) -> Self {
        TemplateUrlBuilder { base_url }
    }
}

impl UrlBuilder for TemplateUrlBuilder {
    fn build(&self, cds_code: &str, year: u32) -> Option<Url> {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("cdsCode", cds_code)
            .append_pair("year", &year.to_string());
        Some(url)
    }
}
