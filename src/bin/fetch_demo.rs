//! Demonstration binary wiring the trivial collaborator stand-ins to the
//! fetch coordinator. Not part of the test surface — a worked example of
//! how an application assembles roster lookup, URL building, and the core
//! fetch engine.

use std::sync::Arc;

use ca_dashboard_fetch::collaborators::{
    ExactSchoolMatcher, RosterEntry, RosterSource, SchoolMatcher, StaticRosterSource,
    TemplateUrlBuilder, UrlBuilder,
};
use ca_dashboard_fetch::enrich::Meta;
use ca_dashboard_fetch::{FetchCoordinator, FetchOptions};

/// The closed year → internal year-id table (§6). A real deployment's
/// `UrlBuilder` collaborator owns this mapping; it is duplicated here only
/// because this binary is a worked example, not the core.
fn year_id(year: u32) -> Option<u64> {
    match year {
        2017 => Some(3),
        2018 => Some(4),
        2019 => Some(5),
        2020 => Some(6),
        2021 => Some(7),
        2022 => Some(8),
        2023 => Some(9),
        2024 => Some(10),
        2025 => Some(11),
        _ => None,
    }
}

#[tokio::main]
async fn main() {
    let roster = StaticRosterSource::new(vec![
        RosterEntry {
            cds_code: "01611190130229".to_string(),
            school_name: "Lincoln High".to_string(),
        },
        RosterEntry {
            cds_code: "01611190130237".to_string(),
            school_name: "Washington Elementary".to_string(),
        },
    ]);
    let schools = roster.schools().await.expect("roster lookup is infallible");

    let matcher = ExactSchoolMatcher;
    let Some(school) = matcher.resolve("Lincoln High", &schools) else {
        eprintln!("school not found in roster");
        return;
    };

    let url_builder = TemplateUrlBuilder::new(
        "https://api.caschooldashboard.org/indicators"
            .parse()
            .expect("base URL is valid"),
    );
    let year = 2023;
    let Some(url) = url_builder.build(&school.cds_code, year) else {
        eprintln!("could not build a fetch URL for {}", school.cds_code);
        return;
    };
    let Some(year_id) = year_id(year) else {
        eprintln!("no known year id for {year}");
        return;
    };

    let mut coordinator = FetchCoordinator::new(FetchOptions::default());
    coordinator.load_urls(vec![url.to_string()]);

    // Keyed by the server's `schoolYearId` (the response's own field,
    // looked up in enrich.rs), not the human year the URL was built from.
    let mut meta = Meta::new();
    meta.insert((school.cds_code.clone(), year_id), (school.school_name.clone(), year));

    match coordinator.run_with_enrichment(Arc::new(meta)).await {
        Ok(cards) => {
            for card in cards {
                println!(
                    "{} ({}): {} indicators",
                    card.school_name,
                    card.year,
                    card.indicators.len()
                );
            }
        }
        Err(err) => eprintln!("fetch failed: {err}"),
    }
}
