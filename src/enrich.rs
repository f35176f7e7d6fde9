//! Metadata enrichment pass (§4.F): stamps `schoolName`/`year` onto output
//! cards from an externally supplied `(cdsCode, schoolYearId) -> (name,
//! year)` table.

use std::collections::HashMap;
use std::sync::Arc;

use crate::summary_card::SummaryCard;

/// Lookup key: a card's CDS code paired with the upstream `schoolYearId`.
pub type MetaKey = (String, u64);
/// Lookup value: the human-readable school name and reporting year.
pub type MetaValue = (String, u32);
/// The externally supplied metadata table enrichment stamps from.
pub type Meta = HashMap<MetaKey, MetaValue>;

/// Partitions `cards` into `available_parallelism` contiguous, owned chunks
/// and stamps each card whose first indicator's `(cdsCode, schoolYearId)` is
/// found in `meta`. Each chunk is handed to its own task by value and
/// reassembled in order afterward, so there is no shared mutable state
/// between tasks at all — not even a per-slot lock, since no two tasks ever
/// see the same card.
pub async fn enrich(mut cards: Vec<SummaryCard>, meta: Arc<Meta>) -> Vec<SummaryCard> {
    let total = cards.len();
    if total == 0 {
        return cards;
    }

    let parallelism = num_cpus::get().max(1).min(total);
    let chunk_size = total.div_ceil(parallelism);

    let mut chunks = Vec::with_capacity(parallelism);
    while !cards.is_empty() {
        let take = chunk_size.min(cards.len());
        chunks.push(cards.drain(..take).collect::<Vec<_>>());
    }

    let mut handles = Vec::with_capacity(parallelism);
    for chunk in chunks {
        let meta = meta.clone();
        handles.push(tokio::spawn(async move { enrich_chunk(chunk, &meta) }));
    }

    let mut result = Vec::with_capacity(total);
    for handle in handles {
        match handle.await {
            Ok(chunk) => result.extend(chunk),
            Err(err) => tracing::error!(error = %err, "enrichment task panicked"),
        }
    }
    result
}

fn enrich_chunk(mut chunk: Vec<SummaryCard>, meta: &Meta) -> Vec<SummaryCard> {
    for card in &mut chunk {
        let Some(first) = card.indicators.first() else {
            continue;
        };

        let key = (first.cds_code.clone(), first.school_year_id);
        if let Some((school_name, year)) = meta.get(&key) {
            card.school_name = school_name.clone();
            card.year = *year;
        }
    }
    chunk
}
