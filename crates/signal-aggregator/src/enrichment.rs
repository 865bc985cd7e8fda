//! Signal Enrichment Pipeline

use futures_util::future::join_all;

use breakdown_cache::BreakdownLookup;
use breakdown_core::{EnrichedSignal, Signal};

/// Attach cached breakdown data to each signal.
///
/// Output is 1:1 with input and in the same order. Signals without a symbol
/// and cache misses come back with `has_breakdown = false`; the original
/// signal fields are never touched.
pub async fn enrich(lookup: &dyn BreakdownLookup, signals: &[Signal]) -> Vec<EnrichedSignal> {
    let lookups = signals.iter().map(|signal| async move {
        if !signal.has_symbol() {
            return EnrichedSignal::unenriched(signal.clone());
        }
        match lookup.breakdown(&signal.symbol).await {
            Some(record) => EnrichedSignal::with_breakdown(signal.clone(), record),
            None => EnrichedSignal::unenriched(signal.clone()),
        }
    });

    let enriched = join_all(lookups).await;
    let hits = enriched.iter().filter(|s| s.has_breakdown).count();
    tracing::debug!("Enriched {}/{} signals with cached breakdowns", hits, enriched.len());
    enriched
}
