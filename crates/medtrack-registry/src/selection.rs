//! Choosing which symbols to track.

use crate::client::ExchangeInfoClient;
use medtrack_core::Symbol;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use tracing::{info, warn};

/// How the tracked set is chosen at startup.
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    /// Quote asset that discovered pairs must trade against.
    pub quote_asset: String,
    /// Upper bound on discovered or default pairs.
    pub max_pairs: usize,
    /// Explicit pairs; when non-empty, discovery is skipped.
    pub pairs: Vec<String>,
    /// Fallback pairs used when discovery fails.
    pub defaults: Vec<String>,
}

/// Shuffle `candidates` and keep at most `max`.
pub fn select_symbols(mut candidates: Vec<Symbol>, max: usize) -> Vec<Symbol> {
    candidates.shuffle(&mut rand::rng());
    candidates.truncate(max);
    candidates
}

/// Parse, normalize and de-duplicate raw pair names, keeping first occurrence.
fn parse_pairs(raw: &[String]) -> Vec<Symbol> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|p| match Symbol::parse(p.trim()) {
            Ok(symbol) => Some(symbol),
            Err(e) => {
                warn!(pair = %p, error = %e, "Ignoring invalid configured pair");
                None
            }
        })
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Resolve the tracked set.
///
/// Explicit pairs win; otherwise discovery through `client`, falling back to
/// the first `max_pairs` defaults on any failure.
pub async fn resolve_symbols(client: &ExchangeInfoClient, policy: &SelectionPolicy) -> Vec<Symbol> {
    let explicit = parse_pairs(&policy.pairs);
    if !explicit.is_empty() {
        info!(pairs = ?explicit, "Using configured pairs");
        return explicit;
    }

    let selected = match client.fetch_symbols(&policy.quote_asset).await {
        Ok(candidates) => select_symbols(candidates, policy.max_pairs),
        Err(e) => {
            warn!(error = %e, "Failed to fetch pairs, using defaults");
            let mut defaults = parse_pairs(&policy.defaults);
            defaults.truncate(policy.max_pairs);
            defaults
        }
    };

    info!(count = selected.len(), pairs = ?selected, "Selected trading pairs");
    selected
}
