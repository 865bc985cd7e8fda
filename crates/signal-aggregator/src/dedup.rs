use std::collections::HashMap;

use breakdown_core::{normalize, Signal};

/// Keep the highest-scoring entry per symbol, then sort by score descending.
///
/// Symbols are compared in normalized form, so `BTC/USDT` and `BTCUSDT` from
/// two sources collapse. On equal scores the first-seen entry is kept.
/// Entries without a symbol cannot be matched and are kept as they are.
/// A NaN score ranks below every real score.
pub fn dedup_by_symbol(signals: Vec<Signal>) -> Vec<Signal> {
    let mut kept: Vec<Signal> = Vec::with_capacity(signals.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for signal in signals {
        let key = normalize(&signal.symbol);
        if key.is_empty() {
            kept.push(signal);
            continue;
        }
        match index.get(&key) {
            Some(&pos) => {
                if rank(&signal) > rank(&kept[pos]) {
                    kept[pos] = signal;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(signal);
            }
        }
    }

    kept.sort_by(|a, b| rank(b).total_cmp(&rank(a)));
    kept
}

fn rank(signal: &Signal) -> f64 {
    if signal.score.is_nan() {
        f64::NEG_INFINITY
    } else {
        signal.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_max_score_per_symbol() {
        let out = dedup_by_symbol(vec![
            Signal::new("XUSDT", 40.0),
            Signal::new("YUSDT", 55.0),
            Signal::new("XUSDT", 70.0),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].symbol, "XUSDT");
        assert_eq!(out[0].score, 70.0);
        assert_eq!(out[1].symbol, "YUSDT");
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let out = dedup_by_symbol(vec![
            Signal::new("BTCUSDT", 60.0).with_change(1.0),
            Signal::new("BTC/USDT", 60.0).with_change(-1.0),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].change_24h, Some(1.0));
        assert_eq!(out[0].symbol, "BTCUSDT");
    }

    #[test]
    fn test_sorted_descending() {
        let out = dedup_by_symbol(vec![
            Signal::new("AUSDT", 10.0),
            Signal::new("BUSDT", 90.0),
            Signal::new("CUSDT", 50.0),
        ]);
        let scores: Vec<f64> = out.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![90.0, 50.0, 10.0]);
    }

    #[test]
    fn test_nan_scores_sort_last_and_lose_dedup() {
        let out = dedup_by_symbol(vec![
            Signal::new("AUSDT", f64::NAN),
            Signal::new("BUSDT", 40.0),
            Signal::new("A-USDT", 20.0),
            Signal::new("CUSDT", f64::NAN),
            Signal::new("DUSDT", 75.0),
        ]);
        let symbols: Vec<&str> = out.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["DUSDT", "BUSDT", "A-USDT", "CUSDT"]);
        assert!(out[3].score.is_nan());
    }

    #[test]
    fn test_symbolless_entries_are_not_merged() {
        let out = dedup_by_symbol(vec![Signal::new("", 10.0), Signal::new("", 20.0)]);
        assert_eq!(out.len(), 2);
    }
}
