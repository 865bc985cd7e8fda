//! Symbol normalization
//!
//! Every cache key, history buffer and ranking entry uses the exchange-format
//! symbol (`BTCUSDT`). User input like `btc/usdt` or `BTC-USDT` is folded onto
//! that form here; nothing downstream normalizes again.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical exchange-format symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Normalize arbitrary input. Total: malformed input still yields a symbol,
    /// which simply misses in the cache.
    pub fn new(raw: &str) -> Self {
        Symbol(normalize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(raw: &str) -> Self {
        Symbol::new(raw)
    }
}

impl From<String> for Symbol {
    fn from(raw: String) -> Self {
        Symbol::new(&raw)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strip separators and whitespace, then upper-case.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '/' | '-') && !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_separators() {
        assert_eq!(normalize("btc/usdt"), "BTCUSDT");
        assert_eq!(normalize("ETH-USDT"), "ETHUSDT");
        assert_eq!(normalize(" sol / usdt "), "SOLUSDT");
    }

    #[test]
    fn test_canonical_input_unchanged() {
        assert_eq!(normalize("BTCUSDT"), "BTCUSDT");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "btc/usdt",
            "Eth-Usdt",
            "",
            "--//--",
            "ß-straße",
            "1000pepe/usdt",
            "  weird\tinput\n",
            "ǅ/ǆ",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_garbage_maps_to_some_symbol() {
        assert_eq!(normalize("///"), "");
        assert_eq!(Symbol::new("a-b-c").as_str(), "ABC");
    }
}
