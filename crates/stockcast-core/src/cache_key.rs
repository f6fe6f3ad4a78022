use crate::HistoryRequest;

/// Namespace prefix shared by every history cache entry.
pub const KEY_PREFIX: &str = "yf_data:";

/// Derives the cache key for a history request.
///
/// The key is `yf_data:` followed by the hex BLAKE3 digest of
/// `symbol:start:end:interval`. Inputs are used verbatim: no casing or
/// whitespace normalization happens here.
pub fn derive_key(symbol: &str, start_unix: i64, end_unix: i64, interval: &str) -> String {
    let material = format!("{symbol}:{start_unix}:{end_unix}:{interval}");
    let digest = blake3::hash(material.as_bytes());
    format!("{KEY_PREFIX}{}", digest.to_hex())
}

/// Derives the cache key for `request`.
pub fn key_for(request: &HistoryRequest) -> String {
    derive_key(
        request.symbol.as_str(),
        request.start,
        request.end,
        request.interval.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Interval, Symbol};

    #[test]
    fn identical_inputs_give_identical_keys() {
        let first = derive_key("AAPL", 1_640_995_200, 1_672_531_200, "1d");
        let second = derive_key("AAPL", 1_640_995_200, 1_672_531_200, "1d");
        assert_eq!(first, second);
        assert!(first.starts_with(KEY_PREFIX));
        assert_eq!(first.len(), KEY_PREFIX.len() + 64);
    }

    #[test]
    fn interval_changes_the_key() {
        let daily = derive_key("AAPL", 1_640_995_200, 1_672_531_200, "1d");
        let weekly = derive_key("AAPL", 1_640_995_200, 1_672_531_200, "1wk");
        assert_ne!(daily, weekly);
    }

    #[test]
    fn symbol_casing_is_significant() {
        assert_ne!(derive_key("aapl", 0, 1, "1d"), derive_key("AAPL", 0, 1, "1d"));
    }

    #[test]
    fn key_for_matches_derive_key() {
        let request = HistoryRequest::new(
            Symbol::parse("MSFT").expect("valid symbol"),
            10,
            20,
            Interval::OneWeek,
        );
        assert_eq!(key_for(&request), derive_key("MSFT", 10, 20, "1wk"));
    }
}
