//! Symbol types and lookup.

/// Default cap on candidates offered for an ambiguous query.
pub const MAX_CANDIDATES: usize = 10;

/// Normalize user input into an exchange symbol ("btc/usdt" -> "BTCUSDT").
pub fn normalize_symbol(input: &str) -> String {
    input.trim().replace('/', "").to_uppercase()
}

/// Outcome of resolving a user query against the symbol list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolLookup {
    /// Exactly one symbol matches.
    Exact(String),
    /// Several symbols match, few enough to offer as choices.
    Candidates(Vec<String>),
    /// Nothing matches.
    NotFound,
    /// Too many symbols match to be useful.
    TooMany(usize),
}

/// Resolve `query` against `symbols`.
///
/// An exact match wins over partial ones. Otherwise every symbol containing
/// the normalized query is a candidate, in listing order.
pub fn lookup_symbol(symbols: &[String], query: &str, max_candidates: usize) -> SymbolLookup {
    let query = normalize_symbol(query);
    if query.is_empty() {
        return SymbolLookup::NotFound;
    }

    if let Some(exact) = symbols.iter().find(|s| **s == query) {
        return SymbolLookup::Exact(exact.clone());
    }

    let mut matches: Vec<String> = symbols
        .iter()
        .filter(|s| s.contains(&query))
        .cloned()
        .collect();

    match matches.len() {
        0 => SymbolLookup::NotFound,
        1 => SymbolLookup::Exact(matches.remove(0)),
        n if n <= max_candidates => SymbolLookup::Candidates(matches),
        n => SymbolLookup::TooMany(n),
    }
}
