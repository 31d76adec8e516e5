//! Small helpers shared by the engine and the binary.
//!
//! IMPORTANT:
//! - No source-specific logic should live here.

/// Returns the current Unix timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Trims surrounding whitespace and collapses inner runs of
/// whitespace into single spaces.
///
/// Examples:
/// - "  Quantum   mechanics " -> "Quantum mechanics"
/// - "\tCosmology\n"          -> "Cosmology"
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_query_collapses_whitespace() {
        assert_eq!(normalize_query("  Quantum   mechanics "), "Quantum mechanics");
        assert_eq!(normalize_query("\tCosmology\n"), "Cosmology");
        assert_eq!(normalize_query("   "), "");
    }

    #[test]
    fn now_ms_is_after_2020() {
        assert!(now_ms() > 1_577_836_800_000);
    }
}
