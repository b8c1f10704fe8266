//! Identifier extraction from heterogeneous response bodies.
//!
//! Each family carries an ordered set of patterns covering the forms the
//! sources emit: bare prefixed digits, spaced/slashed variants,
//! path-embedded and query-parameter-embedded forms. All matches are
//! unioned, normalized to uppercase prefix + digits, validated, and
//! deduplicated. Zero matches is a valid empty result, not an error —
//! extraction stays independent of any specific source's HTML structure.

use std::collections::BTreeSet;

use regex::Regex;

use crate::types::identifier::IdentifierFamily;

/// WO publication years the sources can plausibly emit.
const WO_YEAR_RANGE: std::ops::RangeInclusive<u32> = 1990..=2025;

/// BR serial length bounds.
const BR_DIGITS_RANGE: std::ops::RangeInclusive<usize> = 7..=12;

/// Ordered, composable matchers for one identifier family.
pub struct PatternSet {
    family: IdentifierFamily,
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Build the reference pattern set for a family.
    pub fn for_family(family: IdentifierFamily) -> Self {
        let sources: &[&str] = match family {
            IdentifierFamily::Wo => &[
                // Bare and spaced/slashed: WO2011123456, WO 2016/162604
                r"(?i)WO[\s/\-]?(\d{4})[\s/\-]?(\d{6})",
                // Short serial variant: WO2011/12345 (boundary keeps it
                // from shadowing six-digit serials)
                r"(?i)WO[\s/\-]?(\d{4})[\s/\-]?(\d{5})\b",
                // Path-embedded: /patent/WO2016162604
                r"(?i)/patent/WO(\d{4})(\d{6})",
                // Query-parameter form: patent_id=WO2011123456
                r"(?i)patent[_\-]?id[=:]WO(\d{4})(\d{6})",
                // publication_number=WO2011123456
                r"(?i)publication[_\-]?number[=:]WO(\d{4})(\d{6})",
            ],
            IdentifierFamily::Br => &[
                r"(?i)BR[\s/\-]?(\d{7,12})",
                r"(?i)/patent/BR(\d{7,12})",
                r"(?i)patent[_\-]?id[=:]BR(\d{7,12})",
                r"(?i)BR\s*[A-Z]?\s*(\d{7,12})",
                r"(?i)publication[_\-]?number[=:]BR(\d{7,12})",
            ],
        };
        Self {
            family,
            patterns: sources
                .iter()
                .map(|p| Regex::new(p).expect("static pattern is valid"))
                .collect(),
        }
    }

    pub fn family(&self) -> IdentifierFamily {
        self.family
    }

    /// Apply every pattern against the body, union the matches, and
    /// return the canonical deduplicated set. Idempotent and
    /// order-independent.
    pub fn extract(&self, body: &str) -> BTreeSet<String> {
        let mut identifiers = BTreeSet::new();
        for pattern in &self.patterns {
            for captures in pattern.captures_iter(body) {
                if let Some(id) = self.normalize(&captures) {
                    identifiers.insert(id);
                }
            }
        }
        identifiers
    }

    fn normalize(&self, captures: &regex::Captures<'_>) -> Option<String> {
        match self.family {
            IdentifierFamily::Wo => {
                let year = captures.get(1)?.as_str();
                let serial = captures.get(2)?.as_str();
                if !WO_YEAR_RANGE.contains(&year.parse::<u32>().ok()?) {
                    return None;
                }
                // Short serials are zero-padded to six digits
                Some(format!("WO{year}{serial:0>6}"))
            }
            IdentifierFamily::Br => {
                let digits = captures.get(1)?.as_str();
                if !BR_DIGITS_RANGE.contains(&digits.len()) {
                    return None;
                }
                Some(format!("BR{digits}"))
            }
        }
    }
}

/// Applies every known family's pattern set to one body.
pub struct Extractor {
    families: Vec<PatternSet>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            families: IdentifierFamily::ALL
                .iter()
                .map(|f| PatternSet::for_family(*f))
                .collect(),
        }
    }

    /// Extract identifiers of a single family.
    pub fn extract(&self, body: &str, family: IdentifierFamily) -> BTreeSet<String> {
        self.families
            .iter()
            .find(|set| set.family() == family)
            .map(|set| set.extract(body))
            .unwrap_or_default()
    }

    /// Extract identifiers across all families, merged into one set.
    pub fn extract_all(&self, body: &str) -> BTreeSet<String> {
        let mut identifiers = BTreeSet::new();
        for set in &self.families {
            identifiers.extend(set.extract(body));
        }
        identifiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_spaced_and_slashed_wo_forms() {
        let extractor = Extractor::new();
        for body in [
            "WO2016162604",
            "WO 2016/162604",
            "WO-2016-162604",
            "/patent/WO2016162604",
            "publication_number=WO2016162604",
        ] {
            let ids = extractor.extract(body, IdentifierFamily::Wo);
            assert_eq!(
                ids.iter().collect::<Vec<_>>(),
                ["WO2016162604"],
                "body: {body}"
            );
        }
    }

    #[test]
    fn overlapping_patterns_deduplicate() {
        let extractor = Extractor::new();
        let body = "see WO2011123456 and publication_number=WO2011123456";
        let ids = extractor.extract(body, IdentifierFamily::Wo);
        assert_eq!(ids.len(), 1);
        assert!(ids.contains("WO2011123456"));
    }

    #[test]
    fn wo_year_out_of_range_is_rejected() {
        let extractor = Extractor::new();
        assert!(extractor
            .extract("WO1889123456", IdentifierFamily::Wo)
            .is_empty());
        assert!(extractor
            .extract("WO2099123456", IdentifierFamily::Wo)
            .is_empty());
    }

    #[test]
    fn short_wo_serial_is_zero_padded() {
        let extractor = Extractor::new();
        let ids = extractor.extract("WO2011/12345 cited", IdentifierFamily::Wo);
        assert_eq!(ids.iter().collect::<Vec<_>>(), ["WO2011012345"]);
    }

    #[test]
    fn br_numbers_validate_digit_length() {
        let extractor = Extractor::new();
        let ids = extractor.extract(
            "BR112012027681 and BR 1234567 but not BR123456",
            IdentifierFamily::Br,
        );
        assert!(ids.contains("BR112012027681"));
        assert!(ids.contains("BR1234567"));
        assert!(!ids.iter().any(|id| id == "BR123456"));
    }

    #[test]
    fn zero_matches_is_a_valid_empty_result() {
        let extractor = Extractor::new();
        assert!(extractor.extract_all("<html>nothing here</html>").is_empty());
    }

    #[test]
    fn extraction_is_idempotent() {
        let extractor = Extractor::new();
        let body = "WO 2011/051540 then /patent/WO2011051540 and BR112012027681";
        let first = extractor.extract_all(body);
        let second = extractor.extract_all(body);
        assert_eq!(first, second);
        assert_eq!(
            first.iter().collect::<Vec<_>>(),
            ["BR112012027681", "WO2011051540"]
        );
    }

    #[test]
    fn mixed_families_merge_into_one_set() {
        let extractor = Extractor::new();
        let ids =
            extractor.extract_all("Espacenet lists WO 2011/051540 and family BR112012027681");
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("WO2011051540"));
        assert!(ids.contains("BR112012027681"));
    }
}
