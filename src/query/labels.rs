//! # Label Filters
//!
//! `k1=v1,k2=v2` strings matched against the target maps of a deployment.
//! Pairs of one string are a conjunction, strings are alternatives.

use std::collections::BTreeMap;

/// Split a label string into its pairs; malformed pairs are ignored
pub fn parse_label_filter(label: &str) -> BTreeMap<String, String> {
    label
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

/// Whether any target carries every pair of any non-empty label string
///
/// No label strings (or only empty ones) match everything.
pub fn matches_label_filters<'a, I>(labels: &[String], targets: I) -> bool
where
    I: IntoIterator<Item = &'a BTreeMap<String, String>>,
{
    let filters: Vec<_> = labels
        .iter()
        .map(|l| parse_label_filter(l))
        .filter(|f| !f.is_empty())
        .collect();
    if filters.is_empty() {
        return true;
    }
    targets.into_iter().any(|target| {
        filters
            .iter()
            .any(|filter| filter.iter().all(|(k, v)| target.get(k) == Some(v)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse() {
        let parsed = parse_label_filter("a=1,b=2,junk");
        assert_eq!(parsed, target(&[("a", "1"), ("b", "2")]));
    }

    #[test]
    fn test_conjunction_within_string() {
        let targets = [target(&[("a", "1")]), target(&[("b", "2")])];
        assert!(!matches_label_filters(&["a=1,b=2".to_string()], &targets));
        assert!(matches_label_filters(&["a=1".to_string()], &targets));
    }

    #[test]
    fn test_strings_are_alternatives() {
        let targets = [target(&[("a", "1"), ("b", "2")])];
        let labels = vec!["x=9".to_string(), "b=2".to_string()];
        assert!(matches_label_filters(&labels, &targets));
        assert!(!matches_label_filters(&["x=9".to_string()], &targets));
    }

    #[test]
    fn test_empty_filters_match_all() {
        let targets: Vec<BTreeMap<String, String>> = Vec::new();
        assert!(matches_label_filters(&[], &targets));
        assert!(matches_label_filters(&[String::new()], &targets));
    }
}
