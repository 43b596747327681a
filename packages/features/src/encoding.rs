//! Most-frequent imputation and label encoding for categorical columns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fills missing categorical values with the most frequent observed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MostFrequentImputer {
    fill_value: String,
}

impl MostFrequentImputer {
    /// Fits the imputer on every observed (non-missing) value.
    ///
    /// Ties resolve to the lexicographically smallest value. Returns `None`
    /// when no value was observed at all.
    #[must_use]
    pub fn fit<'a, I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for value in values.into_iter().flatten() {
            *counts.entry(value).or_default() += 1;
        }

        let mut best: Option<(&str, usize)> = None;
        // BTreeMap iterates in ascending key order, so a strict `>` keeps
        // the smallest value among ties.
        for (value, count) in counts {
            if best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((value, count));
            }
        }

        best.map(|(value, _)| Self {
            fill_value: value.to_string(),
        })
    }

    /// The value substituted for missing cells.
    #[must_use]
    pub fn fill_value(&self) -> &str {
        &self.fill_value
    }

    /// Returns the value itself, or the fill value when missing.
    #[must_use]
    pub fn transform<'a>(&'a self, value: Option<&'a str>) -> &'a str {
        value.unwrap_or(&self.fill_value)
    }
}

/// Maps each distinct category to an integer code.
///
/// Codes are assigned in ascending (alphabetical) order of the category
/// strings, starting at zero. They are only meaningful relative to the
/// categories this encoder was fitted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fits the encoder on the given values.
    #[must_use]
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut classes: Vec<String> = values.into_iter().map(str::to_string).collect();
        classes.sort_unstable();
        classes.dedup();
        Self { classes }
    }

    /// Known categories, indexed by code.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Returns the code for a category, or `None` if it was not seen at fit
    /// time.
    #[must_use]
    pub fn transform(&self, value: &str) -> Option<u32> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
            .and_then(|i| u32::try_from(i).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imputer_picks_most_frequent_value() {
        let imputer =
            MostFrequentImputer::fit([Some("STREET"), None, Some("ALLEY"), Some("STREET")])
                .unwrap();
        assert_eq!(imputer.fill_value(), "STREET");
        assert_eq!(imputer.transform(None), "STREET");
        assert_eq!(imputer.transform(Some("ALLEY")), "ALLEY");
    }

    #[test]
    fn imputer_breaks_ties_alphabetically() {
        let imputer =
            MostFrequentImputer::fit([Some("STREET"), Some("ALLEY"), Some("STREET"), Some("ALLEY")])
                .unwrap();
        assert_eq!(imputer.fill_value(), "ALLEY");
    }

    #[test]
    fn imputer_needs_at_least_one_value() {
        assert!(MostFrequentImputer::fit([None, None]).is_none());
    }

    #[test]
    fn encoder_assigns_alphabetical_codes() {
        let encoder = LabelEncoder::fit(["THEFT", "BATTERY", "THEFT", "ASSAULT"]);
        assert_eq!(encoder.classes(), ["ASSAULT", "BATTERY", "THEFT"]);
        assert_eq!(encoder.transform("ASSAULT"), Some(0));
        assert_eq!(encoder.transform("THEFT"), Some(2));
    }

    #[test]
    fn encoder_rejects_unseen_category() {
        let encoder = LabelEncoder::fit(["THEFT"]);
        assert_eq!(encoder.transform("ARSON"), None);
    }
}
