use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Compares strings so that embedded numbers order by value (`2` < `10`).
///
/// Falls back to byte order when the natural comparison ties (`01` vs `1`), so
/// the result is a total order consistent with string equality.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natord::compare(a, b).then_with(|| a.cmp(b))
}

/// Owned sort key for pin numbers and designators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NaturalKey(String);

impl NaturalKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NaturalKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl PartialOrd for NaturalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NaturalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_order_by_value() {
        let mut numbers: Vec<NaturalKey> = ["10", "2", "A10", "A2", "1"]
            .into_iter()
            .map(NaturalKey::from)
            .collect();
        numbers.sort();
        let sorted: Vec<&str> = numbers.iter().map(NaturalKey::as_str).collect();
        assert_eq!(sorted, vec!["1", "2", "10", "A2", "A10"]);
    }

    #[test]
    fn leading_zeros_do_not_tie() {
        assert_ne!(natural_cmp("01", "1"), Ordering::Equal);
        assert_eq!(natural_cmp("7", "7"), Ordering::Equal);
    }
}
