use indexmap::IndexMap;

use crate::models::ExtendedEntry;

/// Canonical form of an attribute name.
///
/// Normalization steps:
/// - trim and lowercase
/// - drop whitespace, `_` and `-`
///
/// so "Card Type", "CardType" and " card_type " all map to `cardtype`.
/// Every write and every lookup goes through this one function.
pub fn normalize_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Flat view over a product's `extendedData`, keyed by [`normalize_key`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtendedAttributes {
    values: IndexMap<String, String>,
}

impl ExtendedAttributes {
    /// Build from raw entries. The name comes from `name`, falling back to
    /// `displayName`; entries missing a name or value are skipped. On repeated
    /// keys the last value wins.
    pub fn from_entries(entries: &[ExtendedEntry]) -> Self {
        let mut values = IndexMap::with_capacity(entries.len());
        for entry in entries {
            let Some(name) = non_empty(entry.name.as_deref())
                .or_else(|| non_empty(entry.display_name.as_deref()))
            else {
                continue;
            };
            let Some(value) = non_empty(entry.value.as_deref()) else {
                continue;
            };
            let key = normalize_key(name);
            if key.is_empty() {
                continue;
            }
            values.insert(key, value.to_string());
        }
        Self { values }
    }

    /// Lookup by any spelling of the attribute name.
    pub fn get(&self, raw_key: &str) -> Option<&str> {
        self.values.get(&normalize_key(raw_key)).map(String::as_str)
    }

    /// First present value among alias keys, in the order given.
    pub fn first_of(&self, raw_keys: &[&str]) -> Option<&str> {
        raw_keys.iter().find_map(|k| self.get(k))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: Option<&str>, display: Option<&str>, value: Option<&str>) -> ExtendedEntry {
        ExtendedEntry {
            name: name.map(str::to_string),
            display_name: display.map(str::to_string),
            value: value.map(str::to_string),
        }
    }

    #[test]
    fn normalizes_case_whitespace_and_separators() {
        assert_eq!(normalize_key(" Card Type "), "cardtype");
        assert_eq!(normalize_key("CardType"), "cardtype");
        assert_eq!(normalize_key("card_type"), "cardtype");
        assert_eq!(normalize_key("Subtype(s)"), "subtype(s)");
    }

    #[test]
    fn skips_entries_without_name_or_value() {
        let attrs = ExtendedAttributes::from_entries(&[
            entry(None, None, Some("orphan")),
            entry(Some("Rarity"), None, None),
            entry(Some("Cost"), None, Some("   ")),
            entry(Some("  "), Some("Power"), Some("5000")),
        ]);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("power"), Some("5000"));
        assert_eq!(attrs.get("Rarity"), None);
    }

    #[test]
    fn last_value_wins_on_duplicate_keys() {
        let attrs = ExtendedAttributes::from_entries(&[
            entry(Some("Number"), None, Some("OP01-001")),
            entry(Some(" number "), None, Some("OP01-002")),
        ]);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("NUMBER"), Some("OP01-002"));
    }

    #[test]
    fn first_of_respects_alias_order() {
        let attrs = ExtendedAttributes::from_entries(&[
            entry(Some("Counter"), None, Some("1000")),
            entry(Some("CounterPlus"), None, Some("+2000")),
        ]);
        assert_eq!(attrs.first_of(&["Counter Plus", "Counter"]), Some("+2000"));
        assert_eq!(attrs.first_of(&["Trigger", "Counter"]), Some("1000"));
        assert_eq!(attrs.first_of(&["Trigger"]), None);
    }
}
