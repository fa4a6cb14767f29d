use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use tcgcsv_client::TcgGroup;
use tracing::debug;

use super::GroupRegistry;
use crate::config::canonical_set_code;

/// Fixed mapping, usually from `SET_GROUPS`.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    groups: BTreeMap<String, Vec<i64>>,
}

impl StaticRegistry {
    pub fn new(groups: BTreeMap<String, Vec<i64>>) -> Self {
        let groups = groups
            .into_iter()
            .map(|(code, ids)| (canonical_set_code(&code), ids))
            .filter(|(code, ids)| !code.is_empty() && !ids.is_empty())
            .collect();
        Self { groups }
    }
}

impl GroupRegistry for StaticRegistry {
    fn groups_for(&self, set_code: &str) -> Vec<i64> {
        self.groups
            .get(&canonical_set_code(set_code))
            .cloned()
            .unwrap_or_default()
    }

    fn set_codes(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }
}

fn set_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{2,4}\d{2}$").expect("set code regex"))
}

fn name_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[([A-Za-z]{2,4}-?\d{2})\]|-([A-Za-z]{2,4}\d{2})-").expect("name token regex")
    })
}

/// Set code for a catalog group: its abbreviation when that looks like a set
/// code, otherwise an `[OP05]` or `-OP05-` token in the group name.
pub fn group_set_code(group: &TcgGroup) -> Option<String> {
    if let Some(abbr) = group.abbreviation.as_deref() {
        let code = canonical_set_code(abbr);
        if set_code_re().is_match(&code) {
            return Some(code);
        }
    }
    let caps = name_token_re().captures(&group.name)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| canonical_set_code(m.as_str()))
}

/// Mapping discovered from the category's group listing.
#[derive(Debug, Clone, Default)]
pub struct CatalogRegistry {
    groups: BTreeMap<String, Vec<i64>>,
    /// Groups whose set code could not be determined.
    pub unmapped: Vec<TcgGroup>,
}

impl CatalogRegistry {
    pub fn from_groups(groups: Vec<TcgGroup>) -> Self {
        let mut out = Self::default();
        for group in groups {
            match group_set_code(&group) {
                Some(code) => {
                    let ids = out.groups.entry(code).or_default();
                    if !ids.contains(&group.group_id) {
                        ids.push(group.group_id);
                    }
                }
                None => {
                    debug!(group_id = group.group_id, name = %group.name, "group has no set code");
                    out.unmapped.push(group);
                }
            }
        }
        out
    }

    /// Replace discovered entries with explicit ones.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, Vec<i64>>) -> Self {
        for (code, ids) in overrides {
            let code = canonical_set_code(code);
            if code.is_empty() || ids.is_empty() {
                continue;
            }
            self.groups.insert(code, ids.clone());
        }
        self
    }
}

impl GroupRegistry for CatalogRegistry {
    fn groups_for(&self, set_code: &str) -> Vec<i64> {
        self.groups
            .get(&canonical_set_code(set_code))
            .cloned()
            .unwrap_or_default()
    }

    fn set_codes(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: i64, name: &str, abbr: Option<&str>) -> TcgGroup {
        TcgGroup {
            group_id: id,
            name: name.into(),
            abbreviation: abbr.map(Into::into),
            is_supplemental: false,
            published_on: None,
            category_id: Some(68),
        }
    }

    #[test]
    fn static_registry_normalizes_codes() {
        let mut map = BTreeMap::new();
        map.insert("op-01".to_string(), vec![3188]);
        map.insert("st01".to_string(), vec![]);
        let reg = StaticRegistry::new(map);
        assert_eq!(reg.groups_for("OP01"), vec![3188]);
        assert_eq!(reg.groups_for(" op01 "), vec![3188]);
        assert!(reg.groups_for("ST01").is_empty());
        assert_eq!(reg.set_codes(), vec!["OP01"]);
    }

    #[test]
    fn catalog_registry_uses_abbreviation_then_name_token() {
        let reg = CatalogRegistry::from_groups(vec![
            group(3188, "Romance Dawn", Some("OP01")),
            group(3189, "Paramount War", Some("op-02")),
            group(4012, "Pillars of Strength [OP03]", None),
            group(4013, "Romance Dawn Pre-Release Cards", Some("OP01")),
            group(4500, "Extra Booster -EB01-", None),
            group(5000, "One Piece Promotion Cards", Some("P")),
        ]);
        assert_eq!(reg.groups_for("OP01"), vec![3188, 4013]);
        assert_eq!(reg.groups_for("OP02"), vec![3189]);
        assert_eq!(reg.groups_for("OP03"), vec![4012]);
        assert_eq!(reg.groups_for("eb01"), vec![4500]);
        assert_eq!(reg.unmapped.len(), 1);
        assert_eq!(reg.set_codes(), vec!["EB01", "OP01", "OP02", "OP03"]);
    }

    #[test]
    fn overrides_replace_discovered_groups() {
        let mut overrides = BTreeMap::new();
        overrides.insert("OP01".to_string(), vec![9999]);
        let reg = CatalogRegistry::from_groups(vec![group(3188, "Romance Dawn", Some("OP01"))])
            .with_overrides(&overrides);
        assert_eq!(reg.groups_for("op01"), vec![9999]);
    }
}
