//! Descriptive card fields projected from a raw product.
//!
//! Every field reads the flat product field first and the extended attributes
//! second. Fields with no value in either place serialize as `null`.

use serde::{Deserialize, Serialize};

use crate::models::RawProduct;
use crate::normalization::attributes::ExtendedAttributes;

/// Bracketed timing/keyword tags that mark rules text as an effect.
const EFFECT_KEYWORDS: [&str; 16] = [
    "[on play]",
    "[when attacking]",
    "[activate: main]",
    "[main]",
    "[counter]",
    "[on k.o.]",
    "[blocker]",
    "[rush]",
    "[double attack]",
    "[banish]",
    "[your turn]",
    "[opponent's turn]",
    "[end of your turn]",
    "[on block]",
    "[once per turn]",
    "[don!!",
];

const TRIGGER_KEYWORDS: [&str; 2] = ["[trigger]", "trigger:"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMetadata {
    pub name: Option<String>,
    pub clean_name: Option<String>,
    pub rarity: Option<String>,
    pub card_type: Option<String>,
    pub cost: Option<i32>,
    pub power: Option<i32>,
    pub counter: Option<i32>,
    pub life: Option<i32>,
    pub colors: Option<Vec<String>>,
    pub attributes: Option<Vec<String>>,
    pub subtypes: Option<Vec<String>>,
    /// Heuristic: keyword search over `description`.
    pub has_effect: Option<bool>,
    /// Heuristic: keyword search over `description`.
    pub has_trigger: Option<bool>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub url: Option<String>,
    pub frame_type: Option<String>,
    pub finish: Option<String>,
}

pub fn project_metadata(product: &RawProduct, attrs: &ExtendedAttributes) -> CardMetadata {
    let pick = |flat: &Option<String>, keys: &[&str]| pick_field(flat.as_deref(), attrs, keys);

    let description = pick(&product.description, &["description", "effect"]);
    let (has_effect, has_trigger) = match description.as_deref() {
        Some(text) => {
            let (effect, trigger) = effect_flags(text);
            (Some(effect), Some(trigger))
        }
        None => (None, None),
    };

    CardMetadata {
        name: product.name.clone(),
        clean_name: product.clean_name.clone(),
        rarity: pick(&product.rarity, &["rarity"]),
        card_type: pick(&product.card_type, &["cardtype", "category"]),
        cost: pick(&product.cost, &["cost"]).as_deref().and_then(parse_stat),
        power: pick(&product.power, &["power"]).as_deref().and_then(parse_stat),
        counter: pick(&product.counter, &["counterplus", "counter"])
            .as_deref()
            .and_then(parse_stat),
        life: pick(&product.life, &["life"]).as_deref().and_then(parse_stat),
        colors: pick(&product.color, &["color", "colors"])
            .map(|s| split_list(&s, &[';', '/', ','])),
        attributes: pick(&product.attribute, &["attribute"])
            .map(|s| split_list(&s, &['/', ';'])),
        subtypes: pick(&product.subtype, &["subtypes", "subtype"])
            .map(|s| split_list(&s, &['/', ';'])),
        has_effect,
        has_trigger,
        description,
        image_url: pick(&product.image_url, &["imageurl"]),
        url: product.url.clone(),
        frame_type: attrs.get("frametype").map(str::to_string),
        finish: pick(&product.sub_type_name, &["finish", "printing"]),
    }
}

fn pick_field(flat: Option<&str>, attrs: &ExtendedAttributes, keys: &[&str]) -> Option<String> {
    if let Some(v) = flat.map(str::trim).filter(|s| !s.is_empty()) {
        return Some(v.to_string());
    }
    attrs.first_of(keys).map(str::to_string)
}

/// Parse a printed stat such as `"5000"`, `"+1000"` or `"1,000"`.
/// Placeholders like `"-"` yield `None`.
pub fn parse_stat(raw: &str) -> Option<i32> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('+')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse().ok()
}

fn split_list(raw: &str, seps: &[char]) -> Vec<String> {
    raw.split(|c: char| seps.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keyword heuristic over rules text; returns `(has_effect, has_trigger)`.
///
/// Not ground truth: it only reflects whether known tags appear in the text.
/// Text that is left over once trigger clauses are removed also counts as an
/// effect.
pub fn effect_flags(description: &str) -> (bool, bool) {
    let text = description
        .replace("<br>", " ")
        .replace("<br/>", " ")
        .replace("<br />", " ")
        .to_lowercase();

    let has_trigger = TRIGGER_KEYWORDS.iter().any(|k| text.contains(k));
    let tagged = EFFECT_KEYWORDS.iter().any(|k| text.contains(k));

    let without_trigger = match TRIGGER_KEYWORDS.iter().filter_map(|k| text.find(k)).min() {
        Some(idx) => &text[..idx],
        None => text.as_str(),
    };
    let leftover = without_trigger
        .chars()
        .any(|c| c.is_alphanumeric());

    (tagged || leftover, has_trigger)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(p: &RawProduct) -> CardMetadata {
        project_metadata(p, &ExtendedAttributes::from_entries(&p.extended_data))
    }

    #[test]
    fn flat_fields_win_over_extended() {
        let mut p = RawProduct::new("1", "Roronoa Zoro")
            .with_extended("Rarity", "SR")
            .with_extended("Power", "4000")
            .with_extended("Cost", "3");
        p.rarity = Some("SEC".into());
        p.power = Some("5000".into());
        let meta = project(&p);
        assert_eq!(meta.rarity.as_deref(), Some("SEC"));
        assert_eq!(meta.power, Some(5000));
        assert_eq!(meta.cost, Some(3));
    }

    #[test]
    fn blank_flat_field_falls_back() {
        let mut p = RawProduct::new("1", "Nami").with_extended("Card Type", "Character");
        p.card_type = Some("  ".into());
        assert_eq!(project(&p).card_type.as_deref(), Some("Character"));
    }

    #[test]
    fn absent_fields_serialize_as_null() {
        let meta = project(&RawProduct::new("1", "Mystery"));
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("rarity").unwrap().is_null());
        assert!(json.get("colors").unwrap().is_null());
        assert!(json.get("hasEffect").unwrap().is_null());
        assert_eq!(json.get("name").unwrap(), "Mystery");
    }

    #[test]
    fn lists_are_split_and_trimmed() {
        let p = RawProduct::new("1", "Luffy")
            .with_extended("Color", "Red;Green")
            .with_extended("Subtypes", "Supernovas / Straw Hat Crew")
            .with_extended("Attribute", "Strike");
        let meta = project(&p);
        assert_eq!(meta.colors, Some(vec!["Red".to_string(), "Green".to_string()]));
        assert_eq!(
            meta.subtypes,
            Some(vec!["Supernovas".to_string(), "Straw Hat Crew".to_string()])
        );
        assert_eq!(meta.attributes, Some(vec!["Strike".to_string()]));
    }

    #[test]
    fn stats_parse_leniently() {
        assert_eq!(parse_stat("+1000"), Some(1000));
        assert_eq!(parse_stat("1,000"), Some(1000));
        assert_eq!(parse_stat("-"), None);
        assert_eq!(parse_stat("X"), None);
        let p = RawProduct::new("1", "Usopp").with_extended("CounterPlus", "+2000");
        assert_eq!(project(&p).counter, Some(2000));
    }

    #[test]
    fn effect_and_trigger_heuristics() {
        assert_eq!(
            effect_flags("[On Play] Draw 1 card.<br><br>[Trigger] Play this card."),
            (true, true)
        );
        assert_eq!(
            effect_flags("[Trigger] K.O. up to 1 of your opponent's Characters."),
            (false, true)
        );
        assert_eq!(effect_flags("[Blocker]"), (true, false));
        assert_eq!(effect_flags("Give this Leader +1000 power."), (true, false));
        assert_eq!(effect_flags("   "), (false, false));
    }
}
