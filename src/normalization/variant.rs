//! Variant identity: which physical printing a listing refers to.
//!
//! Upstream listings disagree about where the printing is recorded, so the
//! resolver walks a fixed cascade and the first signal that fires wins.
//!
//! Base number:
//! 1. the `Number` extended attribute
//! 2. a `<SET><2 digits>-<3 digits>` token in the display name
//! 3. otherwise unresolved
//!
//! Variant tag:
//! 1. finish signal. The price row's `subTypeName` when a price row is being
//!    joined, else the product's own `subTypeName` / `finish` / `printing`.
//!    "Normal" and empty count as no signal.
//! 2. marker substrings in the display name
//! 3. `Normal`
//!
//! A `Foil` finish on a listing whose name carries a marker is a distinct
//! printing: the two combine into `<marker>foil` (`OP01-001_parallelfoil`),
//! the same slug a literal "Parallel Foil" subtype produces.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::RawProduct;
use crate::normalization::attributes::ExtendedAttributes;

const PRODUCT_FINISH_KEYS: [&str; 3] = ["subtypename", "finish", "printing"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariantTag {
    Normal,
    Foil,
    Parallel,
    AltArt,
    BoxTopper,
    Promo,
    /// Unrecognised finish; carries the lowercase alphanumeric slug of the signal.
    Other(String),
}

impl VariantTag {
    /// Key suffix; `None` for the base printing.
    pub fn suffix(&self) -> Option<&str> {
        match self {
            VariantTag::Normal => None,
            VariantTag::Foil => Some("foil"),
            VariantTag::Parallel => Some("parallel"),
            VariantTag::AltArt => Some("altart"),
            VariantTag::BoxTopper => Some("boxtopper"),
            VariantTag::Promo => Some("promo"),
            VariantTag::Other(slug) => Some(slug.as_str()),
        }
    }

    /// Label used in output records ("normal" for the base printing).
    pub fn label(&self) -> &str {
        self.suffix().unwrap_or("normal")
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, VariantTag::Normal)
    }

    /// Interpret an explicit finish/subtype string. `None` means "no signal":
    /// empty, "Normal", or nothing alphanumeric left after slugging.
    pub fn from_finish(raw: &str) -> Option<Self> {
        let slug = slug(raw);
        let tag = match slug.as_str() {
            "" | "normal" => return None,
            "foil" | "holofoil" | "reverseholofoil" => VariantTag::Foil,
            "parallel" => VariantTag::Parallel,
            "altart" | "alternateart" => VariantTag::AltArt,
            "boxtopper" => VariantTag::BoxTopper,
            "promo" => VariantTag::Promo,
            _ => VariantTag::Other(slug),
        };
        Some(tag)
    }

    /// Marker substrings in a display name, checked in a fixed order.
    pub fn from_name_markers(name: &str) -> Option<Self> {
        let lc = name.to_lowercase().replace(['-', '_'], " ");
        if lc.contains("parallel") {
            Some(VariantTag::Parallel)
        } else if lc.contains("box topper") {
            Some(VariantTag::BoxTopper)
        } else if lc.contains("alternate art") || lc.contains("alt art") {
            Some(VariantTag::AltArt)
        } else if lc.contains("promo") {
            Some(VariantTag::Promo)
        } else {
            None
        }
    }
}

fn slug(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Where the base number came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseSource {
    NumberAttribute,
    NamePattern,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantIdentity {
    pub base_number: String,
    pub tag: VariantTag,
}

impl VariantIdentity {
    pub fn new(base_number: impl Into<String>, tag: VariantTag) -> Self {
        Self {
            base_number: base_number.into(),
            tag,
        }
    }

    /// Output key: the bare base number for normal printings, otherwise
    /// `<base>_<suffix>`.
    pub fn key(&self) -> String {
        match self.tag.suffix() {
            Some(suffix) => format!("{}_{}", self.base_number, suffix),
            None => self.base_number.clone(),
        }
    }
}

impl fmt::Display for VariantIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

fn card_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b([a-z]{1,4}\d{2}-\d{3})\b").expect("card number pattern compiles")
    })
}

/// Extract the first catalog number token from free text.
pub fn card_number_in(text: &str) -> Option<String> {
    card_number_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
}

pub fn resolve_base_number(
    product: &RawProduct,
    attrs: &ExtendedAttributes,
) -> Option<(String, BaseSource)> {
    if let Some(number) = attrs.get("Number") {
        return Some((number.trim().to_ascii_uppercase(), BaseSource::NumberAttribute));
    }
    card_number_in(product.display_name()).map(|n| (n, BaseSource::NamePattern))
}

/// Variant tag for one product as seen through one price row.
///
/// `price_subtype` is `None` only when no price row is involved; the
/// product-level finish fields are consulted only then. A joined row with a
/// missing subtype should pass `Some("")`.
pub fn resolve_variant_tag(
    product: &RawProduct,
    attrs: &ExtendedAttributes,
    price_subtype: Option<&str>,
) -> VariantTag {
    let finish = match price_subtype {
        Some(raw) => VariantTag::from_finish(raw),
        None => product
            .sub_type_name
            .as_deref()
            .or_else(|| attrs.first_of(&PRODUCT_FINISH_KEYS))
            .and_then(VariantTag::from_finish),
    };
    let marker = VariantTag::from_name_markers(product.display_name());
    match (finish, marker) {
        (Some(VariantTag::Foil), Some(marker)) => {
            VariantTag::Other(format!("{}foil", marker.label()))
        }
        (Some(tag), _) | (None, Some(tag)) => tag,
        (None, None) => VariantTag::Normal,
    }
}
