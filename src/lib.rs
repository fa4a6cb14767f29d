//! One Piece card price reconciliation against the TCGplayer catalog mirror.
//!
//! Per catalog group: product and price listings are joined on product id,
//! each joined row is resolved to a card variant key (`OP01-001`,
//! `OP01-001_parallel`, ...) and emitted as a flat record carrying card
//! metadata and prices. `pipeline` wires that to live or on-disk listings and
//! writes one JSON file per set.

pub mod config;
pub mod models;
pub mod normalization;
pub mod pipeline;
pub mod reconcile;
pub mod tracing;

pub mod util {
    pub mod env;
}

pub use config::SyncConfig;
pub use models::{ExtendedEntry, ProductId, RawPrice, RawProduct};
pub use normalization::attributes::ExtendedAttributes;
pub use normalization::metadata::{project_metadata, CardMetadata};
pub use normalization::variant::{VariantIdentity, VariantTag};
pub use reconcile::assemble::{assemble, GroupResult};
pub use reconcile::record::{CardRecord, PriceFields};
pub use reconcile::{reconcile_group, ReconcileOptions, ReconcileReport, Reconciled};
