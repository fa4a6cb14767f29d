//! Outer plumbing around the pure reconciler: where listings come from,
//! which groups make up a set, and where assembled sets are written.

pub mod registry;
pub mod runner;
pub mod sink;
pub mod snapshot;
pub mod tcgcsv;

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{RawPrice, RawProduct};
use crate::reconcile::assemble::GroupResult;

pub use registry::{CatalogRegistry, StaticRegistry};
pub use runner::{sync_sets, SetOutcome, SetStatus, SyncSummary};
pub use sink::JsonFileSink;
pub use snapshot::{RecordingSource, SnapshotSource};
pub use tcgcsv::TcgCsvSource;

/// Product and price listings for a catalog group.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn products(&self, group_id: i64) -> Result<Vec<RawProduct>>;
    async fn prices(&self, group_id: i64) -> Result<Vec<RawPrice>>;
}

#[async_trait]
impl<T: CatalogSource + ?Sized> CatalogSource for Box<T> {
    async fn products(&self, group_id: i64) -> Result<Vec<RawProduct>> {
        (**self).products(group_id).await
    }

    async fn prices(&self, group_id: i64) -> Result<Vec<RawPrice>> {
        (**self).prices(group_id).await
    }
}

/// Set code -> catalog group ids.
pub trait GroupRegistry: Send + Sync {
    /// Groups for a set code, in processing order. Empty when unknown.
    fn groups_for(&self, set_code: &str) -> Vec<i64>;
    /// Every set code the registry knows, sorted.
    fn set_codes(&self) -> Vec<String>;
}

/// Destination for assembled sets.
pub trait CardSink: Send + Sync {
    fn write_set(&self, result: &GroupResult) -> Result<PathBuf>;
    fn finish(&self, summary: &SyncSummary) -> Result<()>;
}
