//! Listings on disk, laid out like the mirror:
//! `<root>/groups.json`, `<root>/<groupId>/products.json`, `<root>/<groupId>/prices.json`.
//! Each file holds either the upstream envelope or a bare array.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tcgcsv_client::{decode_listing, TcgGroup};
use tracing::debug;

use super::sink::write_json_atomic;
use super::CatalogSource;
use crate::models::{RawPrice, RawProduct};

#[derive(Debug, Clone)]
pub struct SnapshotSource {
    root: PathBuf,
}

impl SnapshotSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn groups(&self) -> Result<Vec<TcgGroup>> {
        read_listing(&self.root.join("groups.json")).await
    }

    fn listing_path(&self, group_id: i64, name: &str) -> PathBuf {
        self.root.join(group_id.to_string()).join(name)
    }
}

async fn read_listing<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let body = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    let listing = decode_listing(&body).with_context(|| format!("decode {}", path.display()))?;
    debug!(
        path = %path.display(),
        rows = listing.rows.len(),
        dropped = listing.dropped,
        "snapshot loaded"
    );
    Ok(listing.rows)
}

#[async_trait]
impl CatalogSource for SnapshotSource {
    async fn products(&self, group_id: i64) -> Result<Vec<RawProduct>> {
        read_listing(&self.listing_path(group_id, "products.json")).await
    }

    async fn prices(&self, group_id: i64) -> Result<Vec<RawPrice>> {
        read_listing(&self.listing_path(group_id, "prices.json")).await
    }
}

/// Passes listings through from an inner source and saves each one in the
/// snapshot layout, so a live run can be replayed offline.
pub struct RecordingSource<S> {
    inner: S,
    root: PathBuf,
}

impl<S> RecordingSource<S> {
    pub fn new(inner: S, root: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            root: root.into(),
        }
    }

    fn save<T: Serialize>(&self, group_id: i64, name: &str, rows: &[T]) -> Result<()> {
        let path = self.root.join(group_id.to_string()).join(name);
        let envelope = json!({ "success": true, "errors": [], "results": rows });
        write_json_atomic(&path, &envelope)
    }
}

/// Save a group listing next to the per-group snapshots.
pub fn save_groups(root: &Path, groups: &[TcgGroup]) -> Result<()> {
    let envelope = json!({ "success": true, "errors": [], "results": groups });
    write_json_atomic(&root.join("groups.json"), &envelope)
}

#[async_trait]
impl<S: CatalogSource> CatalogSource for RecordingSource<S> {
    async fn products(&self, group_id: i64) -> Result<Vec<RawProduct>> {
        let rows = self.inner.products(group_id).await?;
        self.save(group_id, "products.json", &rows)?;
        Ok(rows)
    }

    async fn prices(&self, group_id: i64) -> Result<Vec<RawPrice>> {
        let rows = self.inner.prices(group_id).await?;
        self.save(group_id, "prices.json", &rows)?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn reads_envelopes_and_bare_arrays() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "3188/products.json",
            r#"{"success":true,"errors":[],"results":[
                {"productId":501,"name":"Nami","extendedData":[{"name":"Number","value":"OP01-016"}]}
            ]}"#,
        );
        write(
            dir.path(),
            "3188/prices.json",
            r#"[{"productId":501,"subTypeName":"Normal","marketPrice":0.42}]"#,
        );
        let source = SnapshotSource::new(dir.path());

        let products = source.products(3188).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].product_id.as_str(), "501");
        let prices = source.prices(3188).await.unwrap();
        assert_eq!(prices[0].market_price, Some(0.42));
    }

    #[tokio::test]
    async fn rows_without_product_id_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "3188/products.json",
            r#"{"success":true,"errors":[],"results":[
                {"productId":1,"name":"Nami","extendedData":[{"name":"Number","value":"OP01-016"}]},
                {"productId":null,"name":"Broken"}
            ]}"#,
        );
        write(
            dir.path(),
            "3188/prices.json",
            r#"[{"productId":1,"subTypeName":"Normal","marketPrice":0.3},{"name":"no id at all"}]"#,
        );
        let source = SnapshotSource::new(dir.path());

        let products = source.products(3188).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].product_id.as_str(), "1");
        let prices = source.prices(3188).await.unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].market_price, Some(0.3));
    }

    #[tokio::test]
    async fn missing_listing_is_an_error() {
        let dir = TempDir::new().unwrap();
        let source = SnapshotSource::new(dir.path());
        let err = source.products(1).await.unwrap_err();
        assert!(format!("{err:#}").contains("products.json"));
    }

    #[tokio::test]
    async fn recording_round_trips_through_snapshot() {
        let src_dir = TempDir::new().unwrap();
        write(
            src_dir.path(),
            "7/prices.json",
            r#"[{"productId":"9","subTypeName":"Foil","marketPrice":"12.50"}]"#,
        );
        write(src_dir.path(), "7/products.json", r#"[]"#);

        let out_dir = TempDir::new().unwrap();
        let recorder = RecordingSource::new(SnapshotSource::new(src_dir.path()), out_dir.path());
        let first = recorder.prices(7).await.unwrap();
        recorder.products(7).await.unwrap();

        let replay = SnapshotSource::new(out_dir.path());
        assert_eq!(replay.prices(7).await.unwrap(), first);
        assert!(replay.products(7).await.unwrap().is_empty());
    }
}
