use anyhow::{Context, Result};
use async_trait::async_trait;
use tcgcsv_client::{TcgCsvClient, TcgGroup};

use super::CatalogSource;
use crate::models::{RawPrice, RawProduct};

/// Live listings from the tcgcsv mirror.
#[derive(Clone)]
pub struct TcgCsvSource {
    client: TcgCsvClient,
}

impl TcgCsvSource {
    pub fn new(client: TcgCsvClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &TcgCsvClient {
        &self.client
    }

    pub async fn groups(&self) -> Result<Vec<TcgGroup>> {
        self.client
            .groups()
            .await
            .with_context(|| format!("GET {}", self.client.endpoint("groups")))
    }
}

#[async_trait]
impl CatalogSource for TcgCsvSource {
    async fn products(&self, group_id: i64) -> Result<Vec<RawProduct>> {
        let path = format!("{group_id}/products");
        self.client
            .products(group_id)
            .await
            .with_context(|| format!("GET {}", self.client.endpoint(&path)))
    }

    async fn prices(&self, group_id: i64) -> Result<Vec<RawPrice>> {
        let path = format!("{group_id}/prices");
        self.client
            .prices(group_id)
            .await
            .with_context(|| format!("GET {}", self.client.endpoint(&path)))
    }
}
