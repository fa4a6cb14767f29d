use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tcgcsv_client::{TcgConfig, ONE_PIECE_CATEGORY_ID};

use crate::reconcile::ReconcileOptions;
use crate::util::env::{env_flag, env_opt, env_parse};

/// Env keys logged (redacted) by the preflight snapshot.
pub const CONFIG_KEYS: [&str; 11] = [
    "TCGCSV_BASE_URL",
    "TCG_CATEGORY_ID",
    "SET_CODES",
    "SET_GROUPS",
    "OUT_DIR",
    "SYNC_CONCURRENCY",
    "HTTP_TIMEOUT_SECS",
    "HTTP_RPS",
    "HTTP_RETRY_ATTEMPTS",
    "HTTP_RETRY_BASE_DELAY_MS",
    "INCLUDE_UNPRICED",
];

/// Everything a sync run needs, passed explicitly instead of read ad hoc.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub base_url: String,
    pub category_id: i64,
    /// Upper-cased set codes to process; empty means every known set.
    pub set_codes: Vec<String>,
    /// Static set code -> group id overrides.
    pub set_groups: BTreeMap<String, Vec<i64>>,
    pub out_dir: PathBuf,
    pub concurrency: usize,
    pub http_timeout_secs: u64,
    pub http_rps: u32,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub include_unpriced: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let client = TcgConfig::default();
        Self {
            base_url: client.base_url,
            category_id: ONE_PIECE_CATEGORY_ID,
            set_codes: Vec::new(),
            set_groups: BTreeMap::new(),
            out_dir: PathBuf::from("data/prices"),
            concurrency: 4,
            http_timeout_secs: client.timeout_secs,
            http_rps: client.rps,
            retry_attempts: client.retry_attempts,
            retry_base_delay_ms: client.retry_base_delay_ms,
            include_unpriced: false,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let set_groups = match env_opt("SET_GROUPS") {
            Some(raw) => parse_set_groups(&raw).context("invalid SET_GROUPS")?,
            None => BTreeMap::new(),
        };
        Ok(Self {
            base_url: env_opt("TCGCSV_BASE_URL").unwrap_or(d.base_url),
            category_id: env_parse("TCG_CATEGORY_ID", d.category_id),
            set_codes: env_opt("SET_CODES")
                .map(|raw| parse_set_codes(&raw))
                .unwrap_or_default(),
            set_groups,
            out_dir: env_opt("OUT_DIR").map(PathBuf::from).unwrap_or(d.out_dir),
            concurrency: env_parse("SYNC_CONCURRENCY", d.concurrency).max(1),
            http_timeout_secs: env_parse("HTTP_TIMEOUT_SECS", d.http_timeout_secs),
            http_rps: env_parse("HTTP_RPS", d.http_rps),
            retry_attempts: env_parse("HTTP_RETRY_ATTEMPTS", d.retry_attempts),
            retry_base_delay_ms: env_parse("HTTP_RETRY_BASE_DELAY_MS", d.retry_base_delay_ms),
            include_unpriced: env_flag("INCLUDE_UNPRICED", d.include_unpriced),
        })
    }

    pub fn client_config(&self) -> TcgConfig {
        TcgConfig {
            base_url: self.base_url.clone(),
            category_id: self.category_id,
            rps: self.http_rps,
            retry_attempts: self.retry_attempts,
            retry_base_delay_ms: self.retry_base_delay_ms,
            timeout_secs: self.http_timeout_secs,
            ..TcgConfig::default()
        }
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            include_unpriced: self.include_unpriced,
        }
    }
}

/// Canonical set code: ASCII alphanumerics only, upper-cased ("op-01" -> "OP01").
pub fn canonical_set_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Parse `"op01, OP02 st01"` into unique canonical codes, keeping order.
pub fn parse_set_codes(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for code in raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(canonical_set_code)
        .filter(|s| !s.is_empty())
    {
        if !out.contains(&code) {
            out.push(code);
        }
    }
    out
}

/// Parse `"OP01=3188,OP02=3189+4012"`: entries split on `,`, group ids on `+`.
pub fn parse_set_groups(raw: &str) -> Result<BTreeMap<String, Vec<i64>>> {
    let mut out: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((code, ids)) = entry.split_once('=') else {
            bail!("expected CODE=GROUP_ID, got {entry:?}");
        };
        let code = canonical_set_code(code);
        if code.is_empty() {
            bail!("empty set code in {entry:?}");
        }
        let slot = out.entry(code).or_default();
        for id in ids.split('+').map(str::trim).filter(|s| !s.is_empty()) {
            let id: i64 = id
                .parse()
                .with_context(|| format!("group id {id:?} in {entry:?} is not an integer"))?;
            if !slot.contains(&id) {
                slot.push(id);
            }
        }
    }
    Ok(out)
}
