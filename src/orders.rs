//! Confirmed-order records and the append-only order log.
//!
//! Each confirmed order is snapshotted once as an [`OrderRecord`] and
//! appended to a JSON Lines file. Prior entries are never rewritten or
//! deleted.

use std::io::Write;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::Cart;
use crate::catalog::{Catalog, Price};
use crate::state::DeliveryDetails;

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors from the order log.
#[derive(Debug, Error, Diagnostic)]
pub enum OrderLogError {
    #[error("failed to append to order log: {path}")]
    #[diagnostic(
        code(comanda::orders::io),
        help("Check that the log file's directory exists and is writable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize order record: {message}")]
    #[diagnostic(code(comanda::orders::serialize))]
    Serialize { message: String },
}

pub type OrderLogResult<T> = std::result::Result<T, OrderLogError>;

// ── Records ─────────────────────────────────────────────────────────────

/// One line of a confirmed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: u32,
}

/// Immutable snapshot of a confirmed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Milliseconds since the Unix epoch at confirmation time.
    pub timestamp_ms: u64,
    pub lines: Vec<OrderLine>,
    pub total_cents: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryDetails>,
}

impl OrderRecord {
    /// Snapshot the cart at confirmation time. The total is computed
    /// before the cart is cleared.
    pub fn from_cart(cart: &Cart, catalog: &Catalog, delivery: Option<DeliveryDetails>) -> Self {
        let lines = cart
            .lines()
            .map(|(name, quantity)| OrderLine {
                name: name.to_string(),
                quantity,
                unit_price_cents: catalog
                    .find_item(name)
                    .map(|item| item.price.cents())
                    .unwrap_or(0),
            })
            .collect();
        Self {
            timestamp_ms: now_ms(),
            lines,
            total_cents: cart.total(catalog).cents(),
            delivery,
        }
    }

    pub fn total(&self) -> Price {
        Price(self.total_cents)
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ── Log ─────────────────────────────────────────────────────────────────

/// Append-only JSON Lines order log.
#[derive(Debug)]
pub struct OrderLog {
    path: PathBuf,
}

impl OrderLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single JSON line.
    pub fn append(&self, record: &OrderRecord) -> OrderLogResult<()> {
        let json = serde_json::to_string(record).map_err(|e| OrderLogError::Serialize {
            message: e.to_string(),
        })?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| OrderLogError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        writeln!(file, "{json}").map_err(|source| OrderLogError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        tracing::info!(
            total = %Price(record.total_cents),
            lines = record.lines.len(),
            "order recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(total_cents: u32) -> OrderRecord {
        OrderRecord {
            timestamp_ms: 1_700_000_000_000,
            lines: vec![OrderLine {
                name: "Caesar Salad".into(),
                quantity: 2,
                unit_price_cents: 850,
            }],
            total_cents,
            delivery: None,
        }
    }

    #[test]
    fn append_is_line_delimited_and_additive() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = OrderLog::new(dir.path().join("orders.jsonl"));

        log.append(&record(1700)).unwrap();
        log.append(&record(300)).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let records: Vec<OrderRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].total_cents, 1700);
        assert_eq!(records[1].total_cents, 300);
        // The first record survived the second append untouched.
        assert_eq!(records[0].lines[0].name, "Caesar Salad");
    }

    #[test]
    fn delivery_details_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = OrderLog::new(dir.path().join("orders.jsonl"));

        let mut rec = record(1700);
        rec.delivery = Some(DeliveryDetails {
            name: "Ana".into(),
            address: "12 Main St".into(),
            city: "Springfield".into(),
        });
        log.append(&rec).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let parsed: OrderRecord = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed.delivery.unwrap().city, "Springfield");
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let log = OrderLog::new("/nonexistent-dir/orders.jsonl");
        let err = log.append(&record(100)).unwrap_err();
        assert!(matches!(err, OrderLogError::Io { .. }));
    }
}
