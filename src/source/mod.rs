//! Source adapters: read-only readers over the external sales feeds.
//!
//! Each adapter opens its feed, parses it in its native format, and yields
//! [`RawSale`]s lazily in the feed's natural order. Opening failures and
//! malformed records are reported as [`SourceError`]s, which never escape
//! the filter stage.

pub mod structured;
pub mod tabular;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::RawSale;

pub use structured::JsonFileSource;
pub use tabular::CsvFileSource;

/// Date format every feed uses for `sale_date`.
pub const SALE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum SourceError {
    /// The feed could not be opened or read at all.
    #[error("source {source_name} unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    /// A record could not be parsed. `record` counts data records from 1.
    #[error("source {source_name} record {record}: {reason}")]
    Malformed {
        source_name: String,
        record: usize,
        reason: String,
    },
}

impl SourceError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Unavailable { .. } => "unavailable",
            SourceError::Malformed { .. } => "malformed",
        }
    }
}

/// Lazy, finite sequence of parsed sales from one read pass.
pub type SaleIter<'a> = Box<dyn Iterator<Item = Result<RawSale, SourceError>> + Send + 'a>;

/// A read-only feed of sales.
pub trait SalesSource: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Start a read pass. Fails only if the feed cannot be opened.
    fn read(&self) -> Result<SaleIter<'_>, SourceError>;
}

/// Ordered set of sources. Results are merged in this order.
#[derive(Clone)]
pub struct SourceSet {
    sources: Arc<[Box<dyn SalesSource>]>,
}

impl SourceSet {
    pub fn new(sources: Vec<Box<dyn SalesSource>>) -> Self {
        Self {
            sources: sources.into(),
        }
    }

    /// The standard pair: structured feed first, tabular feed second.
    pub fn from_paths(structured: impl Into<PathBuf>, tabular: impl Into<PathBuf>) -> Self {
        Self::new(vec![
            Box::new(JsonFileSource::new("source_a", structured)),
            Box::new(CsvFileSource::new("source_b", tabular)),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn SalesSource> {
        self.sources.iter().map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Accept only finite prices; NaN and infinities cannot be stored.
pub(crate) fn check_price(raw: f64) -> Result<f64, String> {
    if raw.is_finite() {
        Ok(raw)
    } else {
        Err(format!("invalid price {raw}: must be a finite number"))
    }
}

/// Parse a feed date in `YYYY-MM-DD` form.
pub(crate) fn parse_sale_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, SALE_DATE_FORMAT)
        .map_err(|e| format!("invalid sale_date {raw:?}: {e}"))
}
