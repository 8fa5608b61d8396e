//! Tabular feed: CSV with a header row naming
//! `company,car_model,sale_date,price`. Column order does not matter and
//! extra columns are ignored.

use std::path::PathBuf;

use serde::Deserialize;

use super::{SaleIter, SalesSource, SourceError, check_price, parse_sale_date};
use crate::model::RawSale;

#[derive(Debug, Deserialize)]
struct CsvSale {
    company: String,
    car_model: String,
    sale_date: String,
    price: f64,
}

/// Reads sales row by row from a CSV file on disk.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    name: String,
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    fn classify(&self, record: usize, err: csv::Error) -> SourceError {
        if let csv::ErrorKind::Io(_) = err.kind() {
            SourceError::Unavailable {
                source_name: self.name.clone(),
                reason: format!("{}: {err}", self.path.display()),
            }
        } else {
            SourceError::Malformed {
                source_name: self.name.clone(),
                record,
                reason: err.to_string(),
            }
        }
    }
}

impl SalesSource for CsvFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<SaleIter<'_>, SourceError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .map_err(|e| self.classify(0, e))?;

        Ok(Box::new(reader.into_deserialize::<CsvSale>().enumerate().map(
            move |(i, row)| {
                let record = i + 1;
                let row = row.map_err(|e| self.classify(record, e))?;
                let malformed = |reason: String| SourceError::Malformed {
                    source_name: self.name.clone(),
                    record,
                    reason,
                };
                let sale_date = parse_sale_date(&row.sale_date).map_err(&malformed)?;
                let price = check_price(row.price).map_err(&malformed)?;
                Ok(RawSale {
                    company: row.company,
                    car_model: row.car_model,
                    sale_date,
                    price,
                })
            },
        )))
    }
}
