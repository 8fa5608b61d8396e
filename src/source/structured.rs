//! Structured feed: a JSON array of sale objects.
//!
//! ```json
//! [{"company": "Honda", "car_model": "Civic", "sale_date": "2023-05-01", "price": 25000.0}]
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use serde::Deserialize;

use super::{SaleIter, SalesSource, SourceError, check_price, parse_sale_date};
use crate::model::RawSale;

#[derive(Debug, Deserialize)]
struct JsonSale {
    company: String,
    car_model: String,
    sale_date: String,
    price: f64,
}

/// Reads sales from a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    name: String,
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> SourceError {
        SourceError::Unavailable {
            source_name: self.name.clone(),
            reason: format!("{}: {reason}", self.path.display()),
        }
    }
}

impl SalesSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<SaleIter<'_>, SourceError> {
        let file = File::open(&self.path).map_err(|e| self.unavailable(e))?;
        // The top-level array has to be parsed whole; records are converted lazily.
        let items: Vec<JsonSale> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| self.unavailable(format!("invalid JSON document: {e}")))?;

        Ok(Box::new(items.into_iter().enumerate().map(move |(i, item)| {
            let malformed = |reason: String| SourceError::Malformed {
                source_name: self.name.clone(),
                record: i + 1,
                reason,
            };
            let sale_date = parse_sale_date(&item.sale_date).map_err(&malformed)?;
            let price = check_price(item.price).map_err(&malformed)?;
            Ok(RawSale {
                company: item.company,
                car_model: item.car_model,
                sale_date,
                price,
            })
        })))
    }
}
