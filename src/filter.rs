//! Filter & merge: apply a task's filters uniformly to every source and
//! concatenate the matches in source order.

use opentelemetry::KeyValue;
use tracing::{info, warn};

use crate::model::{NewSalesRecord, RawSale, Task};
use crate::source::{SalesSource, SourceError, SourceSet};
use crate::telemetry::metrics;

/// Year range plus optional company allowlist, taken from a task.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleFilter {
    start_year: i32,
    end_year: i32,
    companies: Option<Vec<String>>,
}

impl SaleFilter {
    pub fn for_task(task: &Task) -> Self {
        Self {
            start_year: task.start_year,
            end_year: task.end_year,
            companies: task.company_list(),
        }
    }

    /// Inclusive year bounds, then exact company membership if a list is set.
    pub fn matches(&self, sale: &RawSale) -> bool {
        let year = sale.year();
        if year < self.start_year || year > self.end_year {
            return false;
        }
        match self.companies {
            Some(ref allow) => allow.iter().any(|c| *c == sale.company),
            None => true,
        }
    }
}

/// Read every source, keep what matches `task`, and tag it with the task id.
///
/// Output is source A's matches followed by source B's, each in the
/// source's own order, without deduplication. A source that cannot be
/// opened contributes nothing. A source that hits a malformed record stops
/// there and contributes only the matches read before it. Either way the
/// other sources are still read.
pub fn collect_matching(task: &Task, sources: &SourceSet) -> Vec<NewSalesRecord> {
    let filter = SaleFilter::for_task(task);
    let mut merged = Vec::new();

    for source in sources.iter() {
        let (sales, failure) = read_matching(source, &filter);
        let result = match failure {
            None => {
                info!(
                    task_id = %task.id,
                    source = source.name(),
                    matched = sales.len(),
                    "source read"
                );
                "ok"
            }
            Some(ref e) => {
                warn!(
                    task_id = %task.id,
                    source = source.name(),
                    matched = sales.len(),
                    error = %e,
                    "source read stopped early"
                );
                e.kind()
            }
        };
        metrics::source_reads().add(
            1,
            &[
                KeyValue::new("source", source.name().to_string()),
                KeyValue::new("result", result),
            ],
        );
        merged.extend(sales.into_iter().map(|sale| NewSalesRecord {
            task_id: task.id,
            sale,
        }));
    }

    merged
}

/// Matches read so far, plus the error that ended the pass early, if any.
fn read_matching(
    source: &dyn SalesSource,
    filter: &SaleFilter,
) -> (Vec<RawSale>, Option<SourceError>) {
    let sales = match source.read() {
        Ok(sales) => sales,
        Err(e) => return (Vec::new(), Some(e)),
    };

    let mut matched = Vec::new();
    for sale in sales {
        match sale {
            Ok(sale) if filter.matches(&sale) => matched.push(sale),
            Ok(_) => {}
            Err(e) => return (matched, Some(e)),
        }
    }
    (matched, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskId, TaskStatus};
    use crate::source::SaleIter;
    use chrono::{NaiveDate, Utc};

    enum Entry {
        Sale(RawSale),
        Broken,
    }

    struct StaticSource {
        name: &'static str,
        entries: Option<Vec<Entry>>,
    }

    impl SalesSource for StaticSource {
        fn name(&self) -> &str {
            self.name
        }

        fn read(&self) -> Result<SaleIter<'_>, SourceError> {
            let Some(ref entries) = self.entries else {
                return Err(SourceError::Unavailable {
                    source_name: self.name.to_string(),
                    reason: "offline".to_string(),
                });
            };
            Ok(Box::new(entries.iter().enumerate().map(|(i, e)| match e {
                Entry::Sale(s) => Ok(s.clone()),
                Entry::Broken => Err(SourceError::Malformed {
                    source_name: self.name.to_string(),
                    record: i + 1,
                    reason: "bad date".to_string(),
                }),
            })))
        }
    }

    fn sale(company: &str, model: &str, date: (i32, u32, u32)) -> RawSale {
        RawSale {
            company: company.to_string(),
            car_model: model.to_string(),
            sale_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            price: 1000.0,
        }
    }

    fn task(start: i32, end: i32, companies: Option<&str>) -> Task {
        Task {
            id: TaskId::new(),
            status: TaskStatus::InProgress,
            start_year: start,
            end_year: end,
            companies: companies.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    fn sources(a: Option<Vec<Entry>>, b: Option<Vec<Entry>>) -> SourceSet {
        SourceSet::new(vec![
            Box::new(StaticSource {
                name: "a",
                entries: a,
            }),
            Box::new(StaticSource {
                name: "b",
                entries: b,
            }),
        ])
    }

    #[test]
    fn year_bounds_are_inclusive() {
        let filter = SaleFilter::for_task(&task(2022, 2023, None));
        assert!(filter.matches(&sale("X", "m", (2022, 1, 1))));
        assert!(filter.matches(&sale("X", "m", (2023, 12, 31))));
        assert!(!filter.matches(&sale("X", "m", (2021, 12, 31))));
        assert!(!filter.matches(&sale("X", "m", (2024, 1, 1))));
    }

    #[test]
    fn company_match_is_exact() {
        let filter = SaleFilter::for_task(&task(2020, 2025, Some("Honda,Toyota")));
        assert!(filter.matches(&sale("Honda", "m", (2023, 1, 1))));
        assert!(filter.matches(&sale("Toyota", "m", (2023, 1, 1))));
        assert!(!filter.matches(&sale("honda", "m", (2023, 1, 1))));
        assert!(!filter.matches(&sale("Ford", "m", (2023, 1, 1))));

        let spaced = SaleFilter::for_task(&task(2020, 2025, Some("Honda, Toyota")));
        assert!(!spaced.matches(&sale("Toyota", "m", (2023, 1, 1))));
        assert!(spaced.matches(&sale(" Toyota", "m", (2023, 1, 1))));
    }

    #[test]
    fn company_filter_applies_to_both_sources() {
        let t = task(2023, 2024, Some("Honda"));
        let set = sources(
            Some(vec![
                Entry::Sale(sale("Honda", "Civic", (2023, 5, 1))),
                Entry::Sale(sale("Toyota", "Corolla", (2023, 6, 1))),
            ]),
            Some(vec![
                Entry::Sale(sale("Honda", "Accord", (2022, 1, 1))),
                Entry::Sale(sale("Toyota", "Camry", (2024, 1, 1))),
            ]),
        );

        let out = collect_matching(&t, &set);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sale.car_model, "Civic");
        assert_eq!(out[0].task_id, t.id);
    }

    #[test]
    fn merge_keeps_source_order_and_duplicates() {
        let t = task(2020, 2025, None);
        let dup = sale("Kia", "Rio", (2021, 1, 1));
        let set = sources(
            Some(vec![
                Entry::Sale(sale("Kia", "Soul", (2022, 1, 1))),
                Entry::Sale(dup.clone()),
            ]),
            Some(vec![Entry::Sale(dup.clone())]),
        );

        let models: Vec<_> = collect_matching(&t, &set)
            .into_iter()
            .map(|r| r.sale.car_model)
            .collect();
        assert_eq!(models, ["Soul", "Rio", "Rio"]);
    }

    #[test]
    fn unavailable_source_does_not_block_the_other() {
        let t = task(2020, 2025, None);
        let set = sources(None, Some(vec![Entry::Sale(sale("Kia", "Rio", (2021, 1, 1)))]));

        let out = collect_matching(&t, &set);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sale.company, "Kia");
    }

    #[test]
    fn malformed_record_stops_that_source_only() {
        let t = task(2020, 2025, None);
        let set = sources(
            Some(vec![
                Entry::Sale(sale("Kia", "Rio", (2021, 1, 1))),
                Entry::Broken,
                Entry::Sale(sale("Kia", "Soul", (2021, 1, 1))),
            ]),
            Some(vec![Entry::Sale(sale("Ford", "Focus", (2022, 1, 1)))]),
        );

        let models: Vec<_> = collect_matching(&t, &set)
            .into_iter()
            .map(|r| r.sale.car_model)
            .collect();
        assert_eq!(models, ["Rio", "Focus"]);
    }

    #[test]
    fn malformed_first_record_contributes_nothing() {
        let t = task(2020, 2025, None);
        let set = sources(
            Some(vec![
                Entry::Broken,
                Entry::Sale(sale("Kia", "Soul", (2021, 1, 1))),
            ]),
            Some(vec![Entry::Sale(sale("Ford", "Focus", (2022, 1, 1)))]),
        );

        let out = collect_matching(&t, &set);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sale.company, "Ford");
    }

    #[test]
    fn nothing_matching_is_empty_not_an_error() {
        let t = task(1990, 1991, None);
        let set = sources(
            Some(vec![Entry::Sale(sale("Kia", "Rio", (2021, 1, 1)))]),
            Some(vec![]),
        );
        assert!(collect_matching(&t, &set).is_empty());
    }
}
