//! Sales record persistence.

use chrono::NaiveDate;
use opentelemetry::KeyValue;

use super::task::{get_task_on, record_transition};
use super::{Db, TxContext};
use crate::error::{Error, Result};
use crate::model::{NewSalesRecord, SalesRecord, Task, TaskId, TaskStatus};
use crate::telemetry::metrics;

const DATE_FORMAT: &str = "%Y-%m-%d";

impl Db {
    /// Records produced for a task, in insertion order.
    ///
    /// Fails with [`Error::NotFound`] if the task does not exist; a task
    /// that matched nothing yields an empty list.
    pub async fn list_records(&self, task_id: TaskId) -> Result<Vec<SalesRecord>> {
        // Existence check and fetch share one snapshot.
        let mut tx = self.begin().await?;
        get_task_on(tx.conn(), task_id).await?;

        let rows: Vec<SalesRecordRow> = sqlx::query_as(
            "SELECT id, task_id, company, car_model, sale_date, price
             FROM sales_records WHERE task_id = ?1 ORDER BY id ASC",
        )
        .bind(task_id.to_string())
        .fetch_all(&mut *tx.conn())
        .await?;
        tx.commit().await?;

        rows.into_iter()
            .map(SalesRecordRow::try_into_record)
            .collect()
    }

    /// Final write batch: in_progress → completed plus every record, atomically.
    ///
    /// If the task is not in progress nothing is written.
    pub async fn complete_task(&self, id: TaskId, records: &[NewSalesRecord]) -> Result<Task> {
        let mut tx = self.begin().await?;
        let from = tx.update_status(id, TaskStatus::Completed).await?;
        let inserted = tx.insert_records(id, records).await?;
        let task = tx.get_task(id).await?;
        tx.commit().await?;

        record_transition(from, TaskStatus::Completed);
        metrics::records_persisted().add(inserted, &[KeyValue::new("operation", "complete")]);
        Ok(task)
    }
}

impl TxContext {
    /// Insert records owned by `task_id`. Returns the number inserted.
    pub async fn insert_records(
        &mut self,
        task_id: TaskId,
        records: &[NewSalesRecord],
    ) -> Result<u64> {
        let owner = task_id.to_string();
        let mut inserted = 0;

        for record in records {
            if record.task_id != task_id {
                return Err(Error::Other(format!(
                    "record tagged for task {} inserted under task {task_id}",
                    record.task_id
                )));
            }

            inserted += sqlx::query(
                "INSERT INTO sales_records (task_id, company, car_model, sale_date, price)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&owner)
            .bind(&record.sale.company)
            .bind(&record.sale.car_model)
            .bind(record.sale.sale_date.format(DATE_FORMAT).to_string())
            .bind(record.sale.price)
            .execute(&mut *self.conn())
            .await?
            .rows_affected();
        }

        Ok(inserted)
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct SalesRecordRow {
    id: i64,
    task_id: String,
    company: String,
    car_model: String,
    sale_date: String,
    price: f64,
}

impl SalesRecordRow {
    fn try_into_record(self) -> Result<SalesRecord> {
        let sale_date = NaiveDate::parse_from_str(&self.sale_date, DATE_FORMAT)
            .map_err(|e| Error::Other(format!("bad stored sale_date {:?}: {e}", self.sale_date)))?;

        Ok(SalesRecord {
            id: self.id,
            task_id: self.task_id.parse()?,
            company: self.company,
            car_model: self.car_model,
            sale_date,
            price: self.price,
        })
    }
}
