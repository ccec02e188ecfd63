//! LanceDB connection and collection housekeeping.
//!
//! Opening the store, replacing a collection by name, and the key/value
//! header table (`<collection>_meta`) that records description, counts,
//! date range and the embedding model used for the build.

use anyhow::{anyhow, Result};
use lancedb::database::CreateTableMode;
use lancedb::query::ExecutableQuery;
use lancedb::{connect, Connection};

use arrow_array::{Array, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use reviewrag_core::types::CollectionHeader;

use crate::schema::{build_meta_schema, meta_table_name};

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await?;
    Ok(names.iter().any(|n| n == name))
}

/// Creates `name` from `batch`, replacing any table of the same name.
pub async fn create_or_replace(conn: &Connection, name: &str, batch: RecordBatch) -> Result<lancedb::Table> {
    let schema = batch.schema();
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    let table = conn
        .create_table(name, reader)
        .mode(CreateTableMode::Overwrite)
        .execute()
        .await?;
    Ok(table)
}

const HEADER_KEYS: [&str; 6] = [
    "description",
    "total_reviews",
    "date_created",
    "date_range_start",
    "date_range_end",
    "embedding_model",
];

fn header_values(h: &CollectionHeader) -> [String; 6] {
    [
        h.description.clone(),
        h.total_reviews.to_string(),
        h.date_created.clone(),
        h.date_range_start.clone(),
        h.date_range_end.clone(),
        h.embedding_model.clone(),
    ]
}

pub async fn write_header(conn: &Connection, collection: &str, header: &CollectionHeader) -> Result<()> {
    let now = Utc::now().timestamp_millis();
    let rb = RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from(HEADER_KEYS.to_vec())),
            Arc::new(StringArray::from(header_values(header).to_vec())),
            Arc::new(TimestampMillisecondArray::from(vec![now; HEADER_KEYS.len()])),
        ],
    )?;
    create_or_replace(conn, &meta_table_name(collection), rb).await?;
    Ok(())
}

/// Header of `collection`, or `None` when it was never written.
pub async fn read_header(conn: &Connection, collection: &str) -> Result<Option<CollectionHeader>> {
    let name = meta_table_name(collection);
    if !table_exists(conn, &name).await? { return Ok(None); }
    let t = conn.open_table(&name).execute().await?;
    let mut kv = HashMap::new();
    let mut stream = t.query().execute().await?;
    while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
        let keys = batch.column_by_name("key").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("meta.key column missing"))?;
        let vals = batch.column_by_name("value").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("meta.value column missing"))?;
        for i in 0..batch.num_rows() {
            if keys.is_valid(i) && vals.is_valid(i) { kv.insert(keys.value(i).to_string(), vals.value(i).to_string()); }
        }
    }
    let mut take = |k: &str| kv.remove(k).unwrap_or_default();
    Ok(Some(CollectionHeader {
        description: take("description"),
        total_reviews: take("total_reviews").parse().unwrap_or(0),
        date_created: take("date_created"),
        date_range_start: take("date_range_start"),
        date_range_end: take("date_range_end"),
        embedding_model: take("embedding_model"),
    }))
}
