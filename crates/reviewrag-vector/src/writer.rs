use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use arrow_array::{BooleanArray, FixedSizeListArray, Int32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use std::sync::Arc;
use std::path::Path;

use reviewrag_core::types::{CollectionHeader, ReviewDocument};
use crate::schema::build_review_schema;
use crate::table::{create_or_replace, open_db, write_header};

/// Builds a collection from scratch. There is no update path: every build
/// replaces the whole collection, and a failed build is recovered by
/// running it again.
pub struct ReviewIndexer { pub(crate) db: Connection, pub(crate) collection: String, dim: usize, show_progress: bool }

impl ReviewIndexer {
	pub async fn new(db_path: &Path, collection: &str, dim: usize) -> Result<Self> {
		let db = open_db(db_path.to_string_lossy().as_ref()).await?;
		Ok(Self { db, collection: collection.to_string(), dim, show_progress: false })
	}

	pub fn with_progress(mut self, show: bool) -> Self { self.show_progress = show; self }

	/// Replaces the collection with `docs`, inserting `batch_size` rows at a time, then writes `header`.
	pub async fn build(&self, docs: &[ReviewDocument], embeddings: &[Vec<f32>], header: &CollectionHeader, batch_size: usize) -> Result<usize> {
		if docs.len() != embeddings.len() { bail!("{} documents but {} embeddings", docs.len(), embeddings.len()); }
		if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dim) { bail!("embedding dim {} != collection dim {}", bad.len(), self.dim); }
		let batch_size = batch_size.max(1);
		tracing::info!(collection = %self.collection, rows = docs.len(), "creating collection");

		let pb = if self.show_progress { ProgressBar::new(docs.len() as u64) } else { ProgressBar::hidden() };
		pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} reviews ({percent}%) {msg}")?.progress_chars("#>-"));

		let mut chunks = docs.chunks(batch_size).zip(embeddings.chunks(batch_size));
		let first = match chunks.next() {
			Some((d, e)) => self.to_record_batch(d, e)?,
			None => RecordBatch::new_empty(build_review_schema(self.dim as i32)),
		};
		let first_rows = first.num_rows();
		let table = create_or_replace(&self.db, &self.collection, first).await?;
		pb.inc(first_rows as u64);

		for (i, (d, e)) in chunks.enumerate() {
			let rb = self.to_record_batch(d, e)?; let schema = rb.schema();
			let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), schema));
			table.add(reader).execute().await?;
			pb.inc(d.len() as u64); pb.set_message(format!("batch {}", i + 2));
		}
		pb.finish_with_message("done");

		write_header(&self.db, &self.collection, header).await?;
		let count = table.count_rows(None).await?;
		tracing::info!(collection = %self.collection, count, "collection ready");
		Ok(count)
	}

	fn to_record_batch(&self, docs: &[ReviewDocument], embeddings: &[Vec<f32>]) -> Result<RecordBatch> {
		let schema = build_review_schema(self.dim as i32);
		let m = |f: fn(&ReviewDocument) -> String| docs.iter().map(f).collect::<Vec<String>>();
		let vectors = embeddings.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
		let record_batch = RecordBatch::try_new(schema, vec![
			Arc::new(StringArray::from(m(|d| d.id.clone()))),
			Arc::new(StringArray::from(m(|d| d.document.clone()))),
			Arc::new(StringArray::from(m(|d| d.metadata.date.clone()))),
			Arc::new(Int32Array::from(docs.iter().map(|d| d.metadata.year).collect::<Vec<_>>())),
			Arc::new(StringArray::from(m(|d| d.metadata.month.clone()))),
			Arc::new(Int32Array::from(docs.iter().map(|d| i32::from(d.metadata.score)).collect::<Vec<_>>())),
			Arc::new(StringArray::from(m(|d| d.metadata.version.clone()))),
			Arc::new(Int64Array::from(docs.iter().map(|d| i64::from(d.metadata.thumbs_up)).collect::<Vec<_>>())),
			Arc::new(BooleanArray::from(docs.iter().map(|d| d.metadata.has_reply).collect::<Vec<_>>())),
			Arc::new(BooleanArray::from(docs.iter().map(|d| d.metadata.is_negative).collect::<Vec<_>>())),
			Arc::new(BooleanArray::from(docs.iter().map(|d| d.metadata.is_positive).collect::<Vec<_>>())),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, self.dim as i32)),
		])?;
		Ok(record_batch)
	}
}
