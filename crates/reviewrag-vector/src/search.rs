use anyhow::{anyhow, bail, Context, Result};
use arrow_array::{Array, BooleanArray, Float32Array, Int32Array, Int64Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Table;
use std::path::Path;

use reviewrag_core::filter::Predicate;
use reviewrag_core::traits::Embedder;
use reviewrag_core::types::{CollectionHeader, RetrievedReview, ReviewMetadata};

use crate::schema::DISTANCE_COLUMN;
use crate::table::{open_db, read_header, table_exists};

/// Collection size plus the header written at build time.
#[derive(Debug, Clone, Default)]
pub struct CollectionStats { pub total_reviews: usize, pub header: CollectionHeader }

impl CollectionStats {
	pub fn date_range(&self) -> String { self.header.date_range() }
}

/// Query-time handle: one embedder and one opened table, read-only for its lifetime.
pub struct ReviewSearchEngine { table: Table, embedder: Box<dyn Embedder>, header: CollectionHeader }

impl ReviewSearchEngine {
	pub async fn open(db_path: &Path, collection: &str, embedder: Box<dyn Embedder>) -> Result<Self> {
		let db = open_db(db_path.to_string_lossy().as_ref()).await?;
		if !table_exists(&db, collection).await? {
			return Err(reviewrag_core::error::Error::NotFound(format!("collection '{}' in {}", collection, db_path.display())).into());
		}
		let table = db.open_table(collection).execute().await.with_context(|| format!("Failed to open collection '{}'", collection))?;
		let header = read_header(&db, collection).await?.unwrap_or_default();
		if !header.embedding_model.is_empty() && header.embedding_model != embedder.model_id() {
			// not enforced; relevance silently degrades
			tracing::warn!(built_with = %header.embedding_model, querying_with = %embedder.model_id(), "embedding model differs from the one used to build the collection");
		}
		Ok(Self { table, embedder, header })
	}

	pub fn embedder(&self) -> &dyn Embedder { self.embedder.as_ref() }

	pub async fn stats(&self) -> Result<CollectionStats> {
		Ok(CollectionStats { total_reviews: self.table.count_rows(None).await?, header: self.header.clone() })
	}

	/// The `n` nearest reviews to `query` that satisfy `filter`, closest first.
	///
	/// Fewer than `n` hits (including none) is a normal outcome when the
	/// filtered population is small.
	pub async fn retrieve(&self, query: &str, n: usize, filter: Option<&Predicate>) -> Result<Vec<RetrievedReview>> {
		if n == 0 { bail!("result count must be positive"); }
		let query_embedding = self.embedder.embed_batch(&[query.to_string()])?.pop().ok_or_else(|| anyhow!("embedder returned no vector for the query"))?;
		let mut search = self.table.vector_search(query_embedding)?.limit(n);
		if let Some(p) = filter {
			tracing::debug!(filter = %p, "applying prefilter");
			search = search.only_if(p.to_sql());
		}
		let mut stream = search.execute().await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			hits.extend(batch_to_reviews(&batch)?);
		}
		hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
		hits.truncate(n);
		tracing::debug!(query, n, hits = hits.len(), "retrieved reviews");
		Ok(hits)
	}
}

fn col<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<T>()).ok_or_else(|| anyhow!("column '{}' missing or has unexpected type", name))
}

fn batch_to_reviews(batch: &RecordBatch) -> Result<Vec<RetrievedReview>> {
	let id = col::<StringArray>(batch, "id")?;
	let document = col::<StringArray>(batch, "document")?;
	let date = col::<StringArray>(batch, "date")?;
	let year = col::<Int32Array>(batch, "year")?;
	let month = col::<StringArray>(batch, "month")?;
	let score = col::<Int32Array>(batch, "score")?;
	let version = col::<StringArray>(batch, "version")?;
	let thumbs_up = col::<Int64Array>(batch, "thumbs_up")?;
	let has_reply = col::<BooleanArray>(batch, "has_reply")?;
	let is_negative = col::<BooleanArray>(batch, "is_negative")?;
	let is_positive = col::<BooleanArray>(batch, "is_positive")?;
	let distance = batch.column_by_name(DISTANCE_COLUMN).and_then(|c| c.as_any().downcast_ref::<Float32Array>());

	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		out.push(RetrievedReview {
			id: id.value(i).to_string(),
			document: document.value(i).to_string(),
			metadata: ReviewMetadata {
				date: date.value(i).to_string(),
				year: year.value(i),
				month: month.value(i).to_string(),
				score: u8::try_from(score.value(i))?,
				version: version.value(i).to_string(),
				thumbs_up: u32::try_from(thumbs_up.value(i))?,
				has_reply: has_reply.value(i),
				is_negative: is_negative.value(i),
				is_positive: is_positive.value(i),
			},
			distance: distance.map(|d| d.value(i)).unwrap_or(0.0),
		});
	}
	Ok(out)
}
