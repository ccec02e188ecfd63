use arrow_schema::{Schema, Field, DataType};
use std::sync::Arc;

pub const VECTOR_COLUMN: &str = "vector";
pub const DISTANCE_COLUMN: &str = "_distance";

/// One row per review: id, embedded text, metadata columns, vector.
pub fn build_review_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("document", DataType::Utf8, false),
		Field::new("date", DataType::Utf8, false),
		Field::new("year", DataType::Int32, false),
		Field::new("month", DataType::Utf8, false),
		Field::new("score", DataType::Int32, false),
		Field::new("version", DataType::Utf8, false),
		Field::new("thumbs_up", DataType::Int64, false),
		Field::new("has_reply", DataType::Boolean, false),
		Field::new("is_negative", DataType::Boolean, false),
		Field::new("is_positive", DataType::Boolean, false),
		Field::new(VECTOR_COLUMN, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

/// Key/value header table stored next to a collection.
pub fn build_meta_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
		Field::new("updated_at", DataType::Timestamp(arrow_schema::TimeUnit::Millisecond, None), false),
	]))
}

pub fn meta_table_name(collection: &str) -> String {
	format!("{}_meta", collection)
}
