use arrow_schema::{DataType, Field, Fields, Schema};
use std::sync::Arc;

pub const VECTOR_COLUMN: &str = "vector";

/// Arrow schema for indexed document chunks stored in LanceDB.
///
/// Columns:
/// - id         : `<file_path>:<start_line>:<end_line>`
/// - text       : chunk text
/// - file_path  : path relative to the indexed directory
/// - start_line : 1-based first line
/// - end_line   : 1-based last line (inclusive)
/// - start_char : character offset of the first char
/// - end_char   : character offset one past the last char
/// - vector     : embedding vector (FixedSizeList<Float32>); its width is the
///   table's dimensionality
pub fn chunks_schema(embedding_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(Fields::from(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("file_path", DataType::Utf8, false),
        Field::new("start_line", DataType::UInt32, false),
        Field::new("end_line", DataType::UInt32, false),
        Field::new("start_char", DataType::UInt32, false),
        Field::new("end_char", DataType::UInt32, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                embedding_dim as i32,
            ),
            false,
        ),
    ])))
}

/// Width declared by the vector column, if it is a fixed-size list.
pub fn declared_dimensions(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(VECTOR_COLUMN).ok()?.data_type() {
        DataType::FixedSizeList(_, size) if *size > 0 => Some(*size as usize),
        _ => None,
    }
}
