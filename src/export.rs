use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::{SerializedColumnWriter, SerializedFileWriter};
use parquet::schema::parser::parse_message_type;

use crate::catalog::ColumnType;
use crate::coerce::ColumnData;
use crate::table::TypedTable;

/// Writes the table as a single row group. Every column is optional; ints
/// widen to INT64 and timestamps are stored as UTC milliseconds.
pub fn write_parquet(table: &TypedTable, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let schema = parse_message_type(&message_type(table)).context("build parquet schema")?;
    let props = WriterProperties::builder().build();
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = SerializedFileWriter::new(file, Arc::new(schema), Arc::new(props))
        .context("open parquet writer")?;

    let mut row_group = writer.next_row_group().context("start row group")?;
    for column in table.columns() {
        let mut col = row_group
            .next_column()
            .context("next parquet column")?
            .ok_or_else(|| anyhow!("parquet schema ended before column {}", column.name))?;
        write_column(&mut col, &column.data)
            .with_context(|| format!("write column {}", column.name))?;
        col.close()
            .with_context(|| format!("close column {}", column.name))?;
    }
    row_group.close().context("close row group")?;
    writer.close().context("close parquet file")?;
    Ok(table.row_count())
}

fn message_type(table: &TypedTable) -> String {
    let mut out = String::from("message match_features {\n");
    for column in table.columns() {
        let physical = match column.ty {
            ColumnType::Int(_) => "INT64",
            ColumnType::Bool => "BOOLEAN",
            ColumnType::Float => "DOUBLE",
            ColumnType::Category | ColumnType::Text => "BYTE_ARRAY",
            ColumnType::Timestamp => "INT64",
        };
        let annotation = match column.ty {
            ColumnType::Category | ColumnType::Text => " (UTF8)",
            ColumnType::Timestamp => " (TIMESTAMP(MILLIS,true))",
            _ => "",
        };
        out.push_str(&format!(
            "  OPTIONAL {physical} {}{annotation};\n",
            column.name
        ));
    }
    out.push('}');
    out
}

fn write_column(col: &mut SerializedColumnWriter<'_>, data: &ColumnData) -> Result<()> {
    match data {
        ColumnData::Int(cells) => {
            let (values, defs) = split(cells, |v| *v);
            col.typed::<Int64Type>()
                .write_batch(&values, Some(defs.as_slice()), None)?;
        }
        ColumnData::Bool(cells) => {
            let (values, defs) = split(cells, |v| *v);
            col.typed::<BoolType>()
                .write_batch(&values, Some(defs.as_slice()), None)?;
        }
        ColumnData::Float(cells) => {
            let (values, defs) = split(cells, |v| *v);
            col.typed::<DoubleType>()
                .write_batch(&values, Some(defs.as_slice()), None)?;
        }
        ColumnData::Text(cells) => {
            let (values, defs) = split(cells, |v| ByteArray::from(v.as_str()));
            col.typed::<ByteArrayType>()
                .write_batch(&values, Some(defs.as_slice()), None)?;
        }
        ColumnData::Timestamp(cells) => {
            let (values, defs) = split(cells, |v| v.timestamp_millis());
            col.typed::<Int64Type>()
                .write_batch(&values, Some(defs.as_slice()), None)?;
        }
    }
    Ok(())
}

// Present values plus definition levels (1 = present, 0 = null).
fn split<T, U>(cells: &[Option<T>], f: impl Fn(&T) -> U) -> (Vec<U>, Vec<i16>) {
    let mut values = Vec::with_capacity(cells.len());
    let mut defs = Vec::with_capacity(cells.len());
    for cell in cells {
        match cell {
            Some(v) => {
                values.push(f(v));
                defs.push(1);
            }
            None => defs.push(0),
        }
    }
    (values, defs)
}
