use crate::catalog::{ColumnCatalog, ColumnType};
use crate::coerce::{ColumnData, coerce_column};
use crate::error::{FeatureError, FeatureResult};
use crate::flatten::FlatRow;

#[derive(Debug, Clone, PartialEq)]
pub struct TypedColumn {
    pub name: String,
    pub ty: ColumnType,
    pub data: ColumnData,
}

/// Columnar training table. Rows are kept in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedTable {
    columns: Vec<TypedColumn>,
    rows: usize,
}

pub fn assemble(rows: &[FlatRow], catalog: &ColumnCatalog) -> FeatureResult<TypedTable> {
    let mut table = TypedTable::empty(catalog);
    table.append_batch(rows, catalog)?;
    Ok(table)
}

impl TypedTable {
    pub fn empty(catalog: &ColumnCatalog) -> Self {
        Self {
            columns: catalog
                .columns()
                .iter()
                .map(|c| TypedColumn {
                    name: c.name.clone(),
                    ty: c.ty,
                    data: ColumnData::new(c.ty),
                })
                .collect(),
            rows: 0,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[TypedColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> FeatureResult<&TypedColumn> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| FeatureError::UnknownColumn {
                name: name.to_string(),
            })
    }

    /// Coerces the whole batch first and only then extends the table, so a
    /// rejected batch leaves previously assembled rows untouched.
    pub fn append_batch(&mut self, rows: &[FlatRow], catalog: &ColumnCatalog) -> FeatureResult<usize> {
        self.check_schema(catalog)?;
        if let Some(bad) = rows.iter().find(|r| r.len() != catalog.len()) {
            return Err(FeatureError::SchemaMismatch {
                expected: catalog.len(),
                found: bad.len(),
            });
        }
        if rows.is_empty() {
            return Ok(0);
        }

        let mut batch = Vec::with_capacity(catalog.len());
        for (idx, column) in catalog.columns().iter().enumerate() {
            batch.push(coerce_column(column, rows.iter().map(|r| &r.cells()[idx]))?);
        }

        for (column, data) in self.columns.iter_mut().zip(batch) {
            column.data.append(data);
        }
        self.rows += rows.len();
        Ok(rows.len())
    }

    fn check_schema(&self, catalog: &ColumnCatalog) -> FeatureResult<()> {
        let same = self.columns.len() == catalog.len()
            && self
                .columns
                .iter()
                .zip(catalog.columns())
                .all(|(have, want)| have.name == want.name && have.ty == want.ty);
        if same {
            Ok(())
        } else {
            Err(FeatureError::SchemaMismatch {
                expected: self.columns.len(),
                found: catalog.len(),
            })
        }
    }
}
