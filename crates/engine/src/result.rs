/// A single cell of a columnar query result.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "bool",
            Cell::Int(_) => "int",
            Cell::Float(_) => "float",
            Cell::Text(_) => "text",
            Cell::Blob(_) => "blob",
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultColumn {
    pub name: String,
    pub values: Vec<Cell>,
}

/// Columnar query result: named columns of flat cell arrays.
///
/// Columns are expected to share a length; [`ResultTable::row_count`] reports
/// the length of the first column and consumers validate the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    columns: Vec<ResultColumn>,
}

impl ResultTable {
    pub fn new(columns: Vec<ResultColumn>) -> Self {
        Self { columns }
    }

    /// Build a table from row-major data.
    pub fn from_rows(names: &[&str], rows: Vec<Vec<Cell>>) -> Self {
        let mut columns: Vec<ResultColumn> = names
            .iter()
            .map(|name| ResultColumn {
                name: (*name).to_string(),
                values: Vec::with_capacity(rows.len()),
            })
            .collect();
        for row in rows {
            for (column, cell) in columns.iter_mut().zip(row) {
                column.values.push(cell);
            }
        }
        Self { columns }
    }

    pub fn columns(&self) -> &[ResultColumn] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    /// Case-insensitive column lookup.
    pub fn column(&self, name: &str) -> Option<&[Cell]> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| c.values.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::{Cell, ResultTable};

    #[test]
    fn from_rows_transposes_into_columns() {
        let table = ResultTable::from_rows(
            &["a", "b"],
            vec![
                vec![Cell::Int(1), Cell::from("x")],
                vec![Cell::Int(2), Cell::Null],
            ],
        );
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("A").unwrap(), &[Cell::Int(1), Cell::Int(2)]);
        assert_eq!(table.column("b").unwrap()[1], Cell::Null);
        assert!(table.column("c").is_none());
    }

    #[test]
    fn option_converts_to_null() {
        let none: Option<i64> = None;
        assert!(Cell::from(none).is_null());
        assert_eq!(Cell::from(Some(3i64)), Cell::Int(3));
    }
}
