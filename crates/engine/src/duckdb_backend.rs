//! DuckDB backend driven by the engine worker thread.

use duckdb::types::Value;
use tracing::debug;

use crate::bootstrap::{EngineBootstrapper, EngineSettings, RuntimeBundle};
use crate::error::EngineError;
use crate::result::{Cell, ResultColumn, ResultTable};
use crate::worker::Backend;

pub type DuckDbBootstrapper = EngineBootstrapper<DuckDbBackend>;

/// In-memory DuckDB database; each session is a cloned connection.
pub struct DuckDbBackend {
    root: duckdb::Connection,
}

impl Backend for DuckDbBackend {
    type Session = duckdb::Connection;

    fn open(bundle: &RuntimeBundle, settings: &EngineSettings) -> Result<Self, EngineError> {
        let root = duckdb::Connection::open_in_memory()
            .map_err(|e| EngineError::Bootstrap(format!("failed to open DuckDB: {e}")))?;

        let mut setup = format!("SET threads = {};", bundle.threads());
        if let Some(limit) = &settings.memory_limit {
            setup.push_str(&format!(" SET memory_limit = '{}';", limit.replace('\'', "''")));
        }
        root.execute_batch(&setup)
            .map_err(|e| EngineError::Bootstrap(format!("failed to configure DuckDB: {e}")))?;

        Ok(Self { root })
    }

    fn connect(&mut self) -> Result<Self::Session, EngineError> {
        self.root
            .try_clone()
            .map_err(|e| EngineError::Connect(e.to_string()))
    }

    fn execute(session: &mut Self::Session, sql: &str) -> Result<(), EngineError> {
        debug!(sql, "execute");
        session
            .execute_batch(sql)
            .map_err(|e| EngineError::statement(sql, e.to_string()))
    }

    fn query(session: &mut Self::Session, sql: &str) -> Result<ResultTable, EngineError> {
        debug!(sql, "query");
        let fail = |e: duckdb::Error| EngineError::statement(sql, e.to_string());

        let mut stmt = session.prepare(sql).map_err(fail)?;
        let mut data: Vec<Vec<Cell>> = Vec::new();
        {
            let mut rows = stmt.query([]).map_err(fail)?;
            let width = rows.as_ref().map(|s| s.column_count()).unwrap_or(0);
            data.resize_with(width, Vec::new);
            while let Some(row) = rows.next().map_err(fail)? {
                for (i, column) in data.iter_mut().enumerate() {
                    let value: Value = row.get(i).map_err(fail)?;
                    column.push(cell_from_value(value));
                }
            }
        }

        let columns = stmt
            .column_names()
            .into_iter()
            .zip(data)
            .map(|(name, values)| ResultColumn { name, values })
            .collect();
        Ok(ResultTable::new(columns))
    }
}

fn cell_from_value(value: Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Boolean(b) => Cell::Bool(b),
        Value::TinyInt(v) => Cell::Int(v.into()),
        Value::SmallInt(v) => Cell::Int(v.into()),
        Value::Int(v) => Cell::Int(v.into()),
        Value::BigInt(v) => Cell::Int(v),
        Value::UTinyInt(v) => Cell::Int(v.into()),
        Value::USmallInt(v) => Cell::Int(v.into()),
        Value::UInt(v) => Cell::Int(v.into()),
        Value::UBigInt(v) => i64::try_from(v).map(Cell::Int).unwrap_or(Cell::Float(v as f64)),
        Value::HugeInt(v) => i64::try_from(v).map(Cell::Int).unwrap_or(Cell::Float(v as f64)),
        Value::Float(v) => Cell::Float(v.into()),
        Value::Double(v) => Cell::Float(v),
        Value::Text(s) => Cell::Text(s),
        Value::Blob(b) => Cell::Blob(b),
        other => Cell::Text(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::DuckDbBootstrapper;
    use crate::bootstrap::EngineSettings;
    use crate::result::Cell;

    #[tokio::test]
    async fn runs_queries_on_the_worker() {
        let engine = DuckDbBootstrapper::new(EngineSettings::default())
            .initialize()
            .await
            .expect("bootstrap");
        let mut conn = engine.connect().await.expect("connect");
        conn.execute("CREATE OR REPLACE VIEW v AS SELECT * FROM (VALUES (1, 'a'), (NULL, 'b')) t(n, s)")
            .await
            .expect("view");
        let table = conn
            .query("SELECT TRY_CAST(n AS INTEGER) AS n, s FROM v ORDER BY s")
            .await
            .expect("query");
        assert_eq!(table.column("n").unwrap(), &[Cell::Int(1), Cell::Null]);
        assert_eq!(table.column("s").unwrap()[1], Cell::from("b"));
        conn.close().await.expect("close");
    }
}
