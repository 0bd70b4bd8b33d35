//! Scripted in-memory engine for tests.
//!
//! It understands just enough of the viewer's SQL to be useful: the
//! information-schema lookup, the feature query's range predicate, and quoted
//! identifiers that must name known columns.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::connection::{BoxFuture, Connection, Engine};
use crate::error::EngineError;
use crate::result::{Cell, ResultTable};

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedRow {
    pub geojson: Option<String>,
    pub class_val: Cell,
}

impl ScriptedRow {
    pub fn new(geojson: Option<&str>, class_val: Option<i64>) -> Self {
        Self {
            geojson: geojson.map(str::to_string),
            class_val: Cell::from(class_val),
        }
    }
}

#[derive(Default)]
struct Shared {
    statements: Mutex<Vec<String>>,
    holds: Mutex<HashMap<(i64, i64), Arc<Notify>>>,
    failures: Mutex<Vec<String>>,
    next_id: AtomicU64,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Test double implementing [`Engine`] over a fixture dataset.
#[derive(Clone)]
pub struct ScriptedEngine {
    view: String,
    schema: Vec<(String, String)>,
    rows: Vec<ScriptedRow>,
    shared: Arc<Shared>,
}

impl ScriptedEngine {
    pub fn new(schema: &[(&str, &str)], rows: Vec<ScriptedRow>) -> Self {
        Self {
            view: "features".to_string(),
            schema: schema
                .iter()
                .map(|(n, t)| ((*n).to_string(), (*t).to_string()))
                .collect(),
            rows,
            shared: Arc::default(),
        }
    }

    /// Any statement containing `needle` fails.
    pub fn fail_on(&self, needle: &str) {
        self.shared.failures.lock().push(needle.to_string());
    }

    /// Delay feature queries for `min..=max` until the returned notify fires.
    pub fn hold(&self, min: i64, max: i64) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.shared.holds.lock().insert((min, max), notify.clone());
        notify
    }

    pub fn statements(&self) -> Vec<String> {
        self.shared.statements.lock().clone()
    }

    pub fn opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn check(&self, sql: &str) -> Result<(), EngineError> {
        self.shared.statements.lock().push(sql.to_string());
        if let Some(needle) = self
            .shared
            .failures
            .lock()
            .iter()
            .find(|n| sql.contains(n.as_str()))
        {
            return Err(EngineError::statement(sql, format!("scripted failure on {needle}")));
        }
        for ident in quoted_identifiers(sql) {
            let known = ident.eq_ignore_ascii_case(&self.view)
                || self.schema.iter().any(|(n, _)| n.eq_ignore_ascii_case(&ident));
            if !known {
                return Err(EngineError::statement(
                    sql,
                    format!("Binder Error: Referenced column \"{ident}\" not found"),
                ));
            }
        }
        Ok(())
    }

    fn schema_table(&self) -> ResultTable {
        ResultTable::from_rows(
            &["column_name", "data_type"],
            self.schema
                .iter()
                .map(|(n, t)| vec![Cell::from(n.as_str()), Cell::from(t.as_str())])
                .collect(),
        )
    }

    fn feature_table(&self, range: Option<(i64, i64)>) -> ResultTable {
        let rows = self
            .rows
            .iter()
            .filter(|row| row.geojson.is_some())
            .filter(|row| match (&row.class_val, range) {
                (Cell::Int(v), Some((min, max))) => *v >= min && *v <= max,
                _ => true,
            })
            .map(|row| vec![Cell::from(row.geojson.clone()), row.class_val.clone()])
            .collect();
        ResultTable::from_rows(&["geojson", "class_val"], rows)
    }
}

impl Engine for ScriptedEngine {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, EngineError>> {
        Box::pin(async move {
            let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.shared.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedConnection {
                id,
                engine: self.clone(),
                closed: false,
            }) as Box<dyn Connection>)
        })
    }
}

struct ScriptedConnection {
    id: u64,
    engine: ScriptedEngine,
    closed: bool,
}

impl Connection for ScriptedConnection {
    fn id(&self) -> u64 {
        self.id
    }

    fn execute<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move { self.engine.check(sql) })
    }

    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<ResultTable, EngineError>> {
        Box::pin(async move {
            self.engine.check(sql)?;
            if sql.contains("information_schema.columns") {
                return Ok(self.engine.schema_table());
            }
            let range = between_bounds(sql);
            let hold = range.and_then(|r| self.engine.shared.holds.lock().get(&r).cloned());
            if let Some(notify) = hold {
                notify.notified().await;
            }
            Ok(self.engine.feature_table(range))
        })
    }

    fn close(mut self: Box<Self>) -> BoxFuture<'static, Result<(), EngineError>> {
        self.closed = true;
        self.engine.shared.closed.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.engine.shared.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn quoted_identifiers(sql: &str) -> Vec<String> {
    sql.split('"')
        .skip(1)
        .step_by(2)
        .map(str::to_string)
        .collect()
}

fn between_bounds(sql: &str) -> Option<(i64, i64)> {
    let rest = &sql[sql.find("BETWEEN ")? + "BETWEEN ".len()..];
    let mut parts = rest.split_whitespace();
    let min = parts.next()?.parse().ok()?;
    if parts.next()? != "AND" {
        return None;
    }
    let max = parts.next()?.trim_end_matches(')').parse().ok()?;
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::{between_bounds, quoted_identifiers};

    #[test]
    fn reads_between_bounds() {
        assert_eq!(
            between_bounds("WHERE (x IS NULL OR x BETWEEN -3 AND 10)"),
            Some((-3, 10))
        );
        assert_eq!(between_bounds("SELECT 1"), None);
    }

    #[test]
    fn lists_quoted_identifiers() {
        assert_eq!(
            quoted_identifiers(r#"SELECT "a", "b" FROM "v""#),
            vec!["a", "b", "v"]
        );
    }
}
