use engine::{Cell, Connection, ResultTable};
use formats::{Feature, FeatureCollection, Geometry};
use tracing::{debug, warn};

use crate::error::{MaterializeError, PipelineError};
use crate::query::{CLASS_COLUMN, FeatureQuery, GEOJSON_COLUMN};

/// What to do with a row whose GeoJSON text does not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvalidGeometryPolicy {
    /// Drop the row, log it and count it.
    #[default]
    Skip,
    /// Fail the whole run.
    Abort,
}

/// Typed view of one result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRow {
    pub geojson: Option<String>,
    pub class_val: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Materialized {
    pub collection: FeatureCollection,
    /// Rows dropped under [`InvalidGeometryPolicy::Skip`].
    pub skipped: usize,
}

/// Execute `query` and turn its rows into a feature collection.
pub async fn materialize(
    conn: &mut dyn Connection,
    query: &FeatureQuery,
    policy: InvalidGeometryPolicy,
) -> Result<Materialized, PipelineError> {
    let sql = query.to_sql();
    debug!(%sql, "running feature query");
    let table = conn.query(&sql).await.map_err(PipelineError::Query)?;
    let rows = typed_rows(&table)?;
    Ok(assemble(rows, policy)?)
}

/// Validate the result shape and convert cells into [`FeatureRow`]s.
pub fn typed_rows(table: &ResultTable) -> Result<Vec<FeatureRow>, MaterializeError> {
    let geojson = table
        .column(GEOJSON_COLUMN)
        .ok_or_else(|| MaterializeError::Shape(format!("missing column {GEOJSON_COLUMN}")))?;
    let class_val = table
        .column(CLASS_COLUMN)
        .ok_or_else(|| MaterializeError::Shape(format!("missing column {CLASS_COLUMN}")))?;
    if geojson.len() != class_val.len() {
        return Err(MaterializeError::Shape(format!(
            "column lengths differ: {} vs {}",
            geojson.len(),
            class_val.len()
        )));
    }

    geojson
        .iter()
        .zip(class_val)
        .enumerate()
        .map(|(row, (g, c))| -> Result<FeatureRow, MaterializeError> {
            Ok(FeatureRow {
                geojson: text_cell(row, g)?,
                class_val: int_cell(row, c)?,
            })
        })
        .collect()
}

fn text_cell(row: usize, cell: &Cell) -> Result<Option<String>, MaterializeError> {
    match cell {
        Cell::Null => Ok(None),
        Cell::Text(s) => Ok(Some(s.clone())),
        other => Err(MaterializeError::Shape(format!(
            "row {row}: {GEOJSON_COLUMN} is {}, expected text",
            other.type_name()
        ))),
    }
}

fn int_cell(row: usize, cell: &Cell) -> Result<Option<i32>, MaterializeError> {
    match cell {
        Cell::Null => Ok(None),
        Cell::Int(v) => i32::try_from(*v).map(Some).map_err(|_| {
            MaterializeError::Shape(format!("row {row}: {CLASS_COLUMN} {v} out of i32 range"))
        }),
        other => Err(MaterializeError::Shape(format!(
            "row {row}: {CLASS_COLUMN} is {}, expected integer",
            other.type_name()
        ))),
    }
}

/// Parse each row's geometry; feature order follows row order.
pub fn assemble(
    rows: Vec<FeatureRow>,
    policy: InvalidGeometryPolicy,
) -> Result<Materialized, MaterializeError> {
    let mut features = Vec::with_capacity(rows.len());
    let mut skipped = 0;

    for (row, FeatureRow { geojson, class_val }) in rows.into_iter().enumerate() {
        let Some(text) = geojson.filter(|t| !t.is_empty()) else {
            continue;
        };
        match Geometry::from_geojson_str(&text) {
            Ok(geometry) => features.push(Feature {
                geometry,
                class_val,
            }),
            Err(source) => match policy {
                InvalidGeometryPolicy::Skip => {
                    warn!(row, "skipping row with invalid geometry: {source}");
                    skipped += 1;
                }
                InvalidGeometryPolicy::Abort => {
                    return Err(MaterializeError::Geometry { row, source });
                }
            },
        }
    }

    Ok(Materialized {
        collection: FeatureCollection::new(features),
        skipped,
    })
}
