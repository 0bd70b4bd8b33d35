use engine::{Cell, Connection, ResultTable};
use tracing::{debug, info, warn};

use crate::error::DiscoveryError;

/// Engine extensions every run needs: remote HTTP scans and spatial functions.
pub const REQUIRED_EXTENSIONS: [&str; 2] = ["httpfs", "spatial"];

const METADATA_CACHE_SQL: &str = "SET enable_http_metadata_cache = true";

/// A remote dataset and the view name it is registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSource {
    pub url: String,
    pub view_name: String,
}

impl DatasetSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            view_name: "features".to_string(),
        }
    }

    pub fn with_view_name(mut self, view_name: impl Into<String>) -> Self {
        self.view_name = view_name.into();
        self
    }

    /// Table function used to scan the remote file.
    pub fn scan_expr(&self) -> String {
        let literal = quote_literal(&self.url);
        let path = self.url.split(['?', '#']).next().unwrap_or_default();
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".parquet") || lower.ends_with(".geoparquet") {
            format!("read_parquet({literal})")
        } else {
            format!("ST_Read({literal})")
        }
    }

    pub fn register_view_sql(&self) -> String {
        format!(
            "CREATE OR REPLACE VIEW {} AS SELECT * FROM {}",
            quote_ident(&self.view_name),
            self.scan_expr()
        )
    }

    pub fn introspect_sql(&self) -> String {
        format!(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE table_name = {} ORDER BY ordinal_position",
            quote_literal(&self.view_name)
        )
    }
}

/// Double-quoted SQL identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Single-quoted SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Lower-cased column name.
    pub name: String,
    /// Upper-cased declared type.
    pub data_type: String,
}

impl ColumnDescriptor {
    pub fn normalized(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            data_type: data_type.to_uppercase(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredSchema {
    pub columns: Vec<ColumnDescriptor>,
}

impl DiscoveredSchema {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn from_table(table: &ResultTable) -> Result<Self, DiscoveryError> {
        let names = table
            .column("column_name")
            .ok_or_else(|| DiscoveryError::Shape("missing column_name".to_string()))?;
        let types = table
            .column("data_type")
            .ok_or_else(|| DiscoveryError::Shape("missing data_type".to_string()))?;
        if names.len() != types.len() {
            return Err(DiscoveryError::Shape(format!(
                "{} names but {} types",
                names.len(),
                types.len()
            )));
        }

        let columns = names
            .iter()
            .zip(types)
            .map(|(name, ty)| match (name, ty) {
                (Cell::Text(name), Cell::Text(ty)) => Ok(ColumnDescriptor::normalized(name, ty)),
                (name, ty) => Err(DiscoveryError::Shape(format!(
                    "expected text name/type, got {}/{}",
                    name.type_name(),
                    ty.type_name()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { columns })
    }
}

/// Register `source` as a view and read back its column layout.
///
/// Safe to repeat: extensions load idempotently and the view is replaced.
pub async fn discover(
    conn: &mut dyn Connection,
    source: &DatasetSource,
) -> Result<DiscoveredSchema, DiscoveryError> {
    for name in REQUIRED_EXTENSIONS {
        for sql in [format!("INSTALL {name}"), format!("LOAD {name}")] {
            conn.execute(&sql)
                .await
                .map_err(|source| DiscoveryError::Capability {
                    name: name.to_string(),
                    source,
                })?;
        }
    }

    if let Err(err) = conn.execute(METADATA_CACHE_SQL).await {
        warn!("metadata cache not enabled: {err}");
    }

    conn.execute(&source.register_view_sql())
        .await
        .map_err(|e| DiscoveryError::RegisterView {
            view: source.view_name.clone(),
            source: e,
        })?;

    let table = conn
        .query(&source.introspect_sql())
        .await
        .map_err(|e| DiscoveryError::Introspect {
            view: source.view_name.clone(),
            source: e,
        })?;

    let schema = DiscoveredSchema::from_table(&table)?;
    if schema.columns.is_empty() {
        return Err(DiscoveryError::EmptySchema(source.view_name.clone()));
    }
    debug!(columns = ?schema.columns, "discovered schema");
    info!(
        view = %source.view_name,
        columns = schema.columns.len(),
        "dataset registered"
    );
    Ok(schema)
}

/// Ordered candidate names for each column role plus fallback names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCandidates {
    pub geometry: Vec<String>,
    pub attribute: Vec<String>,
    pub geometry_default: String,
    pub attribute_default: String,
}

impl Default for RoleCandidates {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|n| n.to_string()).collect();
        Self {
            geometry: owned(&["geometry", "geom", "wkb_geometry", "wkb", "the_geom"]),
            attribute: owned(&[
                "class", "class_id", "classval", "class_val", "cls", "value", "category",
            ]),
            geometry_default: "geometry".to_string(),
            attribute_default: "class".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub descriptor: ColumnDescriptor,
    /// No candidate matched; `descriptor` holds the fallback name and no type.
    pub defaulted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumnRoles {
    pub geometry: ResolvedColumn,
    pub attribute: ResolvedColumn,
}

impl RoleCandidates {
    pub fn resolve(&self, schema: &DiscoveredSchema) -> ResolvedColumnRoles {
        ResolvedColumnRoles {
            geometry: resolve_role(schema, "geometry", &self.geometry, &self.geometry_default),
            attribute: resolve_role(schema, "attribute", &self.attribute, &self.attribute_default),
        }
    }
}

fn resolve_role(
    schema: &DiscoveredSchema,
    role: &str,
    candidates: &[String],
    default: &str,
) -> ResolvedColumn {
    let found = candidates
        .iter()
        .find_map(|c| schema.column(&c.to_lowercase()));
    match found {
        Some(descriptor) => ResolvedColumn {
            descriptor: descriptor.clone(),
            defaulted: false,
        },
        None => {
            warn!(role, fallback = default, "no candidate column matched");
            ResolvedColumn {
                descriptor: ColumnDescriptor {
                    name: default.to_lowercase(),
                    data_type: String::new(),
                },
                defaulted: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnDescriptor, DatasetSource, DiscoveredSchema, RoleCandidates, quote_ident};
    use pretty_assertions::assert_eq;

    fn schema(cols: &[(&str, &str)]) -> DiscoveredSchema {
        DiscoveredSchema::new(
            cols.iter()
                .map(|(n, t)| ColumnDescriptor::normalized(n, t))
                .collect(),
        )
    }

    #[test]
    fn unmatched_schema_falls_back_to_literal_defaults() {
        let roles = RoleCandidates::default().resolve(&schema(&[
            ("shape", "BLOB"),
            ("landcover", "INTEGER"),
        ]));
        assert!(roles.geometry.defaulted);
        assert!(roles.attribute.defaulted);
        assert_eq!(roles.geometry.descriptor.name, "geometry");
        assert_eq!(roles.attribute.descriptor.name, "class");
    }

    #[test]
    fn candidates_are_tried_in_priority_order() {
        // Both `wkb` and `geom` exist; `geom` is earlier in the list.
        let roles = RoleCandidates::default().resolve(&schema(&[
            ("wkb", "BLOB"),
            ("geom", "GEOMETRY"),
            ("value", "DOUBLE"),
            ("cls", "VARCHAR"),
        ]));
        assert_eq!(roles.geometry.descriptor, ColumnDescriptor::normalized("geom", "geometry"));
        assert_eq!(roles.attribute.descriptor.name, "cls");
        assert!(!roles.attribute.defaulted);
    }

    #[test]
    fn matching_is_case_insensitive_after_normalization() {
        let roles = RoleCandidates::default().resolve(&schema(&[
            ("The_Geom", "wkb_blob"),
            ("CATEGORY", "bigint"),
        ]));
        assert_eq!(roles.geometry.descriptor.name, "the_geom");
        assert_eq!(roles.geometry.descriptor.data_type, "WKB_BLOB");
        assert_eq!(roles.attribute.descriptor.name, "category");
    }

    #[test]
    fn custom_candidates_override_defaults() {
        let candidates = RoleCandidates {
            geometry: vec!["footprint".to_string()],
            attribute: vec!["LC".to_string()],
            geometry_default: "shape".to_string(),
            attribute_default: "code".to_string(),
        };
        let roles = candidates.resolve(&schema(&[("footprint", "GEOMETRY"), ("lc", "INTEGER")]));
        assert_eq!(roles.geometry.descriptor.name, "footprint");
        assert_eq!(roles.attribute.descriptor.name, "lc");

        let roles = candidates.resolve(&schema(&[("geometry", "GEOMETRY")]));
        assert_eq!(roles.geometry.descriptor.name, "shape");
        assert_eq!(roles.attribute.descriptor.name, "code");
    }

    #[test]
    fn scan_expression_follows_file_suffix() {
        let parquet = DatasetSource::new("https://host/data/tiles.parquet?sig=abc");
        assert_eq!(
            parquet.scan_expr(),
            "read_parquet('https://host/data/tiles.parquet?sig=abc')"
        );
        let other = DatasetSource::new("https://host/it's.fgb");
        assert_eq!(other.scan_expr(), "ST_Read('https://host/it''s.fgb')");
    }

    #[test]
    fn view_registration_replaces_existing_view() {
        let source = DatasetSource::new("https://host/a.parquet").with_view_name("lc");
        assert_eq!(
            source.register_view_sql(),
            "CREATE OR REPLACE VIEW \"lc\" AS SELECT * FROM read_parquet('https://host/a.parquet')"
        );
        assert!(source.introspect_sql().contains("table_name = 'lc'"));
    }

    #[test]
    fn identifiers_double_embedded_quotes() {
        assert_eq!(quote_ident("class"), "\"class\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
