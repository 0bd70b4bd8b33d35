use crate::schema::{ColumnDescriptor, ResolvedColumnRoles, quote_ident};

/// Alias of the GeoJSON text column in the feature query result.
pub const GEOJSON_COLUMN: &str = "geojson";
/// Alias of the normalized attribute column in the feature query result.
pub const CLASS_COLUMN: &str = "class_val";

/// Inclusive attribute range. `min > max` is allowed and matches no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterRange {
    pub min: i32,
    pub max: i32,
}

impl FilterRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i32) -> bool {
        self.min <= value && value <= self.max
    }
}

/// How the geometry column is turned into the engine's geometry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryEncoding {
    /// Well-known binary, parsed with `ST_GeomFromWKB`.
    Wkb,
    /// Native or text-castable, converted with `CAST(.. AS GEOMETRY)`.
    Cast,
}

impl GeometryEncoding {
    pub fn detect(column: &ColumnDescriptor) -> Self {
        if column.data_type.contains("BLOB") || column.name.contains("wkb") {
            GeometryEncoding::Wkb
        } else {
            GeometryEncoding::Cast
        }
    }
}

/// Normalizing, filtering query over a registered view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureQuery {
    pub view: String,
    pub geometry_column: String,
    pub encoding: GeometryEncoding,
    pub attribute_column: String,
    pub range: FilterRange,
}

pub fn build_query(view: &str, roles: &ResolvedColumnRoles, range: FilterRange) -> FeatureQuery {
    FeatureQuery {
        view: view.to_string(),
        geometry_column: roles.geometry.descriptor.name.clone(),
        encoding: GeometryEncoding::detect(&roles.geometry.descriptor),
        attribute_column: roles.attribute.descriptor.name.clone(),
        range,
    }
}

impl FeatureQuery {
    pub fn geometry_expr(&self) -> String {
        let column = quote_ident(&self.geometry_column);
        match self.encoding {
            GeometryEncoding::Wkb => format!("ST_GeomFromWKB({column})"),
            GeometryEncoding::Cast => format!("CAST({column} AS GEOMETRY)"),
        }
    }

    pub fn attribute_expr(&self) -> String {
        format!("TRY_CAST({} AS INTEGER)", quote_ident(&self.attribute_column))
    }

    /// Rows without a class value pass regardless of the range.
    pub fn predicate(&self) -> String {
        format!(
            "{GEOJSON_COLUMN} IS NOT NULL AND ({CLASS_COLUMN} IS NULL OR {CLASS_COLUMN} BETWEEN {} AND {})",
            self.range.min, self.range.max
        )
    }

    pub fn to_sql(&self) -> String {
        format!(
            "SELECT {GEOJSON_COLUMN}, {CLASS_COLUMN} FROM (\n\
             \x20   SELECT CAST(ST_AsGeoJSON(geom) AS VARCHAR) AS {GEOJSON_COLUMN}, {CLASS_COLUMN} FROM (\n\
             \x20       SELECT {} AS geom, {} AS {CLASS_COLUMN} FROM {}\n\
             \x20   )\n\
             )\n\
             WHERE {}",
            self.geometry_expr(),
            self.attribute_expr(),
            quote_ident(&self.view),
            self.predicate()
        )
    }
}
