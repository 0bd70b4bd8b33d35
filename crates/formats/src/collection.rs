use serde_json::{Map, Value};

use crate::geometry::Geometry;

/// Property key carrying the classification value of a feature.
pub const CLASS_PROPERTY: &str = "class_val";

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub class_val: Option<i32>,
}

/// Output of one pipeline run. Replaced wholesale, never edited in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// `[min_lon, min_lat, max_lon, max_lat]` over every vertex.
    pub fn bbox(&self) -> Option<[f64; 4]> {
        let mut bbox: Option<[f64; 4]> = None;
        for feature in &self.features {
            feature.geometry.for_each_point(&mut |p| {
                let b = bbox.get_or_insert([p.lon_deg, p.lat_deg, p.lon_deg, p.lat_deg]);
                b[0] = b[0].min(p.lon_deg);
                b[1] = b[1].min(p.lat_deg);
                b[2] = b[2].max(p.lon_deg);
                b[3] = b[3].max(p.lat_deg);
            });
        }
        bbox
    }

    /// Emits a GeoJSON FeatureCollection; `extra` may add per-feature properties.
    pub fn to_geojson_value_with(
        &self,
        mut extra: impl FnMut(&Feature) -> Map<String, Value>,
    ) -> Value {
        let features = self
            .features
            .iter()
            .map(|feat| {
                let mut properties = extra(feat);
                properties.insert(
                    CLASS_PROPERTY.to_string(),
                    feat.class_val.map(Value::from).unwrap_or(Value::Null),
                );

                let mut fobj = Map::new();
                fobj.insert("type".to_string(), Value::String("Feature".to_string()));
                fobj.insert("properties".to_string(), Value::Object(properties));
                fobj.insert("geometry".to_string(), feat.geometry.to_geojson_value());
                Value::Object(fobj)
            })
            .collect();

        let mut root = Map::new();
        root.insert(
            "type".to_string(),
            Value::String("FeatureCollection".to_string()),
        );
        root.insert("features".to_string(), Value::Array(features));
        Value::Object(root)
    }

    pub fn to_geojson_value(&self) -> Value {
        self.to_geojson_value_with(|_| Map::new())
    }

    pub fn to_geojson_string_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_geojson_value())
    }
}

#[cfg(test)]
mod tests {
    use super::{Feature, FeatureCollection};
    use crate::geometry::{GeoPoint, Geometry};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn square(x: f64, y: f64) -> Geometry {
        Geometry::Polygon(vec![vec![
            GeoPoint::new(x, y),
            GeoPoint::new(x + 1.0, y),
            GeoPoint::new(x + 1.0, y + 1.0),
            GeoPoint::new(x, y),
        ]])
    }

    #[test]
    fn bbox_spans_all_features() {
        let fc = FeatureCollection::new(vec![
            Feature {
                geometry: square(0.0, 0.0),
                class_val: Some(3),
            },
            Feature {
                geometry: square(-5.0, 2.0),
                class_val: None,
            },
        ]);
        assert_eq!(fc.bbox(), Some([-5.0, 0.0, 1.0, 3.0]));
        assert_eq!(FeatureCollection::default().bbox(), None);
    }

    #[test]
    fn geojson_carries_class_property_or_null() {
        let fc = FeatureCollection::new(vec![
            Feature {
                geometry: Geometry::Point(GeoPoint::new(1.0, 2.0)),
                class_val: Some(7),
            },
            Feature {
                geometry: Geometry::Point(GeoPoint::new(3.0, 4.0)),
                class_val: None,
            },
        ]);
        let value = fc.to_geojson_value();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][0]["properties"], json!({"class_val": 7}));
        assert_eq!(value["features"][1]["properties"], json!({"class_val": null}));
        assert_eq!(
            value["features"][1]["geometry"],
            json!({"type": "Point", "coordinates": [3.0, 4.0]})
        );
    }
}
