use std::sync::Arc;

use formats::FeatureCollection;
use pipeline::FilterRange;
use serde_json::{Map, Value};

pub type Rgba = [u8; 4];

/// Linear grayscale ramp over the class value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClassRamp {
    pub low: i32,
    pub high: i32,
    pub alpha: u8,
    /// Color of features without a class value.
    pub unclassified: Rgba,
}

impl ClassRamp {
    pub const fn new(low: i32, high: i32, alpha: u8, unclassified: Rgba) -> Self {
        Self {
            low,
            high,
            alpha,
            unclassified,
        }
    }

    pub fn color(&self, class_val: Option<i32>) -> Rgba {
        let Some(v) = class_val else {
            return self.unclassified;
        };
        let span = (self.high - self.low).max(1) as f32;
        let t = (v.clamp(self.low, self.high) - self.low) as f32 / span;
        let g = (t * 255.0).round() as u8;
        [g, g, g, self.alpha]
    }
}

impl Default for ClassRamp {
    fn default() -> Self {
        Self {
            low: 1,
            high: 25,
            alpha: 200,
            unclassified: [255, 140, 0, 160],
        }
    }
}

/// Feature colors for the renderer, recomputed only when the data or the
/// trigger range changes.
#[derive(Debug, Default)]
pub struct PresentationLayer {
    ramp: ClassRamp,
    data: Option<Arc<FeatureCollection>>,
    triggers: Option<FilterRange>,
    colors: Vec<Rgba>,
    recomputes: usize,
}

impl PresentationLayer {
    pub fn new(ramp: ClassRamp) -> Self {
        Self {
            ramp,
            ..Self::default()
        }
    }

    /// Returns `true` if colors were recomputed.
    pub fn update(&mut self, data: Arc<FeatureCollection>, triggers: FilterRange) -> bool {
        let same_data = self.data.as_ref().is_some_and(|d| Arc::ptr_eq(d, &data));
        if same_data && self.triggers == Some(triggers) {
            return false;
        }
        self.colors = data
            .features
            .iter()
            .map(|f| self.ramp.color(f.class_val))
            .collect();
        self.data = Some(data);
        self.triggers = Some(triggers);
        self.recomputes += 1;
        true
    }

    pub fn colors(&self) -> &[Rgba] {
        &self.colors
    }

    pub fn recomputes(&self) -> usize {
        self.recomputes
    }

    /// GeoJSON with a `fill_color` property per feature.
    pub fn to_geojson_value(&self) -> Option<Value> {
        let data = self.data.as_ref()?;
        let mut colors = self.colors.iter();
        Some(data.to_geojson_value_with(|_| {
            let mut props = Map::new();
            if let Some(c) = colors.next() {
                props.insert(
                    "fill_color".to_string(),
                    Value::Array(c.iter().map(|v| Value::from(*v)).collect()),
                );
            }
            props
        }))
    }
}
