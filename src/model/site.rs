//! Sampling-site records and the dataset they are loaded from.
//!
//! Sites arrive as a GeoJSON feature collection. Property values are
//! decoded leniently: a malformed or missing field falls back to its
//! default instead of rejecting the record. Only an unusable coordinate
//! drops a record.

use crate::error::MapError;
use crate::model::{GeoPoint, MapResult};
use geojson::{Feature, GeoJson, Value as GeoValue};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::rc::Rc;

const BUNDLED_LOCATIONS: &str = include_str!("../../data/locations.geojson");

/// One sampling event.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteRecord {
    pub id: String,
    pub date: String,
    pub organizer: String,
    pub name: String,
    pub site_type: String,
    pub volunteers: u32,
    pub location: GeoPoint,
    pub has_microplastics: bool,
    pub primary_count: u32,
    pub secondary_count: u32,
    pub mesoplastic_count: u32,
    /// Radius of the proximity overlay, in metres.
    pub delivery_radius: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SiteProperties {
    #[serde(deserialize_with = "lenient::text")]
    id: Option<String>,
    #[serde(rename = "fecha", deserialize_with = "lenient::text")]
    date: Option<String>,
    #[serde(rename = "org", deserialize_with = "lenient::text")]
    organizer: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    name: Option<String>,
    #[serde(rename = "tipoSitio", deserialize_with = "lenient::text")]
    site_type: Option<String>,
    #[serde(rename = "voluntarios", deserialize_with = "lenient::count")]
    volunteers: u32,
    #[serde(rename = "latitud", deserialize_with = "lenient::number")]
    latitude: Option<f64>,
    #[serde(rename = "longitud", deserialize_with = "lenient::number")]
    longitude: Option<f64>,
    #[serde(rename = "presenciamp", deserialize_with = "lenient::flag")]
    has_microplastics: bool,
    #[serde(rename = "mpprimarios", deserialize_with = "lenient::count")]
    primary_count: u32,
    #[serde(rename = "mpsecundarios", deserialize_with = "lenient::count")]
    secondary_count: u32,
    #[serde(rename = "mpmesoplasticos", deserialize_with = "lenient::count")]
    mesoplastic_count: u32,
    #[serde(rename = "deliveryRadius", deserialize_with = "lenient::number")]
    delivery_radius: Option<f64>,
}

impl SiteRecord {
    pub fn from_geojson_feature(feature: &Feature) -> MapResult<Self> {
        let properties: SiteProperties = match &feature.properties {
            Some(props) => serde_json::from_value(Value::Object(props.clone()))
                .map_err(|e| MapError::Serialization(format!("Invalid properties: {}", e)))?,
            None => SiteProperties::default(),
        };

        let location = resolve_location(feature, &properties)?;

        let id = properties
            .id
            .or_else(|| {
                feature.id.as_ref().map(|id| match id {
                    geojson::feature::Id::String(s) => s.clone(),
                    geojson::feature::Id::Number(n) => n.to_string(),
                })
            })
            .unwrap_or_default();

        let delivery_radius = properties
            .delivery_radius
            .filter(|radius| radius.is_finite() && *radius > 0.0);

        Ok(SiteRecord {
            id,
            date: properties.date.unwrap_or_default(),
            organizer: properties.organizer.unwrap_or_default(),
            name: properties.name.unwrap_or_default(),
            site_type: properties.site_type.unwrap_or_default(),
            volunteers: properties.volunteers,
            location,
            has_microplastics: properties.has_microplastics,
            primary_count: properties.primary_count,
            secondary_count: properties.secondary_count,
            mesoplastic_count: properties.mesoplastic_count,
            delivery_radius,
        })
    }
}

// Point geometry wins; the latitud/longitud properties are a fallback for
// features without one.
fn resolve_location(feature: &Feature, properties: &SiteProperties) -> MapResult<GeoPoint> {
    let from_geometry = feature
        .geometry
        .as_ref()
        .and_then(|geometry| match &geometry.value {
            GeoValue::Point(position) => GeoPoint::from_position(position),
            _ => None,
        });

    let from_properties = match (properties.latitude, properties.longitude) {
        (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
        _ => None,
    };

    if let (Some(geometry), Some(props)) = (&from_geometry, &from_properties) {
        if (geometry.lat - props.lat).abs() > 1e-6 || (geometry.lng - props.lng).abs() > 1e-6 {
            tracing::debug!(
                "Geometry {:?} disagrees with latitud/longitud {:?}; using geometry",
                geometry,
                props
            );
        }
    }

    from_geometry
        .or(from_properties)
        .ok_or_else(|| MapError::Serialization("Feature has no usable coordinate".to_string()))?
        .validated()
}

/// Immutable collection of sites, loaded once.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    records: Vec<Rc<SiteRecord>>,
    skipped: usize,
}

impl Dataset {
    pub fn new(records: Vec<SiteRecord>) -> Self {
        Dataset {
            records: records.into_iter().map(Rc::new).collect(),
            skipped: 0,
        }
    }

    /// The dataset compiled into the crate.
    pub fn bundled() -> MapResult<Self> {
        Self::from_geojson_str(BUNDLED_LOCATIONS)
    }

    pub fn from_geojson_str(content: &str) -> MapResult<Self> {
        let geojson: GeoJson = content
            .parse()
            .map_err(|e| MapError::Serialization(format!("Invalid GeoJSON: {}", e)))?;

        let features = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(f) => vec![f],
            GeoJson::Geometry(_) => {
                return Err(MapError::Serialization(
                    "Expected a Feature or FeatureCollection, found a bare Geometry".to_string(),
                ));
            }
        };

        let mut records = Vec::with_capacity(features.len());
        let mut skipped = 0;
        for (index, feature) in features.iter().enumerate() {
            match SiteRecord::from_geojson_feature(feature) {
                Ok(record) => records.push(Rc::new(record)),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!("Skipping feature {}: {}", index, e);
                }
            }
        }

        tracing::info!(
            "Loaded {} sites from GeoJSON ({} skipped)",
            records.len(),
            skipped
        );
        Ok(Dataset { records, skipped })
    }

    pub fn records(&self) -> &[Rc<SiteRecord>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Features dropped at load time because their coordinate was unusable.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

mod lenient {
    use super::*;

    fn as_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().replace(',', ".").parse().ok(),
            _ => None,
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(as_f64(&Value::deserialize(d)?).filter(|n| n.is_finite()))
    }

    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        Ok(as_f64(&Value::deserialize(d)?)
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n.round().min(u32::MAX as f64) as u32)
            .unwrap_or(0))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            Value::String(s) => matches!(
                s.trim().to_lowercase().as_str(),
                "true" | "1" | "si" | "sí" | "yes" | "y"
            ),
            _ => false,
        })
    }
}
