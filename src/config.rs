//! Map configuration.
//!
//! Every field has a default, so a partial JSON document (or none at all)
//! yields a usable configuration. Mapbox credentials are read from the
//! build environment and only take effect when the Mapbox provider is
//! selected explicitly.

use crate::engine::tiles::TileLayer;
use crate::error::MapError;
use crate::features::MarkerIcon;
use crate::model::{GeoPoint, MapResult, MAX_ZOOM};
use serde::Deserialize;

pub const DEFAULT_CENTER: GeoPoint = GeoPoint {
    lat: -45.0,
    lng: -65.0,
};
pub const DEFAULT_ZOOM: u8 = 5;
pub const DEFAULT_OVERLAY_COLOR: &str = "#673ab7";

const OSM_URL_TEMPLATE: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
const OSM_ATTRIBUTION: &str = "© OpenStreetMap contributors";
const OSM_MAX_ZOOM: u8 = 19;

const MAPBOX_URL_TEMPLATE: &str =
    "https://api.mapbox.com/styles/v1/{user}/{style}/tiles/256/{z}/{x}/{y}?access_token={token}";
const MAPBOX_ATTRIBUTION: &str = "© Mapbox © OpenStreetMap contributors";
const MAPBOX_MAX_ZOOM: u8 = 18;

/// Name given to the base tile layer, whatever its provider.
pub const BASE_LAYER_NAME: &str = "basemap";

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapboxCredentials {
    pub api_key: Option<String>,
    pub user_id: Option<String>,
    pub style_id: Option<String>,
}

impl MapboxCredentials {
    /// Credentials baked in at build time from `MAPBOX_API_KEY`,
    /// `MAPBOX_USERID` and `MAPBOX_STYLEID`.
    pub fn from_build_env() -> Self {
        MapboxCredentials {
            api_key: option_env!("MAPBOX_API_KEY").map(str::to_string),
            user_id: option_env!("MAPBOX_USERID").map(str::to_string),
            style_id: option_env!("MAPBOX_STYLEID").map(str::to_string),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.parts().is_some()
    }

    // Token, user and style, when all three are set and non-empty.
    fn parts(&self) -> Option<(&str, &str, &str)> {
        fn field(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|s| !s.is_empty())
        }
        Some((
            field(&self.api_key)?,
            field(&self.user_id)?,
            field(&self.style_id)?,
        ))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileProvider {
    #[default]
    OpenStreetMap,
    Mapbox,
    Custom {
        url_template: String,
        #[serde(default)]
        subdomains: Vec<String>,
        #[serde(default)]
        attribution: String,
    },
}

impl TileProvider {
    pub fn tile_layer(&self, credentials: &MapboxCredentials) -> MapResult<TileLayer> {
        match self {
            TileProvider::OpenStreetMap => Ok(TileLayer::new(
                BASE_LAYER_NAME,
                OSM_URL_TEMPLATE,
                vec!["a".into(), "b".into(), "c".into()],
                OSM_ATTRIBUTION,
            )
            .with_max_zoom(OSM_MAX_ZOOM)),
            TileProvider::Mapbox => {
                let Some((token, user, style)) = credentials.parts() else {
                    return Err(MapError::Config(
                        "Mapbox provider needs MAPBOX_API_KEY, MAPBOX_USERID and MAPBOX_STYLEID"
                            .to_string(),
                    ));
                };
                let template = MAPBOX_URL_TEMPLATE
                    .replace("{user}", user)
                    .replace("{style}", style)
                    .replace("{token}", token);
                Ok(TileLayer::new(BASE_LAYER_NAME, template, Vec::new(), MAPBOX_ATTRIBUTION)
                    .with_max_zoom(MAPBOX_MAX_ZOOM))
            }
            TileProvider::Custom {
                url_template,
                subdomains,
                attribution,
            } => {
                if !url_template.contains("{x}")
                    || !url_template.contains("{y}")
                    || !url_template.contains("{z}")
                {
                    return Err(MapError::Config(format!(
                        "Tile URL template '{}' must contain {{x}}, {{y}} and {{z}}",
                        url_template
                    )));
                }
                if url_template.contains("{s}") && subdomains.is_empty() {
                    return Err(MapError::Config(format!(
                        "Tile URL template '{}' uses {{s}} but no subdomains are given",
                        url_template
                    )));
                }
                Ok(TileLayer::new(
                    BASE_LAYER_NAME,
                    url_template.clone(),
                    subdomains.clone(),
                    attribution.clone(),
                ))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub center: GeoPoint,
    pub zoom: u8,
    pub tiles: TileProvider,
    pub icon: MarkerIcon,
    pub overlay_color: String,
    pub mapbox: MapboxCredentials,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            tiles: TileProvider::default(),
            icon: MarkerIcon::default(),
            overlay_color: DEFAULT_OVERLAY_COLOR.to_string(),
            mapbox: MapboxCredentials::from_build_env(),
        }
    }
}

impl MapConfig {
    pub fn from_json(content: &str) -> MapResult<Self> {
        let config: MapConfig = serde_json::from_str(content)
            .map_err(|e| MapError::Config(format!("Invalid map configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MapResult<()> {
        self.center.validated()?;
        if self.zoom > MAX_ZOOM {
            return Err(MapError::Config(format!(
                "zoom {} exceeds maximum {}",
                self.zoom, MAX_ZOOM
            )));
        }
        if self.overlay_color.trim().is_empty() {
            return Err(MapError::Config("overlay_color cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn base_layer(&self) -> MapResult<TileLayer> {
        self.tiles.tile_layer(&self.mapbox)
    }
}
