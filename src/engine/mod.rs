use crate::engine::surface::MapSurface;
use crate::engine::transforms::TILE_SIZE;
use crate::features::FeatureLayer;
use crate::model::Viewport;

pub mod renderer;
pub mod surface;
pub mod tiles;
pub mod transforms;

#[derive(Clone, Debug)]
pub struct MapStyle {
    pub background: String,
    pub marker_fallback_color: String,
    pub marker_fallback_radius: f64,
    pub overlay_fill_opacity: f64,
    pub overlay_line_width: f64,
    pub attribution_font: String,
}

impl Default for MapStyle {
    fn default() -> Self {
        MapStyle {
            background: "#dde6ea".to_string(),
            marker_fallback_color: "#d32f2f".to_string(),
            marker_fallback_radius: 6.0,
            overlay_fill_opacity: 0.2,
            overlay_line_width: 3.0,
            attribution_font: "11px sans-serif".to_string(),
        }
    }
}

/// One primitive of a frame, in paint order.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Tile {
        url: String,
        x: f64,
        y: f64,
        size: f64,
    },
    Circle {
        x: f64,
        y: f64,
        radius: f64,
        color: String,
    },
    MarkerShadow {
        url: String,
        x: f64,
        y: f64,
    },
    Marker {
        url: String,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Attribution {
        text: String,
    },
}

// Offscreen slack before an icon or circle is culled
const CULL_MARGIN: f64 = 32.0;

fn on_screen(viewport: &Viewport, (x, y): (f64, f64), extent: f64) -> bool {
    let margin = extent + CULL_MARGIN;
    x >= -margin
        && y >= -margin
        && x <= viewport.size.width as f64 + margin
        && y <= viewport.size.height as f64 + margin
}

/// Lays out a frame: tiles, then hovered radius overlays, then marker
/// shadows and icons, then the attribution line.
pub fn build_scene(surface: &MapSurface, features: Option<&FeatureLayer>) -> Vec<DrawCommand> {
    let viewport = surface.viewport();
    let mut commands = Vec::new();

    if let Some(tiles) = surface.base_layer() {
        commands.extend(tiles.visible_tiles(viewport).into_iter().map(|tile| {
            DrawCommand::Tile {
                url: tiles.tile_url(&tile.coord),
                x: tile.screen_x,
                y: tile.screen_y,
                size: TILE_SIZE,
            }
        }));
    }

    for overlay in surface.overlays() {
        let at = viewport.world_to_screen(&overlay.center);
        let radius = overlay.radius_px(viewport.zoom);
        if on_screen(viewport, at, radius) {
            commands.push(DrawCommand::Circle {
                x: at.0,
                y: at.1,
                radius,
                color: overlay.color.clone(),
            });
        }
    }

    if let Some(features) = features {
        let placed: Vec<_> = features
            .markers()
            .iter()
            .map(|marker| (marker, viewport.world_to_screen(&marker.position())))
            .filter(|(marker, at)| {
                on_screen(viewport, *at, marker.icon.size[0].max(marker.icon.size[1]))
            })
            .collect();

        for (marker, at) in &placed {
            if let Some(url) = &marker.icon.shadow_url {
                let (x, y) = marker.icon.shadow_origin(*at);
                commands.push(DrawCommand::MarkerShadow {
                    url: url.clone(),
                    x,
                    y,
                });
            }
        }
        for (marker, at) in &placed {
            let (x, y) = marker.icon.origin(*at);
            commands.push(DrawCommand::Marker {
                url: marker.icon.icon_url.clone(),
                x,
                y,
                width: marker.icon.size[0],
                height: marker.icon.size[1],
            });
        }
    }

    if let Some(tiles) = surface.base_layer() {
        if !tiles.attribution().is_empty() {
            commands.push(DrawCommand::Attribution {
                text: tiles.attribution().to_string(),
            });
        }
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::engine::surface::MapRef;
    use crate::model::{Dataset, GeoPoint, PixelSize, SiteRecord};

    fn record(id: &str, lat: f64, lng: f64, radius: Option<f64>) -> SiteRecord {
        SiteRecord {
            id: id.to_string(),
            date: String::new(),
            organizer: String::new(),
            name: id.to_string(),
            site_type: String::new(),
            volunteers: 0,
            location: GeoPoint::new(lat, lng),
            has_microplastics: false,
            primary_count: 0,
            secondary_count: 0,
            mesoplastic_count: 0,
            delivery_radius: radius,
        }
    }

    fn setup() -> (MapRef, FeatureLayer) {
        let config = MapConfig::default();
        let map = MapRef::new();
        map.initialize(&config, PixelSize::new(800, 600)).unwrap();
        let dataset = Dataset::new(vec![
            record("near", -44.0, -66.0, Some(5000.0)),
            // Far outside the default viewport
            record("far", 10.0, 100.0, None),
        ]);
        let layer = FeatureLayer::bind(&dataset, &map, &config).unwrap();
        (map, layer)
    }

    fn scene(map: &MapRef, layer: &FeatureLayer) -> Vec<DrawCommand> {
        map.inspect(|m| build_scene(m, Some(layer))).unwrap()
    }

    #[test]
    fn test_scene_paint_order() {
        let (map, layer) = setup();
        layer.markers()[0].pointer_enter(&map);
        let commands = scene(&map, &layer);

        let rank = |c: &DrawCommand| match c {
            DrawCommand::Tile { .. } => 0,
            DrawCommand::Circle { .. } => 1,
            DrawCommand::MarkerShadow { .. } => 2,
            DrawCommand::Marker { .. } => 3,
            DrawCommand::Attribution { .. } => 4,
        };
        let ranks: Vec<i32> = commands.iter().map(rank).collect();
        assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
        assert!(ranks.contains(&1));
        assert_eq!(ranks.last(), Some(&4));
    }

    #[test]
    fn test_offscreen_markers_are_culled() {
        let (map, layer) = setup();
        let markers = scene(&map, &layer)
            .into_iter()
            .filter(|c| matches!(c, DrawCommand::Marker { .. }))
            .count();
        assert_eq!(markers, 1);
    }

    #[test]
    fn test_circle_only_while_hovered() {
        let (map, layer) = setup();
        let circles = |commands: &[DrawCommand]| {
            commands
                .iter()
                .filter(|c| matches!(c, DrawCommand::Circle { .. }))
                .count()
        };
        assert_eq!(circles(&scene(&map, &layer)), 0);
        layer.markers()[0].pointer_enter(&map);
        assert_eq!(circles(&scene(&map, &layer)), 1);
        layer.markers()[0].pointer_exit(&map);
        assert_eq!(circles(&scene(&map, &layer)), 0);
    }

    #[test]
    fn test_circle_and_marker_share_a_center() {
        let (map, layer) = setup();
        layer.markers()[0].pointer_enter(&map);
        let commands = scene(&map, &layer);
        let circle = commands.iter().find_map(|c| match c {
            DrawCommand::Circle { x, y, .. } => Some((*x, *y)),
            _ => None,
        });
        let marker = commands.iter().find_map(|c| match c {
            DrawCommand::Marker { x, y, .. } => Some((x + 13.0, y + 13.0)),
            _ => None,
        });
        let (circle, marker) = (circle.unwrap(), marker.unwrap());
        assert!((circle.0 - marker.0).abs() < 1e-9);
        assert!((circle.1 - marker.1).abs() < 1e-9);
    }

    #[test]
    fn test_scene_without_features_still_has_tiles() {
        let (map, _) = setup();
        let commands = map.inspect(|m| build_scene(m, None)).unwrap();
        assert!(commands.iter().any(|c| matches!(c, DrawCommand::Tile { .. })));
        assert!(!commands.iter().any(|c| matches!(c, DrawCommand::Marker { .. })));
    }
}
