//! Binds site records to interactive markers on the map surface.
//!
//! Every marker is a small value object holding its own record, icon,
//! popup and optional radius overlay. Event handlers receive the map and
//! the detail panel as arguments; nothing is captured implicitly, so two
//! markers can never interfere with each other.

use crate::config::MapConfig;
use crate::engine::surface::{LayerId, MapRef};
use crate::engine::transforms;
use crate::model::{Dataset, GeoPoint, SiteRecord, Viewport};
use crate::view::panel::{DetailPanel, SiteDetails};
use serde::Deserialize;
use std::rc::Rc;

pub mod popup;

pub use popup::Popup;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarkerIcon {
    pub icon_url: String,
    pub size: [f64; 2],
    /// Point of the icon placed on the site, relative to its top-left corner.
    pub anchor: [f64; 2],
    /// Popup tip, relative to the anchor.
    pub popup_anchor: [f64; 2],
    pub shadow_url: Option<String>,
    pub shadow_anchor: [f64; 2],
}

impl Default for MarkerIcon {
    fn default() -> Self {
        MarkerIcon {
            icon_url: "assets/mapa2rojopsub.png".to_string(),
            size: [26.0, 26.0],
            anchor: [13.0, 13.0],
            popup_anchor: [0.0, -15.0],
            shadow_url: Some("assets/marker-shadow.png".to_string()),
            shadow_anchor: [13.0, 28.0],
        }
    }
}

impl MarkerIcon {
    /// Top-left corner of the icon when its anchor sits at `at`.
    pub fn origin(&self, at: (f64, f64)) -> (f64, f64) {
        (at.0 - self.anchor[0], at.1 - self.anchor[1])
    }

    pub fn shadow_origin(&self, at: (f64, f64)) -> (f64, f64) {
        (at.0 - self.shadow_anchor[0], at.1 - self.shadow_anchor[1])
    }

    pub fn contains(&self, at: (f64, f64), point: (f64, f64)) -> bool {
        let (left, top) = self.origin(at);
        point.0 >= left
            && point.0 <= left + self.size[0]
            && point.1 >= top
            && point.1 <= top + self.size[1]
    }

    pub fn popup_position(&self, at: (f64, f64)) -> (f64, f64) {
        (at.0 + self.popup_anchor[0], at.1 + self.popup_anchor[1])
    }
}

/// Circle of a site's delivery radius, built up front and attached to the
/// map only while the marker is hovered.
#[derive(Clone, Debug, PartialEq)]
pub struct RadiusOverlay {
    pub id: LayerId,
    pub center: GeoPoint,
    pub radius_m: f64,
    pub color: String,
}

impl RadiusOverlay {
    pub fn radius_px(&self, zoom: u8) -> f64 {
        transforms::meters_to_pixels(self.radius_m, self.center.lat, zoom)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerEvent {
    PointerEnter,
    PointerExit,
    Click,
}

#[derive(Clone, Debug)]
pub struct SiteMarker {
    pub record: Rc<SiteRecord>,
    pub icon: MarkerIcon,
    pub popup: Popup,
    pub overlay: Option<RadiusOverlay>,
}

impl SiteMarker {
    pub fn new(index: usize, record: Rc<SiteRecord>, config: &MapConfig) -> Self {
        let overlay = record.delivery_radius.map(|radius_m| RadiusOverlay {
            id: format!("radius-{}-{}", index, record.id),
            center: record.location,
            radius_m,
            color: config.overlay_color.clone(),
        });

        SiteMarker {
            popup: Popup::for_record(&record),
            icon: config.icon.clone(),
            overlay,
            record,
        }
    }

    pub fn position(&self) -> GeoPoint {
        self.record.location
    }

    pub fn pointer_enter(&self, map: &MapRef) -> bool {
        let Some(overlay) = &self.overlay else {
            return false;
        };
        map.with_map(|m| m.attach_overlay(overlay.clone()))
            .unwrap_or(false)
    }

    pub fn pointer_exit(&self, map: &MapRef) -> bool {
        let Some(overlay) = &self.overlay else {
            return false;
        };
        map.with_map(|m| m.detach_overlay(&overlay.id))
            .unwrap_or(false)
    }

    pub fn click(&self, panel: &mut DetailPanel) {
        tracing::debug!("Selected site {} ({})", self.record.id, self.record.name);
        panel.select(SiteDetails::from_record(&self.record));
    }
}

#[derive(Clone, Debug, Default)]
pub struct FeatureLayer {
    markers: Vec<SiteMarker>,
}

impl FeatureLayer {
    /// Builds one marker per record and registers the layer on the map.
    /// Returns `None` without touching anything while the map is unmounted.
    pub fn bind(dataset: &Dataset, map: &MapRef, config: &MapConfig) -> Option<Self> {
        if !map.is_ready() {
            tracing::debug!("Map not mounted yet, deferring feature binding");
            return None;
        }

        let markers: Vec<SiteMarker> = dataset
            .records()
            .iter()
            .enumerate()
            .map(|(index, record)| SiteMarker::new(index, Rc::clone(record), config))
            .collect();

        map.with_map(|m| {
            m.clear_non_base_layers();
            m.install_feature_layer(markers.len());
        })?;

        tracing::info!("Bound {} site markers", markers.len());
        Some(FeatureLayer { markers })
    }

    pub fn markers(&self) -> &[SiteMarker] {
        &self.markers
    }

    pub fn get(&self, index: usize) -> Option<&SiteMarker> {
        self.markers.get(index)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn dispatch(
        &self,
        index: usize,
        event: MarkerEvent,
        map: &MapRef,
        panel: &mut DetailPanel,
    ) -> bool {
        let Some(marker) = self.markers.get(index) else {
            return false;
        };
        match event {
            MarkerEvent::PointerEnter => marker.pointer_enter(map),
            MarkerEvent::PointerExit => marker.pointer_exit(map),
            MarkerEvent::Click => {
                marker.click(panel);
                true
            }
        }
    }

    /// Topmost marker under a screen point. Later markers are drawn on top.
    pub fn hit_test(&self, viewport: &Viewport, point: (f64, f64)) -> Option<usize> {
        self.markers
            .iter()
            .enumerate()
            .rev()
            .find(|(_, marker)| {
                let at = viewport.world_to_screen(&marker.position());
                marker.icon.contains(at, point)
            })
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PixelSize;
    use crate::view::panel::Selection;

    fn record(id: &str, lat: f64, lng: f64, radius: Option<f64>) -> SiteRecord {
        SiteRecord {
            id: id.to_string(),
            date: "2021-03-14".to_string(),
            organizer: "Proyecto Sub".to_string(),
            name: format!("Sitio {}", id),
            site_type: "playa".to_string(),
            volunteers: 4,
            location: GeoPoint::new(lat, lng),
            has_microplastics: true,
            primary_count: 1,
            secondary_count: 2,
            mesoplastic_count: 3,
            delivery_radius: radius,
        }
    }

    fn synthetic() -> Dataset {
        Dataset::new(vec![
            record("1", -42.0, -65.0, Some(2000.0)),
            record("2", -43.0, -66.0, None),
            record("3", -44.0, -67.0, Some(500.0)),
            record("4", -45.0, -68.0, None),
            record("5", -46.0, -69.0, Some(1000.0)),
        ])
    }

    fn mounted() -> MapRef {
        let map = MapRef::new();
        map.initialize(&MapConfig::default(), PixelSize::new(800, 600))
            .unwrap();
        map
    }

    fn overlays(map: &MapRef) -> usize {
        map.inspect(|m| m.overlay_count()).unwrap()
    }

    #[test]
    fn test_one_marker_per_record() {
        let map = mounted();
        let layer = FeatureLayer::bind(&synthetic(), &map, &MapConfig::default()).unwrap();
        assert_eq!(layer.len(), 5);
        let ids: Vec<&str> = layer.markers().iter().map(|m| m.record.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3", "4", "5"]);
        assert_eq!(
            map.inspect(|m| m.layers().len()),
            Some(2),
            "base layer plus feature layer"
        );
    }

    #[test]
    fn test_bind_on_unmounted_map_is_noop() {
        let map = MapRef::new();
        assert!(FeatureLayer::bind(&synthetic(), &map, &MapConfig::default()).is_none());
        assert!(!map.is_ready());
    }

    #[test]
    fn test_rebinding_clears_stale_overlays() {
        let map = mounted();
        let config = MapConfig::default();
        let layer = FeatureLayer::bind(&synthetic(), &map, &config).unwrap();
        layer.markers()[0].pointer_enter(&map);
        assert_eq!(overlays(&map), 1);

        FeatureLayer::bind(&synthetic(), &map, &config).unwrap();
        assert_eq!(overlays(&map), 0);
        assert_eq!(map.inspect(|m| m.base_layer_count()), Some(1));
    }

    #[test]
    fn test_overlay_only_for_records_with_radius() {
        let map = mounted();
        let layer = FeatureLayer::bind(&synthetic(), &map, &MapConfig::default()).unwrap();
        let with_overlay: Vec<bool> = layer.markers().iter().map(|m| m.overlay.is_some()).collect();
        assert_eq!(with_overlay, [true, false, true, false, true]);
    }

    #[test]
    fn test_overlay_centered_on_marker() {
        let map = mounted();
        let layer = FeatureLayer::bind(&synthetic(), &map, &MapConfig::default()).unwrap();
        for marker in layer.markers() {
            if let Some(overlay) = &marker.overlay {
                assert_eq!(overlay.center, marker.position());
                assert_eq!(overlay.center, marker.record.location);
            }
        }
    }

    #[test]
    fn test_hover_cycles_do_not_leak_overlays() {
        let map = mounted();
        let layer = FeatureLayer::bind(&synthetic(), &map, &MapConfig::default()).unwrap();
        let marker = &layer.markers()[0];
        let before = overlays(&map);

        for _ in 0..10 {
            assert!(marker.pointer_enter(&map));
            assert_eq!(overlays(&map), before + 1);
            assert!(marker.pointer_exit(&map));
            assert_eq!(overlays(&map), before);
        }
    }

    #[test]
    fn test_repeated_enter_attaches_once() {
        let map = mounted();
        let layer = FeatureLayer::bind(&synthetic(), &map, &MapConfig::default()).unwrap();
        let marker = &layer.markers()[2];
        assert!(marker.pointer_enter(&map));
        assert!(!marker.pointer_enter(&map));
        assert_eq!(overlays(&map), 1);
        marker.pointer_exit(&map);
        assert_eq!(overlays(&map), 0);
    }

    #[test]
    fn test_hover_without_radius_is_noop() {
        let map = mounted();
        let layer = FeatureLayer::bind(&synthetic(), &map, &MapConfig::default()).unwrap();
        let layers_before = map.inspect(|m| m.layers().to_vec()).unwrap();
        let marker = &layer.markers()[1];
        assert!(!marker.pointer_enter(&map));
        assert!(!marker.pointer_exit(&map));
        assert_eq!(map.inspect(|m| m.layers().to_vec()).unwrap(), layers_before);
    }

    #[test]
    fn test_markers_do_not_interfere() {
        let map = mounted();
        let layer = FeatureLayer::bind(&synthetic(), &map, &MapConfig::default()).unwrap();
        let mut panel = DetailPanel::default();
        layer.dispatch(0, MarkerEvent::PointerEnter, &map, &mut panel);
        layer.dispatch(2, MarkerEvent::PointerEnter, &map, &mut panel);
        assert_eq!(overlays(&map), 2);
        layer.dispatch(0, MarkerEvent::PointerExit, &map, &mut panel);
        let remaining: Vec<String> = map
            .inspect(|m| m.overlays().map(|o| o.id.clone()).collect())
            .unwrap();
        assert_eq!(remaining, ["radius-2-3"]);
    }

    #[test]
    fn test_hover_on_unmounted_map_is_skipped() {
        let config = MapConfig::default();
        let marker = SiteMarker::new(0, Rc::new(record("9", -42.0, -65.0, Some(10.0))), &config);
        let map = MapRef::new();
        assert!(!marker.pointer_enter(&map));
        assert!(!marker.pointer_exit(&map));
    }

    #[test]
    fn test_click_replaces_selection() {
        let map = mounted();
        let layer = FeatureLayer::bind(&synthetic(), &map, &MapConfig::default()).unwrap();
        let mut panel = DetailPanel::default();

        layer.dispatch(0, MarkerEvent::Click, &map, &mut panel);
        assert!(matches!(panel.selection(), Selection::Selected(d) if d.id == "1"));

        layer.dispatch(3, MarkerEvent::Click, &map, &mut panel);
        match panel.selection() {
            Selection::Selected(details) => {
                assert_eq!(details.id, "4");
                assert_eq!(details.name, "Sitio 4");
            }
            Selection::Empty => panic!("expected a selection"),
        }
    }

    #[test]
    fn test_dispatch_out_of_range_is_ignored() {
        let map = mounted();
        let layer = FeatureLayer::bind(&synthetic(), &map, &MapConfig::default()).unwrap();
        let mut panel = DetailPanel::default();
        assert!(!layer.dispatch(99, MarkerEvent::Click, &map, &mut panel));
        assert!(!panel.is_visible());
    }

    #[test]
    fn test_hit_test_finds_marker_under_pointer() {
        let map = mounted();
        let layer = FeatureLayer::bind(&synthetic(), &map, &MapConfig::default()).unwrap();
        let viewport = map.inspect(|m| m.viewport().clone()).unwrap();
        let at = viewport.world_to_screen(&GeoPoint::new(-44.0, -67.0));

        assert_eq!(layer.hit_test(&viewport, at), Some(2));
        assert_eq!(layer.hit_test(&viewport, (at.0 + 12.0, at.1 - 12.0)), Some(2));
        assert_eq!(layer.hit_test(&viewport, (at.0 + 14.0, at.1)), None);
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let dataset = Dataset::new(vec![
            record("under", -44.0, -67.0, None),
            record("over", -44.0, -67.0, None),
        ]);
        let map = mounted();
        let layer = FeatureLayer::bind(&dataset, &map, &MapConfig::default()).unwrap();
        let viewport = map.inspect(|m| m.viewport().clone()).unwrap();
        let at = viewport.world_to_screen(&GeoPoint::new(-44.0, -67.0));
        assert_eq!(layer.hit_test(&viewport, at), Some(1));
    }

    #[test]
    fn test_icon_geometry() {
        let icon = MarkerIcon::default();
        assert_eq!(icon.origin((100.0, 100.0)), (87.0, 87.0));
        assert_eq!(icon.popup_position((100.0, 100.0)), (100.0, 85.0));
        assert_eq!(icon.shadow_origin((100.0, 100.0)), (87.0, 72.0));
    }

    #[test]
    fn test_radius_grows_with_zoom() {
        let overlay = RadiusOverlay {
            id: "r".into(),
            center: GeoPoint::new(-45.0, -65.0),
            radius_m: 2000.0,
            color: "#673ab7".into(),
        };
        let r5 = overlay.radius_px(5);
        let r6 = overlay.radius_px(6);
        assert!(r5 > 0.0);
        assert!((r6 - 2.0 * r5).abs() < 1e-9);
    }
}
