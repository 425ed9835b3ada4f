//! Controller that turns raw pointer input into marker events.

use crate::config::MapConfig;
use crate::engine::surface::MapRef;
use crate::features::{FeatureLayer, MarkerEvent, Popup};
use crate::model::{Dataset, MapResult, PixelSize, Viewport};
use crate::view::panel::{DetailPanel, Selection};

pub struct MapApp {
    config: MapConfig,
    map: MapRef,
    dataset: Dataset,
    features: Option<FeatureLayer>,
    panel: DetailPanel,
    hovered: Option<usize>,
    open_popup: Option<usize>,
}

impl MapApp {
    pub fn new(config: MapConfig, dataset: Dataset) -> Self {
        MapApp {
            config,
            map: MapRef::new(),
            dataset,
            features: None,
            panel: DetailPanel::default(),
            hovered: None,
            open_popup: None,
        }
    }

    pub fn map(&self) -> &MapRef {
        &self.map
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn features(&self) -> Option<&FeatureLayer> {
        self.features.as_ref()
    }

    pub fn panel(&self) -> &DetailPanel {
        &self.panel
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn selected_id(&self) -> Option<&str> {
        match self.panel.selection() {
            Selection::Selected(details) => Some(details.id.as_str()),
            Selection::Empty => None,
        }
    }

    /// Mounts (or remounts) the surface and binds the dataset to it.
    pub fn mount(&mut self, size: PixelSize) -> MapResult<()> {
        self.map.initialize(&self.config, size)?;
        self.hovered = None;
        self.open_popup = None;
        self.features = FeatureLayer::bind(&self.dataset, &self.map, &self.config);
        Ok(())
    }

    pub fn resize(&mut self, size: PixelSize) -> MapResult<bool> {
        self.map
            .with_map(|m| m.resize(size))
            .transpose()
            .map(|resized| resized.is_some())
    }

    fn viewport(&self) -> Option<Viewport> {
        self.map.inspect(|m| m.viewport().clone())
    }

    fn marker_at(&self, x: f64, y: f64) -> Option<usize> {
        let features = self.features.as_ref()?;
        let viewport = self.viewport()?;
        features.hit_test(&viewport, (x, y))
    }

    /// Tracks which marker is under the pointer, emitting exit/enter pairs
    /// on change. Returns whether the hovered marker changed.
    pub fn pointer_move(&mut self, x: f64, y: f64) -> bool {
        let hit = self.marker_at(x, y);
        self.set_hovered(hit)
    }

    pub fn pointer_leave(&mut self) -> bool {
        self.set_hovered(None)
    }

    fn set_hovered(&mut self, next: Option<usize>) -> bool {
        if next == self.hovered {
            return false;
        }
        let Some(features) = self.features.as_ref() else {
            return false;
        };

        if let Some(previous) = self.hovered.take() {
            features.dispatch(previous, MarkerEvent::PointerExit, &self.map, &mut self.panel);
        }
        if let Some(index) = next {
            features.dispatch(index, MarkerEvent::PointerEnter, &self.map, &mut self.panel);
        }
        self.hovered = next;
        true
    }

    /// A click on a marker selects it and opens its popup; a click on bare
    /// map closes the popup but leaves the selection alone.
    pub fn click(&mut self, x: f64, y: f64) -> bool {
        match self.marker_at(x, y) {
            Some(index) => {
                if let Some(features) = self.features.as_ref() {
                    features.dispatch(index, MarkerEvent::Click, &self.map, &mut self.panel);
                }
                self.open_popup = Some(index);
                true
            }
            None => self.open_popup.take().is_some(),
        }
    }

    pub fn dismiss(&mut self) -> bool {
        let was_visible = self.panel.is_visible();
        self.panel.clear();
        was_visible
    }

    pub fn close_popup(&mut self) -> bool {
        self.open_popup.take().is_some()
    }

    /// Open popup and the screen point its tip should sit on.
    pub fn open_popup(&self) -> Option<(&Popup, (f64, f64))> {
        let marker = self.features.as_ref()?.get(self.open_popup?)?;
        let viewport = self.viewport()?;
        let at = viewport.world_to_screen(&marker.position());
        Some((&marker.popup, marker.icon.popup_position(at)))
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) -> bool {
        match self.map.with_map(|m| m.viewport_mut().pan_by_pixels(dx, dy)) {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                tracing::warn!("Pan rejected: {}", e);
                false
            }
            None => false,
        }
    }

    pub fn zoom_by(&mut self, delta: i32, anchor: (f64, f64)) -> bool {
        match self.map.with_map(|m| m.viewport_mut().zoom_around(delta, anchor)) {
            Some(Ok(changed)) => changed,
            Some(Err(e)) => {
                tracing::warn!("Zoom rejected: {}", e);
                false
            }
            None => false,
        }
    }
}
