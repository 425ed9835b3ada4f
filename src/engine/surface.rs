//! The map surface: a viewport plus the ordered set of layers drawn on it.
//!
//! Components never reach the surface through a global. They hold a
//! [`MapRef`], which is empty until the surface is mounted; every operation
//! through an empty reference is skipped rather than failed.

use crate::config::MapConfig;
use crate::engine::tiles::TileLayer;
use crate::features::RadiusOverlay;
use crate::model::{MapResult, PixelSize, Viewport};
use std::cell::RefCell;
use std::rc::Rc;

pub type LayerId = String;

pub const FEATURE_LAYER_ID: &str = "sites";

#[derive(Clone, Debug, PartialEq)]
pub enum LayerKind {
    BaseTiles(TileLayer),
    Features { marker_count: usize },
    Radius(RadiusOverlay),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MapLayer {
    pub id: LayerId,
    pub kind: LayerKind,
}

impl MapLayer {
    pub fn is_base(&self) -> bool {
        matches!(self.kind, LayerKind::BaseTiles(_))
    }
}

#[derive(Debug)]
pub struct MapSurface {
    viewport: Viewport,
    layers: Vec<MapLayer>,
}

impl MapSurface {
    pub fn new(config: &MapConfig, size: PixelSize) -> MapResult<Self> {
        let viewport = Viewport::new(config.center, config.zoom, size)?;
        let mut surface = MapSurface {
            viewport,
            layers: Vec::new(),
        };
        surface.install_base_layer(config.base_layer()?);
        Ok(surface)
    }

    /// Replaces the base tile layer. Any previous base layer is removed
    /// first, so exactly one is active afterwards.
    pub fn install_base_layer(&mut self, tiles: TileLayer) {
        self.layers.retain(|layer| !layer.is_base());
        self.layers.insert(
            0,
            MapLayer {
                id: tiles.name().to_string(),
                kind: LayerKind::BaseTiles(tiles),
            },
        );
    }

    /// Removes everything except the base tile layer.
    pub fn clear_non_base_layers(&mut self) -> usize {
        let before = self.layers.len();
        self.layers.retain(MapLayer::is_base);
        let removed = before - self.layers.len();
        if removed > 0 {
            tracing::debug!("Removed {} non-base layers", removed);
        }
        removed
    }

    /// Puts the surface back into its freshly-mounted state.
    pub fn reinitialize(&mut self, config: &MapConfig) -> MapResult<()> {
        let tiles = config.base_layer()?;
        self.viewport.pan(config.center)?;
        self.viewport.zoom_to(config.zoom)?;
        self.clear_non_base_layers();
        self.install_base_layer(tiles);
        Ok(())
    }

    pub fn install_feature_layer(&mut self, marker_count: usize) {
        self.layers.retain(|layer| layer.id != FEATURE_LAYER_ID);
        self.layers.push(MapLayer {
            id: FEATURE_LAYER_ID.to_string(),
            kind: LayerKind::Features { marker_count },
        });
    }

    /// Returns false, leaving the layers untouched, if the overlay is
    /// already attached.
    pub fn attach_overlay(&mut self, overlay: RadiusOverlay) -> bool {
        if self.has_layer(&overlay.id) {
            return false;
        }
        self.layers.push(MapLayer {
            id: overlay.id.clone(),
            kind: LayerKind::Radius(overlay),
        });
        true
    }

    pub fn detach_overlay(&mut self, id: &str) -> bool {
        let before = self.layers.len();
        self.layers
            .retain(|layer| !(layer.id == id && matches!(layer.kind, LayerKind::Radius(_))));
        before != self.layers.len()
    }

    pub fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|layer| layer.id == id)
    }

    pub fn layers(&self) -> &[MapLayer] {
        &self.layers
    }

    pub fn base_layer(&self) -> Option<&TileLayer> {
        self.layers.iter().find_map(|layer| match &layer.kind {
            LayerKind::BaseTiles(tiles) => Some(tiles),
            _ => None,
        })
    }

    pub fn base_layer_count(&self) -> usize {
        self.layers.iter().filter(|layer| layer.is_base()).count()
    }

    pub fn overlays(&self) -> impl Iterator<Item = &RadiusOverlay> {
        self.layers.iter().filter_map(|layer| match &layer.kind {
            LayerKind::Radius(overlay) => Some(overlay),
            _ => None,
        })
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays().count()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn resize(&mut self, size: PixelSize) -> MapResult<()> {
        self.viewport.resize(size)
    }
}

/// Shared, possibly-unmounted handle to the map surface.
#[derive(Clone, Debug, Default)]
pub struct MapRef {
    inner: Rc<RefCell<Option<MapSurface>>>,
}

impl MapRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.borrow().is_some()
    }

    /// Mounts a new surface, or reinitializes the one already mounted.
    pub fn initialize(&self, config: &MapConfig, size: PixelSize) -> MapResult<()> {
        let mut slot = self.inner.borrow_mut();
        match slot.as_mut() {
            Some(surface) => {
                tracing::debug!("Reinitializing mounted map surface");
                surface.resize(size)?;
                surface.reinitialize(config)
            }
            None => {
                *slot = Some(MapSurface::new(config, size)?);
                tracing::info!(
                    "Map surface mounted at ({}, {}) zoom {}",
                    config.center.lat,
                    config.center.lng,
                    config.zoom
                );
                Ok(())
            }
        }
    }

    pub fn unmount(&self) {
        self.inner.borrow_mut().take();
    }

    /// Runs `f` against the mounted surface; `None` when nothing is mounted.
    pub fn with_map<R>(&self, f: impl FnOnce(&mut MapSurface) -> R) -> Option<R> {
        let mut slot = self.inner.try_borrow_mut().ok()?;
        slot.as_mut().map(f)
    }

    pub fn inspect<R>(&self, f: impl FnOnce(&MapSurface) -> R) -> Option<R> {
        let slot = self.inner.try_borrow().ok()?;
        slot.as_ref().map(f)
    }
}
