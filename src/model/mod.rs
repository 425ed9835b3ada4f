use crate::engine::transforms;
use crate::error::MapError;
use geojson::Position;
use serde::Deserialize;

pub mod site;

pub use site::{Dataset, SiteRecord};

pub type MapResult<T> = Result<T, MapError>;

pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 19;

// Geographic point. (lat, lng) is the only axis order used inside the crate;
// GeoJSON positions are converted once, in `from_position`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        GeoPoint { lat, lng }
    }

    /// Converts a GeoJSON `[lng, lat, ...]` position.
    pub fn from_position(position: &Position) -> Option<Self> {
        match position.as_slice() {
            [lng, lat, ..] => Some(GeoPoint::new(*lat, *lng)),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }

    pub fn validated(self) -> MapResult<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(MapError::InvalidCoordinate {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }
}

// Pixel size
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        PixelSize { width, height }
    }
}

/// Slippy-map tile address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        TileCoord { x, y, z }
    }

    pub fn is_valid(&self) -> bool {
        let max_coord = 1u64 << self.z;
        (self.x as u64) < max_coord && (self.y as u64) < max_coord && self.z <= MAX_ZOOM
    }
}

// Viewport for map view management
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    pub center: GeoPoint,
    pub zoom: u8,
    pub size: PixelSize,
}

impl Viewport {
    pub fn new(center: GeoPoint, zoom: u8, size: PixelSize) -> MapResult<Self> {
        let center = center.validated()?;
        if zoom > MAX_ZOOM {
            return Err(MapError::InvalidViewport(format!(
                "Zoom must be between {} and {}",
                MIN_ZOOM, MAX_ZOOM
            )));
        }
        if size.width == 0 || size.height == 0 {
            return Err(MapError::InvalidViewport(
                "Size dimensions must be greater than 0".to_string(),
            ));
        }

        Ok(Viewport { center, zoom, size })
    }

    pub fn pan(&mut self, new_center: GeoPoint) -> MapResult<()> {
        self.center = new_center.validated()?;
        Ok(())
    }

    pub fn zoom_to(&mut self, new_zoom: u8) -> MapResult<()> {
        if new_zoom > MAX_ZOOM {
            return Err(MapError::InvalidViewport(format!(
                "Zoom must be between {} and {}",
                MIN_ZOOM, MAX_ZOOM
            )));
        }
        self.zoom = new_zoom;
        Ok(())
    }

    pub fn resize(&mut self, new_size: PixelSize) -> MapResult<()> {
        if new_size.width == 0 || new_size.height == 0 {
            return Err(MapError::InvalidViewport(
                "Size dimensions must be greater than 0".to_string(),
            ));
        }
        self.size = new_size;
        Ok(())
    }

    /// World-pixel position of the top-left screen corner.
    pub fn pixel_origin(&self) -> (f64, f64) {
        let (cx, cy) = transforms::project(&self.center, self.zoom);
        (
            cx - self.size.width as f64 / 2.0,
            cy - self.size.height as f64 / 2.0,
        )
    }

    pub fn world_to_screen(&self, point: &GeoPoint) -> (f64, f64) {
        let (px, py) = transforms::project(point, self.zoom);
        let (ox, oy) = self.pixel_origin();
        (px - ox, py - oy)
    }

    pub fn screen_to_world(&self, x: f64, y: f64) -> GeoPoint {
        let (ox, oy) = self.pixel_origin();
        transforms::unproject((ox + x, oy + y), self.zoom)
    }

    /// Moves the map content by a screen delta, as a drag would.
    pub fn pan_by_pixels(&mut self, dx: f64, dy: f64) -> MapResult<()> {
        let half_w = self.size.width as f64 / 2.0;
        let half_h = self.size.height as f64 / 2.0;
        let target = self.screen_to_world(half_w - dx, half_h - dy);
        self.pan(GeoPoint::new(
            transforms::clamp_latitude(target.lat),
            transforms::wrap_longitude(target.lng),
        ))
    }

    /// Zooms by whole steps while keeping the point under `anchor` fixed.
    pub fn zoom_around(&mut self, delta: i32, anchor: (f64, f64)) -> MapResult<bool> {
        let new_zoom = (self.zoom as i32 + delta).clamp(MIN_ZOOM as i32, MAX_ZOOM as i32) as u8;
        if new_zoom == self.zoom {
            return Ok(false);
        }

        let pinned = self.screen_to_world(anchor.0, anchor.1);
        self.zoom_to(new_zoom)?;
        let (px, py) = transforms::project(&pinned, self.zoom);
        let cx = px - anchor.0 + self.size.width as f64 / 2.0;
        let cy = py - anchor.1 + self.size.height as f64 / 2.0;
        let center = transforms::unproject((cx, cy), self.zoom);
        self.pan(GeoPoint::new(
            transforms::clamp_latitude(center.lat),
            transforms::wrap_longitude(center.lng),
        ))?;
        Ok(true)
    }
}
