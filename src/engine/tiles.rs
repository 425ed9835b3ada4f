use crate::engine::transforms::TILE_SIZE;
use crate::model::{TileCoord, Viewport};
use lru::LruCache;
use std::num::NonZeroUsize;

/// Raster basemap described by an XYZ URL template.
#[derive(Clone, Debug, PartialEq)]
pub struct TileLayer {
    name: String,
    url_template: String,
    subdomains: Vec<String>,
    attribution: String,
    max_zoom: u8,
}

impl TileLayer {
    pub fn new(
        name: impl Into<String>,
        url_template: impl Into<String>,
        subdomains: Vec<String>,
        attribution: impl Into<String>,
    ) -> Self {
        TileLayer {
            name: name.into(),
            url_template: url_template.into(),
            subdomains,
            attribution: attribution.into(),
            max_zoom: crate::model::MAX_ZOOM,
        }
    }

    pub fn with_max_zoom(mut self, max_zoom: u8) -> Self {
        self.max_zoom = max_zoom.min(crate::model::MAX_ZOOM);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    pub fn attribution(&self) -> &str {
        &self.attribution
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn tile_url(&self, tile: &TileCoord) -> String {
        let mut url = self
            .url_template
            .replace("{z}", &tile.z.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string());
        if !self.subdomains.is_empty() {
            let index = (tile.x as usize + tile.y as usize) % self.subdomains.len();
            url = url.replace("{s}", &self.subdomains[index]);
        }
        url
    }

    /// Tiles covering the viewport, with their top-left screen position.
    /// Columns wrap around the antimeridian; rows outside the world are dropped.
    pub fn visible_tiles(&self, viewport: &Viewport) -> Vec<VisibleTile> {
        if viewport.zoom > self.max_zoom {
            return Vec::new();
        }

        let z = viewport.zoom;
        let tile_count = 1i64 << z;
        let (ox, oy) = viewport.pixel_origin();

        let min_col = (ox / TILE_SIZE).floor() as i64;
        let max_col = ((ox + viewport.size.width as f64 - 1.0) / TILE_SIZE).floor() as i64;
        let min_row = ((oy / TILE_SIZE).floor() as i64).max(0);
        let max_row = (((oy + viewport.size.height as f64 - 1.0) / TILE_SIZE).floor() as i64)
            .min(tile_count - 1);

        let mut tiles = Vec::new();
        for row in min_row..=max_row {
            for col in min_col..=max_col {
                let wrapped = col.rem_euclid(tile_count);
                let coord = TileCoord::new(wrapped as u32, row as u32, z);
                let screen_x = col as f64 * TILE_SIZE - ox;
                let screen_y = row as f64 * TILE_SIZE - oy;
                tiles.push(VisibleTile {
                    coord,
                    screen_x,
                    screen_y,
                });
            }
        }
        tiles
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VisibleTile {
    pub coord: TileCoord,
    pub screen_x: f64,
    pub screen_y: f64,
}

/// Number of loaded tile and icon images kept per view.
pub const TILE_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(capacity) => capacity,
    None => panic!("tile cache capacity must be non-zero"),
};

/// Least-recently-used store of loaded images, keyed by URL.
pub fn tile_cache<V>(capacity: NonZeroUsize) -> LruCache<String, V> {
    LruCache::new(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeoPoint, PixelSize};

    fn osm() -> TileLayer {
        TileLayer::new(
            "basemap",
            "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
            vec!["a".into(), "b".into(), "c".into()],
            "© OpenStreetMap contributors",
        )
    }

    #[test]
    fn test_tile_url_substitution() {
        let url = osm().tile_url(&TileCoord::new(10, 20, 5));
        // (10 + 20) % 3 == 0
        assert_eq!(url, "https://a.tile.openstreetmap.org/5/10/20.png");
        let url = osm().tile_url(&TileCoord::new(11, 20, 5));
        assert_eq!(url, "https://b.tile.openstreetmap.org/5/11/20.png");
    }

    #[test]
    fn test_single_tile_world() {
        let viewport =
            Viewport::new(GeoPoint::new(0.0, 0.0), 0, PixelSize::new(256, 256)).unwrap();
        let tiles = osm().visible_tiles(&viewport);
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].coord, TileCoord::new(0, 0, 0));
        assert_eq!((tiles[0].screen_x, tiles[0].screen_y), (0.0, 0.0));
    }

    #[test]
    fn test_visible_tiles_cover_viewport() {
        let viewport =
            Viewport::new(GeoPoint::new(-45.0, -65.0), 5, PixelSize::new(800, 600)).unwrap();
        let tiles = osm().visible_tiles(&viewport);
        assert!(!tiles.is_empty());
        assert!(tiles.iter().all(|t| t.coord.is_valid()));
        let min_x = tiles.iter().map(|t| t.screen_x).fold(f64::INFINITY, f64::min);
        let max_x = tiles.iter().map(|t| t.screen_x).fold(f64::NEG_INFINITY, f64::max);
        assert!(min_x <= 0.0);
        assert!(max_x + TILE_SIZE >= 800.0);
    }

    #[test]
    fn test_columns_wrap_at_antimeridian() {
        let viewport =
            Viewport::new(GeoPoint::new(0.0, 179.0), 2, PixelSize::new(512, 256)).unwrap();
        let tiles = osm().visible_tiles(&viewport);
        assert!(tiles.iter().any(|t| t.coord.x == 0));
        assert!(tiles.iter().any(|t| t.coord.x == 3));
    }

    #[test]
    fn test_no_tiles_beyond_max_zoom() {
        let layer = osm().with_max_zoom(4);
        let viewport =
            Viewport::new(GeoPoint::new(0.0, 0.0), 6, PixelSize::new(256, 256)).unwrap();
        assert!(layer.visible_tiles(&viewport).is_empty());
    }

    #[test]
    fn test_tile_cache_evicts_least_recently_used() {
        let mut cache = tile_cache(NonZeroUsize::new(2).unwrap());
        cache.put(osm().tile_url(&TileCoord::new(0, 0, 1)), 1);
        cache.put(osm().tile_url(&TileCoord::new(1, 0, 1)), 2);
        let first = osm().tile_url(&TileCoord::new(0, 0, 1));
        assert_eq!(cache.get(&first), Some(&1));
        cache.put(osm().tile_url(&TileCoord::new(0, 1, 1)), 3);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&first));
        assert!(!cache.contains(&osm().tile_url(&TileCoord::new(1, 0, 1))));
    }

    #[test]
    fn test_tile_cache_capacity_bounds_loaded_images() {
        let mut cache = tile_cache(TILE_CACHE_CAPACITY);
        for x in 0..300 {
            cache.put(osm().tile_url(&TileCoord::new(x, 0, 9)), x);
        }
        assert_eq!(cache.len(), TILE_CACHE_CAPACITY.get());
        assert!(!cache.contains(&osm().tile_url(&TileCoord::new(0, 0, 9))));
    }
}
