#![allow(non_upper_case_globals)]

use crate::model::GeoPoint;
use std::f64::consts::PI;

// Pure Web Mercator transformation functions

pub const TILE_SIZE: f64 = 256.0;
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;
const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.686;

// Side length of the whole world in pixels at a zoom level
pub const world_size: fn(u8) -> f64 = |zoom| TILE_SIZE * 2.0_f64.powi(zoom as i32);

pub const clamp_latitude: fn(f64) -> f64 = |lat| lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);

pub const wrap_longitude: fn(f64) -> f64 = |lng| {
    if (-180.0..=180.0).contains(&lng) {
        lng
    } else {
        (lng + 180.0).rem_euclid(360.0) - 180.0
    }
};

// Geographic point to world pixel coordinates
pub const project: fn(&GeoPoint, u8) -> (f64, f64) = |point, zoom| {
    let size = world_size(zoom);
    let lat_rad = clamp_latitude(point.lat).to_radians();
    let x = (point.lng + 180.0) / 360.0 * size;
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * size;
    (x, y)
};

// World pixel coordinates back to a geographic point
pub const unproject: fn((f64, f64), u8) -> GeoPoint = |(x, y), zoom| {
    let size = world_size(zoom);
    let lng = x / size * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / size)).sinh().atan().to_degrees();
    GeoPoint::new(lat, lng)
};

// Ground resolution at a latitude
pub const meters_per_pixel: fn(f64, u8) -> f64 =
    |lat, zoom| EARTH_CIRCUMFERENCE_M * clamp_latitude(lat).to_radians().cos() / world_size(zoom);

pub const meters_to_pixels: fn(f64, f64, u8) -> f64 =
    |meters, lat, zoom| meters / meters_per_pixel(lat, zoom);
