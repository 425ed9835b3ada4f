use wasm_bindgen::prelude::*;

pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod view;

pub use config::MapConfig;
pub use error::MapError;
pub use model::{Dataset, GeoPoint, MapResult, SiteRecord};
pub use view::panel::{Selection, SiteDetails};
pub use view::view::MapView;

#[wasm_bindgen(start)]
fn start() {
    console_error_panic_hook::set_once();
    logging::init_logging(tracing::Level::INFO);
    tracing::info!("site-map ready");
}
