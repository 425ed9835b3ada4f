use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("i/o error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("WebAssembly error: {0}")]
    Wasm(String),
    #[error("Invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },
    #[error("Invalid viewport: {0}")]
    InvalidViewport(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<MapError> for wasm_bindgen::JsValue {
    fn from(err: MapError) -> Self {
        wasm_bindgen::JsValue::from_str(&err.to_string())
    }
}
