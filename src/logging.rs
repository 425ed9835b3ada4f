//! Logging setup.
//!
//! Installs a `tracing-subscriber` fmt subscriber. In the browser events go
//! to the devtools console through `tracing-web`, at a matching severity;
//! elsewhere they go to stdout. Timestamps are left out because
//! `wasm32-unknown-unknown` has no system clock.

use tracing::Level;

/// Installs the global subscriber. Returns false if one was already set,
/// which makes repeated calls harmless.
pub fn init_logging(level: Level) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .without_time()
        .with_ansi(false)
        .with_target(false);

    #[cfg(target_arch = "wasm32")]
    let builder = builder.with_writer(tracing_web::MakeWebConsoleWriter::new());

    builder.try_init().is_ok()
}
