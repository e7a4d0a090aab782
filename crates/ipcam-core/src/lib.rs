//! Reconnect policy, the public `IpVideoGrabber` facade, and JSON settings
//! loading built on top of `ipcam-stream`'s connection primitives.

pub mod error;
pub mod events;
pub mod facade;
pub mod reconnect;
pub mod settings;

pub use error::{GrabberError, GrabberResult, SettingsError, SettingsResult};
pub use events::{EventBus, ResizeEvent};
pub use facade::IpVideoGrabber;
pub use reconnect::ReconnectController;
pub use settings::load_camera_configs;

/// Installs a `tracing-subscriber` formatter reading `RUST_LOG`. Intended to
/// be called once by the embedding application, not by tests.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
