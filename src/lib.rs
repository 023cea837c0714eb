pub mod backend;
pub mod config;
pub mod error;
pub mod gpio;
pub mod pins;
pub mod revision;
pub mod routes;
pub mod shutdown;

pub use backend::{HelperCall, MockGpioBackend, SysfsBackend};
pub use config::{AppConfig, GpioConfig, HttpConfig, ProbePolicy};
pub use error::GpioError;
pub use gpio::{GpioBackend, GpioManager};
pub use pins::{Direction, PinOptions, PinTable, Pull, Reading};
pub use revision::BoardRevision;
pub use routes::AppState;
pub use shutdown::ShutdownHook;
