pub mod mock;
pub mod sysfs;

pub use mock::{HelperCall, MockGpioBackend};
pub use sysfs::SysfsBackend;
