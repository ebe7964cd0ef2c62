pub mod summary;
pub mod units;

pub use summary::{build_summary, MODULE_TARGET_POINTS};
pub use units::units_of;
