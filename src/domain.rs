//! Domain module - core value types of the price tracker
//!
//! Each module is its own file in the domain/ directory; the commonly used
//! items are re-exported here.

pub mod locator;
pub mod price_record;
pub mod run_mode;

pub use locator::{Locator, LocatorChain, LocatorPair};
pub use price_record::{CAPTURED_AT_FORMAT, PriceRecord};
pub use run_mode::{RunMode, TEST_PRODUCT_IDS};
