//! Data models for recordscribe.

mod asset;
mod unit_record;
mod window;

pub use asset::{ExtractionResult, Granularity, SourceAsset, UnitStatus};
pub use unit_record::{UnitField, UnitRecord, ValidationError};
pub use window::Window;
