pub mod error;
pub mod field_value;
pub mod ids;
pub mod message;
pub mod record;

pub use error::CoreError;
pub use field_value::{FieldValue, FromField};
pub use ids::*;
pub use message::{Completed, ImageEvent, Notification};
pub use record::{Record, Snapshot};
