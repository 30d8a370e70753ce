pub mod event;
pub mod reading;

pub use event::{Event, RawValue};
pub use reading::Reading;
