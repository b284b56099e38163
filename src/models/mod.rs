pub mod event;
pub mod location;
pub mod tag;

pub use event::{Event, EventRecord};
pub use location::{AvailabilityWindow, Location, LocationDisplay};
pub use tag::Tag;
