mod extension;
pub mod geometry;
mod space;

pub use extension::Extension;
pub use geometry::{FrameSample, Segment};
pub use space::{MediaKind, Space, SpaceId};
