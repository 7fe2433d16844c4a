//! Distance tools: the cgmlst-dists binary and an in-process equivalent.

mod cgmlst_dists;
mod native;

pub use bio_types::{DistanceTool, DistanceToolError};
pub use cgmlst_dists::CgmlstDists;
pub use native::NativeDistances;

/// Header cell cgmlst-dists writes above its row labels.
pub const TOOL_INDEX_HEADER: &str = "cgmlst-dists";
