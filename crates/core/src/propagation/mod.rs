//! Path planning and split-step propagation
//!
//! [`PropagationGeometry`] fixes where the screens sit and how the pitch changes
//! along the path; [`SplitStepPropagator`] walks a field through that geometry.

pub mod geometry;
pub mod split_step;

pub use geometry::PropagationGeometry;
pub use split_step::{absorbing_window, SplitStepPropagator};
