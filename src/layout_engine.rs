mod hide;
mod tiling;

pub use hide::{HideCorner, hide_position, optimal_hide_corner};
pub use tiling::{LayoutResult, calculate_layout, inset_by_outer_gaps, relocate_floating};
