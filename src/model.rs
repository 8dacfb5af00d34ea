pub mod classify;
pub mod closed_windows;
pub mod tree;
pub mod world;
