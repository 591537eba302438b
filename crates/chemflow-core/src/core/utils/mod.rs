pub mod geometry;
pub mod text;
pub mod units;
