pub mod grid;
pub mod pixel;
pub mod simulator;
pub mod spatial_query;
pub mod utils;
