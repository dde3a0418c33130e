pub mod board;
pub mod chart;
pub mod detail;
pub mod format;
pub mod help;
pub mod risk;
pub mod tile;
