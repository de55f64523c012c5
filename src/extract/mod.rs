pub mod detail;
pub mod region;
pub mod rows;
