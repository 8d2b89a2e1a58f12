pub mod blocks;
pub mod chart;
pub mod fields;
pub mod keywords;
pub mod sections;

pub use fields::Document;
