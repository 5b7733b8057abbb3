pub mod attempts;
pub mod grading;
pub mod models;
pub mod rollup;
