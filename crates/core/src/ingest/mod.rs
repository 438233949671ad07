pub mod calendar;
pub mod reddit;
pub mod types;
