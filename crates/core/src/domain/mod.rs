pub mod contract;
pub mod post;
pub mod review;
pub mod synthesis;
