pub mod convert;
pub mod plan;
pub mod resolve;
