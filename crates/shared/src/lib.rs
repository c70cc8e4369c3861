pub mod directory;
pub mod display;
pub mod domain;
pub mod error;
pub mod reading;
