pub mod app;
pub mod domain;
pub mod error;
pub mod export;
pub mod extract;
pub mod flywheel;
pub mod progress;
