pub mod analysis;
pub mod archive;
pub mod config;
pub mod error;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod report;
