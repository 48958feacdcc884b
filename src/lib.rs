// Library for tests to access modules

pub mod analysis;
pub mod config;
pub mod metrics_repo;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod segmenter;
pub mod version;
