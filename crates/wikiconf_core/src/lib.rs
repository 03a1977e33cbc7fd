pub mod article_path;
pub mod config;
pub mod error;
pub mod interwiki;
pub mod matcher;
pub mod report;
pub mod services;
pub mod site_config;
pub mod static_services;
pub mod variants;
pub mod width;

pub use error::ConfigError;
pub use site_config::SiteConfig;
