// Source fetchers that produce raw trending records

pub mod file_sources;
pub mod github_trending;

pub use file_sources::{HtmlFileSource, JsonFileSource};
pub use github_trending::{parse_trending_html, HttpTrendingSource};
