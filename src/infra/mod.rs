// Infrastructure adapters behind the application ports

pub mod http_client;
pub mod sqlite_store;
pub mod summary_reporter;

pub use http_client::ReqwestHttp;
pub use sqlite_store::{SqliteStore, StoredRepository};
pub use summary_reporter::{ReportSummary, SummaryReporter};
