// 轉接層：`domain::ports` 的具體實作

pub mod http;
pub mod static_session;
pub mod storage;

pub use http::HttpFetcher;
pub use static_session::{StaticSession, StaticSessionFactory};
pub use storage::LocalStorage;
