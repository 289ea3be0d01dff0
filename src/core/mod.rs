pub mod aggregator;
pub mod html;
pub mod interactive;
pub mod matrix;
pub mod normalize;
pub mod report;
pub mod slots;
pub mod text_scan;

pub use crate::domain::model::{AggregateResult, ExtractionQuery, SlotRecord, SourceConfig, StrategyKind};
pub use crate::domain::ports::{BrowserSession, ExtractionStrategy, PageFetcher, SessionFactory, Storage};
pub use crate::utils::error::Result;

use crate::utils::error::ScoutError;
use std::future::Future;
use std::time::Duration;

/// 執行單一步驟，超過 `limit` 視為該步驟失敗
pub(crate) async fn within<T>(
    limit: Duration,
    step: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ScoutError::timeout(step, limit)),
    }
}

pub(crate) async fn fetch_bounded(
    fetcher: &dyn PageFetcher,
    url: &str,
    limit: Duration,
    step: &str,
) -> Result<String> {
    within(limit, &format!("{} of {}", step, url), fetcher.fetch(url)).await
}
