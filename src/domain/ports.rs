use crate::domain::model::{ExtractionQuery, SlotRecord, SourceConfig, StrategyKind};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 取得指定網址的頁面內容
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// 互動式擷取對瀏覽器工作階段下的固定指令集
///
/// `click_*` 找不到目標時回傳 `Ok(false)`，找到但點擊失敗時回傳 `Err`
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&mut self, url: &str) -> Result<()>;
    async fn settle(&mut self, wait: Duration) -> Result<()>;
    async fn click_text(&mut self, text: &str) -> Result<bool>;
    async fn click_selector(&mut self, selector: &str) -> Result<bool>;
    async fn surface_count(&self) -> usize;
    async fn switch_to_latest_surface(&mut self) -> Result<()>;
    async fn content(&self) -> Result<String>;
    /// 目前頁面中每個內嵌 frame 的 HTML，依文件順序
    async fn frame_contents(&self) -> Result<Vec<String>>;
    async fn current_url(&self) -> String;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>>;
}

#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;
    async fn extract(&self, source: &SourceConfig, query: &ExtractionQuery)
        -> Result<Vec<SlotRecord>>;
}
