//! 沒有可用結構的頁面：掃描每個文字節點找出開球時間
//!
//! 來源設定了 `product_labels` 時改用瀏覽器工作階段，先點選產品再讀取頁面

use async_trait::async_trait;
use chrono::NaiveTime;
use scraper::{ElementRef, Html};
use std::sync::Arc;

use crate::core::{fetch_bounded, within};
use crate::core::html::element_text;
use crate::core::normalize::{is_at_or_before, normalize_time, satisfies_player_count, TIME_12H_RE};
use crate::core::slots::dedupe_sorted;
use crate::domain::model::{ExtractionQuery, SlotRecord, SourceConfig, StrategyKind};
use crate::domain::ports::{BrowserSession, ExtractionStrategy, PageFetcher, SessionFactory};
use crate::utils::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextHit {
    pub time: NaiveTime,
    pub hint: Option<String>,
}

/// 文字節點中不晚於 `latest` 的 12 小時制時間
///
/// 父元素文字提到 player 時作為人數提示
pub fn scan_times(html: &str, latest: NaiveTime) -> Vec<TextHit> {
    let document = Html::parse_document(html);
    let mut hits = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let parent = node.parent().and_then(ElementRef::wrap);
        if parent.is_some_and(|p| matches!(p.value().name(), "script" | "style")) {
            continue;
        }

        for caps in TIME_12H_RE.captures_iter(text) {
            let Ok(time) = normalize_time(&caps[1]) else {
                continue;
            };
            if !is_at_or_before(time, latest) {
                continue;
            }
            let hint = parent
                .map(element_text)
                .filter(|t| t.to_lowercase().contains("player"));
            hits.push(TextHit { time, hint });
        }
    }
    hits
}

pub struct TextScanExtractor {
    fetcher: Arc<dyn PageFetcher>,
    sessions: Option<Arc<dyn SessionFactory>>,
}

impl TextScanExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            sessions: None,
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionFactory>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// 依序點擊產品標籤，第一個成功的就停止
    async fn pick_product(
        &self,
        session: &mut dyn BrowserSession,
        labels: &[String],
        query: &ExtractionQuery,
    ) -> bool {
        for label in labels {
            match within(query.timeouts.click, "product click", session.click_text(label)).await {
                Ok(true) => {
                    tracing::debug!("Picked product '{}'", label);
                    return true;
                }
                Ok(false) => tracing::debug!("No '{}' product on page", label),
                Err(e) => tracing::warn!("⚠️ Product '{}' failed: {}", label, e),
            }
        }
        false
    }

    async fn load_with_session(
        &self,
        sessions: &dyn SessionFactory,
        source: &SourceConfig,
        url: &str,
        query: &ExtractionQuery,
    ) -> Result<String> {
        let mut session = sessions.open().await?;
        within(query.timeouts.page_load, "page load", session.goto(url)).await?;

        if !self
            .pick_product(session.as_mut(), &source.product_labels, query)
            .await
        {
            tracing::info!("{}: no product label matched, reading the page as loaded", source.name);
        }
        if let Err(e) = session.settle(query.timeouts.settle).await {
            tracing::warn!("⚠️ {} did not settle: {}", source.name, e);
        }
        session.content().await
    }

    async fn load(&self, source: &SourceConfig, url: &str, query: &ExtractionQuery) -> Result<String> {
        if !source.product_labels.is_empty() {
            match &self.sessions {
                Some(sessions) => {
                    return self
                        .load_with_session(sessions.as_ref(), source, url, query)
                        .await
                }
                None => tracing::warn!(
                    "⚠️ {}: product labels set but no browser session available, fetching directly",
                    source.name
                ),
            }
        }
        fetch_bounded(self.fetcher.as_ref(), url, query.timeouts.page_load, "page load").await
    }
}

#[async_trait]
impl ExtractionStrategy for TextScanExtractor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TextScan
    }

    async fn extract(
        &self,
        source: &SourceConfig,
        query: &ExtractionQuery,
    ) -> Result<Vec<SlotRecord>> {
        let url = source.url_for(query.date);
        let html = self.load(source, &url, query).await?;

        let records = scan_times(&html, query.latest)
            .into_iter()
            .filter(|hit| satisfies_player_count(hit.hint.as_deref(), query.min_players))
            .map(|hit| SlotRecord::slot(source.name.clone(), query.date, hit.time, hit.hint, url.clone()))
            .collect();

        Ok(dedupe_sorted(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ScoutError;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use std::time::Duration;

    const CALENDAR_HTML: &str = r#"
<html><head><script>var opens = "5:00 AM";</script></head><body>
<div class="row"><span class="time">6:30 AM</span> <span>2 players available</span></div>
<div class="row"><span class="time">6:40 AM</span></div>
<div class="row"><p>6:50 AM - 1 player left</p></div>
<div class="row"><p>Twilight 3:00 PM 4 players</p></div>
<div class="row"><span class="time">6:40 AM</span></div>
</body></html>"#;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    struct OnePage(&'static str);

    #[async_trait]
    impl PageFetcher for OnePage {
        async fn fetch(&self, _url: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl PageFetcher for Broken {
        async fn fetch(&self, url: &str) -> Result<String> {
            Err(ScoutError::HttpStatusError {
                status: 503,
                url: url.to_string(),
            })
        }
    }

    /// 模擬產品選擇頁：點到 `working` 後才出現時段
    #[derive(Clone)]
    struct ProductPicker {
        working: &'static str,
        broken: &'static str,
        picked: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ProductPicker {
        fn new(working: &'static str, broken: &'static str) -> Self {
            Self {
                working,
                broken,
                picked: false,
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BrowserSession for ProductPicker {
        async fn goto(&mut self, url: &str) -> Result<()> {
            self.log.lock().unwrap().push(format!("goto:{}", url));
            Ok(())
        }

        async fn settle(&mut self, _wait: Duration) -> Result<()> {
            self.log.lock().unwrap().push("settle".to_string());
            Ok(())
        }

        async fn click_text(&mut self, text: &str) -> Result<bool> {
            self.log.lock().unwrap().push(format!("click:{}", text));
            if text == self.broken {
                return Err(ScoutError::SessionError {
                    message: "element detached".to_string(),
                });
            }
            if text == self.working {
                self.picked = true;
                return Ok(true);
            }
            Ok(false)
        }

        async fn click_selector(&mut self, _selector: &str) -> Result<bool> {
            Ok(false)
        }

        async fn surface_count(&self) -> usize {
            1
        }

        async fn switch_to_latest_surface(&mut self) -> Result<()> {
            Ok(())
        }

        async fn content(&self) -> Result<String> {
            self.log.lock().unwrap().push("content".to_string());
            if self.picked {
                Ok(CALENDAR_HTML.to_string())
            } else {
                Ok("<p>Choose a product</p>".to_string())
            }
        }

        async fn frame_contents(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn current_url(&self) -> String {
            String::new()
        }
    }

    struct PickerFactory(ProductPicker);

    #[async_trait]
    impl SessionFactory for PickerFactory {
        async fn open(&self) -> Result<Box<dyn BrowserSession>> {
            Ok(Box::new(self.0.clone()))
        }
    }

    const PAGE_URL: &str = "https://bookings.example.com/ViewPublicCalendar.msp?selectedDate=2026-10-18";

    fn labelled_source() -> SourceConfig {
        source().with_product_labels(["18 Holes", "18 Hole", "All"])
    }

    fn picker_extractor(picker: &ProductPicker) -> TextScanExtractor {
        TextScanExtractor::new(Arc::new(Broken)).with_sessions(Arc::new(PickerFactory(picker.clone())))
    }

    fn source() -> SourceConfig {
        SourceConfig::new(
            "collier",
            "Collier Park",
            StrategyKind::TextScan,
            "https://bookings.example.com/ViewPublicCalendar.msp?selectedDate={date}",
        )
    }

    fn query(min_players: u32) -> ExtractionQuery {
        ExtractionQuery::new(
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
            min_players,
            t(10, 0),
        )
        .unwrap()
    }

    #[test]
    fn test_scan_times_skips_scripts_and_late_times() {
        let hits = scan_times(CALENDAR_HTML, t(10, 0));
        let times: Vec<NaiveTime> = hits.iter().map(|h| h.time).collect();
        assert_eq!(times, vec![t(6, 30), t(6, 40), t(6, 50), t(6, 40)]);
    }

    #[test]
    fn test_hint_comes_from_enclosing_element() {
        let html = r#"<p>7:15 AM 1 to 3 players</p><span>7:20 AM</span>"#;
        let hits = scan_times(html, t(10, 0));
        assert_eq!(hits[0].hint.as_deref(), Some("7:15 AM 1 to 3 players"));
        assert_eq!(hits[1].hint, None);
    }

    #[tokio::test]
    async fn test_extract_filters_players_and_dedupes() {
        let extractor = TextScanExtractor::new(Arc::new(OnePage(CALENDAR_HTML)));
        let records = extractor.extract(&source(), &query(2)).await.unwrap();

        let times: Vec<String> = records.iter().map(|r| r.time_label()).collect();
        assert_eq!(times, vec!["06:30", "06:40"]);
        assert_eq!(
            records[0].action_url,
            "https://bookings.example.com/ViewPublicCalendar.msp?selectedDate=2026-10-18"
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let extractor = TextScanExtractor::new(Arc::new(Broken));
        assert!(extractor.extract(&source(), &query(2)).await.is_err());
    }

    #[tokio::test]
    async fn test_product_labels_are_clicked_in_order() {
        let picker = ProductPicker::new("All", "18 Hole");
        let records = picker_extractor(&picker)
            .extract(&labelled_source(), &query(2))
            .await
            .unwrap();

        assert_eq!(
            picker.log(),
            vec![
                format!("goto:{}", PAGE_URL),
                "click:18 Holes".to_string(),
                "click:18 Hole".to_string(),
                "click:All".to_string(),
                "settle".to_string(),
                "content".to_string(),
            ]
        );
        let times: Vec<String> = records.iter().map(|r| r.time_label()).collect();
        assert_eq!(times, vec!["06:30", "06:40"]);
        assert_eq!(records[0].action_url, PAGE_URL);
    }

    #[tokio::test]
    async fn test_first_matching_product_stops_the_clicks() {
        let picker = ProductPicker::new("18 Holes", "");
        let records = picker_extractor(&picker)
            .extract(&labelled_source(), &query(2))
            .await
            .unwrap();

        assert_eq!(
            picker.log(),
            vec![
                format!("goto:{}", PAGE_URL),
                "click:18 Holes".to_string(),
                "settle".to_string(),
                "content".to_string(),
            ]
        );
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_no_matching_product_reads_page_as_loaded() {
        let picker = ProductPicker::new("Members", "");
        let records = picker_extractor(&picker)
            .extract(&labelled_source(), &query(2))
            .await
            .unwrap();

        assert!(records.is_empty());
        assert_eq!(picker.log().last().map(String::as_str), Some("content"));
    }

    #[tokio::test]
    async fn test_product_labels_without_sessions_fetch_directly() {
        let extractor = TextScanExtractor::new(Arc::new(OnePage(CALENDAR_HTML)));
        let records = extractor.extract(&labelled_source(), &query(2)).await.unwrap();
        assert_eq!(records.len(), 2);
    }
}
