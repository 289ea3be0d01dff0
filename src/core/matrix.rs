//! 預約矩陣頁面：每種球洞數一欄，可預約的格子裡有 "Select" 連結

use async_trait::async_trait;
use chrono::NaiveTime;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, LazyLock};

use crate::core::fetch_bounded;
use crate::core::html::{element_text, expand_cells, resolve_link, usable_href, ANCHOR};
use crate::core::normalize::{
    first_time_12h, format_hhmm, is_at_or_before, satisfies_player_count,
};
use crate::core::slots::dedupe_sorted;
use crate::domain::model::{ExtractionQuery, SlotRecord, SourceConfig, StrategyKind};
use crate::domain::ports::{ExtractionStrategy, PageFetcher};
use crate::utils::error::Result;

const SHORT_LABEL: &str = "9 holes";
const LONG_LABEL: &str = "18 holes";
const ACTION_KEYWORD: &str = "select";
const HEADER_SCAN_ROWS: usize = 6;

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static FORM_CONTROL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("button, input").unwrap());
static DROPDOWN: LazyLock<Selector> = LazyLock::new(|| Selector::parse("select").unwrap());
static OPTION: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option").unwrap());

static DEST_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\s*(?:to|-)\s*(\d+)\s*players?\b").unwrap());
static DEST_UP_TO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bup to\s*(\d+)\s*players?\b").unwrap());
static DEST_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\s*players?\b").unwrap());
static FIRST_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// 18 洞欄位中可預約的一列（尚未做人數篩選）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRow {
    pub time: NaiveTime,
    pub action_url: String,
    pub row_hint: Option<String>,
}

/// 檢查預約頁人數上限的結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed(bool),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationCheck {
    pub confirmation: Confirmation,
    pub hint: Option<String>,
}

impl DestinationCheck {
    pub fn unknown() -> Self {
        Self {
            confirmation: Confirmation::Unknown,
            hint: None,
        }
    }
}

/// 預約頁上的人數提示優先於該列文字
pub fn resolve_hint(row_hint: Option<&str>, destination: &DestinationCheck) -> Option<String> {
    destination
        .hint
        .clone()
        .or_else(|| row_hint.map(str::to_string))
}

/// `Unknown` 只在這裡被判定：一律接受
pub fn accept_row(confirmation: Confirmation, hint: Option<&str>, min_players: u32) -> bool {
    let confirmed = match confirmation {
        Confirmation::Confirmed(ok) => ok,
        Confirmation::Unknown => true,
    };
    confirmed && satisfies_player_count(hint, min_players)
}

fn find_matrix_table(document: &Html) -> Option<ElementRef<'_>> {
    document.select(&TABLE).find(|table| {
        let text = element_text(*table).to_lowercase();
        text.contains(SHORT_LABEL) && text.contains(LONG_LABEL) && text.contains(ACTION_KEYWORD)
    })
}

fn target_column(header: ElementRef<'_>) -> Option<usize> {
    let headers: Vec<String> = expand_cells(header)
        .into_iter()
        .map(|cell| element_text(cell).to_lowercase())
        .collect();

    headers
        .iter()
        .position(|h| h.contains(LONG_LABEL))
        // 也接受 "18 Hole"、"18-hole"
        .or_else(|| headers.iter().position(|h| h.contains("18") && h.contains("hole")))
}

fn action_href<'a>(cell: ElementRef<'a>) -> Option<&'a str> {
    let anchors: Vec<ElementRef<'a>> = cell.select(&ANCHOR).collect();
    let preferred = anchors
        .iter()
        .find(|a| element_text(**a).to_lowercase().contains(ACTION_KEYWORD))
        .or_else(|| anchors.first());

    preferred
        .and_then(|a| a.value().attr("href"))
        .and_then(usable_href)
        .or_else(|| {
            cell.select(&FORM_CONTROL).find_map(|control| {
                control
                    .value()
                    .attr("formaction")
                    .or_else(|| control.value().attr("href"))
                    .and_then(usable_href)
            })
        })
}

/// 18 洞欄位有預約連結且不晚於 `latest` 的列
///
/// 找不到矩陣表格時回傳空結果
pub fn parse_matrix(html: &str, page_url: &str, latest: NaiveTime) -> Vec<MatrixRow> {
    let document = Html::parse_document(html);
    let Some(table) = find_matrix_table(&document) else {
        tracing::debug!("No booking matrix table on {}", page_url);
        return Vec::new();
    };

    let rows: Vec<ElementRef<'_>> = table.select(&ROW).collect();
    let header = rows
        .iter()
        .take(HEADER_SCAN_ROWS)
        .filter(|tr| {
            let text = element_text(**tr).to_lowercase();
            text.contains(LONG_LABEL) || text.contains(SHORT_LABEL)
        })
        .last();
    let Some(column) = header.and_then(|h| target_column(*h)) else {
        tracing::debug!("Booking matrix on {} has no 18-hole column", page_url);
        return Vec::new();
    };

    let mut found = Vec::new();
    for tr in rows {
        let text = element_text(tr);
        let lowered = text.to_lowercase();
        if !lowered.contains(ACTION_KEYWORD) {
            continue;
        }
        let Some(time) = first_time_12h(&text) else {
            continue;
        };
        if !is_at_or_before(time, latest) {
            continue;
        }

        let cells = expand_cells(tr);
        let Some(cell) = cells.get(column) else {
            continue;
        };
        let Some(action_url) = action_href(*cell).and_then(|href| resolve_link(page_url, href))
        else {
            tracing::debug!("{} has no 18-hole booking link", format_hhmm(time));
            continue;
        };

        found.push(MatrixRow {
            time,
            action_url,
            row_hint: lowered.contains("player").then(|| text.clone()),
        });
    }
    found
}

fn dropdown_max(document: &Html) -> Option<u32> {
    document
        .select(&DROPDOWN)
        .filter(|select| {
            ["id", "name", "class"].iter().any(|attr| {
                select
                    .value()
                    .attr(attr)
                    .is_some_and(|v| v.to_lowercase().contains("player"))
            })
        })
        .flat_map(|select| select.select(&OPTION).collect::<Vec<_>>())
        .filter_map(|option| {
            option
                .value()
                .attr("value")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .or_else(|| {
                    FIRST_NUMBER_RE
                        .find(&element_text(option))
                        .and_then(|m| m.as_str().parse().ok())
                })
        })
        .max()
}

/// 從預約頁讀出人數上限
///
/// 優先順序：人數下拉選單、`N to M players`、`up to N players`、最大的 `N player(s)`
pub fn inspect_destination(html: &str, min_players: u32) -> DestinationCheck {
    let document = Html::parse_document(html);

    if let Some(max) = dropdown_max(&document) {
        return DestinationCheck {
            confirmation: Confirmation::Confirmed(max >= min_players),
            hint: Some(format!("players up to {}", max)),
        };
    }

    let text = element_text(document.root_element()).to_lowercase();

    if let Some(caps) = DEST_RANGE_RE.captures(&text) {
        if let Ok(upper) = caps[2].parse::<u32>() {
            return DestinationCheck {
                confirmation: Confirmation::Confirmed(upper >= min_players),
                hint: Some(caps[0].to_string()),
            };
        }
    }

    if let Some(caps) = DEST_UP_TO_RE.captures(&text) {
        if let Ok(upper) = caps[1].parse::<u32>() {
            return DestinationCheck {
                confirmation: Confirmation::Confirmed(upper >= min_players),
                hint: Some(caps[0].to_string()),
            };
        }
    }

    let max = DEST_COUNT_RE
        .captures_iter(&text)
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max();
    match max {
        Some(max) => DestinationCheck {
            confirmation: Confirmation::Confirmed(max >= min_players),
            hint: Some(format!("players up to {}", max)),
        },
        None => DestinationCheck::unknown(),
    }
}

pub struct MatrixExtractor {
    fetcher: Arc<dyn PageFetcher>,
}

impl MatrixExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    async fn check_destination(&self, url: &str, query: &ExtractionQuery) -> DestinationCheck {
        match fetch_bounded(
            self.fetcher.as_ref(),
            url,
            query.timeouts.confirm,
            "booking page check",
        )
        .await
        {
            Ok(html) => inspect_destination(&html, query.min_players),
            Err(e) => {
                tracing::warn!("⚠️ Could not check {}: {} (keeping the slot)", url, e);
                DestinationCheck::unknown()
            }
        }
    }
}

#[async_trait]
impl ExtractionStrategy for MatrixExtractor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Matrix
    }

    async fn extract(
        &self,
        source: &SourceConfig,
        query: &ExtractionQuery,
    ) -> Result<Vec<SlotRecord>> {
        let url = source.url_for(query.date);
        let html = fetch_bounded(self.fetcher.as_ref(), &url, query.timeouts.page_load, "page load")
            .await?;

        let rows = parse_matrix(&html, &url, query.latest);
        tracing::debug!("{}: {} candidate rows", source.name, rows.len());

        let mut records = Vec::new();
        for row in rows {
            let destination = if source.confirm_players {
                self.check_destination(&row.action_url, query).await
            } else {
                DestinationCheck::unknown()
            };
            let hint = resolve_hint(row.row_hint.as_deref(), &destination);

            if !accept_row(destination.confirmation, hint.as_deref(), query.min_players) {
                tracing::debug!(
                    "{} {} rejected for {} players",
                    source.name,
                    format_hhmm(row.time),
                    query.min_players
                );
                continue;
            }

            records.push(SlotRecord::slot(
                source.name.clone(),
                query.date,
                row.time,
                hint,
                row.action_url,
            ));
        }

        Ok(dedupe_sorted(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ScoutError;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    const PAGE_URL: &str = "https://club.example.com/teetimes/searchmatrix?teedate=20261018";

    const MATRIX_HTML: &str = r#"
<html><body>
<table id="nav"><tr><td>Home</td><td>9 holes only on Mondays</td></tr></table>
<table class="matrixTable">
  <tr><th colspan="2">Tee Time</th><th>9 Holes</th><th>18 Holes</th></tr>
  <tr><td>7:00 AM</td><td>1 to 4 players</td>
      <td><a href="/teetimes/book/9-0700">Select</a></td>
      <td><a href="/teetimes/book/18-0700">Select</a></td></tr>
  <tr><td>7:10 AM</td><td>1 to 4 players</td>
      <td><a href="/teetimes/book/9-0710">Select</a></td>
      <td>&nbsp;</td></tr>
  <tr><td>9:30 AM</td><td>1 to 4 players</td>
      <td><a href="/teetimes/book/9-0930">Select</a></td>
      <td><a href="/teetimes/book/18-0930">Select</a></td></tr>
</table>
</body></html>"#;

    struct StubFetcher {
        pages: HashMap<String, String>,
    }

    impl StubFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, html)| (url.to_string(), html.to_string()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ScoutError::HttpStatusError {
                    status: 404,
                    url: url.to_string(),
                })
        }
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn query(min_players: u32, latest: NaiveTime) -> ExtractionQuery {
        ExtractionQuery::new(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(), min_players, latest)
            .unwrap()
    }

    fn source() -> SourceConfig {
        SourceConfig::new(
            "club",
            "Club Links",
            StrategyKind::Matrix,
            "https://club.example.com/teetimes/searchmatrix?teedate={yyyymmdd}",
        )
    }

    #[test]
    fn test_parse_matrix_keeps_rows_with_long_course_links() {
        let rows = parse_matrix(MATRIX_HTML, PAGE_URL, t(10, 0));
        let times: Vec<NaiveTime> = rows.iter().map(|r| r.time).collect();
        assert_eq!(times, vec![t(7, 0), t(9, 30)]);
        assert_eq!(rows[0].action_url, "https://club.example.com/teetimes/book/18-0700");
        assert!(rows[0].row_hint.as_deref().unwrap().contains("1 to 4 players"));
    }

    #[test]
    fn test_parse_matrix_without_matrix_table_is_empty() {
        let html = "<table><tr><td>7:00 AM</td><td>Select</td></tr></table>";
        assert!(parse_matrix(html, PAGE_URL, t(10, 0)).is_empty());
    }

    #[test]
    fn test_parse_matrix_falls_back_to_singular_hole_label() {
        let html = r#"<table>
          <caption>Choose 9 holes or 18 holes</caption>
          <tr><th>Time</th><th>9 Holes</th><th>18 Hole Round</th></tr>
          <tr><td>6:40 AM</td><td><a href="/b/9">Select</a></td><td><a href="/b/18">Select</a></td></tr>
        </table>"#;
        let rows = parse_matrix(html, PAGE_URL, t(10, 0));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action_url, "https://club.example.com/b/18");
    }

    #[test]
    fn test_inspect_destination_patterns() {
        let dropdown = r#"<select name="numPlayers"><option value="1">1</option><option value="2">2</option></select>"#;
        let check = inspect_destination(dropdown, 3);
        assert_eq!(check.confirmation, Confirmation::Confirmed(false));
        assert_eq!(check.hint.as_deref(), Some("players up to 2"));

        let range = "<p>This tee time is available for 1 to 4 players.</p>";
        let check = inspect_destination(range, 2);
        assert_eq!(check.confirmation, Confirmation::Confirmed(true));
        assert_eq!(check.hint.as_deref(), Some("1 to 4 players"));

        let up_to = "<p>Book up to 3 players online</p>";
        assert_eq!(
            inspect_destination(up_to, 4).confirmation,
            Confirmation::Confirmed(false)
        );

        let single = "<p>1 player remaining</p>";
        assert_eq!(
            inspect_destination(single, 2).confirmation,
            Confirmation::Confirmed(false)
        );

        let silent = "<p>Green fees include GST</p>";
        assert_eq!(inspect_destination(silent, 2), DestinationCheck::unknown());
    }

    #[test]
    fn test_unknown_confirmation_is_accepted() {
        assert!(accept_row(Confirmation::Unknown, None, 4));
        assert!(!accept_row(Confirmation::Confirmed(false), None, 1));
        assert!(!accept_row(Confirmation::Unknown, Some("1 to 2 players"), 3));
    }

    #[test]
    fn test_destination_hint_overrides_row_hint() {
        let destination = DestinationCheck {
            confirmation: Confirmation::Confirmed(true),
            hint: Some("up to 4 players".to_string()),
        };
        assert_eq!(
            resolve_hint(Some("7:00 AM 2 players Select"), &destination).as_deref(),
            Some("up to 4 players")
        );
        assert_eq!(
            resolve_hint(Some("row text"), &DestinationCheck::unknown()).as_deref(),
            Some("row text")
        );
    }

    #[tokio::test]
    async fn test_scenario_seven_oclock_only() {
        let fetcher = StubFetcher::new(&[
            (PAGE_URL, MATRIX_HTML),
            (
                "https://club.example.com/teetimes/book/18-0700",
                "<p>1 to 4 players</p>",
            ),
        ]);
        let extractor = MatrixExtractor::new(Arc::new(fetcher));

        let records = extractor.extract(&source(), &query(2, t(9, 0))).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time_label(), "07:00");
        assert_eq!(records[0].player_hint.as_deref(), Some("1 to 4 players"));
        assert_eq!(records[0].source, "Club Links");
    }

    #[tokio::test]
    async fn test_failed_booking_page_check_keeps_slot() {
        // stub 沒有預約頁，所以每次確認都會失敗
        let fetcher = StubFetcher::new(&[(PAGE_URL, MATRIX_HTML)]);
        let extractor = MatrixExtractor::new(Arc::new(fetcher));

        let records = extractor.extract(&source(), &query(2, t(10, 0))).await.unwrap();

        let times: Vec<String> = records.iter().map(|r| r.time_label()).collect();
        assert_eq!(times, vec!["07:00", "09:30"]);
    }

    #[tokio::test]
    async fn test_booking_page_limit_rejects_slot() {
        let fetcher = StubFetcher::new(&[
            (PAGE_URL, MATRIX_HTML),
            ("https://club.example.com/teetimes/book/18-0700", "<p>up to 2 players</p>"),
            ("https://club.example.com/teetimes/book/18-0930", "<p>1 to 4 players</p>"),
        ]);
        let extractor = MatrixExtractor::new(Arc::new(fetcher));

        let records = extractor.extract(&source(), &query(3, t(10, 0))).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time_label(), "09:30");
    }

    #[tokio::test]
    async fn test_extract_is_idempotent() {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(StubFetcher::new(&[(PAGE_URL, MATRIX_HTML)]));
        let extractor = MatrixExtractor::new(fetcher);
        let mut src = source();
        src.confirm_players = false;

        let first = extractor.extract(&src, &query(2, t(10, 0))).await.unwrap();
        let second = extractor.extract(&src, &query(2, t(10, 0))).await.unwrap();

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_page_load_failure_is_an_error() {
        let extractor = MatrixExtractor::new(Arc::new(StubFetcher::new(&[])));
        let result = extractor.extract(&source(), &query(2, t(10, 0))).await;
        assert!(matches!(result, Err(ScoutError::HttpStatusError { status: 404, .. })));
    }
}
