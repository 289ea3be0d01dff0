//! 需要點擊後才顯示時段表的預約頁面（可能開新分頁或放在 iframe 裡）

use async_trait::async_trait;
use chrono::NaiveTime;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

use crate::core::html::{document_text, element_text};
use crate::core::normalize::{is_at_or_before, normalize_time, PRICE_RE, TIME_ANY_RE};
use crate::core::within;
use crate::domain::model::{ExtractionQuery, SlotRecord, SourceConfig, StrategyKind};
use crate::domain::ports::{BrowserSession, ExtractionStrategy, SessionFactory};
use crate::utils::error::Result;

const TABLE_ACTION: &str = "table a[href], table button";
const ANY_ACTION: &str = "a[href], button";

static SLOT_MARKER: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "[class*='timeslot'], [class*='time-slot'], [class*='teetime'], [class*='tee-time'], .slot",
    )
    .unwrap()
});
static AVAILABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bavailable\b").unwrap());
static TAKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:taken|booked|unavailable|not available|sold out|full)\b").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractiveState {
    InitialView,
    PostNavigationView,
    TimesheetContext,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavigationTrigger {
    PriceToken,
    TableAction,
    AnyAction,
}

impl NavigationTrigger {
    const IN_ORDER: [NavigationTrigger; 3] = [
        NavigationTrigger::PriceToken,
        NavigationTrigger::TableAction,
        NavigationTrigger::AnyAction,
    ];
}

/// 頁面文字中第一個價格，例如 `$45.00`
pub fn find_price_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let text = document_text(&document);
    PRICE_RE.find(&text).map(|m| m.as_str().to_string())
}

pub fn has_slot_markers(html: &str) -> bool {
    let document = Html::parse_document(html);
    document.select(&SLOT_MARKER).next().is_some() || TIME_ANY_RE.is_match(&document_text(&document))
}

/// 同時出現 "Available" 與 "Taken" 時視為已被預約
pub fn is_available(block: &str) -> bool {
    AVAILABLE_RE.is_match(block) && !TAKEN_RE.is_match(block)
}

fn innermost_marker_blocks(document: &Html) -> Vec<String> {
    document
        .select(&SLOT_MARKER)
        .filter(|block| {
            !block
                .descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .any(|inner| SLOT_MARKER.matches(&inner))
        })
        .map(element_text)
        .collect()
}

/// 沒有時段 class 時，以時間為起點把文字切段
fn segments_around_times(text: &str) -> Vec<String> {
    let starts: Vec<usize> = TIME_ANY_RE.find_iter(text).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            text[start..end].trim().to_string()
        })
        .collect()
}

/// 時段表中可預約的時間（去重、遞增）
pub fn parse_timesheet(html: &str, latest: NaiveTime) -> Vec<NaiveTime> {
    let document = Html::parse_document(html);
    let mut blocks = innermost_marker_blocks(&document);
    if blocks.is_empty() {
        blocks = segments_around_times(&document_text(&document));
    }

    let mut times = BTreeSet::new();
    for block in blocks {
        let Some(token) = TIME_ANY_RE.captures(&block) else {
            continue;
        };
        let Ok(time) = normalize_time(&token[1]) else {
            continue;
        };
        if is_at_or_before(time, latest) && is_available(&block) {
            times.insert(time);
        }
    }
    times.into_iter().collect()
}

pub struct InteractiveExtractor {
    sessions: Arc<dyn SessionFactory>,
}

impl InteractiveExtractor {
    pub fn new(sessions: Arc<dyn SessionFactory>) -> Self {
        Self { sessions }
    }

    async fn try_trigger(
        &self,
        session: &mut dyn BrowserSession,
        trigger: NavigationTrigger,
        query: &ExtractionQuery,
    ) -> Result<bool> {
        let limit = query.timeouts.click;
        match trigger {
            NavigationTrigger::PriceToken => {
                let html = session.content().await?;
                let Some(token) = find_price_token(&html) else {
                    return Ok(false);
                };
                within(limit, "price click", session.click_text(&token)).await
            }
            NavigationTrigger::TableAction => {
                within(limit, "table action click", session.click_selector(TABLE_ACTION)).await
            }
            NavigationTrigger::AnyAction => {
                within(limit, "action click", session.click_selector(ANY_ACTION)).await
            }
        }
    }

    async fn navigate(&self, session: &mut dyn BrowserSession, query: &ExtractionQuery) -> bool {
        for trigger in NavigationTrigger::IN_ORDER {
            match self.try_trigger(session, trigger, query).await {
                Ok(true) => {
                    tracing::debug!("Navigated with {:?}", trigger);
                    return true;
                }
                Ok(false) => tracing::debug!("{:?} found nothing to click", trigger),
                Err(e) => tracing::warn!("⚠️ {:?} failed: {}", trigger, e),
            }
        }
        false
    }

    /// 主畫面有時段就用主畫面，否則找第一個有時段的 frame，都沒有時仍回傳主畫面
    async fn resolve_timesheet(&self, session: &mut dyn BrowserSession) -> Result<String> {
        let main = session.content().await?;
        if has_slot_markers(&main) {
            return Ok(main);
        }

        let frames = match session.frame_contents().await {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!("⚠️ Could not read nested frames: {}", e);
                Vec::new()
            }
        };
        Ok(frames
            .into_iter()
            .find(|frame| has_slot_markers(frame))
            .unwrap_or(main))
    }
}

#[async_trait]
impl ExtractionStrategy for InteractiveExtractor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Interactive
    }

    async fn extract(
        &self,
        source: &SourceConfig,
        query: &ExtractionQuery,
    ) -> Result<Vec<SlotRecord>> {
        let url = source.url_for(query.date);
        let mut session = self.sessions.open().await?;

        let mut state = InteractiveState::InitialView;
        within(query.timeouts.page_load, "page load", session.goto(&url)).await?;
        if let Err(e) = session.settle(query.timeouts.settle).await {
            tracing::warn!("⚠️ {} did not settle: {}", source.name, e);
        }

        let surfaces_before = session.surface_count().await;
        if !self.navigate(session.as_mut(), query).await {
            tracing::info!("{}: no way into the timesheet from {:?}", source.name, state);
            return Ok(Vec::new());
        }
        state = InteractiveState::PostNavigationView;

        if let Err(e) = session.settle(query.timeouts.settle).await {
            tracing::warn!("⚠️ {} did not settle after navigation: {}", source.name, e);
        }
        if session.surface_count().await > surfaces_before {
            if let Err(e) = session.switch_to_latest_surface().await {
                tracing::warn!("⚠️ {} could not switch to the new tab: {}", source.name, e);
            }
        }

        let html = match self.resolve_timesheet(session.as_mut()).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("⚠️ {}: no timesheet in {:?}: {}", source.name, state, e);
                return Ok(Vec::new());
            }
        };
        state = InteractiveState::TimesheetContext;
        let action_url = session.current_url().await;

        let times = parse_timesheet(&html, query.latest);
        tracing::debug!("{}: {} available times in {:?}", source.name, times.len(), state);
        state = InteractiveState::Done;
        tracing::debug!("{}: {:?}", source.name, state);

        Ok(times
            .into_iter()
            .map(|time| SlotRecord::slot(source.name.clone(), query.date, time, None, action_url.clone()))
            .collect())
    }
}
