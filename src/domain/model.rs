use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::utils::error::{Result, ScoutError};

/// 單一來源的一個可預約開球時間，或是失敗佔位記錄
///
/// `time` 為 `None` 即為佔位記錄，`player_hint` 存放錯誤說明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub source: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: Option<NaiveTime>,
    pub player_hint: Option<String>,
    pub action_url: String,
}

impl SlotRecord {
    pub fn slot(
        source: impl Into<String>,
        date: NaiveDate,
        time: NaiveTime,
        player_hint: Option<String>,
        action_url: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            date,
            time: Some(time),
            player_hint,
            action_url: action_url.into(),
        }
    }

    pub fn placeholder(
        source: impl Into<String>,
        date: NaiveDate,
        diagnostic: &str,
        action_url: impl Into<String>,
    ) -> Self {
        let diagnostic = diagnostic.trim();
        let diagnostic = if diagnostic.is_empty() {
            "unknown failure"
        } else {
            diagnostic
        };
        Self {
            source: source.into(),
            date,
            time: None,
            player_hint: Some(format!("ERROR: {}", diagnostic)),
            action_url: action_url.into(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.time.is_none()
    }

    /// 報表與排序用的 `HH:MM`，佔位記錄為空字串
    pub fn time_label(&self) -> String {
        self.time
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_default()
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => s.serialize_str(&t.format("%H:%M").to_string()),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw = String::deserialize(d)?;
        if raw.is_empty() {
            return Ok(None);
        }
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

/// 各步驟的逾時設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub page_load: Duration,
    pub settle: Duration,
    pub click: Duration,
    pub confirm: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_load: Duration::from_secs(60),
            settle: Duration::from_millis(1500),
            click: Duration::from_secs(3),
            confirm: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionQuery {
    pub date: NaiveDate,
    pub min_players: u32,
    pub latest: NaiveTime,
    pub timeouts: Timeouts,
}

impl ExtractionQuery {
    pub fn new(date: NaiveDate, min_players: u32, latest: NaiveTime) -> Result<Self> {
        if min_players == 0 {
            return Err(ScoutError::InvalidConfigValueError {
                field: "min_players".to_string(),
                value: "0".to_string(),
                reason: "At least one player is required".to_string(),
            });
        }
        Ok(Self {
            date,
            min_players,
            latest,
            timeouts: Timeouts::default(),
        })
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn latest_label(&self) -> String {
        self.latest.format("%H:%M").to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Matrix,
    TextScan,
    Interactive,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Matrix => "matrix",
            StrategyKind::TextScan => "text_scan",
            StrategyKind::Interactive => "interactive",
        };
        f.write_str(name)
    }
}

fn default_confirm_players() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 短代號，供 `--only` 篩選
    pub key: String,
    pub name: String,
    pub strategy: StrategyKind,
    pub url_template: String,
    #[serde(default = "default_confirm_players")]
    pub confirm_players: bool,
    /// 讀取頁面前依序嘗試點擊的產品標籤，例如 "18 Holes"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_labels: Vec<String>,
}

impl SourceConfig {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        strategy: StrategyKind,
        url_template: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            strategy,
            url_template: url_template.into(),
            confirm_players: true,
            product_labels: Vec::new(),
        }
    }

    pub fn with_product_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.product_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// `{date}` → `2026-10-18`, `{yyyymmdd}` → `20261018`
    pub fn url_for(&self, date: NaiveDate) -> String {
        self.url_template
            .replace("{date}", &date.format("%Y-%m-%d").to_string())
            .replace("{yyyymmdd}", &date.format("%Y%m%d").to_string())
    }
}

/// 彙整結果：時段與失敗佔位記錄分開存放
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateResult {
    pub slots: Vec<SlotRecord>,
    pub failures: Vec<SlotRecord>,
}

impl AggregateResult {
    pub fn merged(&self) -> Vec<SlotRecord> {
        self.slots
            .iter()
            .chain(self.failures.iter())
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
