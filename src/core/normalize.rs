//! 各擷取策略共用的時間與人數解析

use chrono::{NaiveTime, Timelike};
use regex::Regex;
use std::sync::LazyLock;

use crate::utils::error::{Result, ScoutError};

/// `7:05 AM`、`11:50pm`
pub static TIME_12H_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2}:\d{2}\s*(?:am|pm))\b").unwrap());

/// `07:05`、`7:05 am`，時段表有時不寫上午下午
pub static TIME_ANY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2}:\d{2}(?:\s*(?:am|pm)\b)?)").unwrap());

/// `$45`、`$ 45.00`
pub static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s?\d+(?:\.\d{2})?").unwrap());

static TIME_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2})(?:[:.](\d{2}))?(?::\d{2})?\s*(?:([ap])\.?\s*m\.?)?$").unwrap()
});
static HHMM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap());
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*(?:to|-|–|—)\s*(\d+)").unwrap());
static ALTERNATIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*(?:\bor\b|/)\s*(\d+)").unwrap());

fn time_parse_error(input: &str) -> ScoutError {
    ScoutError::TimeParseError {
        input: input.to_string(),
    }
}

/// 將時間文字解析為時刻（捨去秒數）
///
/// 接受 `7:05 AM`、`7:05am`、`07:05`、`7.05 p.m.`、`7 AM`；
/// 沒有分鐘也沒有上午下午的純數字不接受
pub fn normalize_time(text: &str) -> Result<NaiveTime> {
    let trimmed = text.trim();
    let caps = TIME_TEXT_RE
        .captures(trimmed)
        .ok_or_else(|| time_parse_error(text))?;

    let hour: u32 = caps[1].parse().map_err(|_| time_parse_error(text))?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().map_err(|_| time_parse_error(text))?,
        None => 0,
    };
    let meridiem = caps.get(3).map(|m| m.as_str().to_ascii_lowercase());

    if caps.get(2).is_none() && meridiem.is_none() {
        return Err(time_parse_error(text));
    }

    let hour = match meridiem.as_deref() {
        Some(m) => {
            if !(1..=12).contains(&hour) {
                return Err(time_parse_error(text));
            }
            match (m, hour) {
                ("a", 12) => 0,
                ("a", h) => h,
                ("p", 12) => 12,
                (_, h) => h + 12,
            }
        }
        None => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| time_parse_error(text))
}

/// 嚴格的 24 小時制 `HH:MM`，用於設定值如 `10:00`
pub fn parse_hhmm_24(text: &str) -> Result<NaiveTime> {
    let caps = HHMM_RE
        .captures(text.trim())
        .ok_or_else(|| time_parse_error(text))?;
    let hour: u32 = caps[1].parse().map_err(|_| time_parse_error(text))?;
    let minute: u32 = caps[2].parse().map_err(|_| time_parse_error(text))?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| time_parse_error(text))
}

pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn is_at_or_before(candidate: NaiveTime, latest: NaiveTime) -> bool {
    (candidate.hour(), candidate.minute()) <= (latest.hour(), latest.minute())
}

/// 判斷人數提示是否允許至少 `min_players` 人
///
/// 沒有提示或提示中沒有數字時一律通過
pub fn satisfies_player_count(hint: Option<&str>, min_players: u32) -> bool {
    let Some(hint) = hint else {
        return true;
    };

    // 先移除時間，避免把分鐘數當成人數
    let hint = TIME_ANY_RE.replace_all(hint, " ");
    let hint = hint.as_ref();

    let numbers: Vec<u32> = NUMBER_RE
        .find_iter(hint)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    let Some(&max) = numbers.iter().max() else {
        return true;
    };

    if let Some(caps) = RANGE_RE.captures(hint) {
        if let Ok(upper) = caps[2].parse::<u32>() {
            return upper >= min_players;
        }
    }

    if ALTERNATIVE_RE.is_match(hint) {
        return max >= min_players;
    }

    max >= min_players
}

/// 文字中第一個 12 小時制時間
pub fn first_time_12h(text: &str) -> Option<NaiveTime> {
    TIME_12H_RE
        .captures(text)
        .and_then(|caps| normalize_time(&caps[1]).ok())
}

pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
