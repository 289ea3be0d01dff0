pub mod toml_config;

use crate::domain::model::{SourceConfig, StrategyKind, Timeouts};
use crate::utils::error::{Result, ScoutError};

#[cfg(feature = "cli")]
pub use cli::CliConfig;

/// MiClub 日曆頁要先選產品才會列出時段
const MICLUB_PRODUCTS: [&str; 3] = ["18 Holes", "18 Hole", "All"];

/// 預設查詢的四個球場
pub fn builtin_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new(
            "collier",
            "Collier Park",
            StrategyKind::TextScan,
            "https://bookings.collierparkgolf.com.au/guests/bookings/ViewPublicCalendar.msp?mobile=true&selectedDate={date}",
        )
        .with_product_labels(MICLUB_PRODUCTS),
        SourceConfig::new(
            "marangaroo",
            "Marangaroo",
            StrategyKind::TextScan,
            "https://marangaroo.miclub.com.au/guests/bookings/ViewPublicCalendar.msp?mobile=true&selectedDate={date}",
        )
        .with_product_labels(MICLUB_PRODUCTS),
        SourceConfig::new(
            "whaleback",
            "Whaleback",
            StrategyKind::TextScan,
            "https://www.whalebackgolfcourse.com.au/guests/bookings/ViewPublicCalendar.msp?booking_resource_id=3000000&mobile=true&selectedDate={date}",
        )
        .with_product_labels(MICLUB_PRODUCTS),
        SourceConfig::new(
            "hamersley",
            "Hamersley Public Golf Course",
            StrategyKind::Matrix,
            "https://hamersley.quick18.com/teetimes/searchmatrix?teedate={yyyymmdd}",
        ),
    ]
}

/// 依 `--only` 篩選來源，保留設定檔中的順序
///
/// 空清單代表全部保留；未知的代號視為設定錯誤
pub fn select_sources(sources: Vec<SourceConfig>, only: &[String]) -> Result<Vec<SourceConfig>> {
    if only.is_empty() {
        return Ok(sources);
    }

    for key in only {
        if !sources.iter().any(|s| s.key.eq_ignore_ascii_case(key.trim())) {
            let known: Vec<&str> = sources.iter().map(|s| s.key.as_str()).collect();
            return Err(ScoutError::InvalidConfigValueError {
                field: "only".to_string(),
                value: key.clone(),
                reason: format!("Unknown source key. Known keys: {}", known.join(", ")),
            });
        }
    }

    Ok(sources
        .into_iter()
        .filter(|s| only.iter().any(|k| s.key.eq_ignore_ascii_case(k.trim())))
        .collect())
}

/// 有指定 `--sources` 時從檔案載入，否則使用內建來源
pub fn load_sources(path: Option<&str>) -> Result<(Vec<SourceConfig>, Timeouts)> {
    use crate::utils::validation::Validate;

    match path {
        Some(path) => {
            let file = toml_config::SourcesFile::from_file(path)?;
            file.validate()?;
            let timeouts = file.timeouts();
            Ok((file.sources, timeouts))
        }
        None => Ok((builtin_sources(), Timeouts::default())),
    }
}

#[cfg(feature = "cli")]
mod cli {
    use crate::core::normalize::parse_hhmm_24;
    use crate::core::report::ReportFormat;
    use crate::domain::model::ExtractionQuery;
    use crate::utils::error::{Result, ScoutError};
    use crate::utils::validation::{self, Validate};
    use chrono::NaiveDate;
    use clap::Parser;

    const DEFAULT_DEBUG_DIR: &str = "debug";

    #[derive(Debug, Clone, Parser)]
    #[command(name = "tee-times")]
    #[command(about = "Look up open morning tee times across several golf course booking sites")]
    pub struct CliConfig {
        #[arg(long, env = "PLAY_DATE", help = "Play date (YYYY-MM-DD)")]
        pub date: String,

        #[arg(long, env = "MIN_PLAYERS", default_value = "2")]
        pub players: u32,

        #[arg(long, env = "LATEST_TIME", default_value = "10:00", help = "Latest tee time (HH:MM, 24h)")]
        pub before: String,

        #[arg(long, help = "TOML file listing sources (built-in courses otherwise)")]
        pub sources: Option<String>,

        #[arg(long, value_delimiter = ',', help = "Only query these source keys")]
        pub only: Vec<String>,

        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        pub format: ReportFormat,

        #[arg(long, default_value = "tee_time_summary.md", help = "Report file, or - for stdout")]
        pub output: String,

        #[arg(
            long,
            env = "DEBUG",
            action = clap::ArgAction::SetTrue,
            value_parser = clap::builder::FalseyValueParser::new(),
            help = "Save every fetched page into ./debug"
        )]
        pub debug: bool,

        #[arg(long, env = "TEE_TIMES_DEBUG_DIR", help = "Save every fetched page into this directory")]
        pub debug_dir: Option<String>,

        #[arg(long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Emit logs as JSON")]
        pub log_json: bool,

        #[arg(long, help = "Log CPU and memory usage per source")]
        pub monitor: bool,
    }

    impl CliConfig {
        pub fn play_date(&self) -> Result<NaiveDate> {
            NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").map_err(|_| {
                ScoutError::InvalidConfigValueError {
                    field: "date".to_string(),
                    value: self.date.clone(),
                    reason: "Expected YYYY-MM-DD".to_string(),
                }
            })
        }

        pub fn query(&self) -> Result<ExtractionQuery> {
            let latest = parse_hhmm_24(&self.before).map_err(|_| ScoutError::InvalidConfigValueError {
                field: "before".to_string(),
                value: self.before.clone(),
                reason: "Expected HH:MM (24-hour)".to_string(),
            })?;
            ExtractionQuery::new(self.play_date()?, self.players, latest)
        }

        pub fn writes_to_stdout(&self) -> bool {
            self.output == "-"
        }

        /// 快照目錄：`--debug-dir` 優先，其次 `--debug` 對應 `debug/`
        pub fn snapshot_dir(&self) -> Option<String> {
            self.debug_dir
                .clone()
                .or_else(|| self.debug.then(|| DEFAULT_DEBUG_DIR.to_string()))
        }
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            self.query()?;
            validation::validate_path("output", &self.output)?;
            if let Some(sources) = &self.sources {
                validation::validate_path("sources", sources)?;
            }
            if let Some(dir) = self.snapshot_dir() {
                validation::validate_path("debug_dir", &dir)?;
            }
            Ok(())
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::validate_url_template;

    #[test]
    fn test_builtin_sources_are_valid() {
        let sources = builtin_sources();
        assert_eq!(sources.len(), 4);
        for source in &sources {
            assert!(validate_url_template("url_template", &source.url_template).is_ok());
        }
        let hamersley = sources.iter().find(|s| s.key == "hamersley").unwrap();
        assert_eq!(hamersley.strategy, StrategyKind::Matrix);
        assert!(hamersley.product_labels.is_empty());
        for key in ["collier", "marangaroo", "whaleback"] {
            let source = sources.iter().find(|s| s.key == key).unwrap();
            assert_eq!(source.product_labels, vec!["18 Holes", "18 Hole", "All"]);
        }
        assert_eq!(
            hamersley.url_for(chrono::NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()),
            "https://hamersley.quick18.com/teetimes/searchmatrix?teedate=20261018"
        );
    }

    #[test]
    fn test_select_sources() {
        let picked = select_sources(builtin_sources(), &["Hamersley".to_string(), "collier".to_string()]).unwrap();
        let keys: Vec<&str> = picked.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["collier", "hamersley"]);

        assert_eq!(select_sources(builtin_sources(), &[]).unwrap().len(), 4);
        assert!(select_sources(builtin_sources(), &["augusta".to_string()]).is_err());
    }

    #[test]
    fn test_load_sources_defaults_to_builtins() {
        let (sources, timeouts) = load_sources(None).unwrap();
        assert_eq!(sources.len(), 4);
        assert_eq!(timeouts, Timeouts::default());
    }
}
