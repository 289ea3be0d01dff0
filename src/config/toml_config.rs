use crate::domain::model::{SourceConfig, Timeouts};
use crate::utils::error::{Result, ScoutError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

/// `--sources` 指定的 TOML 檔
///
/// ```toml
/// [timeouts]
/// page_load_secs = 30
///
/// [[sources]]
/// key = "hamersley"
/// name = "Hamersley Public Golf Course"
/// strategy = "matrix"
/// url_template = "https://hamersley.quick18.com/teetimes/searchmatrix?teedate={yyyymmdd}"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<SourceConfig>,
    pub timeouts: Option<TimeoutsConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    pub page_load_secs: Option<u64>,
    pub settle_millis: Option<u64>,
    pub click_millis: Option<u64>,
    pub confirm_secs: Option<u64>,
}

impl TimeoutsConfig {
    /// 只覆寫有設定的欄位
    pub fn apply(&self, base: Timeouts) -> Timeouts {
        Timeouts {
            page_load: self.page_load_secs.map(Duration::from_secs).unwrap_or(base.page_load),
            settle: self.settle_millis.map(Duration::from_millis).unwrap_or(base.settle),
            click: self.click_millis.map(Duration::from_millis).unwrap_or(base.click),
            confirm: self.confirm_secs.map(Duration::from_secs).unwrap_or(base.confirm),
        }
    }
}

impl SourcesFile {
    /// 從 TOML 檔案載入來源清單
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ScoutError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ScoutError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CLUB_HOST})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
            .as_ref()
            .map(|t| t.apply(Timeouts::default()))
            .unwrap_or_default()
    }
}

impl Validate for SourcesFile {
    fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(ScoutError::MissingConfigError {
                field: "sources".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for (i, source) in self.sources.iter().enumerate() {
            validation::validate_non_empty_string(&format!("sources[{}].key", i), &source.key)?;
            validation::validate_non_empty_string(&format!("sources[{}].name", i), &source.name)?;
            validation::validate_url_template(
                &format!("sources[{}].url_template", i),
                &source.url_template,
            )?;
            if !seen.insert(source.key.as_str()) {
                return Err(ScoutError::InvalidConfigValueError {
                    field: format!("sources[{}].key", i),
                    value: source.key.clone(),
                    reason: "Duplicate source key".to_string(),
                });
            }
        }

        if let Some(t) = &self.timeouts {
            if let Some(secs) = t.page_load_secs {
                validation::validate_range("timeouts.page_load_secs", secs, 1, 600)?;
            }
            if let Some(millis) = t.settle_millis {
                validation::validate_range("timeouts.settle_millis", millis, 0, 60_000)?;
            }
            if let Some(millis) = t.click_millis {
                validation::validate_range("timeouts.click_millis", millis, 100, 60_000)?;
            }
            if let Some(secs) = t.confirm_secs {
                validation::validate_range("timeouts.confirm_secs", secs, 1, 600)?;
            }
        }

        Ok(())
    }
}
