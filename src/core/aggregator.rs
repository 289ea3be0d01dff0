use std::collections::HashMap;
use std::sync::Arc;

use crate::core::interactive::InteractiveExtractor;
use crate::core::matrix::MatrixExtractor;
use crate::core::normalize::is_at_or_before;
use crate::core::slots::dedupe_sorted;
use crate::core::text_scan::TextScanExtractor;
use crate::domain::model::{AggregateResult, ExtractionQuery, SlotRecord, SourceConfig, StrategyKind};
use crate::domain::ports::{ExtractionStrategy, PageFetcher, SessionFactory};
use crate::utils::error::{Result, ScoutError};
use crate::utils::monitor::SystemMonitor;

/// 依序以對應策略查詢每個來源
///
/// 來源失敗只在這裡轉成佔位記錄，不影響其他來源的結果
pub struct Aggregator {
    strategies: HashMap<StrategyKind, Arc<dyn ExtractionStrategy>>,
    monitor: SystemMonitor,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::new_with_monitoring(false)
    }

    pub fn new_with_monitoring(monitor_enabled: bool) -> Self {
        Self {
            strategies: HashMap::new(),
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    /// 註冊三種擷取策略
    pub fn standard(fetcher: Arc<dyn PageFetcher>, sessions: Arc<dyn SessionFactory>) -> Self {
        Self::new()
            .with_strategy(Arc::new(MatrixExtractor::new(fetcher.clone())))
            .with_strategy(Arc::new(
                TextScanExtractor::new(fetcher).with_sessions(sessions.clone()),
            ))
            .with_strategy(Arc::new(InteractiveExtractor::new(sessions)))
    }

    /// 以策略種類註冊，重複時覆蓋
    pub fn with_strategy(mut self, strategy: Arc<dyn ExtractionStrategy>) -> Self {
        self.strategies.insert(strategy.kind(), strategy);
        self
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = SystemMonitor::new(enabled);
        self
    }

    async fn extract_source(
        &self,
        source: &SourceConfig,
        query: &ExtractionQuery,
    ) -> Result<Vec<SlotRecord>> {
        let strategy = self
            .strategies
            .get(&source.strategy)
            .ok_or_else(|| ScoutError::ExtractionError {
                source_name: source.name.clone(),
                message: format!("no {} strategy registered", source.strategy),
            })?;
        strategy.extract(source, query).await
    }

    pub async fn run(&self, query: &ExtractionQuery, sources: &[SourceConfig]) -> AggregateResult {
        let mut slots = Vec::new();
        let mut failures = Vec::new();

        for source in sources {
            tracing::info!("🔎 {} ({})", source.name, source.strategy);

            match self.extract_source(source, query).await {
                Ok(records) => {
                    let records: Vec<SlotRecord> = records
                        .into_iter()
                        .filter(|r| r.time.is_some_and(|t| is_at_or_before(t, query.latest)))
                        .collect();
                    tracing::info!("✅ {}: {} matching slots", source.name, records.len());
                    slots.extend(records);
                }
                Err(e) => {
                    tracing::error!("❌ {} failed: {} (Category: {:?})", source.name, e, e.category());
                    failures.push(SlotRecord::placeholder(
                        source.name.clone(),
                        query.date,
                        &e.to_string(),
                        source.url_for(query.date),
                    ));
                }
            }

            self.monitor.log_stats(&source.name);
        }

        self.monitor.log_final_stats();
        AggregateResult {
            slots: dedupe_sorted(slots),
            failures,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}
