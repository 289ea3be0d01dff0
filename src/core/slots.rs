use std::collections::BTreeMap;

use crate::domain::model::SlotRecord;

/// 以 `(source, date, time)` 去重（後者覆蓋前者），並依來源、日期、時間排序
pub fn dedupe_sorted(records: Vec<SlotRecord>) -> Vec<SlotRecord> {
    let mut unique = BTreeMap::new();
    for record in records {
        unique.insert(
            (record.source.clone(), record.date, record.time),
            record,
        );
    }
    unique.into_values().collect()
}
