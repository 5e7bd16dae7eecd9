//! Parquet export from a populated store

use crate::common::{day, snapshot, write_snapshot, ScriptedReasoner, MILESTONE_CALL};
use deal_assess::config::Config;
use deal_assess::context::FileCollector;
use deal_assess::export::{export_all, ParquetExporter, ParquetReader};
use deal_assess::pipeline::DailyRun;
use deal_assess::store::MemoryStore;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_export_after_daily_run() {
    let dir = TempDir::new().unwrap();
    let context = dir.path().join("context");
    write_snapshot(&context, &snapshot("ACME", day(2)));
    write_snapshot(&context, &snapshot("BETA", day(2)));

    let store = Arc::new(MemoryStore::new());
    let run = DailyRun::new(
        Config::default(),
        Arc::new(FileCollector::new(&context)),
        Arc::new(ScriptedReasoner::new(&[MILESTONE_CALL])),
        store.clone(),
    );
    run.run(day(2), None).await.unwrap();

    let exporter = ParquetExporter::new(dir.path().join("out"));
    let written = export_all(store.as_ref(), &exporter, day(2)).await.unwrap();
    assert_eq!(written.len(), 2);

    let records = ParquetReader::new(&written[0]).read_assessments().unwrap();
    let deals: Vec<&str> = records.iter().map(|r| r.deal.as_str()).collect();
    assert_eq!(deals, vec!["ACME", "BETA"]);
    assert!(records.iter().all(|r| r.reasoner_probability == Some(0.88)));
}
