//! File-backed context collector
//!
//! Reads one JSON document per deal from `<dir>/<YYYY-MM-DD>/<DEAL>.json`,
//! as dropped by the upstream ingestion jobs.

use super::{ContextCollector, ContextError, ContextSnapshot};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Collector over a directory of dated context files
pub struct FileCollector {
    root: PathBuf,
}

impl FileCollector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn day_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(date.format("%Y-%m-%d").to_string())
    }

    fn deal_path(&self, deal: &str, date: NaiveDate) -> PathBuf {
        self.day_dir(date).join(format!("{deal}.json"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ContextCollector for FileCollector {
    async fn portfolio(&self, date: NaiveDate) -> Result<Vec<String>, ContextError> {
        let dir = self.day_dir(date);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(dir = ?dir, "No context directory for date");
                return Ok(vec![]);
            }
            Err(e) => return Err(e.into()),
        };

        let mut deals = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                deals.push(stem.to_string());
            }
        }
        deals.sort();
        Ok(deals)
    }

    async fn collect(&self, deal: &str, date: NaiveDate) -> Result<ContextSnapshot, ContextError> {
        let path = self.deal_path(deal, date);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ContextError::DataUnavailable {
                    deal: deal.to_string(),
                    reason: format!("missing {}", path.display()),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut snapshot: ContextSnapshot =
            serde_json::from_str(&content).map_err(|source| ContextError::Invalid {
                deal: deal.to_string(),
                source,
            })?;

        // The file layout is authoritative for identity
        snapshot.deal = deal.to_string();
        snapshot.as_of = date;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn write_deal(root: &Path, deal: &str, body: &str) {
        let dir = root.join("2026-03-02");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{deal}.json")), body).unwrap();
    }

    #[tokio::test]
    async fn test_portfolio_lists_sorted_deals() {
        let tmp = tempfile::tempdir().unwrap();
        let body = r#"{"deal":"x","as_of":"2026-03-02","market":{"deal_price":"10","current_price":"9"}}"#;
        write_deal(tmp.path(), "ZETA", body);
        write_deal(tmp.path(), "ACME", body);
        std::fs::write(tmp.path().join("2026-03-02").join("notes.txt"), "x").unwrap();

        let collector = FileCollector::new(tmp.path());
        let deals = collector.portfolio(date()).await.unwrap();
        assert_eq!(deals, vec!["ACME", "ZETA"]);
    }

    #[tokio::test]
    async fn test_portfolio_missing_day_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let collector = FileCollector::new(tmp.path());
        assert!(collector.portfolio(date()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collect_overrides_identity() {
        let tmp = tempfile::tempdir().unwrap();
        let body = r#"{"deal":"wrong","as_of":"2020-01-01","market":{"deal_price":"10","current_price":"9"},"implied_probability":0.9}"#;
        write_deal(tmp.path(), "ACME", body);

        let collector = FileCollector::new(tmp.path());
        let snapshot = collector.collect("ACME", date()).await.unwrap();
        assert_eq!(snapshot.deal, "ACME");
        assert_eq!(snapshot.as_of, date());
        assert_eq!(snapshot.implied_probability, Some(0.9));
    }

    #[tokio::test]
    async fn test_collect_missing_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let collector = FileCollector::new(tmp.path());
        let err = collector.collect("NOPE", date()).await.unwrap_err();
        assert!(matches!(err, ContextError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_collect_invalid_json() {
        let tmp = tempfile::tempdir().unwrap();
        write_deal(tmp.path(), "ACME", "{not json");
        let collector = FileCollector::new(tmp.path());
        let err = collector.collect("ACME", date()).await.unwrap_err();
        assert!(matches!(err, ContextError::Invalid { .. }));
    }
}
