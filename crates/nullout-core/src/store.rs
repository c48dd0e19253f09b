//! In-memory finding store and scan index. Written only by the scan engine,
//! read by everything else; dispatch is serial so no locking is needed.

use crate::model::Finding;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Store {
    findings: HashMap<String, Finding>,
    scans: HashMap<String, Vec<String>>,
    counter: u64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint an opaque id: monotone within the process, debuggable outside it.
    pub fn mint_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!(
            "{prefix}_{}_{}_{}",
            chrono::Utc::now().timestamp_millis(),
            std::process::id(),
            self.counter
        )
    }

    pub fn insert_finding(&mut self, finding: Finding) {
        self.findings.insert(finding.finding_id.clone(), finding);
    }

    pub fn finding(&self, finding_id: &str) -> Option<&Finding> {
        self.findings.get(finding_id)
    }

    pub fn register_scan(&mut self, scan_id: String, finding_ids: Vec<String>) {
        self.scans.insert(scan_id, finding_ids);
    }

    pub fn scan_findings(&self, scan_id: &str) -> &[String] {
        self.scans.get(scan_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_are_unique_and_ordered() {
        let mut store = Store::new();
        let a = store.mint_id("fnd");
        let b = store.mint_id("fnd");
        assert_ne!(a, b);
        assert!(a.starts_with("fnd_"));
        assert!(a.ends_with("_1"));
        assert!(b.ends_with("_2"));
    }

    #[test]
    fn scan_index_round_trips() {
        let mut store = Store::new();
        store.register_scan("scan_1".into(), vec!["fnd_1".into(), "fnd_2".into()]);
        assert_eq!(store.scan_findings("scan_1"), ["fnd_1", "fnd_2"]);
        assert!(store.scan_findings("scan_missing").is_empty());
    }
}
