//! Checks that a batch produced exactly one result per submitted image.

use std::collections::{HashMap, HashSet};

use crate::types::{BatchImage, BatchResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageReport {
    /// Submitted ids with no result.
    pub missing: Vec<String>,
    /// Ids answered more than once.
    pub duplicates: Vec<String>,
    /// Result ids that were never submitted.
    pub unexpected: Vec<String>,
}

impl CoverageReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.duplicates.is_empty() && self.unexpected.is_empty()
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing results for {}", self.missing.join(", ")));
        }
        if !self.duplicates.is_empty() {
            parts.push(format!("duplicate results for {}", self.duplicates.join(", ")));
        }
        if !self.unexpected.is_empty() {
            parts.push(format!("unexpected results for {}", self.unexpected.join(", ")));
        }
        if parts.is_empty() {
            "complete".to_string()
        } else {
            parts.join("; ")
        }
    }
}

pub fn verify_coverage(images: &[BatchImage], results: &[BatchResult]) -> CoverageReport {
    let submitted: HashSet<&str> = images.iter().map(|image| image.id.as_str()).collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut report = CoverageReport::default();

    for result in results {
        let id = result.image_id();
        let count = counts.entry(id).or_insert(0);
        *count += 1;

        if !submitted.contains(id) {
            if *count == 1 {
                report.unexpected.push(id.to_string());
            }
        } else if *count == 2 {
            report.duplicates.push(id.to_string());
        }
    }

    report.missing = images
        .iter()
        .filter(|image| !counts.contains_key(image.id.as_str()))
        .map(|image| image.id.clone())
        .collect();

    report
}
