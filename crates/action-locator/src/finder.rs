//! Candidate finder: live elements whose visible text contains a target

use crate::{errors::LocatorError, types::Candidate};
use action_primitives::{evaluate_as, scripts, PageAutomation, ScanResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct CandidateFinder {
    page: Arc<dyn PageAutomation>,
}

impl CandidateFinder {
    pub fn new(page: Arc<dyn PageAutomation>) -> Self {
        Self { page }
    }

    /// Every visible element whose text contains `target`, case-insensitively.
    ///
    /// Empty targets, no matches and scan failures all yield an empty list.
    pub async fn find(&self, target: &str) -> Vec<Candidate> {
        match self.try_find(target).await {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(target = %target, error = %err, "candidate scan failed");
                Vec::new()
            }
        }
    }

    /// Like [`find`](Self::find), but surfaces scan failures.
    pub async fn try_find(&self, target: &str) -> Result<Vec<Candidate>, LocatorError> {
        let target = target.trim();
        if target.is_empty() {
            return Ok(Vec::new());
        }
        let scan: ScanResult = evaluate_as(self.page.as_ref(), &scripts::text_scan(target)).await?;
        let candidates = collect_candidates(&scan, target);
        debug!(
            target = %target,
            scanned = scan.elements.len(),
            found = candidates.len(),
            "candidate scan complete"
        );
        Ok(candidates)
    }
}

/// Filter raw scan records down to visible, de-duplicated matches.
pub fn collect_candidates(scan: &ScanResult, target: &str) -> Vec<Candidate> {
    let needle = target.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut seen_handles = HashSet::new();
    let mut seen_boxes = HashSet::new();
    let mut candidates = Vec::new();

    for record in &scan.elements {
        if !record.text.to_lowercase().contains(&needle) {
            continue;
        }
        let bbox = record.bounding_box();
        if bbox.is_empty() {
            continue;
        }
        let rounded = (
            bbox.x.round() as i64,
            bbox.y.round() as i64,
            bbox.width.round() as i64,
            bbox.height.round() as i64,
        );
        if !seen_handles.insert(record.handle.clone()) || !seen_boxes.insert(rounded) {
            continue;
        }
        candidates.push(Candidate::from_record(record, &scan.viewport));
    }

    candidates
}
