//! Visual disambiguation between several textual candidates

use crate::types::Candidate;
use action_primitives::PageAutomation;
use perceiver_visual::{decode_base64, similarity};
use std::sync::Arc;
use tracing::debug;

/// Best-scoring candidate and its similarity
#[derive(Debug, Clone, PartialEq)]
pub struct VisualMatch {
    pub candidate: Candidate,
    pub score: f64,
}

pub struct VisualMatcher {
    page: Arc<dyn PageAutomation>,
}

impl VisualMatcher {
    pub fn new(page: Arc<dyn PageAutomation>) -> Self {
        Self { page }
    }

    /// Score every candidate's on-screen region against the recorded
    /// reference. Candidates that cannot be captured score 0.
    pub async fn score(&self, reference: &[u8], candidates: &[Candidate]) -> Vec<f64> {
        let mut scores = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let score = match self.page.screenshot(Some(candidate.bounding_box)).await {
                Ok(live) => similarity(reference, &live),
                Err(err) => {
                    debug!(handle = %candidate.handle, error = %err, "region capture failed");
                    0.0
                }
            };
            scores.push(score);
        }
        scores
    }

    /// Top candidate by similarity, if it reaches `threshold`.
    pub async fn best_match(
        &self,
        reference_image: &str,
        candidates: &[Candidate],
        threshold: f64,
    ) -> Option<VisualMatch> {
        let reference = match decode_base64(reference_image) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(error = %err, "reference image unreadable");
                return None;
            }
        };

        let scores = self.score(&reference, candidates).await;
        let (index, score) = scores
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

        debug!(
            best = %candidates[index].handle,
            score,
            threshold,
            "visual comparison complete"
        );

        if score >= threshold {
            Some(VisualMatch {
                candidate: candidates[index].clone(),
                score,
            })
        } else {
            None
        }
    }
}
