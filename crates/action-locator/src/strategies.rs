//! Element resolution strategies
//!
//! Three strategies in fallback order:
//! 1. Structural - literal selector hint, verified against recorded text
//! 2. Textual - text search, position filter, then visual disambiguation
//! 3. Coordinate - jittered replay at the recorded absolute position
//!
//! Strategies report a [`StrategyOutcome::Miss`] when they do not apply or
//! find nothing usable. An `Err` means the page capability failed; the
//! resolver treats it as a miss too, keeping the message.

use crate::{
    errors::LocatorError,
    finder::CandidateFinder,
    position::filter_by_position,
    types::*,
    visual::VisualMatcher,
};
use action_primitives::{evaluate_as, scripts, PageAutomation, ScanResult, Tempo};
use async_trait::async_trait;
use replay_core_types::{Action, ResolutionMethod};
use std::sync::Arc;
use tracing::debug;

/// Strategy trait for element resolution
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Attempt to resolve the action's target using this strategy
    async fn resolve(
        &self,
        action: &Action,
        params: &AttemptParams,
    ) -> Result<StrategyOutcome, LocatorError>;

    /// Get strategy type
    fn strategy_type(&self) -> LocatorStrategy;

    /// Get strategy name
    fn name(&self) -> &'static str {
        self.strategy_type().name()
    }
}

/// Case-insensitive substring overlap in either direction
pub fn text_overlaps(live: &str, recorded: &str) -> bool {
    let live = live.trim().to_lowercase();
    let recorded = recorded.trim().to_lowercase();
    if live.is_empty() || recorded.is_empty() {
        return false;
    }
    live.contains(&recorded) || recorded.contains(&live)
}

/// Literal selector hint strategy
pub struct StructuralStrategy {
    page: Arc<dyn PageAutomation>,
    settings: Arc<ResolverSettings>,
}

impl StructuralStrategy {
    pub fn new(page: Arc<dyn PageAutomation>, settings: Arc<ResolverSettings>) -> Self {
        Self { page, settings }
    }
}

#[async_trait]
impl Strategy for StructuralStrategy {
    async fn resolve(
        &self,
        action: &Action,
        _params: &AttemptParams,
    ) -> Result<StrategyOutcome, LocatorError> {
        let Some(selector) = action.selector() else {
            return Ok(StrategyOutcome::miss(MissKind::NotApplicable, "no structural hint"));
        };

        debug!(selector = %selector, "querying selector hint");
        let scan: ScanResult =
            evaluate_as(self.page.as_ref(), &scripts::selector_query(selector)).await?;
        if let Some(error) = scan.error.as_deref() {
            return Ok(StrategyOutcome::miss(
                MissKind::InvalidSelector,
                format!("selector '{}' rejected by the page: {}", selector, error),
            ));
        }

        let visible: Vec<Candidate> = scan
            .elements
            .iter()
            .filter(|record| !record.bounding_box().is_empty())
            .map(|record| Candidate::from_record(record, &scan.viewport))
            .collect();

        let element = match visible.as_slice() {
            [] => {
                return Ok(StrategyOutcome::miss(
                    MissKind::NotFound,
                    format!("selector '{}' matched no visible element", selector),
                ))
            }
            [only] => only,
            many => {
                return Ok(StrategyOutcome::miss(
                    MissKind::Ambiguous,
                    format!(
                        "selector '{}' is ambiguous ({} visible elements)",
                        selector,
                        many.len()
                    ),
                ))
            }
        };

        let recorded = action.locator.as_ref().and_then(|l| l.text());
        let confidence = match recorded {
            Some(recorded) if !text_overlaps(&element.text, recorded) => {
                return Ok(StrategyOutcome::miss(
                    MissKind::TextMismatch,
                    format!(
                        "text mismatch: selector element has '{}', recorded '{}'",
                        element.text, recorded
                    ),
                ));
            }
            Some(recorded) if element.text_equals(recorded) => self.settings.exact_text_confidence,
            _ => self.settings.text_confidence,
        };

        Ok(StrategyOutcome::Matched(ResolvedTarget::from_candidate(
            element,
            LocatorStrategy::Structural,
            ResolutionMethod::Structural,
            confidence,
        )))
    }

    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::Structural
    }
}

/// Text search narrowed by recorded position, then by pixel similarity
pub struct TextualStrategy {
    finder: CandidateFinder,
    matcher: VisualMatcher,
    settings: Arc<ResolverSettings>,
}

impl TextualStrategy {
    pub fn new(page: Arc<dyn PageAutomation>, settings: Arc<ResolverSettings>) -> Self {
        Self {
            finder: CandidateFinder::new(page.clone()),
            matcher: VisualMatcher::new(page),
            settings,
        }
    }
}

#[async_trait]
impl Strategy for TextualStrategy {
    async fn resolve(
        &self,
        action: &Action,
        params: &AttemptParams,
    ) -> Result<StrategyOutcome, LocatorError> {
        let Some(locator) = action.locator.as_ref() else {
            return Ok(StrategyOutcome::miss(MissKind::NotApplicable, "no locator"));
        };
        let Some(text) = locator.text() else {
            return Ok(StrategyOutcome::miss(MissKind::NotApplicable, "no recorded text"));
        };

        let found = self.finder.try_find(text).await?;
        if found.is_empty() {
            return Ok(StrategyOutcome::miss(
                MissKind::NotFound,
                format!("no visible element contains '{}'", text),
            ));
        }

        let remaining = match locator.relative_position {
            Some(expected) => filter_by_position(&found, expected, params.tolerance),
            None => found.clone(),
        };
        debug!(
            text = %text,
            found = found.len(),
            remaining = remaining.len(),
            tolerance = params.tolerance,
            "position filter applied"
        );

        match remaining.as_slice() {
            [] => Ok(StrategyOutcome::miss(
                MissKind::PositionMismatch,
                format!(
                    "position mismatch: {} candidates for '{}' outside {:.1}% tolerance",
                    found.len(),
                    text,
                    params.tolerance
                ),
            )),
            [only] => {
                let confidence = if only.text_equals(text) {
                    self.settings.exact_text_confidence
                } else {
                    self.settings.text_confidence
                };
                Ok(StrategyOutcome::Matched(ResolvedTarget::from_candidate(
                    only,
                    LocatorStrategy::Textual,
                    ResolutionMethod::Textual,
                    confidence,
                )))
            }
            many => match locator.reference_image.as_deref() {
                Some(reference) if locator.has_reference_image() => {
                    match self
                        .matcher
                        .best_match(reference, many, params.similarity_threshold)
                        .await
                    {
                        Some(best) => Ok(StrategyOutcome::Matched(ResolvedTarget::from_candidate(
                            &best.candidate,
                            LocatorStrategy::Textual,
                            ResolutionMethod::Visual,
                            best.score,
                        ))),
                        None => Ok(StrategyOutcome::miss(
                            MissKind::VisualMismatch,
                            format!(
                                "visual mismatch: no candidate for '{}' reached similarity {:.2}",
                                text, params.similarity_threshold
                            ),
                        )),
                    }
                }
                _ => Ok(StrategyOutcome::miss(
                    MissKind::Ambiguous,
                    format!(
                        "{} ambiguous candidates for '{}' and no reference image",
                        many.len(),
                        text
                    ),
                )),
            },
        }
    }

    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::Textual
    }
}

/// Raw replay at the recorded absolute position
pub struct CoordinateStrategy {
    tempo: Arc<Tempo>,
    settings: Arc<ResolverSettings>,
}

impl CoordinateStrategy {
    pub fn new(tempo: Arc<Tempo>, settings: Arc<ResolverSettings>) -> Self {
        Self { tempo, settings }
    }
}

#[async_trait]
impl Strategy for CoordinateStrategy {
    async fn resolve(
        &self,
        action: &Action,
        _params: &AttemptParams,
    ) -> Result<StrategyOutcome, LocatorError> {
        if !action.action_type.allows_coordinate_replay() {
            return Ok(StrategyOutcome::miss(
                MissKind::NotApplicable,
                format!("coordinate replay not allowed for {}", action.action_type),
            ));
        }
        let Some(position) = action.locator.as_ref().and_then(|l| l.position) else {
            return Ok(StrategyOutcome::miss(MissKind::NotApplicable, "no recorded position"));
        };

        Ok(StrategyOutcome::Matched(ResolvedTarget {
            strategy: LocatorStrategy::Coordinate,
            method: ResolutionMethod::Coordinate,
            point: self.tempo.jitter(position),
            handle: None,
            text: None,
            confidence: self.settings.coordinate_confidence,
        }))
    }

    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::Coordinate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::tests::png;
    use action_primitives::fake::{element, FakeOp, FakePage};
    use action_primitives::{ActionError, BoundingBox, Point, TempoPlan};
    use perceiver_visual::encode_base64;
    use replay_core_types::{ActionType, Locator};

    fn settings() -> Arc<ResolverSettings> {
        Arc::new(ResolverSettings::instant())
    }

    fn matched(outcome: StrategyOutcome) -> ResolvedTarget {
        match outcome {
            StrategyOutcome::Matched(target) => target,
            StrategyOutcome::Miss(miss) => panic!("expected match, got miss: {}", miss),
        }
    }

    fn missed(outcome: StrategyOutcome) -> Miss {
        match outcome {
            StrategyOutcome::Miss(miss) => miss,
            StrategyOutcome::Matched(target) => panic!("expected miss, got {:?}", target),
        }
    }

    #[test]
    fn overlap_is_bidirectional() {
        assert!(text_overlaps("Log In", "log in"));
        assert!(text_overlaps("Log In to continue", "Log In"));
        assert!(text_overlaps("Log", "Log In"));
        assert!(!text_overlaps("Sign Up", "Log In"));
        assert!(!text_overlaps("", "Log In"));
    }

    #[tokio::test]
    async fn structural_rejects_reused_selector() {
        let page = Arc::new(FakePage::new().with_selector(
            "#primary",
            vec![element("r-1", "Sign Up", 10.0, 10.0, 50.0, 20.0)],
        ));
        let strategy = StructuralStrategy::new(page, settings());
        let action = Action::click("login", Locator::default().with_text("Log In"))
            .with_selector("#primary");
        let miss = missed(
            strategy
                .resolve(&action, &AttemptParams::default())
                .await
                .unwrap(),
        );
        assert_eq!(miss.kind, MissKind::TextMismatch);
        assert!(miss.reason.contains("text mismatch"));
    }

    #[tokio::test]
    async fn structural_separates_invalid_from_empty_selector() {
        let page = Arc::new(
            FakePage::new()
                .with_invalid_selector("##", "SyntaxError: '##' is not a valid selector"),
        );
        let strategy = StructuralStrategy::new(page, settings());

        let invalid = Action::click("x", Locator::default()).with_selector("##");
        let miss = missed(
            strategy
                .resolve(&invalid, &AttemptParams::default())
                .await
                .unwrap(),
        );
        assert_eq!(miss.kind, MissKind::InvalidSelector);
        assert!(miss.reason.contains("SyntaxError"));

        let empty = Action::click("x", Locator::default()).with_selector("#gone");
        let miss = missed(
            strategy
                .resolve(&empty, &AttemptParams::default())
                .await
                .unwrap(),
        );
        assert_eq!(miss.kind, MissKind::NotFound);
        assert!(miss.reason.contains("matched no visible element"));
    }

    #[tokio::test]
    async fn structural_matches_single_visible() {
        let page = Arc::new(FakePage::new().with_selector(
            "#primary",
            vec![
                element("r-1", "Log In", 10.0, 10.0, 50.0, 20.0),
                element("r-2", "Log In", 0.0, 0.0, 0.0, 0.0),
            ],
        ));
        let strategy = StructuralStrategy::new(page, settings());
        let action = Action::click("login", Locator::default().with_text("log in"))
            .with_selector("#primary");
        let target = matched(
            strategy
                .resolve(&action, &AttemptParams::default())
                .await
                .unwrap(),
        );
        assert_eq!(target.method, ResolutionMethod::Structural);
        assert_eq!(target.point, Point::new(35.0, 20.0));
        assert_eq!(target.confidence, 1.0);
    }

    #[tokio::test]
    async fn structural_surfaces_capability_errors() {
        let page = Arc::new(
            FakePage::new().fail(FakeOp::Evaluate, ActionError::Script("bad selector".into())),
        );
        let strategy = StructuralStrategy::new(page, settings());
        let action = Action::click("x", Locator::default()).with_selector("##");
        assert!(strategy
            .resolve(&action, &AttemptParams::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn textual_single_candidate_after_position_filter() {
        let page = Arc::new(FakePage::new().with_viewport(1000.0, 1000.0).with_elements(vec![
            element("r-1", "Next page", 90.0, 90.0, 20.0, 20.0),
            element("r-2", "Next", 890.0, 890.0, 20.0, 20.0),
        ]));
        let strategy = TextualStrategy::new(page, settings());
        let action = Action::click(
            "next",
            Locator::default().with_text("Next").with_relative_position(88.0, 88.0),
        );
        let target = matched(
            strategy
                .resolve(&action, &AttemptParams::default())
                .await
                .unwrap(),
        );
        assert_eq!(target.method, ResolutionMethod::Textual);
        assert_eq!(target.handle.unwrap().0, "r-2");
        assert_eq!(target.confidence, 1.0);
    }

    #[tokio::test]
    async fn textual_partial_text_has_lower_confidence() {
        let page = Arc::new(FakePage::new().with_elements(vec![element(
            "r-1",
            "Log In now",
            10.0,
            10.0,
            20.0,
            20.0,
        )]));
        let strategy = TextualStrategy::new(page, settings());
        let action = Action::click("login", Locator::default().with_text("Log In"));
        let target = matched(
            strategy
                .resolve(&action, &AttemptParams::default())
                .await
                .unwrap(),
        );
        assert_eq!(target.confidence, 0.9);
    }

    #[tokio::test]
    async fn textual_uses_visual_for_ambiguity() {
        let green = png([0, 200, 0]);
        let page = Arc::new(
            FakePage::new()
                .with_viewport(1000.0, 1000.0)
                .with_elements(vec![
                    element("r-1", "Buy", 480.0, 480.0, 20.0, 20.0),
                    element("r-2", "Buy", 500.0, 500.0, 20.0, 20.0),
                ])
                .with_screenshot(png([200, 0, 200]))
                .with_region_screenshot(BoundingBox::new(500.0, 500.0, 20.0, 20.0), green.clone()),
        );
        let strategy = TextualStrategy::new(page, settings());
        let action = Action::click(
            "buy",
            Locator::default()
                .with_text("Buy")
                .with_relative_position(50.0, 50.0)
                .with_reference_image(encode_base64(&green)),
        );
        let target = matched(
            strategy
                .resolve(&action, &AttemptParams::default())
                .await
                .unwrap(),
        );
        assert_eq!(target.method, ResolutionMethod::Visual);
        assert_eq!(target.handle.unwrap().0, "r-2");
    }

    #[tokio::test]
    async fn textual_ambiguous_without_reference_misses() {
        let page = Arc::new(FakePage::new().with_elements(vec![
            element("r-1", "Buy", 10.0, 10.0, 20.0, 20.0),
            element("r-2", "Buy", 60.0, 10.0, 20.0, 20.0),
        ]));
        let strategy = TextualStrategy::new(page, settings());
        let action = Action::click("buy", Locator::default().with_text("Buy"));
        let miss = missed(
            strategy
                .resolve(&action, &AttemptParams::default())
                .await
                .unwrap(),
        );
        assert_eq!(miss.kind, MissKind::Ambiguous);
        assert!(miss.reason.contains("ambiguous"));
    }

    #[tokio::test]
    async fn coordinate_only_for_pointer_actions() {
        let tempo = Arc::new(Tempo::new(TempoPlan::instant()));
        let strategy = CoordinateStrategy::new(tempo, settings());
        let locator = Locator::default().with_position(120.0, 40.0);

        let target = matched(
            strategy
                .resolve(
                    &Action::click("c", locator.clone()),
                    &AttemptParams::default(),
                )
                .await
                .unwrap(),
        );
        assert_eq!(target.point, Point::new(120.0, 40.0));
        assert_eq!(target.confidence, 0.1);

        let upload = Action::new("u", ActionType::Upload).with_locator(locator);
        assert!(!strategy
            .resolve(&upload, &AttemptParams::default())
            .await
            .unwrap()
            .is_match());
    }
}
