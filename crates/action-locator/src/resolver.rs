//! Element resolver with fallback chain orchestration

use crate::{
    errors::LocatorError,
    strategies::*,
    types::*,
    upload::{FileFetcher, FileUploader, HttpFetcher},
};
use action_primitives::{PageAutomation, Tempo};
use async_trait::async_trait;
use replay_core_types::{Action, ActionType, ExecutionResult, FailureKind, ResolutionMethod};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Element resolver trait
///
/// One call is one attempt: every applicable strategy is tried once with the
/// given parameters. Failures are reported in the result, never raised.
#[async_trait]
pub trait ElementResolver: Send + Sync {
    async fn resolve(&self, action: &Action, params: &AttemptParams) -> ExecutionResult;
}

/// Default element resolver implementation
pub struct DefaultElementResolver {
    page: Arc<dyn PageAutomation>,
    tempo: Arc<Tempo>,
    settings: Arc<ResolverSettings>,
    structural: Arc<StructuralStrategy>,
    textual: Arc<TextualStrategy>,
    coordinate: Arc<CoordinateStrategy>,
    uploader: FileUploader,
}

impl DefaultElementResolver {
    /// Create a resolver that downloads remote upload sources over HTTP.
    pub fn new(
        page: Arc<dyn PageAutomation>,
        settings: ResolverSettings,
    ) -> Result<Self, LocatorError> {
        let timeout = Duration::from_millis(settings.upload.download_timeout_ms);
        let fetcher = Arc::new(HttpFetcher::new(timeout)?);
        Ok(Self::with_fetcher(page, settings, fetcher))
    }

    /// Create a resolver with a custom remote file source.
    pub fn with_fetcher(
        page: Arc<dyn PageAutomation>,
        settings: ResolverSettings,
        fetcher: Arc<dyn FileFetcher>,
    ) -> Self {
        let tempo = Arc::new(Tempo::new(settings.tempo.clone()));
        let uploader = FileUploader::new(page.clone(), fetcher, settings.upload.clone());
        let settings = Arc::new(settings);
        Self {
            structural: Arc::new(StructuralStrategy::new(page.clone(), settings.clone())),
            textual: Arc::new(TextualStrategy::new(page.clone(), settings.clone())),
            coordinate: Arc::new(CoordinateStrategy::new(tempo.clone(), settings.clone())),
            page,
            tempo,
            settings,
            uploader,
        }
    }

    /// Get strategy by type
    fn get_strategy(&self, strategy_type: LocatorStrategy) -> Arc<dyn Strategy> {
        match strategy_type {
            LocatorStrategy::Structural => self.structural.clone(),
            LocatorStrategy::Textual => self.textual.clone(),
            LocatorStrategy::Coordinate => self.coordinate.clone(),
        }
    }

    /// Walk the fallback chain until a strategy matches.
    pub async fn locate(
        &self,
        action: &Action,
        params: &AttemptParams,
    ) -> Result<ResolvedTarget, LocatorError> {
        let mut reasons = Vec::new();
        let mut kind: Option<FailureKind> = None;

        for strategy_type in LocatorStrategy::fallback_chain() {
            let strategy = self.get_strategy(strategy_type);
            debug!(strategy = strategy.name(), attempt = params.attempt, "trying strategy");

            match strategy.resolve(action, params).await {
                Ok(StrategyOutcome::Matched(target)) => {
                    info!(
                        action = %action.name,
                        strategy = strategy.name(),
                        confidence = target.confidence,
                        "element resolved"
                    );
                    return Ok(target);
                }
                Ok(StrategyOutcome::Miss(miss)) => {
                    debug!(strategy = strategy.name(), kind = ?miss.kind, reason = %miss, "strategy missed");
                    kind = most_specific(kind, miss.kind.failure_kind());
                    reasons.push(format!("{}: {}", strategy.name(), miss));
                }
                Err(err) => {
                    warn!(strategy = strategy.name(), error = %err, "strategy failed");
                    kind = most_specific(kind, Some(err.failure_kind()));
                    reasons.push(format!("{}: {}", strategy.name(), err));
                }
            }
        }

        Err(LocatorError::Unresolved {
            kind: kind.unwrap_or(FailureKind::ElementNotFound),
            detail: format!(
                "all strategies exhausted for '{}' ({})",
                action.name,
                reasons.join("; ")
            ),
        })
    }

    async fn interact(&self, action: &Action, target: &ResolvedTarget) -> Result<(), LocatorError> {
        let point = target.point;
        self.page.hover(point.x, point.y).await?;
        let delay = self.tempo.hover_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.page.click(point.x, point.y).await?;

        if action.action_type == ActionType::Type {
            let text = action.params.text.as_deref().unwrap_or_default();
            self.page.type_text(text).await?;
        }
        Ok(())
    }

    async fn execute(
        &self,
        action: &Action,
        params: &AttemptParams,
    ) -> Result<(ResolutionMethod, Option<f64>), LocatorError> {
        match action.action_type {
            ActionType::Upload => {
                let file_path = action.params.file_path.as_deref().unwrap_or_default();
                self.uploader.upload(file_path).await?;
                Ok((ResolutionMethod::Upload, Some(1.0)))
            }
            ActionType::Submit if action.locator.is_none() && action.selector().is_none() => {
                self.page.press_key(&self.settings.submit_key).await?;
                Ok((ResolutionMethod::Direct, None))
            }
            action_type if action_type.needs_resolution() => {
                let target = self.locate(action, params).await?;
                self.interact(action, &target).await?;
                Ok((target.method, Some(target.confidence)))
            }
            other => Err(LocatorError::InvalidLocator(format!(
                "{} actions do not target an element",
                other
            ))),
        }
    }
}

fn most_specific(current: Option<FailureKind>, next: Option<FailureKind>) -> Option<FailureKind> {
    match (current, next) {
        (Some(a), Some(b)) if b.specificity() > a.specificity() => Some(b),
        (None, next) => next,
        (current, _) => current,
    }
}

#[async_trait]
impl ElementResolver for DefaultElementResolver {
    async fn resolve(&self, action: &Action, params: &AttemptParams) -> ExecutionResult {
        let started = Instant::now();
        let action = action.clone().normalized();

        let result = match self.execute(&action, params).await {
            Ok((method, confidence)) => ExecutionResult::success(method, confidence),
            Err(err) => {
                debug!(action = %action.name, attempt = params.attempt, error = %err, "attempt failed");
                let failed =
                    ExecutionResult::failure(err.to_string()).with_failure_kind(err.failure_kind());
                if err.is_retryable() {
                    failed
                } else {
                    failed.non_retryable()
                }
            }
        };
        result.with_elapsed(started.elapsed().as_millis() as u64)
    }
}
