//! In-memory fakes for the fetcher and metric contracts (testing only)
//!
//! Provides `StaticFetcher`, `FixedMetric` and `ScriptedMetric`, which satisfy
//! the trait contracts without any network access.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::artifact::{ArtifactHandle, Category};
use crate::context::{ArtifactContext, ArtifactFetcher, FetchError};
use crate::error::{EvalError, Result};
use crate::metric::{Metric, Score};

// ---------------------------------------------------------------------------
// StaticFetcher
// ---------------------------------------------------------------------------

/// Fetcher answering from a per-identity table.
///
/// Unknown identities get an empty [`ArtifactContext`].
#[derive(Debug, Default)]
pub struct StaticFetcher {
    contexts: HashMap<String, ArtifactContext>,
    errors: HashMap<String, FetchError>,
    delays: HashMap<String, Duration>,
    fail_first: Mutex<Option<(u32, FetchError)>>,
    calls: Arc<AtomicU32>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, identity: &str, context: ArtifactContext) -> Self {
        self.contexts.insert(identity.to_string(), context);
        self
    }

    /// Every fetch of `identity` fails with `error`.
    pub fn with_error(mut self, identity: &str, error: FetchError) -> Self {
        self.errors.insert(identity.to_string(), error);
        self
    }

    /// Fetches of `identity` take `delay` before answering.
    pub fn with_delay(mut self, identity: &str, delay: Duration) -> Self {
        self.delays.insert(identity.to_string(), delay);
        self
    }

    /// The first `n` fetches (of any identity) fail with `error`.
    pub fn failing_first(self, n: u32, error: FetchError) -> Self {
        *self.fail_first.lock().unwrap_or_else(PoisonError::into_inner) = Some((n, error));
        self
    }

    /// Shared counter of fetch calls, usable after the fetcher is moved.
    pub fn call_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ArtifactFetcher for StaticFetcher {
    async fn fetch(&self, handle: &ArtifactHandle) -> std::result::Result<ArtifactContext, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let identity = handle.identity();

        if let Some(delay) = self.delays.get(identity) {
            tokio::time::sleep(*delay).await;
        }

        {
            let mut fail_first = self.fail_first.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some((remaining, error)) = fail_first.as_mut() {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(error.clone());
                }
            }
        }

        if let Some(error) = self.errors.get(identity) {
            return Err(error.clone());
        }
        Ok(self.contexts.get(identity).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// FixedMetric
// ---------------------------------------------------------------------------

/// Metric that always returns the same score.
#[derive(Debug)]
pub struct FixedMetric {
    name: String,
    score: f64,
    categories: Vec<Category>,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl FixedMetric {
    /// Applicable to every supported category by default.
    pub fn new(name: &str, score: f64) -> Self {
        Self {
            name: name.to_string(),
            score,
            categories: Category::SUPPORTED.to_vec(),
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn for_categories(mut self, categories: &[Category]) -> Self {
        self.categories = categories.to_vec();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Metric for FixedMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn applicable(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    async fn evaluate(&self, _handle: &ArtifactHandle, _context: &ArtifactContext) -> Result<Score> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Score::new(self.score))
    }
}

// ---------------------------------------------------------------------------
// ScriptedMetric
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Step {
    Score(f64),
    Fail(EvalError),
    Hang,
    Panic(String),
}

/// Metric that plays back a script of results, one per call.
///
/// The last step repeats once the script is exhausted; an empty script
/// scores 1.0.
#[derive(Debug)]
pub struct ScriptedMetric {
    name: String,
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
}

impl ScriptedMetric {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
        }
    }

    fn push(self, step: Step) -> Self {
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
        self
    }

    pub fn then_score(self, score: f64) -> Self {
        self.push(Step::Score(score))
    }

    pub fn then_fail(self, error: EvalError) -> Self {
        self.push(Step::Fail(error))
    }

    /// Never complete.
    pub fn then_hang(self) -> Self {
        self.push(Step::Hang)
    }

    pub fn then_panic(self, message: &str) -> Self {
        self.push(Step::Panic(message.to_string()))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock().unwrap_or_else(PoisonError::into_inner);
        match steps.len() {
            0 => Step::Score(1.0),
            1 => steps[0].clone(),
            _ => steps.pop_front().unwrap_or(Step::Score(1.0)),
        }
    }
}

#[async_trait]
impl Metric for ScriptedMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn applicable(&self, category: Category) -> bool {
        category.is_supported()
    }

    async fn evaluate(&self, _handle: &ArtifactHandle, _context: &ArtifactContext) -> Result<Score> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Step::Score(v) => Ok(Score::new(v)),
            Step::Fail(e) => Err(e),
            Step::Hang => {
                futures::future::pending::<()>().await;
                Ok(Score::new(0.0))
            }
            Step::Panic(msg) => panic!("{}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExternalCallKind;

    fn handle() -> ArtifactHandle {
        ArtifactHandle::new(Category::Model, "host", "org/a", "https://host/org/a")
    }

    #[tokio::test]
    async fn test_scripted_metric_repeats_last_step() {
        let m = ScriptedMetric::new("s")
            .then_fail(EvalError::external("x", "y", ExternalCallKind::Server, "z"))
            .then_score(0.4);
        let ctx = ArtifactContext::default();
        assert!(m.evaluate(&handle(), &ctx).await.is_err());
        assert_eq!(m.evaluate(&handle(), &ctx).await.unwrap().value, 0.4);
        assert_eq!(m.evaluate(&handle(), &ctx).await.unwrap().value, 0.4);
        assert_eq!(m.calls(), 3);
    }

    #[tokio::test]
    async fn test_static_fetcher_fail_first_then_default() {
        let f = StaticFetcher::new().failing_first(
            1,
            FetchError::Malformed {
                service: "s".into(),
                message: "m".into(),
            },
        );
        assert!(f.fetch(&handle()).await.is_err());
        assert_eq!(f.fetch(&handle()).await.unwrap(), ArtifactContext::default());
        assert_eq!(f.call_counter().load(Ordering::SeqCst), 2);
    }
}
