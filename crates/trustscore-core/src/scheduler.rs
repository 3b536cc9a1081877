//! Run scheduler: bounded concurrent evaluation with in-order emission.
//!
//! A driver task walks the input, takes a permit from a semaphore sized to
//! `max_concurrent_artifacts` for each reference, classifies it and spawns
//! one evaluation per supported artifact. Finished items come back tagged
//! with their slot index and carry their permit into an [`OrderedBuffer`];
//! the permit is released only when the stream yields the item, so slots in
//! flight plus slots waiting for an earlier one never exceed the window.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::artifact::Classifier;
use crate::evaluator::ArtifactEvaluator;
use crate::input::{reference_lines, ReferenceLine};
use crate::obs;
use crate::policy::{InvalidReferencePolicy, RunPolicy};
use crate::record::{RejectionRecord, RunItem, SkipNotice, SkipReason};
use crate::stats::RUN_STATS;

/// Slot buffer indexed by input position.
///
/// Holds only the window between the oldest unreleased slot and the newest
/// completed one.
#[derive(Debug)]
pub struct OrderedBuffer<T> {
    next: usize,
    slots: VecDeque<Option<T>>,
}

impl<T> Default for OrderedBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OrderedBuffer<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            slots: VecDeque::new(),
        }
    }

    /// Store `item` in slot `index`. Slots already released are ignored.
    pub fn insert(&mut self, index: usize, item: T) {
        if index < self.next {
            return;
        }
        let offset = index - self.next;
        if self.slots.len() <= offset {
            self.slots.resize_with(offset + 1, || None);
        }
        self.slots[offset] = Some(item);
    }

    /// Release the front slot if it is filled.
    pub fn pop_ready(&mut self) -> Option<T> {
        match self.slots.front() {
            Some(Some(_)) => {
                self.next += 1;
                self.slots.pop_front().flatten()
            }
            _ => None,
        }
    }

    /// Release the next filled slot, skipping empty ones. Returns the item
    /// and how many empty slots were skipped.
    pub fn pop_skipping_gaps(&mut self) -> Option<(T, usize)> {
        let mut gaps = 0;
        while let Some(slot) = self.slots.pop_front() {
            self.next += 1;
            match slot {
                Some(item) => return Some((item, gaps)),
                None => gaps += 1,
            }
        }
        None
    }

    /// Index of the next slot to release.
    pub fn next_index(&self) -> usize {
        self.next
    }

    /// Slots held, filled or not.
    pub fn pending(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

/// Drives evaluation of a reference list.
#[derive(Clone)]
pub struct RunScheduler {
    classifier: Arc<Classifier>,
    evaluator: Arc<ArtifactEvaluator>,
    policy: Arc<RunPolicy>,
}

impl RunScheduler {
    pub fn new(
        classifier: Arc<Classifier>,
        evaluator: Arc<ArtifactEvaluator>,
        policy: Arc<RunPolicy>,
    ) -> Self {
        Self {
            classifier,
            evaluator,
            policy,
        }
    }

    /// Start evaluating `lines` and return the ordered output stream.
    ///
    /// `lines` are raw input lines; blank and `#` comment lines are dropped
    /// here and produce nothing. Every other line yields exactly one
    /// [`RunItem`], in input order. Must be called inside a Tokio runtime.
    pub fn run<I, S>(&self, lines: I) -> RecordStream
    where
        I: IntoIterator<Item = S>,
        I::IntoIter: Send + 'static,
        S: Into<String> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = self.clone();
        let lines = lines.into_iter();
        let driver = tokio::spawn(async move {
            scheduler.drive(reference_lines(lines), tx).await;
        });

        RecordStream {
            rx,
            buffer: OrderedBuffer::new(),
            closed: false,
            driver,
        }
    }

    async fn drive<I>(&self, references: I, tx: mpsc::UnboundedSender<Released>)
    where
        I: Iterator<Item = ReferenceLine>,
    {
        let slots = Arc::new(Semaphore::new(self.policy.max_concurrent_artifacts));

        for (index, ReferenceLine { line, raw }) in references.enumerate() {
            let permit = match Arc::clone(&slots).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let handle = match self.classifier.classify(&raw) {
                Ok(handle) if handle.category().is_supported() => handle,
                Ok(handle) => {
                    RUN_STATS.inc_references_skipped();
                    let notice = SkipNotice {
                        reference: raw,
                        line,
                        reason: SkipReason::Unsupported,
                        detail: format!("no classifier rule recognizes {}", handle.host()),
                    };
                    obs::emit_reference_skipped(&notice);
                    let _ = tx.send((index, RunItem::Skipped(notice), permit));
                    continue;
                }
                Err(err) => {
                    let item = match self.policy.on_invalid_reference {
                        InvalidReferencePolicy::Record => {
                            RUN_STATS.inc_references_rejected();
                            let record = RejectionRecord::new(raw, line, &err);
                            obs::emit_reference_rejected(&record);
                            RunItem::Rejected(record)
                        }
                        InvalidReferencePolicy::Skip => {
                            RUN_STATS.inc_references_skipped();
                            let notice = SkipNotice {
                                reference: raw,
                                line,
                                reason: SkipReason::Invalid,
                                detail: err.to_string(),
                            };
                            obs::emit_reference_skipped(&notice);
                            RunItem::Skipped(notice)
                        }
                    };
                    let _ = tx.send((index, item, permit));
                    continue;
                }
            };

            let slot = EvaluationSlot {
                index,
                line,
                reference: raw,
                permit: Some(permit),
                tx: tx.clone(),
            };
            let evaluator = Arc::clone(&self.evaluator);
            tokio::spawn(async move {
                let record = evaluator.evaluate(handle).await;
                slot.complete(RunItem::Evaluated { line, record });
            });
        }
    }
}

/// A finished item, its slot index and the permit it holds.
type Released = (usize, RunItem, OwnedSemaphorePermit);

/// One spawned evaluation's claim on its output slot.
///
/// Dropped without [`EvaluationSlot::complete`], for instance when the task
/// panics or is cancelled, it answers the reference with an aborted
/// [`SkipNotice`] so the slot is never left empty.
struct EvaluationSlot {
    index: usize,
    line: usize,
    reference: String,
    permit: Option<OwnedSemaphorePermit>,
    tx: mpsc::UnboundedSender<Released>,
}

impl EvaluationSlot {
    fn complete(mut self, item: RunItem) {
        if let Some(permit) = self.permit.take() {
            let _ = self.tx.send((self.index, item, permit));
        }
    }
}

impl Drop for EvaluationSlot {
    fn drop(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };
        RUN_STATS.inc_references_skipped();
        let notice = SkipNotice {
            reference: std::mem::take(&mut self.reference),
            line: self.line,
            reason: SkipReason::Aborted,
            detail: "evaluation ended without producing a record".to_string(),
        };
        obs::emit_reference_skipped(&notice);
        let _ = self.tx.send((self.index, RunItem::Skipped(notice), permit));
    }
}

/// Ordered, finite stream of [`RunItem`]s produced by [`RunScheduler::run`].
///
/// Dropping the stream stops the driver; evaluations already in flight run
/// to completion and are discarded.
pub struct RecordStream {
    rx: mpsc::UnboundedReceiver<Released>,
    buffer: OrderedBuffer<(RunItem, OwnedSemaphorePermit)>,
    closed: bool,
    driver: JoinHandle<()>,
}

impl Stream for RecordStream {
    type Item = RunItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<RunItem>> {
        let this = self.get_mut();
        loop {
            // Dropping the permit frees the slot for the next reference.
            if let Some((item, _permit)) = this.buffer.pop_ready() {
                return Poll::Ready(Some(item));
            }

            if this.closed {
                return Poll::Ready(this.buffer.pop_skipping_gaps().map(|((item, _), gaps)| {
                    if gaps > 0 {
                        warn!(gaps, line = item.line(), "evaluations lost before emission");
                    }
                    item
                }));
            }

            match this.rx.poll_recv(cx) {
                Poll::Ready(Some((index, item, permit))) => {
                    this.buffer.insert(index, (item, permit))
                }
                Poll::Ready(None) => this.closed = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
