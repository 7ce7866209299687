//! Lockout countdown derived from the ledger deadline.

use futures::Stream;
use portcullis_common::LockoutView;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::ledger::{AttemptLedger, LedgerStore};

/// Lockout timer service
pub struct LockoutTimer<S, C> {
    ledger: Arc<AttemptLedger<S, C>>,
    tick: Duration,
}

impl<S: LedgerStore, C: Clock> LockoutTimer<S, C> {
    pub fn new(ledger: Arc<AttemptLedger<S, C>>, tick: Duration) -> Self {
        Self { ledger, tick }
    }

    /// One-shot view; an expired lockout is reset by the read
    pub async fn current(&self) -> LockoutView {
        current_view(&self.ledger).await
    }

    /// Subscribe to the countdown.
    ///
    /// Emits the current view, then one view per tick while blocked, then a
    /// final unblocked view once the deadline passes.
    pub fn observe(&self) -> LockoutSubscription {
        let (views_tx, views) = mpsc::channel(4);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let ledger = self.ledger.clone();
        let tick = self.tick;

        let task = tokio::spawn(async move {
            countdown(ledger, tick, views_tx, cancel_rx).await;
        });

        LockoutSubscription {
            views,
            cancel: Some(cancel_tx),
            task,
        }
    }
}

async fn current_view<S: LedgerStore, C: Clock>(ledger: &AttemptLedger<S, C>) -> LockoutView {
    let snapshot = ledger.read().await;
    LockoutView::at(snapshot.locked_until, ledger.clock().now())
}

async fn countdown<S: LedgerStore, C: Clock>(
    ledger: Arc<AttemptLedger<S, C>>,
    tick: Duration,
    views: mpsc::Sender<LockoutView>,
    mut cancel: oneshot::Receiver<()>,
) {
    let mut view = current_view(&ledger).await;
    if views.send(view).await.is_err() || !view.is_blocked {
        return;
    }

    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    while view.is_blocked {
        tokio::select! {
            biased;
            _ = &mut cancel => {
                tracing::debug!("Lockout countdown cancelled");
                return;
            }
            _ = ticker.tick() => {
                // The read also clears the ledger once the deadline has passed
                view = current_view(&ledger).await;
                if views.send(view).await.is_err() {
                    return;
                }
            }
        }
    }

    tracing::info!("Lockout window elapsed");
}

/// Live stream of lockout views. Dropping it stops the countdown.
pub struct LockoutSubscription {
    views: mpsc::Receiver<LockoutView>,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl LockoutSubscription {
    /// Next view, or `None` once the countdown has finished or was cancelled
    pub async fn next_view(&mut self) -> Option<LockoutView> {
        self.views.recv().await
    }

    /// Stop the countdown; no further views are delivered
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        self.task.abort();
        self.views.close();
        while self.views.try_recv().is_ok() {}
    }
}

impl Stream for LockoutSubscription {
    type Item = LockoutView;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.views.poll_recv(cx)
    }
}

impl Drop for LockoutSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
