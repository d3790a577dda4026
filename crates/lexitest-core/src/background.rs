//! Fire-and-forget work owned by a session.
//!
//! Tasks run on the ambient tokio runtime and report back over a channel.
//! Every message carries the generation that was current at dispatch, and
//! messages from an older generation are dropped when drained.

use std::future::Future;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::model::Question;
use crate::traits::AnswerReceipt;

/// Result of a background task, tagged with its session generation.
#[derive(Debug)]
pub(crate) struct Tagged {
    pub generation: u64,
    pub event: BackgroundEvent,
}

#[derive(Debug)]
pub(crate) enum BackgroundEvent {
    Prefetched {
        level: u32,
        result: anyhow::Result<Vec<Question>>,
    },
    Recorded {
        question_id: String,
        result: anyhow::Result<AnswerReceipt>,
    },
}

#[derive(Debug)]
pub(crate) struct Background {
    generation: u64,
    tx: UnboundedSender<Tagged>,
    rx: UnboundedReceiver<Tagged>,
    tasks: Vec<JoinHandle<()>>,
}

impl Background {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            generation: 0,
            tx,
            rx,
            tasks: Vec::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a new generation. Results of earlier tasks will be dropped.
    pub fn bump(&mut self) {
        self.generation += 1;
    }

    /// Spawn `work` on the current runtime. Returns `false` when there is no
    /// runtime to spawn on.
    pub fn spawn<F>(&mut self, work: F) -> bool
    where
        F: Future<Output = BackgroundEvent> + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime, skipping background request");
            return false;
        };
        let tx = self.tx.clone();
        let generation = self.generation;
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(handle.spawn(async move {
            let event = work.await;
            // receiver gone means the session was dropped
            let _ = tx.send(Tagged { generation, event });
        }));
        true
    }

    /// Take every finished result from the current generation.
    pub fn drain(&mut self) -> Vec<BackgroundEvent> {
        let mut events = Vec::new();
        while let Ok(tagged) = self.rx.try_recv() {
            if tagged.generation == self.generation {
                events.push(tagged.event);
            } else {
                tracing::debug!(
                    stale = tagged.generation,
                    current = self.generation,
                    "dropping result from superseded session"
                );
            }
        }
        events
    }

    /// Wait for every spawned task to finish.
    pub async fn settle(&mut self) {
        let tasks = std::mem::take(&mut self.tasks);
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                tracing::warn!("background task failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(id: &str) -> BackgroundEvent {
        BackgroundEvent::Recorded {
            question_id: id.into(),
            result: Ok(AnswerReceipt {
                correct: true,
                correct_answer: "a".into(),
            }),
        }
    }

    #[tokio::test]
    async fn drains_current_generation() {
        let mut background = Background::new();
        assert!(background.spawn(async { recorded("q1") }));
        background.settle().await;

        let events = background.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], BackgroundEvent::Recorded { question_id, .. } if question_id == "q1"));
        assert!(background.drain().is_empty());
    }

    #[tokio::test]
    async fn drops_stale_generation() {
        let mut background = Background::new();
        background.spawn(async { recorded("old") });
        background.bump();
        background.spawn(async { recorded("new") });
        background.settle().await;

        let events = background.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], BackgroundEvent::Recorded { question_id, .. } if question_id == "new"));
        assert_eq!(background.generation(), 1);
        assert!(background.tasks.is_empty());
    }

    #[test]
    fn spawn_without_runtime_is_skipped() {
        let mut background = Background::new();
        assert!(!background.spawn(async { recorded("q") }));
    }
}
