//! Crawl job events and the per-job event log.
//!
//! The job task is the only producer. Events land in an append-only log in
//! emission order; a stream reads the log from the start, so a subscriber
//! that connects late still sees every event. Only one stream may read a
//! job's log at a time.

use crate::types::PageStatus;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{watch, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Started,
    Finished,
}

/// Internally tagged (`"type": "progress"` etc.); every variant carries the
/// job id and the visited/limit counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrawlEvent {
    Start {
        job_id: Uuid,
        visited: usize,
        limit: usize,
        url: String,
    },
    Progress {
        job_id: Uuid,
        visited: usize,
        limit: usize,
        url: String,
        status: PageStatus,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        error: String,
    },
    Error {
        job_id: Uuid,
        visited: usize,
        limit: usize,
        message: String,
    },
    Processing {
        job_id: Uuid,
        visited: usize,
        limit: usize,
        stage: String,
        state: ProcessingState,
    },
    Complete {
        job_id: Uuid,
        visited: usize,
        limit: usize,
        errors: usize,
    },
}

impl CrawlEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            CrawlEvent::Start { .. } => "start",
            CrawlEvent::Progress { .. } => "progress",
            CrawlEvent::Error { .. } => "error",
            CrawlEvent::Processing { .. } => "processing",
            CrawlEvent::Complete { .. } => "complete",
        }
    }

    /// `complete` and `error` end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CrawlEvent::Complete { .. } | CrawlEvent::Error { .. })
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            CrawlEvent::Start { job_id, .. }
            | CrawlEvent::Progress { job_id, .. }
            | CrawlEvent::Error { job_id, .. }
            | CrawlEvent::Processing { job_id, .. }
            | CrawlEvent::Complete { job_id, .. } => *job_id,
        }
    }
}

pub struct EventLog {
    events: Mutex<Vec<CrawlEvent>>,
    appended: watch::Sender<usize>,
    consumer: Arc<tokio::sync::Mutex<()>>,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").field("len", &self.len()).finish()
    }
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        let (appended, _) = watch::channel(0);
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            appended,
            consumer: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    pub fn push(&self, event: CrawlEvent) {
        let len = {
            let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
            events.push(event);
            events.len()
        };
        self.appended.send_replace(len);
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<CrawlEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn get(&self, index: usize) -> Option<CrawlEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    /// Stream every event from the first one, ending after a terminal event.
    /// `None` while another stream is attached.
    pub fn subscribe(self: &Arc<Self>) -> Option<impl Stream<Item = CrawlEvent> + Send + 'static> {
        let guard = Arc::clone(&self.consumer).try_lock_owned().ok()?;
        let state = Cursor {
            log: Arc::clone(self),
            next: 0,
            appended: self.appended.subscribe(),
            done: false,
            _guard: guard,
        };
        Some(futures::stream::unfold(state, |mut cursor| async move {
            if cursor.done {
                return None;
            }
            loop {
                if let Some(event) = cursor.log.get(cursor.next) {
                    cursor.next += 1;
                    cursor.done = event.is_terminal();
                    return Some((event, cursor));
                }
                if cursor.appended.changed().await.is_err() {
                    return None;
                }
            }
        }))
    }
}

struct Cursor {
    log: Arc<EventLog>,
    next: usize,
    appended: watch::Receiver<usize>,
    done: bool,
    _guard: OwnedMutexGuard<()>,
}
