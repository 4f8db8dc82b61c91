//! Session store: one [`BookingSession`] per session identifier, created on
//! first use, wiped on explicit reset, never garbage-collected here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::models::session::{BookingSession, BookingStep};

/// A stuck in-flight flag is force-cleared after this long, so one lost turn
/// can never lock a session out permanently.
pub const INFLIGHT_STALE_AFTER: Duration = Duration::from_secs(5);

pub struct SessionHandle {
    busy: AtomicBool,
    busy_since: Mutex<Option<Instant>>,
    last_step: AtomicU8,
    pub session: tokio::sync::Mutex<BookingSession>,
}

impl SessionHandle {
    fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
            busy_since: Mutex::new(None),
            last_step: AtomicU8::new(BookingStep::AwaitingIntent.index()),
            session: tokio::sync::Mutex::new(BookingSession::new()),
        }
    }

    /// Claims the session for one turn. A concurrent claim fails unless the
    /// previous one has gone stale, in which case it is taken over.
    pub fn try_begin_turn(&self, stale_after: Duration) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            *self.busy_since.lock().unwrap() = Some(Instant::now());
            return true;
        }

        let mut since = self.busy_since.lock().unwrap();
        match *since {
            Some(started) if started.elapsed() > stale_after => {
                tracing::warn!("in-flight turn went stale, taking over the session");
                *since = Some(Instant::now());
                true
            }
            _ => false,
        }
    }

    pub fn end_turn(&self, step: BookingStep) {
        self.last_step.store(step.index(), Ordering::Release);
        *self.busy_since.lock().unwrap() = None;
        self.busy.store(false, Ordering::Release);
    }

    /// Step reached at the end of the last completed turn; readable without
    /// touching the session lock (used by the busy reply).
    pub fn last_step(&self) -> BookingStep {
        BookingStep::from_index(self.last_step.load(Ordering::Acquire))
            .unwrap_or(BookingStep::AwaitingIntent)
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, session_id: &str) -> Arc<SessionHandle> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(SessionHandle::new()))
            .clone()
    }

    /// Wipes the session back to its initial state, creating it if needed.
    pub async fn reset(&self, session_id: &str) {
        let handle = self.handle(session_id);
        handle.session.lock().await.reset();
        handle
            .last_step
            .store(BookingStep::AwaitingIntent.index(), Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
