use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use super::store::{ChatStore, Storage};
use super::{ChatBackend, Message, Notice, FALLBACK_REPLY};

/// Result of [`ChatSession::send`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty or whitespace-only input; nothing changed
    Ignored,
    /// Another message is still in flight; nothing changed
    Busy,
    /// The assistant reply was appended
    Replied(String),
    /// The call failed; the fallback reply was appended
    Failed(Notice),
}

/// One conversation: in-memory history mirrored to a [`ChatStore`], and at most one
/// outbound request at a time.
pub struct ChatSession<B: ChatBackend, S: Storage> {
    backend: B,
    store: ChatStore<S>,
    messages: Mutex<Vec<Message>>,
    busy: AtomicBool,
}

impl<B: ChatBackend, S: Storage> ChatSession<B, S> {
    /// Start a session from whatever history the store holds.
    pub fn new(backend: B, store: ChatStore<S>) -> Self {
        let messages = store.load();
        Self {
            backend,
            store,
            messages: Mutex::new(messages),
            busy: AtomicBool::new(false),
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock_messages().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Send `input` and wait for the reply.
    pub async fn send(&self, input: &str) -> SendOutcome {
        let text = input.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }

        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            warn!("chat: message rejected, a request is already in flight");
            return SendOutcome::Busy;
        };

        self.push(Message::user(text));

        match self.backend.send(text).await {
            Ok(reply) => {
                if !reply.is_empty() {
                    self.push(Message::assistant(reply.clone()));
                }
                SendOutcome::Replied(reply)
            }
            Err(e) => {
                error!(status = ?e.status, error = %e, "chat: error calling chat endpoint");
                let notice = Notice::for_error(&e);
                self.push(Message::assistant(FALLBACK_REPLY));
                SendOutcome::Failed(notice)
            }
        }
    }

    /// Reset to the greeting and drop the stored history.
    pub fn clear(&self) -> Notice {
        let fresh = self.store.clear();
        *self.lock_messages() = fresh;
        info!("chat: history cleared");
        Notice::HistoryCleared
    }

    fn push(&self, message: Message) {
        let mut messages = self.lock_messages();
        messages.push(message);
        self.store.save(&messages);
    }

    fn lock_messages(&self) -> MutexGuard<'_, Vec<Message>> {
        // A panic while holding the lock cannot leave the Vec half-written
        self.messages.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Holds the busy flag; releasing happens on drop so every exit path clears it.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
