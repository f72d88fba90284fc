use nextstep::chat::{
    BackendError, ChatBackend, ChatSession, ChatStore, FileStorage, MemoryStorage, Message,
    Notice, Role, SendOutcome, FALLBACK_REPLY, GREETING,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Backend that answers from a script, then with empty replies
#[derive(Default)]
struct ScriptedBackend {
    replies: Mutex<Vec<Result<String, BackendError>>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<Result<String, BackendError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for ScriptedBackend {
    async fn send(&self, _message: &str) -> Result<String, BackendError> {
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            Ok(String::new())
        } else {
            replies.remove(0)
        }
    }
}

fn backend_error(status: Option<u16>, message: &str) -> BackendError {
    BackendError {
        status,
        message: message.to_string(),
    }
}

#[derive(Default)]
struct Gate {
    entered: Notify,
    release: Notify,
    calls: AtomicUsize,
}

/// Backend that blocks inside `send` until the test releases it
struct GatedBackend {
    gate: Arc<Gate>,
}

#[async_trait::async_trait]
impl ChatBackend for GatedBackend {
    async fn send(&self, _message: &str) -> Result<String, BackendError> {
        self.gate.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.entered.notify_one();
        self.gate.release.notified().await;
        Ok("Here are some internship portals.".to_string())
    }
}

#[tokio::test]
async fn new_session_starts_with_greeting() {
    let session = ChatSession::new(
        ScriptedBackend::default(),
        ChatStore::new(MemoryStorage::new()),
    );
    let messages = session.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::Assistant);
    assert_eq!(messages[0].content, GREETING);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn blank_input_is_ignored() {
    let session = ChatSession::new(
        ScriptedBackend::default(),
        ChatStore::new(MemoryStorage::new()),
    );

    assert_eq!(session.send("").await, SendOutcome::Ignored);
    assert_eq!(session.send("   \n\t").await, SendOutcome::Ignored);
    assert_eq!(session.messages(), vec![Message::greeting()]);
}

#[tokio::test]
async fn reply_is_appended_and_persisted() {
    let backend = ScriptedBackend::new(vec![Ok("Try the NCS portal.".to_string())]);
    let session = ChatSession::new(backend, ChatStore::new(MemoryStorage::new()));

    let outcome = session.send("  How do I find a job?  ").await;
    assert_eq!(outcome, SendOutcome::Replied("Try the NCS portal.".to_string()));

    let messages = session.messages();
    assert_eq!(
        messages,
        vec![
            Message::greeting(),
            Message::user("How do I find a job?"),
            Message::assistant("Try the NCS portal."),
        ]
    );
    assert!(!session.is_busy());
}

#[tokio::test]
async fn empty_reply_appends_nothing() {
    let backend = ScriptedBackend::new(vec![Ok(String::new())]);
    let session = ChatSession::new(backend, ChatStore::new(MemoryStorage::new()));

    assert_eq!(session.send("hello").await, SendOutcome::Replied(String::new()));
    assert_eq!(
        session.messages(),
        vec![Message::greeting(), Message::user("hello")]
    );
}

#[tokio::test]
async fn failure_appends_fallback_and_reports_notice() {
    let backend = ScriptedBackend::new(vec![
        Err(backend_error(
            Some(429),
            "Rate limit exceeded. Please try again in a moment.",
        )),
        Err(backend_error(Some(402), "Payment required. Please add credits to continue.")),
        Err(backend_error(None, "chat request failed: connection refused")),
    ]);
    let session = ChatSession::new(backend, ChatStore::new(MemoryStorage::new()));

    assert_eq!(session.send("one").await, SendOutcome::Failed(Notice::RateLimited));
    assert_eq!(
        session.send("two").await,
        SendOutcome::Failed(Notice::PaymentRequired)
    );
    assert_eq!(
        session.send("three").await,
        SendOutcome::Failed(Notice::RequestFailed)
    );

    let messages = session.messages();
    assert_eq!(messages.len(), 7);
    assert_eq!(messages[2], Message::assistant(FALLBACK_REPLY));
    assert_eq!(messages[6], Message::assistant(FALLBACK_REPLY));
    assert!(!session.is_busy());
}

#[tokio::test]
async fn second_send_while_in_flight_is_rejected() {
    let gate = Arc::new(Gate::default());
    let session = Arc::new(ChatSession::new(
        GatedBackend { gate: gate.clone() },
        ChatStore::new(MemoryStorage::new()),
    ));

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.send("first").await })
    };

    gate.entered.notified().await;
    assert!(session.is_busy());

    assert_eq!(session.send("second").await, SendOutcome::Busy);
    assert_eq!(
        session.messages(),
        vec![Message::greeting(), Message::user("first")]
    );

    gate.release.notify_one();
    let outcome = first.await.expect("send task");
    assert_eq!(
        outcome,
        SendOutcome::Replied("Here are some internship portals.".to_string())
    );
    assert_eq!(gate.calls.load(Ordering::SeqCst), 1);
    assert!(!session.is_busy());
    assert_eq!(session.messages().len(), 3);
}

#[tokio::test]
async fn clear_resets_to_greeting_and_removes_storage() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::new(vec![Ok("Sure.".to_string())]);
    let session = ChatSession::new(backend, ChatStore::new(FileStorage::new(dir.path())));

    session.send("hi").await;
    assert_eq!(session.messages().len(), 3);
    assert!(dir.path().join("nextstep-chat-history.json").exists());

    assert_eq!(session.clear(), Notice::HistoryCleared);
    assert_eq!(session.messages(), vec![Message::greeting()]);
    assert!(!dir.path().join("nextstep-chat-history.json").exists());
}

#[tokio::test]
async fn history_survives_a_new_session() {
    let dir = tempfile::tempdir().unwrap();

    let first = ChatSession::new(
        ScriptedBackend::new(vec![Ok("Look at AICTE internships.".to_string())]),
        ChatStore::new(FileStorage::new(dir.path())),
    );
    first.send("Any internships for CS students?").await;
    let before = first.messages();
    drop(first);

    let backend = ScriptedBackend::default();
    let second = ChatSession::new(backend, ChatStore::new(FileStorage::new(dir.path())));
    assert_eq!(second.messages(), before);
    assert_eq!(
        second.messages()[1],
        Message::user("Any internships for CS students?")
    );
}
