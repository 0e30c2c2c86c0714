mod common;

use common::ScriptedTransport;
use nitibot::config::WELCOME_MESSAGE;
use nitibot::conversation::Conversation;
use nitibot::history::{ FileHistoryStore, HistoryStore, MemoryHistoryStore };
use nitibot::models::chat::{ ChatStatus, PersistedRecord, Role };
use nitibot::session::{ ChatSession, SubmitOutcome };
use std::sync::Arc;

#[tokio::test]
async fn greeting_question_reply_then_clear() {
    let store = Arc::new(MemoryHistoryStore::new("chat-messages"));
    let transport = Arc::new(
        ScriptedTransport::replying(&["You may qualify ", "if your turnover is under ₹100 crore."])
    );
    let mut session = ChatSession::new(
        Conversation::new(store.clone(), WELCOME_MESSAGE),
        transport.clone()
    );

    session.initialize().await;
    let messages = session.conversation().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::Assistant);
    assert_eq!(messages[0].text(), WELCOME_MESSAGE);

    let outcome = session.submit("Am I eligible for DPIIT?").await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Completed { reply_id: Some(_) }));
    assert_eq!(transport.sent_texts(), vec!["Am I eligible for DPIIT?".to_string()]);

    let messages = session.conversation().messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].text(), "Am I eligible for DPIIT?");
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(session.status(), ChatStatus::Ready);
    assert_eq!(store.load().await, session.conversation().snapshot());

    session.clear().await;
    assert!(session.conversation().is_empty());
    assert!(session.conversation().durations().is_empty());
    assert_eq!(store.load().await, PersistedRecord::default());
}

#[tokio::test]
async fn history_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::replying(&["SISFS gives seed grants."]));

    {
        let store = Arc::new(FileHistoryStore::new(dir.path(), "chat-messages"));
        let mut session = ChatSession::new(Conversation::new(store, WELCOME_MESSAGE), transport.clone());
        session.initialize().await;
        session.submit("Explain SISFS funding").await.unwrap();
    }

    let store = Arc::new(FileHistoryStore::new(dir.path(), "chat-messages"));
    let mut restored = Conversation::new(store, WELCOME_MESSAGE);
    restored.initialize().await;

    let messages = restored.messages();
    assert_eq!(messages.len(), 3);
    assert!(messages[0].id.starts_with("welcome-"));
    assert_eq!(messages[2].text(), "SISFS gives seed grants.");
    assert!(restored.duration_of(&messages[2].id).is_some());
}

#[tokio::test]
async fn corrupt_file_starts_a_fresh_greeted_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileHistoryStore::new(dir.path(), "chat-messages"));
    std::fs::write(store.path(), "{\"messages\": [").unwrap();

    let mut conversation = Conversation::new(store.clone(), WELCOME_MESSAGE);
    conversation.initialize().await;

    assert_eq!(conversation.messages().len(), 1);
    assert_eq!(store.load().await.messages.len(), 1);
}

#[tokio::test]
async fn clear_then_initialize_greets_again() {
    let store = Arc::new(MemoryHistoryStore::new("chat-messages"));
    let transport = Arc::new(ScriptedTransport::replying(&["ok"]));
    let mut session = ChatSession::new(Conversation::new(store.clone(), WELCOME_MESSAGE), transport);

    session.initialize().await;
    session.submit("Checklist for Startup India registration").await.unwrap();
    session.clear().await;
    session.initialize().await;
    session.initialize().await;

    let messages = session.conversation().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text(), WELCOME_MESSAGE);
    assert_eq!(store.load().await.messages, messages);
}
