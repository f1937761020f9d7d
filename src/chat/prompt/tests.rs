use super::*;
use crate::llm::Role;

fn conversation() -> Conversation {
    Conversation::from_turns(vec![
        Turn::new("What is the revenue?", Some("It is 10M.".to_string())),
        Turn::new("And costs?", Some(String::new())),
        Turn::new("Compare them", None),
    ])
}

#[test]
fn prior_turns_exclude_in_flight() {
    let conversation = conversation();
    assert_eq!(conversation.prior_turns().len(), 2);
    assert_eq!(
        conversation.in_flight().map(|t| t.user.as_str()),
        Some("Compare them")
    );
    assert!(Conversation::new().prior_turns().is_empty());
}

#[test]
fn history_rendering_skips_empty_slots() {
    let history = render_history(conversation().prior_turns());
    assert_eq!(
        history,
        "user:What is the revenue?\nassistant:It is 10M.\nuser:And costs?"
    );
    assert_eq!(render_history(&[]), "");
}

#[test]
fn document_prompt_layout() {
    let prompt = build_document_prompt("chunk one\n---\nchunk two", "user:hi\nassistant:hello", "Why?");

    assert!(prompt.starts_with("You are a document question-answering assistant."));
    assert!(prompt.contains("Document content: ```\nchunk one\n---\nchunk two```"));
    assert!(prompt.contains("Conversation history: ```\nuser:hi\nassistant:hello```"));
    assert!(prompt.ends_with("user: ```Why?```\nassistant: "));
}

#[test]
fn document_messages_use_in_flight_question() {
    let messages = document_messages("ctx", &conversation());

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
    assert!(messages[0].content.ends_with("user: ```Compare them```\nassistant: "));
    assert!(messages[0].content.contains("assistant:It is 10M."));
    assert!(!messages[0].content.contains("user:Compare them"));
}

#[test]
fn plain_chat_first_turn_has_system_prompt() {
    let mut conversation = Conversation::new();
    conversation.push_user("Hello there");

    let messages = plain_chat_messages(&conversation);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[1], ChatMessage::user("Hello there"));
}

#[test]
fn plain_chat_replays_all_turns() {
    let messages = plain_chat_messages(&conversation());
    let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();

    assert_eq!(
        roles,
        vec![
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::User
        ]
    );
    assert_eq!(messages[4].content, "Compare them");
}

#[test]
fn conversation_mutation() {
    let mut conversation = Conversation::new();
    assert!(conversation.is_empty());

    conversation.push_user("q1");
    conversation.answer_last("a1");
    conversation.push_user("q2");

    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation.turns()[0].assistant.as_deref(), Some("a1"));
    assert_eq!(conversation.in_flight().and_then(|t| t.assistant.as_deref()), None);

    let dropped = conversation.discard_last().expect("should drop last turn");
    assert_eq!(dropped.user, "q2");
    assert_eq!(conversation.len(), 1);
}
