use super::*;

use chrono::Utc;
use shared::domain::Participant;

fn chat(id: &str) -> Conversation {
    Conversation {
        id: ChatId::new(id),
        name: id.to_uppercase(),
        is_group: false,
        users: Vec::new(),
    }
}

fn message(id: &str, chat_id: &str) -> Message {
    Message {
        id: MessageId::new(id),
        chat_id: ChatId::new(chat_id),
        sender: Participant::new("u2", "Bob"),
        body: format!("body {id}"),
        created_at: Utc::now(),
    }
}

fn ids(sync: &MessageSync) -> Vec<&str> {
    sync.transcript().iter().map(|m| m.id.as_str()).collect()
}

#[test]
fn select_clears_transcript_and_starts_loading() {
    let mut sync = MessageSync::default();
    let ticket = sync.select(Some(chat("a"))).expect("ticket");
    sync.complete_fetch(&ticket, vec![message("m1", "a")]);
    assert_eq!(ids(&sync), ["m1"]);

    let ticket = sync.select(Some(chat("b"))).expect("ticket");
    assert!(sync.transcript().is_empty());
    assert!(sync.is_loading());
    assert_eq!(ticket.chat_id, ChatId::new("b"));
}

#[test]
fn selecting_none_is_idle_without_ticket() {
    let mut sync = MessageSync::default();
    sync.select(Some(chat("a")));
    assert!(sync.select(None).is_none());
    assert_eq!(sync.phase(), LoadPhase::Idle);
    assert_eq!(
        sync.route_live(message("m1", "a")),
        LiveRoute::Background
    );
}

#[test]
fn stale_tickets_never_overwrite_current_selection() {
    let mut sync = MessageSync::default();
    let first_a = sync.select(Some(chat("a"))).expect("ticket");
    let b = sync.select(Some(chat("b"))).expect("ticket");
    let second_a = sync.select(Some(chat("a"))).expect("ticket");

    assert_eq!(sync.complete_fetch(&b, vec![message("mb", "b")]), None);
    assert_eq!(sync.complete_fetch(&first_a, vec![message("old", "a")]), None);
    assert!(sync.transcript().is_empty());
    assert!(sync.is_loading());

    assert_eq!(
        sync.complete_fetch(&second_a, vec![message("ma", "a")]),
        Some(0)
    );
    assert_eq!(ids(&sync), ["ma"]);
    assert!(!sync.fail_fetch(&first_a));
}

#[test]
fn live_messages_during_load_are_merged_after_history() {
    let mut sync = MessageSync::default();
    let ticket = sync.select(Some(chat("a"))).expect("ticket");

    assert_eq!(sync.route_live(message("m2", "a")), LiveRoute::Buffered);
    assert_eq!(sync.route_live(message("m3", "a")), LiveRoute::Buffered);
    assert_eq!(sync.route_live(message("m2", "a")), LiveRoute::Duplicate);

    let replayed = sync
        .complete_fetch(&ticket, vec![message("m1", "a"), message("m2", "a")])
        .expect("current");
    assert_eq!(replayed, 1);
    assert_eq!(ids(&sync), ["m1", "m2", "m3"]);
}

#[test]
fn append_preserves_existing_entries() {
    let mut sync = MessageSync::default();
    let ticket = sync.select(Some(chat("a"))).expect("ticket");
    sync.complete_fetch(&ticket, vec![message("m1", "a"), message("m2", "a")]);
    let before: Vec<Message> = sync.transcript().to_vec();

    assert_eq!(sync.route_live(message("m3", "a")), LiveRoute::Appended);
    assert_eq!(&sync.transcript()[..2], before.as_slice());
    assert_eq!(ids(&sync), ["m1", "m2", "m3"]);
}

#[test]
fn duplicate_live_message_is_ignored_after_load() {
    let mut sync = MessageSync::default();
    let ticket = sync.select(Some(chat("a"))).expect("ticket");
    sync.complete_fetch(&ticket, Vec::new());
    assert_eq!(sync.route_live(message("m1", "a")), LiveRoute::Appended);
    assert_eq!(sync.route_live(message("m1", "a")), LiveRoute::Duplicate);
    assert_eq!(ids(&sync), ["m1"]);
}

#[test]
fn failed_load_drops_buffer_and_later_live_messages() {
    let mut sync = MessageSync::default();
    let ticket = sync.select(Some(chat("a"))).expect("ticket");
    sync.route_live(message("m1", "a"));

    assert!(sync.fail_fetch(&ticket));
    assert_eq!(sync.phase(), LoadPhase::Failed);
    assert!(sync.transcript().is_empty());
    assert_eq!(sync.route_live(message("m2", "a")), LiveRoute::Dropped);
    assert_eq!(sync.route_live(message("m3", "b")), LiveRoute::Background);
    assert_eq!(sync.complete_fetch(&ticket, vec![message("m1", "a")]), None);
}

#[test]
fn confirmed_send_survives_failed_load() {
    let mut sync = MessageSync::default();
    let ticket = sync.select(Some(chat("a"))).expect("ticket");
    assert!(sync.fail_fetch(&ticket));

    assert_eq!(sync.route_confirmed(message("s1", "a")), LiveRoute::Appended);
    assert_eq!(sync.route_confirmed(message("s1", "a")), LiveRoute::Duplicate);
    assert_eq!(sync.route_live(message("s1", "a")), LiveRoute::Dropped);
    assert_eq!(ids(&sync), ["s1"]);
}

#[test]
fn confirmed_send_follows_live_routing_otherwise() {
    let mut sync = MessageSync::default();
    let ticket = sync.select(Some(chat("a"))).expect("ticket");

    assert_eq!(sync.route_confirmed(message("s1", "a")), LiveRoute::Buffered);
    assert_eq!(sync.route_confirmed(message("s2", "b")), LiveRoute::Background);

    sync.complete_fetch(&ticket, vec![message("m1", "a"), message("s1", "a")]);
    assert_eq!(ids(&sync), ["m1", "s1"]);
    assert_eq!(sync.route_confirmed(message("s3", "a")), LiveRoute::Appended);
}
