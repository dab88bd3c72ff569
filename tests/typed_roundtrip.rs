//! Purpose: End-to-end tests for the typed subscribe/trigger surfaces.
//! Exports: None (integration test module).
//! Role: Exercise schema declaration through delivery over the in-process hub.
//! Invariants: Only the public `api` surface is used.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};

use subwire::api::{ChannelSpec, Client, Hub, MessageSpec, Server, TriggerBackend};

#[derive(Serialize, Deserialize)]
struct RoomInput {
    room: String,
}

#[derive(Serialize, Deserialize)]
struct UserInput {
    user: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
struct ChatMessage {
    from: String,
    body: String,
}

const CHAT: ChannelSpec<RoomInput> = ChannelSpec::new("chat");
const MESSAGE_SENT: MessageSpec<RoomInput, (), ChatMessage> = CHAT.message("message-sent");
const TYPING: MessageSpec<RoomInput, UserInput, bool> = CHAT.message("typing");

const SYSTEM: ChannelSpec = ChannelSpec::new("system");
const HEARTBEAT: MessageSpec<(), (), u64> = SYSTEM.message("heartbeat");

fn room(name: &str) -> RoomInput {
    RoomInput {
        room: name.to_string(),
    }
}

fn chat_sink() -> (
    Arc<Mutex<Vec<ChatMessage>>>,
    impl FnMut(ChatMessage) + Send + 'static,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let tap = seen.clone();
    (seen, move |message: ChatMessage| {
        tap.lock().expect("lock").push(message);
    })
}

#[test]
fn typed_round_trip_reaches_only_the_addressed_room() {
    let hub = Hub::new();
    let client = Client::new(hub.clone());
    let server = Server::new(hub.clone());

    let (lobby_seen, lobby) = chat_sink();
    let (ops_seen, ops) = chat_sink();
    let _lobby_sub = client
        .subscribe(&MESSAGE_SENT, &room("lobby"), &(), lobby)
        .expect("subscribe");
    let _ops_sub = client
        .subscribe(&MESSAGE_SENT, &room("ops"), &(), ops)
        .expect("subscribe");

    server
        .trigger(
            &MESSAGE_SENT,
            &room("lobby"),
            &(),
            &ChatMessage {
                from: "ada".to_string(),
                body: "hi".to_string(),
            },
        )
        .expect("trigger");

    assert_eq!(
        lobby_seen.lock().expect("lock").as_slice(),
        &[ChatMessage {
            from: "ada".to_string(),
            body: "hi".to_string(),
        }]
    );
    assert!(ops_seen.lock().expect("lock").is_empty());
}

#[test]
fn message_input_scopes_event_names() {
    let hub = Hub::new();
    let client = Client::new(hub.clone());
    let server = Server::new(hub.clone());

    let ada_seen = Arc::new(Mutex::new(Vec::new()));
    let tap = ada_seen.clone();
    let ada_sub = client
        .subscribe(
            &TYPING,
            &room("lobby"),
            &UserInput {
                user: "ada".to_string(),
            },
            move |typing: bool| {
                tap.lock().expect("lock").push(typing);
            },
        )
        .expect("subscribe");
    let lin_seen = Arc::new(Mutex::new(Vec::new()));
    let tap = lin_seen.clone();
    let _lin_sub = client
        .subscribe(
            &TYPING,
            &room("lobby"),
            &UserInput {
                user: "lin".to_string(),
            },
            move |typing: bool| {
                tap.lock().expect("lock").push(typing);
            },
        )
        .expect("subscribe");

    assert_eq!(ada_sub.channel(), "chat-{\"room\":\"lobby\"}");
    assert_eq!(ada_sub.event(), "typing-{\"user\":\"ada\"}");

    server
        .trigger(
            &TYPING,
            &room("lobby"),
            &UserInput {
                user: "ada".to_string(),
            },
            &true,
        )
        .expect("trigger");

    assert_eq!(ada_seen.lock().expect("lock").as_slice(), &[true]);
    assert!(lin_seen.lock().expect("lock").is_empty());
}

#[test]
fn keyless_schema_uses_bare_names() {
    let hub = Hub::new();
    let client = Client::new(hub.clone());
    let server = Server::new(hub.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let tap = seen.clone();
    let sub = client
        .subscribe(&HEARTBEAT, &(), &(), move |beat: u64| {
            tap.lock().expect("lock").push(beat);
        })
        .expect("subscribe");

    assert_eq!(sub.channel(), "system");
    assert_eq!(sub.event(), "heartbeat");

    server.trigger(&HEARTBEAT, &(), &(), &7).expect("trigger");
    assert_eq!(seen.lock().expect("lock").as_slice(), &[7]);
}

#[test]
fn channel_handles_are_shared_until_last_drop() {
    let hub = Hub::new();
    let client = Client::new(hub.clone());

    let (_first_seen, first) = chat_sink();
    let first_sub = client
        .subscribe(&MESSAGE_SENT, &room("lobby"), &(), first)
        .expect("subscribe");
    let typing_sub = client
        .subscribe(
            &TYPING,
            &room("lobby"),
            &UserInput {
                user: "ada".to_string(),
            },
            |_typing: bool| {},
        )
        .expect("subscribe");

    // Two messages on one channel instance still mean one subscribe.
    assert_eq!(hub.subscribe_count(), 1);
    let channel = first_sub.channel().to_string();

    drop(first_sub);
    assert!(hub.has_channel(&channel));
    drop(typing_sub);
    assert!(!hub.has_channel(&channel));
}

#[test]
fn undecodable_payloads_are_skipped_not_fatal() {
    let hub = Hub::new();
    let client = Client::new(hub.clone());
    let server = Server::new(hub.clone());

    let (seen, tap) = chat_sink();
    let sub = client
        .subscribe(&MESSAGE_SENT, &room("lobby"), &(), tap)
        .expect("subscribe");

    // Raw trigger around the typed server, as a foreign publisher would.
    hub.trigger(sub.channel(), sub.event(), &json!({"version": 2}))
        .expect("trigger");
    assert!(seen.lock().expect("lock").is_empty());

    server
        .trigger(
            &MESSAGE_SENT,
            &room("lobby"),
            &(),
            &ChatMessage {
                from: "ada".to_string(),
                body: "after the noise".to_string(),
            },
        )
        .expect("trigger");
    assert_eq!(seen.lock().expect("lock").len(), 1);
}
