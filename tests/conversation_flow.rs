use crux_core::testing::AppTester;

use shared::conversation::ThreadPhase;
use shared::model::{
    ConversationId, Listing, ListingId, ListingKind, Message, MessageId, MessageSender, User,
    UserId,
};
use shared::{App, Effect, Event, Model};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};

fn token_for(email: &str) -> String {
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{email}"}}"#));
    format!("eyJhbGciOiJIUzI1NiJ9.{payload}.sig")
}

fn message(id: u64, email: &str, text: &str) -> Message {
    Message {
        id: MessageId::new(id),
        sender: MessageSender { email: email.into() },
        text: text.into(),
        sent_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
    }
}

fn listing_owned_by(email: &str, claimed: bool) -> Listing {
    Listing {
        id: ListingId::new(1),
        name: Some("Red Wallet".into()),
        description: "d".into(),
        photo_path: None,
        location: "loc".into(),
        date: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        kind: ListingKind::Lost,
        claimed,
        owner: Some(User {
            id: UserId::new(9),
            last_name: "Martin".into(),
            first_name: "Alice".into(),
            email: email.into(),
            age: None,
        }),
    }
}

fn signed_in_model(email: &str) -> Model {
    let mut model = Model::default();
    model.session.set_token(token_for(email));
    model.caller_email = Some(email.into());
    model
}

#[test]
fn opening_a_thread_resolves_identity_then_fetches() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in_model("alice@example.com");

    let update = app.update(
        Event::ConversationOpened {
            conversation_id: ConversationId::new(1),
            listing_id: Some(ListingId::new(1)),
        },
        &mut model,
    );

    // Identity is resolved synchronously from the token; the thread and the
    // listing (for owner detection) are both requested.
    let state = model.conversation.as_ref().unwrap();
    assert_eq!(state.phase, ThreadPhase::LoadingThread);
    let http_count = update
        .effects
        .iter()
        .filter(|e| matches!(e, Effect::Http(_)))
        .count();
    assert_eq!(http_count, 2);

    let _ = app.update(
        Event::ThreadFetched {
            conversation_id: ConversationId::new(1),
            result: Box::new(Ok(vec![message(1, "bob@example.com", "hi")])),
        },
        &mut model,
    );
    assert_eq!(
        model.conversation.as_ref().unwrap().phase,
        ThreadPhase::Ready
    );

    let view = app.view(&model);
    let thread = view.thread.unwrap();
    assert_eq!(thread.messages.len(), 1);
    assert!(!thread.messages[0].is_mine);
}

#[test]
fn unreadable_token_blocks_the_thread_permanently() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    // Authenticated, but the token payload is not decodable.
    model.session.set_token("garbage".into());

    let update = app.update(
        Event::ConversationOpened {
            conversation_id: ConversationId::new(1),
            listing_id: None,
        },
        &mut model,
    );

    let state = model.conversation.as_ref().unwrap();
    assert_eq!(state.phase, ThreadPhase::Blocked);
    // No thread fetch goes out while blocked.
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Http(_))));

    // Even a (stray) thread response cannot unblock it.
    let _ = app.update(
        Event::ThreadFetched {
            conversation_id: ConversationId::new(1),
            result: Box::new(Ok(vec![message(1, "x@x.com", "hi")])),
        },
        &mut model,
    );
    let state = model.conversation.as_ref().unwrap();
    assert_eq!(state.phase, ThreadPhase::Blocked);
    assert!(state.messages.is_empty());

    let view = app.view(&model);
    assert!(view.thread.unwrap().blocked_message.is_some());
}

#[test]
fn send_appends_only_on_server_echo() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in_model("alice@example.com");

    let _ = app.update(
        Event::ConversationOpened {
            conversation_id: ConversationId::new(1),
            listing_id: None,
        },
        &mut model,
    );
    let _ = app.update(
        Event::ThreadFetched {
            conversation_id: ConversationId::new(1),
            result: Box::new(Ok(vec![])),
        },
        &mut model,
    );

    let _ = app.update(Event::DraftChanged("is this yours?".into()), &mut model);
    let update = app.update(Event::SendRequested, &mut model);
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Http(_))));

    // Nothing is appended until the echo arrives.
    assert!(model.conversation.as_ref().unwrap().messages.is_empty());
    assert!(model.conversation.as_ref().unwrap().sending);

    let _ = app.update(
        Event::MessageSent {
            conversation_id: ConversationId::new(1),
            result: Box::new(Ok(message(1, "alice@example.com", "is this yours?"))),
        },
        &mut model,
    );

    let state = model.conversation.as_ref().unwrap();
    assert_eq!(state.messages.len(), 1);
    assert!(state.draft.is_empty());

    let view = app.view(&model);
    assert!(view.thread.unwrap().messages[0].is_mine);
}

#[test]
fn failed_send_keeps_the_draft() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in_model("alice@example.com");

    let _ = app.update(
        Event::ConversationOpened {
            conversation_id: ConversationId::new(1),
            listing_id: None,
        },
        &mut model,
    );
    let _ = app.update(
        Event::ThreadFetched {
            conversation_id: ConversationId::new(1),
            result: Box::new(Ok(vec![])),
        },
        &mut model,
    );

    let _ = app.update(Event::DraftChanged("still there?".into()), &mut model);
    let _ = app.update(Event::SendRequested, &mut model);
    let _ = app.update(
        Event::MessageSent {
            conversation_id: ConversationId::new(1),
            result: Box::new(Err(shared::AppError::new(
                shared::ErrorKind::Network,
                "offline",
            ))),
        },
        &mut model,
    );

    let state = model.conversation.as_ref().unwrap();
    assert!(state.messages.is_empty());
    assert_eq!(state.draft, "still there?");
    assert!(!state.sending);
    assert!(app.view(&model).error.is_some());
}

#[test]
fn delete_is_confirmed_and_removes_exactly_one_message() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in_model("alice@example.com");

    let _ = app.update(
        Event::ConversationOpened {
            conversation_id: ConversationId::new(1),
            listing_id: None,
        },
        &mut model,
    );
    let _ = app.update(
        Event::ThreadFetched {
            conversation_id: ConversationId::new(1),
            result: Box::new(Ok(vec![
                message(1, "alice@example.com", "a"),
                message(2, "bob@example.com", "b"),
                message(3, "alice@example.com", "c"),
            ])),
        },
        &mut model,
    );

    // Requesting alone sends nothing; only confirmation does.
    let update = app.update(Event::MessageDeleteRequested(MessageId::new(3)), &mut model);
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Http(_))));

    let update = app.update(Event::MessageDeleteConfirmed, &mut model);
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Http(_))));

    let _ = app.update(
        Event::MessageDeleted {
            conversation_id: ConversationId::new(1),
            message_id: MessageId::new(3),
            result: Box::new(Ok(())),
        },
        &mut model,
    );

    let ids: Vec<u64> = model
        .conversation
        .as_ref()
        .unwrap()
        .messages
        .iter()
        .map(|m| m.id.value())
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn only_own_messages_can_be_deleted() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in_model("bob@example.com");

    let _ = app.update(
        Event::ConversationOpened {
            conversation_id: ConversationId::new(1),
            listing_id: None,
        },
        &mut model,
    );
    let _ = app.update(
        Event::ThreadFetched {
            conversation_id: ConversationId::new(1),
            result: Box::new(Ok(vec![
                message(7, "alice@example.com", "mine, says alice"),
                message(8, "bob@example.com", "mine, says bob"),
            ])),
        },
        &mut model,
    );

    // Another sender's message cannot even be staged for deletion.
    let _ = app.update(Event::MessageDeleteRequested(MessageId::new(7)), &mut model);
    assert_eq!(model.conversation.as_ref().unwrap().pending_delete, None);
    let update = app.update(Event::MessageDeleteConfirmed, &mut model);
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Http(_))));

    let _ = app.update(Event::MessageDeleteRequested(MessageId::new(8)), &mut model);
    assert_eq!(
        model.conversation.as_ref().unwrap().pending_delete,
        Some(MessageId::new(8))
    );
}

#[test]
fn repeated_delete_confirmation_sends_only_one_request() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in_model("alice@example.com");

    let _ = app.update(
        Event::ConversationOpened {
            conversation_id: ConversationId::new(1),
            listing_id: None,
        },
        &mut model,
    );
    let _ = app.update(
        Event::ThreadFetched {
            conversation_id: ConversationId::new(1),
            result: Box::new(Ok(vec![message(1, "alice@example.com", "a")])),
        },
        &mut model,
    );

    let _ = app.update(Event::MessageDeleteRequested(MessageId::new(1)), &mut model);
    let update = app.update(Event::MessageDeleteConfirmed, &mut model);
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Http(_))));

    // Confirming again while the DELETE is in flight is a no-op.
    let update = app.update(Event::MessageDeleteConfirmed, &mut model);
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Http(_))));

    let _ = app.update(
        Event::MessageDeleted {
            conversation_id: ConversationId::new(1),
            message_id: MessageId::new(1),
            result: Box::new(Ok(())),
        },
        &mut model,
    );
    assert!(model.conversation.as_ref().unwrap().messages.is_empty());
}

#[test]
fn stale_responses_for_a_closed_conversation_are_dropped() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in_model("alice@example.com");

    let _ = app.update(
        Event::ConversationOpened {
            conversation_id: ConversationId::new(1),
            listing_id: None,
        },
        &mut model,
    );
    // The user switches to another conversation before the reply lands.
    let _ = app.update(
        Event::ConversationOpened {
            conversation_id: ConversationId::new(2),
            listing_id: None,
        },
        &mut model,
    );

    let _ = app.update(
        Event::ThreadFetched {
            conversation_id: ConversationId::new(1),
            result: Box::new(Ok(vec![message(1, "bob@example.com", "old thread")])),
        },
        &mut model,
    );

    let state = model.conversation.as_ref().unwrap();
    assert_eq!(state.conversation_id, ConversationId::new(2));
    assert_eq!(state.phase, ThreadPhase::LoadingThread);
    assert!(state.messages.is_empty());

    // Navigating away entirely drops the thread state; late replies are ignored.
    let _ = app.update(Event::NavigateTo(shared::model::Route::Home), &mut model);
    assert!(model.conversation.is_none());
    let _ = app.update(
        Event::ThreadFetched {
            conversation_id: ConversationId::new(2),
            result: Box::new(Ok(vec![])),
        },
        &mut model,
    );
    assert!(model.conversation.is_none());
}

#[test]
fn owner_can_mark_claimed_from_the_thread() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in_model("alice@example.com");

    let _ = app.update(
        Event::ConversationOpened {
            conversation_id: ConversationId::new(1),
            listing_id: Some(ListingId::new(1)),
        },
        &mut model,
    );
    let _ = app.update(
        Event::ThreadFetched {
            conversation_id: ConversationId::new(1),
            result: Box::new(Ok(vec![])),
        },
        &mut model,
    );
    let _ = app.update(
        Event::ThreadListingFetched {
            conversation_id: ConversationId::new(1),
            result: Box::new(Ok(listing_owned_by("alice@example.com", false))),
        },
        &mut model,
    );

    assert!(app.view(&model).thread.unwrap().can_mark_claimed);

    let update = app.update(Event::ThreadClaimRequested, &mut model);
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Http(_))));

    let _ = app.update(
        Event::ThreadClaimCompleted {
            conversation_id: ConversationId::new(1),
            result: Box::new(Ok(listing_owned_by("alice@example.com", true))),
        },
        &mut model,
    );
    assert!(!app.view(&model).thread.unwrap().can_mark_claimed);
}

#[test]
fn non_owner_gets_no_claim_action() {
    let app = AppTester::<App, Effect>::default();
    let mut model = signed_in_model("bob@example.com");

    let _ = app.update(
        Event::ConversationOpened {
            conversation_id: ConversationId::new(1),
            listing_id: Some(ListingId::new(1)),
        },
        &mut model,
    );
    let _ = app.update(
        Event::ThreadFetched {
            conversation_id: ConversationId::new(1),
            result: Box::new(Ok(vec![])),
        },
        &mut model,
    );
    let _ = app.update(
        Event::ThreadListingFetched {
            conversation_id: ConversationId::new(1),
            result: Box::new(Ok(listing_owned_by("alice@example.com", false))),
        },
        &mut model,
    );

    assert!(!app.view(&model).thread.unwrap().can_mark_claimed);

    // The claim event is a no-op for a non-owner.
    let update = app.update(Event::ThreadClaimRequested, &mut model);
    assert!(!update.effects.iter().any(|e| matches!(e, Effect::Http(_))));
}
