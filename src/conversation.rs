//! Open conversation thread.
//!
//! State machine for the message screen. The thread only loads once the
//! caller's identity has been resolved from the token; an unreadable
//! identity blocks the screen permanently. Sends are confirmed by the
//! server echo, never applied optimistically.

use serde::{Deserialize, Serialize};

use crate::identity::CallerIdentity;
use crate::model::{ConversationId, Listing, ListingId, Message, MessageId};
use crate::AppError;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadPhase {
    ResolvingIdentity,
    LoadingThread,
    Ready,
    /// Terminal. Reached when identity or the thread fetch fails; the user
    /// must leave and re-enter the screen.
    Blocked,
}

#[derive(Clone, Debug)]
pub struct ConversationState {
    pub conversation_id: ConversationId,
    pub listing_id: Option<ListingId>,
    pub phase: ThreadPhase,
    pub caller: Option<CallerIdentity>,
    pub messages: Vec<Message>,
    /// The listing this conversation is about, when known; used for owner
    /// detection and the mark-claimed action.
    pub listing: Option<Listing>,
    pub draft: String,
    pub sending: bool,
    pub pending_delete: Option<MessageId>,
    pub blocking_error: Option<AppError>,
}

impl ConversationState {
    #[must_use]
    pub fn open(conversation_id: ConversationId, listing_id: Option<ListingId>) -> Self {
        Self {
            conversation_id,
            listing_id,
            phase: ThreadPhase::ResolvingIdentity,
            caller: None,
            messages: Vec::new(),
            listing: None,
            draft: String::new(),
            sending: false,
            pending_delete: None,
            blocking_error: None,
        }
    }

    pub fn identity_resolved(&mut self, caller: CallerIdentity) {
        if self.phase == ThreadPhase::ResolvingIdentity {
            self.caller = Some(caller);
            self.phase = ThreadPhase::LoadingThread;
        }
    }

    pub fn identity_failed(&mut self, error: AppError) {
        self.phase = ThreadPhase::Blocked;
        self.blocking_error = Some(error);
    }

    pub fn thread_loaded(&mut self, messages: Vec<Message>) {
        if self.phase == ThreadPhase::LoadingThread {
            self.messages = messages;
            self.phase = ThreadPhase::Ready;
        }
    }

    pub fn thread_failed(&mut self, error: AppError) {
        if self.phase == ThreadPhase::LoadingThread {
            self.phase = ThreadPhase::Blocked;
            self.blocking_error = Some(error);
        }
    }

    pub fn listing_loaded(&mut self, listing: Listing) {
        self.listing = Some(listing);
    }

    pub fn begin_send(&mut self) {
        self.sending = true;
    }

    /// Applies the server echo: exactly one message appended, draft cleared.
    pub fn message_sent(&mut self, message: Message) {
        self.messages.push(message);
        self.draft.clear();
        self.sending = false;
    }

    /// A failed send leaves the thread and the draft untouched.
    pub fn send_failed(&mut self) {
        self.sending = false;
    }

    /// Only the caller's own messages are deletable.
    pub fn request_delete(&mut self, message_id: MessageId) {
        let deletable = self
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .is_some_and(|m| self.is_mine(m));
        if deletable {
            self.pending_delete = Some(message_id);
        }
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Removes exactly the confirmed message; no re-fetch.
    pub fn message_deleted(&mut self, message_id: MessageId) {
        self.messages.retain(|m| m.id != message_id);
        self.pending_delete = None;
    }

    pub fn claim_applied(&mut self, listing: Listing) {
        self.listing = Some(listing);
    }

    #[must_use]
    pub fn is_mine(&self, message: &Message) -> bool {
        self.caller
            .as_ref()
            .is_some_and(|c| c.email == message.sender.email)
    }

    /// The caller owns the listing this thread is about.
    #[must_use]
    pub fn caller_owns_listing(&self) -> bool {
        match (&self.caller, &self.listing) {
            (Some(caller), Some(listing)) => listing.owner_email() == Some(caller.email.as_str()),
            _ => false,
        }
    }

    #[must_use]
    pub fn can_mark_claimed(&self) -> bool {
        self.caller_owns_listing() && self.listing.as_ref().is_some_and(|l| !l.claimed)
    }
}
