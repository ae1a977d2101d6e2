use serde::{Deserialize, Serialize};

use crate::api::{ListingDraft, LoginResponse, ProfileForm, RegisterForm};
use crate::feed::{SortOrder, TypeFilter};
use crate::model::{
    Conversation, ConversationId, Listing, ListingId, Message, MessageId, Route, User, UserId,
};
use crate::AppResult;

// Large payloads are boxed so the enum stays small; the size guard below
// keeps us honest.

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Lifecycle
    AppStarted,
    TokenLoaded(Option<Vec<u8>>),
    TokenPersisted(bool),

    // Navigation & surfaces
    NavigateTo(Route),
    ErrorDismissed,
    ToastDismissed,

    // Auth
    LoginSubmitted {
        email: String,
        password: String,
    },
    LoggedIn(Box<AppResult<LoginResponse>>),
    LogoutRequested,
    RegisterSubmitted(Box<RegisterForm>),
    Registered(Box<AppResult<()>>),
    PasswordResetRequested {
        email: String,
    },
    PasswordResetRequestCompleted(Box<AppResult<()>>),
    PasswordResetSubmitted {
        token: String,
        password: String,
        confirm: String,
    },
    PasswordResetCompleted(Box<AppResult<()>>),
    VerifySubmitted {
        token: String,
    },
    VerifyCompleted(Box<AppResult<()>>),

    // Browse feed
    BrowseOpened,
    ListingsFetched(Box<AppResult<Vec<Listing>>>),
    SearchChanged(String),
    FilterChanged(TypeFilter),
    SortChanged(SortOrder),
    NextPage,
    PreviousPage,

    // Listing lifecycle
    ListingOpened(ListingId),
    ListingFetched(Box<AppResult<Listing>>),
    ListingFormSubmitted(Box<ListingDraft>),
    ListingCreated(Box<AppResult<Listing>>),
    ListingEditSubmitted {
        id: ListingId,
        draft: Box<ListingDraft>,
    },
    ListingUpdated(Box<AppResult<Listing>>),
    ListingDeleteRequested(ListingId),
    ListingDeleted {
        id: ListingId,
        result: Box<AppResult<()>>,
    },
    ClaimRequested(ListingId),
    ClaimCompleted {
        id: ListingId,
        result: Box<AppResult<Listing>>,
    },
    MyListingsFetched(Box<AppResult<Vec<Listing>>>),

    // Contact owner (get-or-create conversation from a listing)
    ContactOwnerRequested {
        owner_id: UserId,
    },
    ConversationResolved(Box<AppResult<Conversation>>),

    // Conversations list
    ConversationsOpened,
    ConversationsFetched(Box<AppResult<Vec<Conversation>>>),

    // Open conversation thread
    ConversationOpened {
        conversation_id: ConversationId,
        listing_id: Option<ListingId>,
    },
    ThreadFetched {
        conversation_id: ConversationId,
        result: Box<AppResult<Vec<Message>>>,
    },
    ThreadListingFetched {
        conversation_id: ConversationId,
        result: Box<AppResult<Listing>>,
    },
    DraftChanged(String),
    SendRequested,
    MessageSent {
        conversation_id: ConversationId,
        result: Box<AppResult<Message>>,
    },
    MessageDeleteRequested(MessageId),
    MessageDeleteConfirmed,
    MessageDeleteCancelled,
    MessageDeleted {
        conversation_id: ConversationId,
        message_id: MessageId,
        result: Box<AppResult<()>>,
    },
    ThreadClaimRequested,
    ThreadClaimCompleted {
        conversation_id: ConversationId,
        result: Box<AppResult<Listing>>,
    },

    // Profile
    ProfileOpened,
    ProfileFetched(Box<AppResult<User>>),
    MyListingsOpened,
    ProfileSaveSubmitted(Box<ProfileForm>),
    ProfileSaved(Box<AppResult<User>>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_size_is_reasonable() {
        // Ensure boxing keeps the enum small.
        let size = std::mem::size_of::<Event>();
        assert!(
            size <= 128,
            "Event enum is {size} bytes, box more variants"
        );
    }

    #[test]
    fn events_round_trip_through_serde() {
        let events = vec![
            Event::AppStarted,
            Event::TokenLoaded(Some(b"tok".to_vec())),
            Event::NavigateTo(Route::Browse),
            Event::SearchChanged("wallet".into()),
            Event::ListingOpened(ListingId::new(3)),
        ];

        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let back: Event = serde_json::from_str(&json).unwrap();
            assert_eq!(back, event);
        }
    }
}
