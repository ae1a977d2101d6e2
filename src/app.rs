//! The application: event loop and view projection.
//!
//! `update` is the only place side effects are requested; everything it
//! delegates to (feed pipeline, conversation transitions, validation) is
//! pure. Responses come back as events carrying a pre-classified
//! `AppResult`, so every arm below only has to branch on Ok/Err.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::api::{
    self, ClaimUpdate, Endpoint, GetOrCreateConversationRequest, HttpMethod, ResetEmailRequest,
};
use crate::capabilities::Capabilities;
use crate::conversation::{ConversationState, ThreadPhase};
use crate::event::Event;
use crate::identity;
use crate::model::{
    Conversation, ConversationId, Listing, ListingId, LoadState, Model, Route, UserId,
};
use crate::{
    current_time_ms, format_time_ago, AppError, AppResult, ErrorKind, TOKEN_STORAGE_KEY,
};

#[derive(Default)]
pub struct App;

// --- View model ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ViewModel {
    pub route: Route,
    pub show_chrome: bool,
    pub authenticated: bool,
    pub feed: FeedViewModel,
    pub detail: Option<DetailViewModel>,
    pub conversations: Option<ConversationsViewModel>,
    pub thread: Option<ThreadViewModel>,
    pub profile: Option<ProfileViewModel>,
    pub busy: BusyFlags,
    pub error: Option<ErrorViewModel>,
    pub toast: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct BusyFlags {
    pub logging_in: bool,
    pub registering: bool,
    pub submitting_listing: bool,
    pub requesting_reset: bool,
    pub verifying: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorViewModel {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ListingCard {
    pub id: ListingId,
    pub title: String,
    pub kind_label: String,
    pub location: String,
    pub posted_ago: String,
    pub photo_path: Option<String>,
    pub claimed: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct FeedViewModel {
    pub items: Vec<ListingCard>,
    pub has_more: bool,
    pub page: usize,
    pub search: String,
    pub loading: bool,
    pub failed: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DetailViewModel {
    pub card: ListingCard,
    pub description: String,
    pub is_mine: bool,
    pub can_mark_claimed: bool,
    pub can_contact: bool,
    pub owner_id: Option<UserId>,
    pub owner_name: Option<String>,
    pub updating: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConversationCard {
    pub id: ConversationId,
    pub title: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ConversationsViewModel {
    pub items: Vec<ConversationCard>,
    pub loading: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MessageViewModel {
    pub id: crate::model::MessageId,
    pub text: String,
    pub sent_ago: String,
    pub is_mine: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ThreadViewModel {
    pub phase: ThreadPhase,
    pub messages: Vec<MessageViewModel>,
    pub draft: String,
    pub sending: bool,
    pub can_send: bool,
    pub can_mark_claimed: bool,
    pub pending_delete: Option<crate::model::MessageId>,
    pub blocked_message: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProfileViewModel {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: Option<u32>,
    pub saving: bool,
    pub my_listings: Vec<ListingCard>,
}

// --- Response adapters ---
//
// Capability callbacks run these so the events that re-enter `update`
// already carry classified results.

fn transport_error(e: &crux_http::HttpError) -> AppError {
    AppError::new(ErrorKind::Network, "Unable to reach the server.")
        .with_internal(e.to_string())
}

fn decode<T: DeserializeOwned>(
    result: crux_http::Result<crux_http::Response<Vec<u8>>>,
) -> AppResult<T> {
    let mut response = result.map_err(|e| transport_error(&e))?;
    let status = u16::from(response.status());
    let body = response.take_body().unwrap_or_default();
    api::decode_response(status, &body)
}

fn accept(result: crux_http::Result<crux_http::Response<Vec<u8>>>) -> AppResult<()> {
    let mut response = result.map_err(|e| transport_error(&e))?;
    let status = u16::from(response.status());
    let body = response.take_body().unwrap_or_default();
    api::check_status(status, &body)
}

fn json_body<T: Serialize>(value: &T) -> AppResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        AppError::new(ErrorKind::Serialization, "Could not encode the request.")
            .with_internal(e.to_string())
    })
}

/// Builds and dispatches one backend request. The bearer header is attached
/// for authenticated endpoints when a token is present; a missing token is
/// logged and the request goes out anyway, to be rejected as unauthorized.
fn send_api<F>(
    model: &Model,
    caps: &Capabilities,
    endpoint: &Endpoint,
    body: Option<Vec<u8>>,
    make_event: F,
) where
    F: FnOnce(crux_http::Result<crux_http::Response<Vec<u8>>>) -> Event + Send + 'static,
{
    let url = model.api.url_for(endpoint);
    tracing::debug!(method = ?endpoint.method(), url = %url, "api request");

    let mut builder = match endpoint.method() {
        HttpMethod::Get => caps.http.get(&url),
        HttpMethod::Post => caps.http.post(&url),
        HttpMethod::Put => caps.http.put(&url),
        HttpMethod::Delete => caps.http.delete(&url),
    };

    builder = builder.header("Content-Type", "application/json");

    if endpoint.requires_auth() {
        if let Some(token) = model.session.bearer() {
            let bearer = format!("Bearer {token}");
            builder = builder.header("Authorization", bearer.as_str());
        } else {
            tracing::warn!(path = %endpoint.path(), "authenticated call without a token");
        }
    }

    if let Some(body) = body {
        builder = builder.body_bytes(body);
    }

    builder.send(make_event);
}

impl App {
    /// Decodes the caller identity from the current session token.
    fn caller_email(model: &Model) -> Option<String> {
        model
            .session
            .bearer()
            .and_then(|token| identity::decode_caller(token).ok())
            .map(|caller| caller.email)
    }

    /// Moves the open conversation out of `ResolvingIdentity`, issuing the
    /// thread fetch (and the listing fetch for owner detection) when the
    /// identity is readable, blocking the screen otherwise.
    fn resolve_identity_and_load(model: &mut Model, caps: &Capabilities) {
        let identity = match model.session.bearer() {
            None => Err(AppError::new(
                ErrorKind::Authentication,
                "You are not signed in.",
            )),
            Some(token) => identity::decode_caller(token).map_err(|e| {
                AppError::new(
                    ErrorKind::Authentication,
                    "Your session could not be read. Please sign in again.",
                )
                .with_internal(e.to_string())
            }),
        };

        let (conversation_id, listing_id) = {
            let Some(state) = model.conversation.as_mut() else {
                return;
            };
            match identity {
                Ok(caller) => state.identity_resolved(caller),
                Err(error) => {
                    state.identity_failed(error);
                    return;
                }
            }
            (state.conversation_id, state.listing_id)
        };

        send_api(
            model,
            caps,
            &Endpoint::Thread(conversation_id),
            None,
            move |result| Event::ThreadFetched {
                conversation_id,
                result: Box::new(decode(result)),
            },
        );

        if let Some(listing_id) = listing_id {
            send_api(
                model,
                caps,
                &Endpoint::Listing(listing_id),
                None,
                move |result| Event::ThreadListingFetched {
                    conversation_id,
                    result: Box::new(decode(result)),
                },
            );
        }
    }

    fn open_conversation(
        model: &mut Model,
        caps: &Capabilities,
        conversation_id: ConversationId,
        listing_id: Option<ListingId>,
    ) {
        model.conversation = Some(ConversationState::open(conversation_id, listing_id));
        model.route = Route::Conversation;
        Self::resolve_identity_and_load(model, caps);
    }

    fn fetch_listings(model: &mut Model, caps: &Capabilities) {
        model.feed.load = LoadState::Loading;
        send_api(model, caps, &Endpoint::Listings, None, |result| {
            Event::ListingsFetched(Box::new(decode(result)))
        });
    }

    /// Redirects unauthenticated access to the entry route. Returns whether
    /// the caller may proceed.
    fn guard(model: &mut Model, route: Route) -> bool {
        if route.requires_auth() && !model.is_authenticated() {
            tracing::debug!(?route, "unauthenticated access redirected");
            model.route = Route::Landing;
            return false;
        }
        model.route = route;
        true
    }

    /// The open conversation, but only if the response belongs to it. Stale
    /// responses for a thread the user has left are dropped here.
    fn matching_conversation(
        model: &mut Model,
        conversation_id: ConversationId,
    ) -> Option<&mut ConversationState> {
        match model.conversation.as_mut() {
            Some(state) if state.conversation_id == conversation_id => Some(state),
            _ => {
                tracing::debug!(%conversation_id, "dropping response for a closed conversation");
                None
            }
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        match event {
            // --- Lifecycle ---
            Event::AppStarted => {
                caps.key_value.get(TOKEN_STORAGE_KEY.to_string(), |result| {
                    Event::TokenLoaded(result.ok().flatten())
                });
            }

            Event::TokenLoaded(stored) => {
                model.session.init(stored);
                model.caller_email = Self::caller_email(model);
                model.route = if model.is_authenticated() {
                    Route::Home
                } else {
                    Route::Landing
                };
            }

            Event::TokenPersisted(ok) => {
                if !ok {
                    tracing::warn!("token write to device storage failed");
                    model.set_error(AppError::new(
                        ErrorKind::Storage,
                        "Could not save your session on this device.",
                    ));
                }
            }

            // --- Navigation & surfaces ---
            Event::NavigateTo(route) => {
                Self::guard(model, route);
                if route != Route::Conversation {
                    model.conversation = None;
                }
            }

            Event::ErrorDismissed => model.active_error = None,
            Event::ToastDismissed => model.toast = None,

            // --- Auth ---
            Event::LoginSubmitted { email, password } => {
                match api::validate_login(&email, &password) {
                    Err(error) => model.set_error(error),
                    Ok(request) => match json_body(&request) {
                        Err(error) => model.set_error(error),
                        Ok(body) => {
                            model.logging_in = true;
                            send_api(model, caps, &Endpoint::Login, Some(body), |result| {
                                Event::LoggedIn(Box::new(decode(result)))
                            });
                        }
                    },
                }
            }

            Event::LoggedIn(result) => {
                model.logging_in = false;
                match *result {
                    Ok(response) => {
                        model.session.set_token(response.token.clone());
                        model.caller_email = Self::caller_email(model);
                        model.route = Route::Home;
                        caps.key_value.set(
                            TOKEN_STORAGE_KEY.to_string(),
                            response.token.into_bytes(),
                            |result| Event::TokenPersisted(result.is_ok()),
                        );
                    }
                    Err(error) => model.set_error(error),
                }
            }

            Event::LogoutRequested => {
                model.session.clear();
                model.caller_email = None;
                model.conversation = None;
                model.route = Route::Landing;
                caps.key_value.delete(TOKEN_STORAGE_KEY.to_string(), |result| {
                    Event::TokenPersisted(result.is_ok())
                });
            }

            Event::RegisterSubmitted(form) => match form.validate() {
                Err(error) => model.set_error(error),
                Ok(request) => match json_body(&request) {
                    Err(error) => model.set_error(error),
                    Ok(body) => {
                        model.registering = true;
                        send_api(model, caps, &Endpoint::Register, Some(body), |result| {
                            Event::Registered(Box::new(accept(result)))
                        });
                    }
                },
            },

            Event::Registered(result) => {
                model.registering = false;
                match *result {
                    Ok(()) => {
                        model.route = Route::Login;
                        model.set_toast("Account created. Check your email to activate it.");
                    }
                    Err(error) => model.set_error(error),
                }
            }

            Event::PasswordResetRequested { email } => {
                if email.trim().is_empty() {
                    model.set_error(AppError::new(
                        ErrorKind::Validation,
                        "Please enter your email address.",
                    ));
                } else {
                    let request = ResetEmailRequest {
                        email: email.trim().to_string(),
                    };
                    match json_body(&request) {
                        Err(error) => model.set_error(error),
                        Ok(body) => {
                            model.requesting_reset = true;
                            send_api(model, caps, &Endpoint::RequestReset, Some(body), |result| {
                                Event::PasswordResetRequestCompleted(Box::new(accept(result)))
                            });
                        }
                    }
                }
            }

            Event::PasswordResetRequestCompleted(result) => {
                model.requesting_reset = false;
                match *result {
                    Ok(()) => {
                        model.set_toast("If that address has an account, a reset email is on its way.");
                    }
                    Err(error) => model.set_error(error),
                }
            }

            Event::PasswordResetSubmitted {
                token,
                password,
                confirm,
            } => match api::validate_reset(&token, &password, &confirm) {
                Err(error) => model.set_error(error),
                Ok(request) => match json_body(&request) {
                    Err(error) => model.set_error(error),
                    Ok(body) => {
                        model.requesting_reset = true;
                        send_api(model, caps, &Endpoint::ResetPassword, Some(body), |result| {
                            Event::PasswordResetCompleted(Box::new(accept(result)))
                        });
                    }
                },
            },

            Event::PasswordResetCompleted(result) => {
                model.requesting_reset = false;
                match *result {
                    Ok(()) => {
                        model.route = Route::Login;
                        model.set_toast("Password updated. You can now sign in.");
                    }
                    Err(error) => model.set_error(error),
                }
            }

            Event::VerifySubmitted { token } => {
                model.verifying = true;
                send_api(model, caps, &Endpoint::Verify { token }, None, |result| {
                    Event::VerifyCompleted(Box::new(accept(result)))
                });
            }

            Event::VerifyCompleted(result) => {
                model.verifying = false;
                match *result {
                    Ok(()) => {
                        model.route = Route::Login;
                        model.set_toast("Account activated. You can now sign in.");
                    }
                    Err(error) => model.set_error(error),
                }
            }

            // --- Browse feed ---
            Event::BrowseOpened => {
                if Self::guard(model, Route::Browse) {
                    Self::fetch_listings(model, caps);
                }
            }

            Event::ListingsFetched(result) => match *result {
                Ok(listings) => model.feed.ingest(listings),
                Err(error) => {
                    model.feed.load = LoadState::Failed;
                    model.set_error(error);
                }
            },

            Event::SearchChanged(search) => model.feed.set_search(search),
            Event::FilterChanged(filter) => model.feed.set_filter(filter),
            Event::SortChanged(sort) => model.feed.set_sort(sort),
            Event::NextPage => model.feed.next_page(),
            Event::PreviousPage => model.feed.previous_page(),

            // --- Listing lifecycle ---
            Event::ListingOpened(id) => {
                if Self::guard(model, Route::ListingDetail) {
                    model.detail = crate::model::DetailState {
                        listing_id: Some(id),
                        listing: None,
                        load: LoadState::Loading,
                        updating: false,
                    };
                    send_api(model, caps, &Endpoint::Listing(id), None, |result| {
                        Event::ListingFetched(Box::new(decode(result)))
                    });
                }
            }

            Event::ListingFetched(result) => match *result {
                // A response for a listing the user has navigated away from
                // must not overwrite the current detail screen.
                Ok(listing) if model.detail.listing_id == Some(listing.id) => {
                    model.detail.listing = Some(listing);
                    model.detail.load = LoadState::Loaded;
                }
                Ok(listing) => {
                    tracing::debug!(id = %listing.id, "dropping response for a closed detail screen");
                }
                Err(error) => {
                    model.detail.load = LoadState::Failed;
                    model.set_error(error);
                }
            },

            Event::ListingFormSubmitted(draft) => match draft.validate(Utc::now()) {
                Err(error) => model.set_error(error),
                Ok(request) => match json_body(&request) {
                    Err(error) => model.set_error(error),
                    Ok(body) => {
                        model.submitting_listing = true;
                        send_api(model, caps, &Endpoint::CreateListing, Some(body), |result| {
                            Event::ListingCreated(Box::new(decode(result)))
                        });
                    }
                },
            },

            Event::ListingCreated(result) => {
                model.submitting_listing = false;
                match *result {
                    Ok(_listing) => {
                        model.set_toast("Listing published.");
                        model.route = Route::Browse;
                        Self::fetch_listings(model, caps);
                    }
                    Err(error) => model.set_error(error),
                }
            }

            Event::ListingEditSubmitted { id, draft } => match draft.validate(Utc::now()) {
                Err(error) => model.set_error(error),
                Ok(request) => match json_body(&request) {
                    Err(error) => model.set_error(error),
                    Ok(body) => {
                        model.detail.updating = true;
                        send_api(model, caps, &Endpoint::UpdateListing(id), Some(body), |result| {
                            Event::ListingUpdated(Box::new(decode(result)))
                        });
                    }
                },
            },

            Event::ListingUpdated(result) => {
                model.detail.updating = false;
                match *result {
                    Ok(listing) => {
                        model.route = Route::ListingDetail;
                        model.detail.listing = Some(listing);
                        model.detail.load = LoadState::Loaded;
                        model.set_toast("Listing updated.");
                    }
                    Err(error) => model.set_error(error),
                }
            }

            Event::ListingDeleteRequested(id) => {
                model.detail.updating = true;
                send_api(
                    model,
                    caps,
                    &Endpoint::DeleteListing(id),
                    None,
                    move |result| Event::ListingDeleted {
                        id,
                        result: Box::new(accept(result)),
                    },
                );
            }

            Event::ListingDeleted { id, result } => {
                model.detail.updating = false;
                match *result {
                    Ok(()) => {
                        model.profile.my_listings.retain(|l| l.id != id);
                        model.detail = crate::model::DetailState::default();
                        model.set_toast("Listing deleted.");
                        model.route = Route::Browse;
                        Self::fetch_listings(model, caps);
                    }
                    Err(error) => model.set_error(error),
                }
            }

            Event::ClaimRequested(id) => match json_body(&ClaimUpdate { claimed: true }) {
                Err(error) => model.set_error(error),
                Ok(body) => {
                    model.detail.updating = true;
                    send_api(
                        model,
                        caps,
                        &Endpoint::UpdateListing(id),
                        Some(body),
                        move |result| Event::ClaimCompleted {
                            id,
                            result: Box::new(decode(result)),
                        },
                    );
                }
            },

            Event::ClaimCompleted { id, result } => {
                model.detail.updating = false;
                match *result {
                    Ok(listing) => {
                        if model.detail.listing_id == Some(id) {
                            model.detail.listing = Some(listing);
                        }
                        model.set_toast("Marked as claimed.");
                    }
                    Err(error) => model.set_error(error),
                }
            }

            Event::MyListingsFetched(result) => match *result {
                Ok(listings) => model.profile.my_listings = listings,
                Err(error) => model.set_error(error),
            },

            // --- Contact owner ---
            Event::ContactOwnerRequested { owner_id } => {
                let request = GetOrCreateConversationRequest { user2_id: owner_id };
                match json_body(&request) {
                    Err(error) => model.set_error(error),
                    Ok(body) => {
                        send_api(
                            model,
                            caps,
                            &Endpoint::GetOrCreateConversation,
                            Some(body),
                            |result| Event::ConversationResolved(Box::new(decode(result))),
                        );
                    }
                }
            }

            Event::ConversationResolved(result) => match *result {
                Ok(conversation) => {
                    let listing_id = model.detail.listing_id;
                    Self::open_conversation(model, caps, conversation.id, listing_id);
                }
                Err(error) => model.set_error(error),
            },

            // --- Conversations list ---
            Event::ConversationsOpened => {
                if Self::guard(model, Route::Conversations) {
                    model.conversations.load = LoadState::Loading;
                    send_api(model, caps, &Endpoint::Conversations, None, |result| {
                        Event::ConversationsFetched(Box::new(decode(result)))
                    });
                }
            }

            Event::ConversationsFetched(result) => match *result {
                Ok(conversations) => {
                    model.conversations.conversations = conversations;
                    model.conversations.load = LoadState::Loaded;
                }
                Err(error) => {
                    model.conversations.load = LoadState::Failed;
                    model.set_error(error);
                }
            },

            // --- Open conversation thread ---
            Event::ConversationOpened {
                conversation_id,
                listing_id,
            } => {
                if Self::guard(model, Route::Conversation) {
                    Self::open_conversation(model, caps, conversation_id, listing_id);
                } else {
                    model.conversation = None;
                }
            }

            Event::ThreadFetched {
                conversation_id,
                result,
            } => {
                if let Some(state) = Self::matching_conversation(model, conversation_id) {
                    match *result {
                        Ok(messages) => state.thread_loaded(messages),
                        Err(error) => state.thread_failed(error),
                    }
                }
            }

            Event::ThreadListingFetched {
                conversation_id,
                result,
            } => {
                if let Some(state) = Self::matching_conversation(model, conversation_id) {
                    match *result {
                        Ok(listing) => state.listing_loaded(listing),
                        // Owner detection is best-effort; the thread stays usable.
                        Err(error) => {
                            tracing::warn!(code = error.code(), "listing fetch for thread failed");
                        }
                    }
                }
            }

            Event::DraftChanged(text) => {
                if let Some(state) = model.conversation.as_mut() {
                    state.draft = text;
                }
            }

            Event::SendRequested => {
                let prepared = model.conversation.as_ref().and_then(|state| {
                    (state.phase == ThreadPhase::Ready && !state.sending)
                        .then(|| (state.conversation_id, api::validate_message(&state.draft)))
                });
                match prepared {
                    None => {}
                    Some((_, Err(error))) => model.set_error(error),
                    Some((conversation_id, Ok(request))) => match json_body(&request) {
                        Err(error) => model.set_error(error),
                        Ok(body) => {
                            if let Some(state) = model.conversation.as_mut() {
                                state.begin_send();
                            }
                            send_api(
                                model,
                                caps,
                                &Endpoint::SendMessage(conversation_id),
                                Some(body),
                                move |result| Event::MessageSent {
                                    conversation_id,
                                    result: Box::new(decode(result)),
                                },
                            );
                        }
                    },
                }
            }

            Event::MessageSent {
                conversation_id,
                result,
            } => {
                if let Some(state) = Self::matching_conversation(model, conversation_id) {
                    match *result {
                        Ok(message) => state.message_sent(message),
                        Err(error) => {
                            state.send_failed();
                            model.set_error(error);
                        }
                    }
                }
            }

            Event::MessageDeleteRequested(message_id) => {
                if let Some(state) = model.conversation.as_mut() {
                    state.request_delete(message_id);
                }
            }

            Event::MessageDeleteCancelled => {
                if let Some(state) = model.conversation.as_mut() {
                    state.cancel_delete();
                }
            }

            Event::MessageDeleteConfirmed => {
                // Taking the pending id makes a repeated confirm a no-op
                // while the DELETE is in flight.
                let pending = model
                    .conversation
                    .as_mut()
                    .and_then(|state| state.pending_delete.take().map(|id| (state.conversation_id, id)));
                if let Some((conversation_id, message_id)) = pending {
                    send_api(
                        model,
                        caps,
                        &Endpoint::DeleteMessage(message_id),
                        None,
                        move |result| Event::MessageDeleted {
                            conversation_id,
                            message_id,
                            result: Box::new(accept(result)),
                        },
                    );
                }
            }

            Event::MessageDeleted {
                conversation_id,
                message_id,
                result,
            } => {
                if let Some(state) = Self::matching_conversation(model, conversation_id) {
                    match *result {
                        Ok(()) => state.message_deleted(message_id),
                        Err(error) => {
                            state.cancel_delete();
                            model.set_error(error);
                        }
                    }
                }
            }

            Event::ThreadClaimRequested => {
                let target = model.conversation.as_ref().and_then(|state| {
                    state
                        .can_mark_claimed()
                        .then(|| state.listing.as_ref().map(|l| (state.conversation_id, l.id)))
                        .flatten()
                });
                if let Some((conversation_id, listing_id)) = target {
                    match json_body(&ClaimUpdate { claimed: true }) {
                        Err(error) => model.set_error(error),
                        Ok(body) => {
                            send_api(
                                model,
                                caps,
                                &Endpoint::UpdateListing(listing_id),
                                Some(body),
                                move |result| Event::ThreadClaimCompleted {
                                    conversation_id,
                                    result: Box::new(decode(result)),
                                },
                            );
                        }
                    }
                }
            }

            Event::ThreadClaimCompleted {
                conversation_id,
                result,
            } => {
                if let Some(state) = Self::matching_conversation(model, conversation_id) {
                    match *result {
                        Ok(listing) => {
                            state.claim_applied(listing);
                            model.set_toast("Marked as claimed.");
                        }
                        Err(error) => model.set_error(error),
                    }
                }
            }

            // --- Profile ---
            Event::ProfileOpened => {
                if Self::guard(model, Route::Profile) {
                    model.profile.load = LoadState::Loading;
                    send_api(model, caps, &Endpoint::Me, None, |result| {
                        Event::ProfileFetched(Box::new(decode(result)))
                    });
                    send_api(model, caps, &Endpoint::MyListings, None, |result| {
                        Event::MyListingsFetched(Box::new(decode(result)))
                    });
                }
            }

            Event::MyListingsOpened => {
                send_api(model, caps, &Endpoint::MyListings, None, |result| {
                    Event::MyListingsFetched(Box::new(decode(result)))
                });
            }

            Event::ProfileFetched(result) => match *result {
                Ok(user) => {
                    model.profile.user = Some(user);
                    model.profile.load = LoadState::Loaded;
                }
                Err(error) => {
                    model.profile.load = LoadState::Failed;
                    model.set_error(error);
                }
            },

            Event::ProfileSaveSubmitted(form) => {
                let user_id = model.profile.user.as_ref().map(|u| u.id);
                match user_id {
                    None => model.set_error(AppError::new(
                        ErrorKind::InvalidState,
                        "Your profile has not loaded yet.",
                    )),
                    Some(id) => match form.validate() {
                        Err(error) => model.set_error(error),
                        Ok(request) => match json_body(&request) {
                            Err(error) => model.set_error(error),
                            Ok(body) => {
                                model.profile.saving = true;
                                send_api(
                                    model,
                                    caps,
                                    &Endpoint::UpdateUser(id),
                                    Some(body),
                                    |result| Event::ProfileSaved(Box::new(decode(result))),
                                );
                            }
                        },
                    },
                }
            }

            Event::ProfileSaved(result) => {
                model.profile.saving = false;
                match *result {
                    Ok(user) => {
                        model.profile.user = Some(user);
                        model.route = Route::Profile;
                        model.set_toast("Profile updated.");
                    }
                    Err(error) => model.set_error(error),
                }
            }
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        let now = current_time_ms();
        let authenticated = model.is_authenticated();

        let page = model.feed.page();
        let feed = FeedViewModel {
            items: page.items.iter().map(|l| listing_card(l, now)).collect(),
            has_more: page.has_more,
            page: model.feed.query.page,
            search: model.feed.query.search.clone(),
            loading: model.feed.load.is_loading(),
            failed: model.feed.load == LoadState::Failed,
        };

        let detail = model.detail.listing.as_ref().map(|listing| {
            let is_mine = match (&model.caller_email, listing.owner_email()) {
                (Some(caller), Some(owner)) => caller == owner,
                _ => false,
            };
            DetailViewModel {
                card: listing_card(listing, now),
                description: listing.description.clone(),
                is_mine,
                can_mark_claimed: is_mine && !listing.claimed,
                can_contact: !is_mine && listing.owner.is_some(),
                owner_id: listing.owner.as_ref().map(|o| o.id),
                owner_name: listing.owner.as_ref().map(crate::model::User::display_name),
                updating: model.detail.updating,
            }
        });

        let conversations = (model.route == Route::Conversations).then(|| {
            let caller = model.caller_email.as_deref().unwrap_or_default();
            ConversationsViewModel {
                items: model
                    .conversations
                    .conversations
                    .iter()
                    .map(|c| ConversationCard {
                        id: c.id,
                        title: conversation_title(c, caller),
                    })
                    .collect(),
                loading: model.conversations.load.is_loading(),
            }
        });

        let thread = model.conversation.as_ref().map(|state| ThreadViewModel {
            phase: state.phase,
            messages: state
                .messages
                .iter()
                .map(|m| MessageViewModel {
                    id: m.id,
                    text: m.text.clone(),
                    sent_ago: format_time_ago(timestamp_ms(m.sent_at), now),
                    is_mine: state.is_mine(m),
                })
                .collect(),
            draft: state.draft.clone(),
            sending: state.sending,
            can_send: state.phase == ThreadPhase::Ready
                && !state.sending
                && !state.draft.trim().is_empty(),
            can_mark_claimed: state.can_mark_claimed(),
            pending_delete: state.pending_delete,
            blocked_message: state
                .blocking_error
                .as_ref()
                .map(AppError::user_facing_message),
        });

        let profile = model.profile.user.as_ref().map(|user| ProfileViewModel {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            age: user.age,
            saving: model.profile.saving,
            my_listings: model
                .profile
                .my_listings
                .iter()
                .map(|l| listing_card(l, now))
                .collect(),
        });

        ViewModel {
            route: model.route,
            show_chrome: model.route.has_chrome() && authenticated,
            authenticated,
            feed,
            detail,
            conversations,
            thread,
            profile,
            busy: BusyFlags {
                logging_in: model.logging_in,
                registering: model.registering,
                submitting_listing: model.submitting_listing,
                requesting_reset: model.requesting_reset,
                verifying: model.verifying,
            },
            error: model.active_error.as_ref().map(|e| ErrorViewModel {
                code: e.code().to_string(),
                message: e.user_facing_message(),
                retryable: e.is_retryable(),
            }),
            toast: model.toast.clone(),
        }
    }
}

fn timestamp_ms(date: chrono::DateTime<Utc>) -> u64 {
    u64::try_from(date.timestamp_millis()).unwrap_or(0)
}

fn listing_card(listing: &Listing, now: u64) -> ListingCard {
    ListingCard {
        id: listing.id,
        title: listing
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Unnamed item".to_string()),
        kind_label: listing.kind.label().to_string(),
        location: listing.location.clone(),
        posted_ago: format_time_ago(timestamp_ms(listing.date), now),
        photo_path: listing.photo_path.clone(),
        claimed: listing.claimed,
    }
}

fn conversation_title(conversation: &Conversation, caller_email: &str) -> String {
    let other = conversation.other_participant(caller_email);
    let name = other.display_name();
    if name.trim().is_empty() {
        other.email.clone()
    } else {
        name
    }
}
