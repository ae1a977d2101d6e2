use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::ApiConfig;
use crate::conversation::ConversationState;
use crate::feed::FeedState;
use crate::session::Session;
use crate::AppError;

// --- Typed ids ---
//
// The backend hands out numeric ids everywhere; wrap them so a listing id
// can never be passed where a conversation id is expected.

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(
            Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn value(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

typed_id!(UserId);
typed_id!(ListingId);
typed_id!(ConversationId);
typed_id!(MessageId);

// --- Wire entities ---
//
// Field names mirror the backend's JSON (French) via serde renames; the
// Rust side stays English.

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    #[serde(rename = "nom")]
    pub last_name: String,
    #[serde(rename = "prenom")]
    pub first_name: String,
    pub email: String,
    #[serde(default)]
    pub age: Option<u32>,
}

impl User {
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

/// Lost or found. The backend speaks French on the wire.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListingKind {
    #[serde(rename = "PERDU")]
    Lost,
    #[serde(rename = "TROUVE")]
    Found,
}

impl ListingKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Lost => "Lost",
            Self::Found => "Found",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Listing {
    pub id: ListingId,
    #[serde(default)]
    pub name: Option<String>,
    pub description: String,
    /// Device-local file path written by the shell's photo pipeline; opaque
    /// to the core.
    #[serde(rename = "photoPath", default)]
    pub photo_path: Option<String>,
    /// Free text or a "lat,lng" string, depending on how it was entered.
    #[serde(rename = "localisation")]
    pub location: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: ListingKind,
    #[serde(rename = "reclame", default)]
    pub claimed: bool,
    #[serde(default)]
    pub owner: Option<User>,
}

impl Listing {
    #[must_use]
    pub fn owner_email(&self) -> Option<&str> {
        self.owner.as_ref().map(|o| o.email.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(rename = "nom", default)]
    pub name: Option<String>,
    pub user1: User,
    pub user2: User,
}

impl Conversation {
    /// The participant that is not the caller. Falls back to `user2` if the
    /// caller matches neither (the server should not let that happen).
    #[must_use]
    pub fn other_participant(&self, caller_email: &str) -> &User {
        if self.user1.email == caller_email {
            &self.user2
        } else {
            &self.user1
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MessageSender {
    pub email: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub sender: MessageSender,
    #[serde(rename = "contenu")]
    pub text: String,
    #[serde(rename = "dateEnvoi")]
    pub sent_at: DateTime<Utc>,
}

// --- Navigation ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Route {
    #[default]
    Landing,
    Login,
    Register,
    ForgotPassword,
    ResetPassword,
    Verify,
    Legal,
    Home,
    Browse,
    ListingDetail,
    ListingForm,
    ListingEdit,
    Conversations,
    Conversation,
    Profile,
    EditProfile,
}

impl Route {
    #[must_use]
    pub const fn requires_auth(self) -> bool {
        !matches!(
            self,
            Self::Landing
                | Self::Login
                | Self::Register
                | Self::ForgotPassword
                | Self::ResetPassword
                | Self::Verify
                | Self::Legal
        )
    }

    /// Header and footer are only drawn once the user is inside the app.
    #[must_use]
    pub const fn has_chrome(self) -> bool {
        self.requires_auth()
    }
}

// --- Per-screen state ---

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    /// Terminal: the screen shows the failure and offers no automatic retry.
    Failed,
}

impl LoadState {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

#[derive(Clone, Debug, Default)]
pub struct DetailState {
    pub listing_id: Option<ListingId>,
    pub listing: Option<Listing>,
    pub load: LoadState,
    pub updating: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ProfileState {
    pub user: Option<User>,
    pub my_listings: Vec<Listing>,
    pub load: LoadState,
    pub saving: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ConversationsState {
    pub conversations: Vec<Conversation>,
    pub load: LoadState,
}

// --- Model ---

#[derive(Default)]
pub struct Model {
    pub api: ApiConfig,
    pub session: Session,
    pub route: Route,

    /// Caller email decoded from the token's subject claim; set whenever a
    /// token is installed, cleared on logout.
    pub caller_email: Option<String>,

    pub feed: FeedState,
    pub detail: DetailState,
    pub profile: ProfileState,
    pub conversations: ConversationsState,
    pub conversation: Option<ConversationState>,

    // In-flight flags for the form screens (drafts live in the shell; the
    // conversation draft is the exception and lives in ConversationState).
    pub logging_in: bool,
    pub registering: bool,
    pub submitting_listing: bool,
    pub requesting_reset: bool,
    pub verifying: bool,

    pub active_error: Option<AppError>,
    pub toast: Option<String>,
}

impl Model {
    #[must_use]
    pub fn new(api: ApiConfig) -> Self {
        Self {
            api,
            ..Self::default()
        }
    }

    pub fn set_error(&mut self, error: AppError) {
        tracing::warn!(code = error.code(), "surfacing error: {error}");
        self.active_error = Some(error);
    }

    pub fn set_toast(&mut self, message: impl Into<String>) {
        self.toast = Some(message.into());
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }
}
