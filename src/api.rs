//! Backend API surface.
//!
//! Pure request description and response classification. The update loop
//! turns an [`Endpoint`] into a `crux_http` request; nothing here performs
//! I/O. Wire field names are the backend's (French), mapped via serde.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::{ConversationId, ListingId, ListingKind, MessageId, UserId};
use crate::{AppError, AppResult, ErrorKind, MAX_DESCRIPTION_LENGTH, MAX_MESSAGE_LENGTH};

pub const DEFAULT_API_BASE: &str = "https://api.trouvaille.app";

/// Validated backend base URL. Construction is the only place the URL is
/// checked, so every endpoint join afterwards is infallible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    base: Url,
}

impl ApiConfig {
    pub fn new(base: &str) -> AppResult<Self> {
        let url = Url::parse(base).map_err(|e| {
            AppError::new(ErrorKind::Validation, format!("invalid base URL: {e}"))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AppError::new(
                ErrorKind::Validation,
                format!("base URL must be http(s), got {}", url.scheme()),
            ));
        }
        if url.host_str().is_none() {
            return Err(AppError::new(ErrorKind::Validation, "base URL has no host"));
        }

        Ok(Self { base: url })
    }

    /// Absolute URL for an endpoint. The base is validated and the paths are
    /// static, so joining cannot fail.
    #[must_use]
    pub fn url_for(&self, endpoint: &Endpoint) -> String {
        let mut url = self.base.clone();
        {
            let mut path = url.path().trim_end_matches('/').to_string();
            path.push_str(&endpoint.path());
            url.set_path(&path);
        }
        if let Endpoint::Verify { token } = endpoint {
            url.query_pairs_mut().append_pair("token", token);
        }
        url.to_string()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            // DEFAULT_API_BASE is a valid https URL; checked in tests.
            base: Url::parse(DEFAULT_API_BASE).unwrap_or_else(|_| {
                unreachable!("DEFAULT_API_BASE is a constant valid URL")
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// Every backend call the core makes, with its method, path, and whether a
/// bearer token must be attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Register,
    RequestReset,
    ResetPassword,
    Verify { token: String },

    Listings,
    MyListings,
    Listing(ListingId),
    CreateListing,
    UpdateListing(ListingId),
    DeleteListing(ListingId),

    Thread(ConversationId),
    SendMessage(ConversationId),
    DeleteMessage(MessageId),
    Conversations,
    GetOrCreateConversation,

    Me,
    UpdateUser(UserId),
}

impl Endpoint {
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        match self {
            Self::Login
            | Self::Register
            | Self::RequestReset
            | Self::ResetPassword
            | Self::CreateListing
            | Self::SendMessage(_)
            | Self::GetOrCreateConversation => HttpMethod::Post,

            Self::Verify { .. }
            | Self::Listings
            | Self::MyListings
            | Self::Listing(_)
            | Self::Thread(_)
            | Self::Conversations
            | Self::Me => HttpMethod::Get,

            Self::UpdateListing(_) | Self::UpdateUser(_) => HttpMethod::Put,

            Self::DeleteListing(_) | Self::DeleteMessage(_) => HttpMethod::Delete,
        }
    }

    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Login => "/auth/login".into(),
            Self::Register => "/auth/register".into(),
            Self::RequestReset => "/auth/request-reset".into(),
            Self::ResetPassword => "/auth/reset-password".into(),
            Self::Verify { .. } => "/auth/verify".into(),

            Self::Listings | Self::CreateListing => "/objects".into(),
            Self::MyListings => "/objects/me".into(),
            Self::Listing(id) | Self::UpdateListing(id) | Self::DeleteListing(id) => {
                format!("/objects/{id}")
            }

            Self::Thread(id) => format!("/messages/conversation/{id}"),
            Self::SendMessage(id) => format!("/messages/send/{id}"),
            Self::DeleteMessage(id) => format!("/messages/{id}"),
            Self::Conversations => "/conversation/user".into(),
            Self::GetOrCreateConversation => "/conversation/conversation/getOrCreate".into(),

            Self::Me => "/users/me".into(),
            Self::UpdateUser(id) => format!("/users/{id}"),
        }
    }

    #[must_use]
    pub const fn requires_auth(&self) -> bool {
        !matches!(
            self,
            Self::Login
                | Self::Register
                | Self::RequestReset
                | Self::ResetPassword
                | Self::Verify { .. }
        )
    }
}

// --- Response classification ---

/// Classifies a response and decodes the body on success. 401 is normalized
/// to the unauthorized kind; the caller decides what to do with it, the
/// session is never cleared here.
pub fn decode_response<T: DeserializeOwned>(status: u16, body: &[u8]) -> AppResult<T> {
    check_status(status, body)?;
    serde_json::from_slice(body).map_err(|e| {
        AppError::new(ErrorKind::Deserialization, "unexpected response shape")
            .with_internal(e.to_string())
    })
}

/// Status-only variant for calls whose body we discard (deletes, resets).
pub fn check_status(status: u16, body: &[u8]) -> AppResult<()> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(AppError::from_http_status(status, body))
    }
}

// --- Request payloads ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RegisterForm {
    pub first_name: String,
    pub last_name: String,
    pub age: String,
    pub email: String,
    pub password: String,
    pub confirm: String,
    pub terms_accepted: bool,
}

/// What actually goes over the wire; confirmation and terms are client-side.
#[derive(Serialize, Clone, Debug)]
pub struct RegisterRequest {
    pub nom: String,
    pub prenom: String,
    pub age: u32,
    pub email: String,
    pub password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> AppResult<RegisterRequest> {
        if self.first_name.trim().is_empty()
            || self.last_name.trim().is_empty()
            || self.email.trim().is_empty()
            || self.password.is_empty()
        {
            return Err(AppError::new(
                ErrorKind::Validation,
                "Please fill in all required fields.",
            ));
        }

        let age: u32 = self.age.trim().parse().map_err(|_| {
            AppError::new(ErrorKind::Validation, "Age must be a number.")
        })?;

        if self.password != self.confirm {
            return Err(AppError::new(ErrorKind::Validation, "Passwords do not match."));
        }
        if !self.terms_accepted {
            return Err(AppError::new(
                ErrorKind::Validation,
                "You must accept the terms of use.",
            ));
        }

        Ok(RegisterRequest {
            nom: self.last_name.trim().to_string(),
            prenom: self.first_name.trim().to_string(),
            age,
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

pub fn validate_login(email: &str, password: &str) -> AppResult<LoginRequest> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::new(
            ErrorKind::Validation,
            "Please enter your email and password.",
        ));
    }
    Ok(LoginRequest {
        email: email.trim().to_string(),
        password: password.to_string(),
    })
}

pub fn validate_reset(token: &str, password: &str, confirm: &str) -> AppResult<ResetRequest> {
    if token.trim().is_empty() || password.is_empty() {
        return Err(AppError::new(
            ErrorKind::Validation,
            "Please fill in all required fields.",
        ));
    }
    if password != confirm {
        return Err(AppError::new(ErrorKind::Validation, "Passwords do not match."));
    }
    Ok(ResetRequest {
        token: token.trim().to_string(),
        password: password.to_string(),
    })
}

#[derive(Serialize, Clone, Debug)]
pub struct ResetRequest {
    pub token: String,
    pub password: String,
}

#[derive(Serialize, Clone, Debug)]
pub struct ResetEmailRequest {
    pub email: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ListingDraft {
    pub kind: ListingKind,
    pub name: Option<String>,
    pub description: String,
    pub photo_path: Option<String>,
    pub location: String,
    pub date: DateTime<Utc>,
}

/// Wire shape for create/update of a listing.
#[derive(Serialize, Clone, Debug)]
pub struct ListingRequest {
    #[serde(rename = "type")]
    pub kind: ListingKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub description: String,
    #[serde(rename = "photoPath", skip_serializing_if = "Option::is_none")]
    pub photo_path: Option<String>,
    #[serde(rename = "localisation")]
    pub location: String,
    pub date: DateTime<Utc>,
}

impl ListingDraft {
    pub fn validate(&self, now: DateTime<Utc>) -> AppResult<ListingRequest> {
        if self.description.trim().is_empty() || self.location.trim().is_empty() {
            return Err(AppError::new(
                ErrorKind::Validation,
                "Please fill in all required fields.",
            ));
        }
        if self.description.len() > MAX_DESCRIPTION_LENGTH {
            return Err(AppError::new(
                ErrorKind::Validation,
                "The description is too long.",
            ));
        }
        let has_photo = self
            .photo_path
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());
        if !has_photo {
            return Err(AppError::new(ErrorKind::Validation, "Please add a photo."));
        }
        if self.date > now {
            return Err(AppError::new(
                ErrorKind::Validation,
                "The date cannot be in the future.",
            ));
        }

        Ok(ListingRequest {
            kind: self.kind,
            name: self
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from),
            description: self.description.trim().to_string(),
            photo_path: self.photo_path.clone(),
            location: self.location.trim().to_string(),
            date: self.date,
        })
    }
}

/// Body for the claim/archive update.
#[derive(Serialize, Clone, Debug)]
pub struct ClaimUpdate {
    #[serde(rename = "reclame")]
    pub claimed: bool,
}

#[derive(Serialize, Clone, Debug)]
pub struct SendMessageRequest {
    #[serde(rename = "contenu")]
    pub text: String,
}

pub fn validate_message(draft: &str) -> AppResult<SendMessageRequest> {
    let text = draft.trim();
    if text.is_empty() {
        return Err(AppError::new(ErrorKind::Validation, "The message is empty."));
    }
    if text.len() > MAX_MESSAGE_LENGTH {
        return Err(AppError::new(ErrorKind::Validation, "The message is too long."));
    }
    Ok(SendMessageRequest { text: text.to_string() })
}

#[derive(Serialize, Clone, Debug)]
pub struct GetOrCreateConversationRequest {
    #[serde(rename = "user2Id")]
    pub user2_id: UserId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: String,
}

#[derive(Serialize, Clone, Debug)]
pub struct ProfileUpdateRequest {
    pub nom: String,
    pub prenom: String,
    pub email: String,
    pub age: u32,
}

impl ProfileForm {
    pub fn validate(&self) -> AppResult<ProfileUpdateRequest> {
        if self.first_name.trim().is_empty()
            || self.last_name.trim().is_empty()
            || self.email.trim().is_empty()
        {
            return Err(AppError::new(
                ErrorKind::Validation,
                "Please fill in all required fields.",
            ));
        }
        let age: u32 = self.age.trim().parse().map_err(|_| {
            AppError::new(ErrorKind::Validation, "Age must be a number.")
        })?;

        Ok(ProfileUpdateRequest {
            nom: self.last_name.trim().to_string(),
            prenom: self.first_name.trim().to_string(),
            email: self.email.trim().to_string(),
            age,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft() -> ListingDraft {
        ListingDraft {
            kind: ListingKind::Lost,
            name: Some("Red Wallet".into()),
            description: "Leather".into(),
            photo_path: Some("file:///photos/1.jpg".into()),
            location: "48.85,2.29".into(),
            date: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn default_base_url_is_valid() {
        assert!(ApiConfig::new(DEFAULT_API_BASE).is_ok());
        let _ = ApiConfig::default();
    }

    #[test]
    fn config_rejects_non_http_schemes() {
        assert!(ApiConfig::new("ftp://example.com").is_err());
        assert!(ApiConfig::new("not a url").is_err());
        assert!(ApiConfig::new("http://localhost:8080").is_ok());
    }

    #[test]
    fn endpoint_urls_join_against_the_base() {
        let config = ApiConfig::new("https://api.example.com").unwrap();
        assert_eq!(
            config.url_for(&Endpoint::Listing(ListingId::new(7))),
            "https://api.example.com/objects/7"
        );
        assert_eq!(
            config.url_for(&Endpoint::Thread(ConversationId::new(3))),
            "https://api.example.com/messages/conversation/3"
        );
        assert_eq!(
            config.url_for(&Endpoint::Verify { token: "t k".into() }),
            "https://api.example.com/auth/verify?token=t+k"
        );
    }

    #[test]
    fn auth_endpoints_do_not_require_a_token() {
        assert!(!Endpoint::Login.requires_auth());
        assert!(!Endpoint::Verify { token: "x".into() }.requires_auth());
        assert!(Endpoint::Listings.requires_auth());
        assert!(Endpoint::Me.requires_auth());
    }

    #[test]
    fn decode_response_passes_2xx_bodies_through() {
        let value: LoginResponse = decode_response(200, br#"{"token":"abc"}"#).unwrap();
        assert_eq!(value.token, "abc");
    }

    #[test]
    fn decode_response_classifies_failures() {
        let err = decode_response::<LoginResponse>(401, b"").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);

        let err = decode_response::<LoginResponse>(200, b"not json").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Deserialization);
    }

    #[test]
    fn login_validation_requires_both_fields() {
        assert!(validate_login("", "pw").is_err());
        assert!(validate_login("a@b.c", "").is_err());
        assert!(validate_login(" a@b.c ", "pw").is_ok());
    }

    #[test]
    fn register_validation_checks_match_and_terms() {
        let mut form = RegisterForm {
            first_name: "Alice".into(),
            last_name: "Martin".into(),
            age: "30".into(),
            email: "alice@example.com".into(),
            password: "pw".into(),
            confirm: "pw".into(),
            terms_accepted: true,
        };
        let request = form.validate().unwrap();
        assert_eq!(request.nom, "Martin");
        assert_eq!(request.prenom, "Alice");
        assert_eq!(request.age, 30);

        form.confirm = "other".into();
        assert!(form.validate().is_err());

        form.confirm = "pw".into();
        form.terms_accepted = false;
        assert!(form.validate().is_err());

        form.terms_accepted = true;
        form.age = "thirty".into();
        assert!(form.validate().is_err());
    }

    #[test]
    fn listing_validation_rejects_future_dates() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert!(draft().validate(now).is_ok());

        let mut future = draft();
        future.date = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        assert!(future.validate(now).is_err());
    }

    #[test]
    fn listing_validation_requires_photo_and_fields() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let mut no_photo = draft();
        no_photo.photo_path = None;
        assert!(no_photo.validate(now).is_err());

        let mut no_description = draft();
        no_description.description = "  ".into();
        assert!(no_description.validate(now).is_err());
    }

    #[test]
    fn listing_request_uses_wire_names() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let request = draft().validate(now).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "PERDU");
        assert_eq!(json["localisation"], "48.85,2.29");
        assert_eq!(json["photoPath"], "file:///photos/1.jpg");
    }

    #[test]
    fn message_validation_trims_and_bounds() {
        assert!(validate_message("   ").is_err());
        assert_eq!(validate_message("  hi ").unwrap().text, "hi");
        assert!(validate_message(&"x".repeat(MAX_MESSAGE_LENGTH + 1)).is_err());
    }
}
