//! Session store.
//!
//! Holds the bearer token as a runtime-only secret. The token is never
//! serialized into the view-model or logged; the only place it leaves the
//! core is the Authorization header and the key-value write.

use secrecy::{ExposeSecret, SecretString};

/// Authentication state. The flag is derived from token presence, so the
/// invariant "no token implies not authenticated" holds by construction.
#[derive(Default)]
pub struct Session {
    token: Option<SecretString>,
}

impl Session {
    /// Restores the session from the persisted token bytes looked up at
    /// application start. Empty or non-UTF-8 values count as no token.
    pub fn init(&mut self, stored: Option<Vec<u8>>) {
        self.token = stored
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(SecretString::new);
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(SecretString::new(token));
    }

    /// Logout: wipes the token. The caller issues the key-value delete and
    /// the navigation back to the entry route.
    pub fn clear(&mut self) {
        self.token = None;
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.expose_secret().as_str())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unauthenticated() {
        let session = Session::default();
        assert!(!session.is_authenticated());
        assert!(session.bearer().is_none());
    }

    #[test]
    fn init_restores_a_stored_token() {
        let mut session = Session::default();
        session.init(Some(b"abc.def.ghi".to_vec()));
        assert!(session.is_authenticated());
        assert_eq!(session.bearer(), Some("abc.def.ghi"));
    }

    #[test]
    fn init_rejects_empty_and_invalid_values() {
        let mut session = Session::default();
        session.init(Some(b"   ".to_vec()));
        assert!(!session.is_authenticated());

        session.init(Some(vec![0xff, 0xfe]));
        assert!(!session.is_authenticated());

        session.init(None);
        assert!(!session.is_authenticated());
    }

    #[test]
    fn clear_forces_unauthenticated() {
        let mut session = Session::default();
        session.set_token("tok".into());
        assert!(session.is_authenticated());

        session.clear();
        assert!(!session.is_authenticated());
        assert!(session.bearer().is_none());
    }

    #[test]
    fn debug_output_never_contains_the_token() {
        let mut session = Session::default();
        session.set_token("super-secret-token".into());
        let debug = format!("{session:?}");
        assert!(!debug.contains("super-secret-token"));
    }
}
