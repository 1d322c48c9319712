//! Local authentication provider.
//!
//! Accounts and sessions live in the same SQLite store as everything else. The
//! surface mirrors a hosted auth client: read the current session, subscribe to
//! sign-in/sign-out changes, sign up, sign in with a password or an OAuth
//! provider, sign out.

use anyhow::{Context, Result, anyhow};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::db::Database;
use crate::error::KobiriError;
use crate::models::Session;

pub const MIN_PASSWORD_LEN: usize = 6;

/// PBKDF2-HMAC-SHA256 rounds for new hashes. Stored hashes keep the count
/// they were created with.
pub const PBKDF2_ROUNDS: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// A stored session was restored at startup.
    InitialSession,
    SignedIn,
    SignedOut,
}

pub type AuthListener = Box<dyn FnMut(AuthEvent, Option<&Session>) + Send + Sync>;

/// Handle returned by [`Auth::on_auth_state_change`]; pass it to
/// [`Auth::unsubscribe`] to stop receiving events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

/// Where to send the browser for third-party sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub authorize_url: String,
    pub client_id: String,
    pub redirect_url: String,
}

#[derive(Default)]
pub struct Auth {
    session: Option<Session>,
    listeners: Vec<(u64, AuthListener)>,
    next_listener: u64,
    oauth: Option<OAuthConfig>,
}

impl Auth {
    #[must_use]
    pub fn new(oauth: Option<OAuthConfig>) -> Self {
        Self {
            oauth,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn get_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Resume a previously issued access token. Unknown tokens leave the
    /// provider signed out.
    pub fn restore(&mut self, db: &Database, access_token: &str) -> Result<Option<&Session>> {
        let Some(session) = db.get_session(access_token)? else {
            debug!("stored session token is no longer valid");
            return Ok(None);
        };
        self.session = Some(session);
        self.emit(AuthEvent::InitialSession);
        Ok(self.session.as_ref())
    }

    pub fn on_auth_state_change(&mut self, listener: AuthListener) -> Subscription {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.push((id, listener));
        Subscription(id)
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != subscription.0);
        self.listeners.len() != before
    }

    pub fn sign_up(&mut self, db: &Database, email: &str, password: &str) -> Result<Session> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(KobiriError::Validation("A valid email address is required.".to_string()).into());
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(KobiriError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters."
            ))
            .into());
        }
        if db.email_exists(email)? {
            return Err(KobiriError::EmailTaken(email.to_string()).into());
        }

        let user = db.insert_user(email, &hash_password(password)?)?;
        info!(user_id = %user.id, "account created");
        let session = db.insert_session(&user)?;
        Ok(self.set_signed_in(session))
    }

    pub fn sign_in_with_password(
        &mut self,
        db: &Database,
        email: &str,
        password: &str,
    ) -> Result<Session> {
        let creds = db
            .get_credentials(email.trim())?
            .ok_or(KobiriError::InvalidCredentials)?;
        if !verify_password(password, &creds.password_hash) {
            return Err(KobiriError::InvalidCredentials.into());
        }
        let session = db.insert_session(&creds.user)?;
        Ok(self.set_signed_in(session))
    }

    /// Build the provider authorization URL. Fails without touching the
    /// session when no OAuth client is configured.
    pub fn sign_in_with_oauth(&self, provider: &str) -> Result<String> {
        let config = self
            .oauth
            .as_ref()
            .ok_or_else(|| KobiriError::NotConfigured("OAuth sign-in".to_string()))?;
        let provider = provider.trim();
        if provider.is_empty() {
            return Err(KobiriError::Validation("An OAuth provider is required.".to_string()).into());
        }

        let mut url = Url::parse(&config.authorize_url).context("Invalid OAuth authorize URL")?;
        let state = Uuid::new_v4().simple().to_string();
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &config.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("state", &state);
        Ok(url.into())
    }

    pub fn sign_out(&mut self, db: &Database) -> Result<()> {
        if let Some(session) = self.session.take() {
            db.delete_session(&session.access_token)?;
            info!(user_id = %session.user.id, "signed out");
        }
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    fn set_signed_in(&mut self, session: Session) -> Session {
        info!(user_id = %session.user.id, "signed in");
        self.session = Some(session.clone());
        self.emit(AuthEvent::SignedIn);
        session
    }

    fn emit(&mut self, event: AuthEvent) {
        let session = self.session.as_ref();
        for (_, listener) in &mut self.listeners {
            listener(event, session);
        }
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| anyhow!("Failed to encode password salt: {e}"))?;
    let params = Params {
        rounds: PBKDF2_ROUNDS,
        output_length: 32,
    };
    let hash = Pbkdf2
        .hash_password_customized(password.as_bytes(), None, None, params, &salt)
        .map_err(|e| anyhow!("Failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// Constant-time check against a stored PHC string. A malformed stored hash
/// never matches.
fn verify_password(password: &str, stored: &str) -> bool {
    let parsed = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("stored password hash is malformed: {e}");
            return false;
        }
    };
    Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recorder(auth: &mut Auth) -> (Arc<Mutex<Vec<AuthEvent>>>, Subscription) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let sub = auth.on_auth_state_change(Box::new(move |event, _| {
            sink.lock().unwrap().push(event);
        }));
        (events, sub)
    }

    #[test]
    fn test_sign_up_then_sign_in() {
        let db = Database::open_in_memory().unwrap();
        let mut auth = Auth::default();
        let session = auth.sign_up(&db, "ada@example.com", "secret1").unwrap();
        assert_eq!(auth.get_session(), Some(&session));

        auth.sign_out(&db).unwrap();
        assert!(auth.get_session().is_none());
        assert!(db.get_session(&session.access_token).unwrap().is_none());

        let again = auth
            .sign_in_with_password(&db, "ada@example.com", "secret1")
            .unwrap();
        assert_eq!(again.user.id, session.user.id);
        assert_ne!(again.access_token, session.access_token);
    }

    #[test]
    fn test_wrong_password_rejected() {
        let db = Database::open_in_memory().unwrap();
        let mut auth = Auth::default();
        auth.sign_up(&db, "ada@example.com", "secret1").unwrap();
        auth.sign_out(&db).unwrap();

        let err = auth
            .sign_in_with_password(&db, "ada@example.com", "nope123")
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<KobiriError>(),
            Some(&KobiriError::InvalidCredentials)
        );
        let err = auth
            .sign_in_with_password(&db, "nobody@example.com", "secret1")
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<KobiriError>(),
            Some(&KobiriError::InvalidCredentials)
        );
        assert!(auth.get_session().is_none());
    }

    #[test]
    fn test_sign_up_validation() {
        let db = Database::open_in_memory().unwrap();
        let mut auth = Auth::default();
        assert!(auth.sign_up(&db, "not-an-email", "secret1").is_err());
        assert!(auth.sign_up(&db, "ada@example.com", "123").is_err());

        auth.sign_up(&db, "ada@example.com", "secret1").unwrap();
        let err = auth.sign_up(&db, "ADA@example.com", "secret1").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KobiriError>(),
            Some(KobiriError::EmailTaken(_))
        ));
    }

    #[test]
    fn test_listeners_receive_events_until_unsubscribed() {
        let db = Database::open_in_memory().unwrap();
        let mut auth = Auth::default();
        let (events, sub) = recorder(&mut auth);

        auth.sign_up(&db, "ada@example.com", "secret1").unwrap();
        auth.sign_out(&db).unwrap();
        assert_eq!(
            *events.lock().unwrap(),
            vec![AuthEvent::SignedIn, AuthEvent::SignedOut]
        );

        assert!(auth.unsubscribe(sub));
        assert!(!auth.unsubscribe(sub));
        auth.sign_in_with_password(&db, "ada@example.com", "secret1")
            .unwrap();
        assert_eq!(events.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_restore_session() {
        let db = Database::open_in_memory().unwrap();
        let mut first = Auth::default();
        let session = first.sign_up(&db, "ada@example.com", "secret1").unwrap();

        let mut second = Auth::default();
        let (events, _) = recorder(&mut second);
        let restored = second.restore(&db, &session.access_token).unwrap().cloned();
        assert_eq!(restored, Some(session));
        assert_eq!(*events.lock().unwrap(), vec![AuthEvent::InitialSession]);

        let mut third = Auth::default();
        assert!(third.restore(&db, "bogus").unwrap().is_none());
    }

    #[test]
    fn test_oauth_requires_config() {
        let auth = Auth::default();
        let err = auth.sign_in_with_oauth("google").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KobiriError>(),
            Some(KobiriError::NotConfigured(_))
        ));
        assert!(auth.get_session().is_none());
    }

    fn query(url: &str) -> Vec<(String, String)> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_oauth_url() {
        let auth = Auth::new(Some(OAuthConfig {
            authorize_url: "https://auth.example.com/authorize".to_string(),
            client_id: "kobiri app".to_string(),
            redirect_url: "http://localhost:8080/callback".to_string(),
        }));
        let url = auth.sign_in_with_oauth("google").unwrap();
        assert!(url.starts_with("https://auth.example.com/authorize?provider=google&"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcallback"));

        let pairs = query(&url);
        assert_eq!(param(&pairs, "client_id"), Some("kobiri app"));
        assert_eq!(param(&pairs, "response_type"), Some("code"));
        assert_eq!(param(&pairs, "state").map(str::len), Some(32));
    }

    #[test]
    fn test_oauth_url_escapes_reserved_characters() {
        let auth = Auth::new(Some(OAuthConfig {
            authorize_url: "https://auth.example.com/authorize?tenant=kobiri".to_string(),
            client_id: "app&id=1".to_string(),
            redirect_url: "http://localhost:8080/cb?next=/home&tab=my recipes".to_string(),
        }));
        let url = auth.sign_in_with_oauth("google").unwrap();
        assert!(url.starts_with("https://auth.example.com/authorize?tenant=kobiri&provider=google&"));
        assert!(!url.contains(' '));

        let pairs = query(&url);
        assert_eq!(param(&pairs, "tenant"), Some("kobiri"));
        assert_eq!(param(&pairs, "client_id"), Some("app&id=1"));
        assert_eq!(
            param(&pairs, "redirect_uri"),
            Some("http://localhost:8080/cb?next=/home&tab=my recipes")
        );
        assert!(param(&pairs, "id").is_none());
        assert!(param(&pairs, "tab").is_none());
    }

    #[test]
    fn test_oauth_rejects_invalid_authorize_url() {
        let auth = Auth::new(Some(OAuthConfig {
            authorize_url: "not a url".to_string(),
            client_id: "kobiri".to_string(),
            redirect_url: "http://localhost:8080/callback".to_string(),
        }));
        assert!(auth.sign_in_with_oauth("google").is_err());
    }

    #[test]
    fn test_hash_is_salted() {
        let first = hash_password("pw").unwrap();
        let second = hash_password("pw").unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with(&format!("$pbkdf2-sha256$i={PBKDF2_ROUNDS},")));
        assert!(verify_password("pw", &first));
        assert!(verify_password("pw", &second));
        assert!(!verify_password("pW", &first));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("secret1", ""));
        assert!(!verify_password("secret1", "5e884898da28047151d0e56f8dc6292773603d0d"));
    }

    #[test]
    fn test_sign_in_round_trip_uses_stored_hash() {
        let db = Database::open_in_memory().unwrap();
        let mut auth = Auth::default();
        let session = auth.sign_up(&db, "ada@example.com", "secret1").unwrap();
        auth.sign_out(&db).unwrap();

        let creds = db.get_credentials("ada@example.com").unwrap().unwrap();
        assert!(creds.password_hash.starts_with("$pbkdf2-sha256$"));
        assert!(!creds.password_hash.contains("secret1"));

        let again = auth
            .sign_in_with_password(&db, "  ada@example.com ", "secret1")
            .unwrap();
        assert_eq!(again.user.id, session.user.id);
        assert!(auth.sign_in_with_password(&db, "ada@example.com", "secret2").is_err());
    }
}
