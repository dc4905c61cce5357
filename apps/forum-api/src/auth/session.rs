//! In-memory session store mapping opaque tokens to user identities.
//!
//! Sessions do not survive a process restart — users re-login. Expiry is
//! enforced server-side on every lookup, not just via the cookie's own
//! max-age.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use forum_common::id::prefix;

/// Session lifetime. Matches the max-age advertised on the cookie.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Name of the HttpOnly cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_token";

struct SessionEntry {
    user_id: String,
    expires_at: Instant,
}

/// Shared registry of live sessions. The token is the only thing that ever
/// reaches the client; the identity mapping stays server-side.
pub struct SessionStore {
    inner: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Create a session for the user and return the opaque token to be set
    /// as a cookie.
    pub fn create(&self, user_id: &str) -> String {
        let token = generate_session_token();
        self.inner.lock().insert(
            token.clone(),
            SessionEntry {
                user_id: user_id.to_string(),
                expires_at: Instant::now() + SESSION_TTL,
            },
        );
        token
    }

    /// Resolve a token to its user identity. Expired tokens are invalidated
    /// here rather than waiting for the cookie to lapse client-side.
    pub fn resolve(&self, token: &str) -> Option<String> {
        let mut sessions = self.inner.lock();
        match sessions.get(token) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.user_id.clone()),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    /// Remove a session. Destroying an unknown token is a no-op.
    pub fn destroy(&self, token: &str) {
        self.inner.lock().remove(token);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate an opaque, unguessable session token.
fn generate_session_token() -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use rand::Rng;

    let mut buf = [0u8; 32];
    rand::thread_rng().fill(&mut buf[..]);
    format!("{}_{}", prefix::SESSION, URL_SAFE_NO_PAD.encode(buf))
}
