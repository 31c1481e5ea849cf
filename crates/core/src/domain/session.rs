use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder wallet value written between the authorization request
/// and signature verification. Keys in this state must never sign.
pub const WAITING_WALLET: &str = "WAITING";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKeyId(pub String);

impl SessionKeyId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// A time-boxed, scope-limited signing credential authorized by the
/// end user. Exactly one active (non-expired, non-waiting) key is used
/// for execution; the most recent wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionKey {
    pub id: SessionKeyId,
    pub user_id: String,
    pub wallet_address: String,
    pub session_public_key: String,
    pub session_private_key: String,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SessionKey {
    pub fn is_waiting(&self) -> bool {
        self.wallet_address == WAITING_WALLET
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_waiting() && self.expires_at > now
    }
}

/// Externally linked identity supplied by the OAuth collaborator,
/// consulted as a recipient-resolution source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkedIdentity {
    pub user_id: String,
    pub handle: String,
    pub wallet_address: String,
    pub linked_account_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{SessionKey, SessionKeyId, WAITING_WALLET};

    fn key(wallet: &str, expires_in: Duration) -> SessionKey {
        let now = Utc::now();
        SessionKey {
            id: SessionKeyId::generate(),
            user_id: "u1".to_string(),
            wallet_address: wallet.to_string(),
            session_public_key: "0xfeed".to_string(),
            session_private_key: "0xbeef".to_string(),
            scope: "transfer".to_string(),
            expires_at: now + expires_in,
            created_at: now,
        }
    }

    #[test]
    fn waiting_placeholder_is_never_active() {
        let k = key(WAITING_WALLET, Duration::hours(24));
        assert!(k.is_waiting());
        assert!(!k.is_active(Utc::now()));
    }

    #[test]
    fn expired_key_is_not_active() {
        let k = key("0xabc", Duration::hours(-1));
        assert!(!k.is_active(Utc::now()));
    }

    #[test]
    fn verified_unexpired_key_is_active() {
        let k = key("0xabc", Duration::hours(24));
        assert!(k.is_active(Utc::now()));
    }
}
