use chrono::{DateTime, Duration, Utc};

use crate::{
    cryptography::{digest_token, generate_access_token},
    error::{Error, ErrorKind},
    schema::{Id, User},
    store::Store,
};

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct SessionData {
    pub user: User,
    token_digest: String,
}

impl SessionData {
    pub fn user_id(&self) -> Id {
        self.user.id
    }

    pub fn token_digest(&self) -> &str {
        &self.token_digest
    }
}

/// Extracts the key from `Token <key>` or `Bearer <key>`.
pub fn parse_authorization(header: &str) -> Result<&str, Error> {
    let mut parts = header.split_whitespace();

    let (Some(scheme), Some(key), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ErrorKind::InvalidSession.new("Invalid token header."));
    };

    if !scheme.eq_ignore_ascii_case("token") && !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ErrorKind::InvalidSession.new("Invalid token header."));
    }

    Ok(key)
}

/// How long an issued token stays valid. The default keeps tokens until logout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenLifetime(Option<Duration>);

impl TokenLifetime {
    /// `0` means tokens never expire.
    pub fn days(days: u32) -> Self {
        match days {
            0 => Self(None),
            days => Self(Some(Duration::days(days.into()))),
        }
    }

    pub fn is_limited(&self) -> bool {
        self.0.is_some()
    }

    /// Tokens issued at or before the returned instant have expired.
    fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.0.map(|lifetime| now - lifetime)
    }
}

/// Creates and stores a fresh token for `user`, returning the key to hand out.
/// Expired tokens of the same user are dropped on the way.
pub async fn issue_token(
    store: &dyn Store,
    lifetime: TokenLifetime,
    user: &User,
) -> Result<String, Error> {
    let now = Utc::now();
    if let Some(cutoff) = lifetime.cutoff(now) {
        let pruned = store.prune_tokens(user.id, cutoff).await?;
        if pruned > 0 {
            log::debug!("Pruned {pruned} expired tokens of user {}", user.id);
        }
    }

    let token = generate_access_token();
    store.insert_token(user.id, &digest_token(&token), now).await?;

    log::debug!("Issued token for user {}", user.id);
    Ok(token)
}

pub async fn verify_session(
    store: &dyn Store,
    lifetime: TokenLifetime,
    header: Option<&str>,
) -> Result<SessionData, Error> {
    let Some(header) = header else {
        return Err(ErrorKind::InvalidSession.default());
    };

    let token_digest = digest_token(parse_authorization(header)?);

    let cutoff = lifetime.cutoff(Utc::now());
    let Some(user) = store.find_token_user(&token_digest, cutoff).await? else {
        log::debug!("Rejected unknown or expired token");
        return Err(ErrorKind::InvalidSession.new("Invalid token."));
    };

    if !user.is_active {
        log::debug!("Rejected token of inactive user {}", user.id);
        return Err(ErrorKind::InvalidSession.new("User inactive or deleted."));
    }

    Ok(SessionData { user, token_digest })
}

pub async fn revoke_session(store: &dyn Store, session: &SessionData) -> Result<(), Error> {
    store.delete_token(session.token_digest()).await?;
    log::debug!("Revoked token for user {}", session.user_id());
    Ok(())
}
