//! Camera identity and access credentials

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Identifies which camera feed to open.
///
/// Supplied by the camera directory whenever the user selects "view stream".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct CameraRef {
    pub id: i64,
    #[serde(alias = "name")]
    pub display_name: String,
}

impl CameraRef {
    /// Create a new camera reference
    pub fn new(id: i64, display_name: impl Into<String>) -> Self {
        Self { id, display_name: display_name.into() }
    }
}

impl fmt::Display for CameraRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.display_name, self.id)
    }
}

/// Opaque bearer token.
///
/// Read once per connection attempt and embedded in the connect target.
/// `Debug` is redacted so tokens never reach logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Arc<str>);

impl Credential {
    /// Wrap a bearer token
    pub fn new(token: impl AsRef<str>) -> Self {
        Self(Arc::from(token.as_ref()))
    }

    /// The raw token, for embedding in the connect target only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// An empty token is the same as no token
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Source of the current access token.
///
/// The core calls [`access_token`](Self::access_token) exactly once per
/// connection attempt and never mid-connection.
pub trait CredentialProvider: Send + Sync {
    /// The current token, or `None` when the user is logged out.
    fn access_token(&self) -> Option<Credential>;
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<Credential> + Send + Sync,
{
    fn access_token(&self) -> Option<Credential> {
        self()
    }
}

/// A fixed token (or none).
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(Option<Credential>);

impl StaticCredential {
    /// Always hand out `token`
    pub fn new(token: impl AsRef<str>) -> Self {
        Self(Some(Credential::new(token)))
    }

    /// Never hand out a token
    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialProvider for StaticCredential {
    fn access_token(&self) -> Option<Credential> {
        self.0.clone()
    }
}

/// Login store shared with the rest of the console.
///
/// Clones share the same slot: the auth flow calls [`login`](Self::login)
/// and [`logout`](Self::logout), viewers read it at connect time.
#[derive(Debug, Clone, Default)]
pub struct SharedCredential {
    slot: Arc<RwLock<Option<Credential>>>,
}

impl SharedCredential {
    /// Logged-out store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the token issued at login
    pub fn login(&self, token: impl AsRef<str>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(Credential::new(token));
    }

    /// Forget the token
    pub fn logout(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl CredentialProvider for SharedCredential {
    fn access_token(&self) -> Option<Credential> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
