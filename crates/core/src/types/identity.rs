//! Identities, collection kinds and the storage keys derived from them.
//!
//! A storage key is a pure function of `(namespace, kind, identity)`:
//!
//! ```text
//! {namespace}:{kind}:guest
//! {namespace}:{kind}:user:{user_id}
//! ```
//!
//! The `user:` segment keeps a user whose identifier happens to be `guest`
//! disjoint from the guest sentinel, so no two identities can ever share a key.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::UserId;

const GUEST_SEGMENT: &str = "guest";
const USER_SEGMENT: &str = "user";

/// The owner of one collection: the anonymous guest or a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "userId", rename_all = "lowercase")]
pub enum Identity {
    /// The anonymous visitor on this device.
    #[default]
    Guest,
    /// A user authenticated by the identity provider.
    User(UserId),
}

impl Identity {
    /// Convenience constructor for a user identity.
    #[must_use]
    pub fn user(id: impl Into<UserId>) -> Self {
        Self::User(id.into())
    }

    /// Returns `true` for the guest sentinel.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest)
    }

    /// The user ID, if this is an authenticated identity.
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Guest => None,
            Self::User(id) => Some(id),
        }
    }
}

impl From<Option<UserId>> for Identity {
    fn from(user: Option<UserId>) -> Self {
        user.map_or(Self::Guest, Self::User)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guest => f.write_str(GUEST_SEGMENT),
            Self::User(id) => write!(f, "{USER_SEGMENT}:{id}"),
        }
    }
}

/// Which product collection a key or manager belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Cart,
    Wishlist,
}

impl CollectionKind {
    /// Both kinds, in display order.
    pub const ALL: [Self; 2] = [Self::Cart, Self::Wishlist];

    /// Key segment for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Wishlist => "wishlist",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionKind {
    type Err = StorageKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cart" => Ok(Self::Cart),
            "wishlist" => Ok(Self::Wishlist),
            other => Err(StorageKeyError::UnknownKind(other.to_owned())),
        }
    }
}

/// Errors from building or parsing a [`StorageKey`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageKeyError {
    /// Namespace is empty or contains characters other than ASCII
    /// alphanumerics, `-` and `_`.
    #[error("invalid storage namespace: {0:?}")]
    InvalidNamespace(String),
    /// User IDs must be non-empty.
    #[error("user id cannot be empty")]
    EmptyUserId,
    /// The key belongs to a different namespace.
    #[error("key is outside namespace {0:?}")]
    ForeignNamespace(String),
    /// The kind segment is not a known collection kind.
    #[error("unknown collection kind: {0:?}")]
    UnknownKind(String),
    /// The identity segment is neither `guest` nor `user:{id}`.
    #[error("malformed identity segment in key: {0:?}")]
    MalformedIdentity(String),
}

/// A deterministic, namespaced key for one `(kind, identity)` collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    kind: CollectionKind,
    identity: Identity,
    rendered: String,
}

impl StorageKey {
    /// Derive the key for `kind` and `identity` under `namespace`.
    ///
    /// # Errors
    ///
    /// Returns `StorageKeyError::InvalidNamespace` for an unusable namespace and
    /// `StorageKeyError::EmptyUserId` for a user identity with an empty ID.
    pub fn new(
        namespace: &str,
        kind: CollectionKind,
        identity: &Identity,
    ) -> Result<Self, StorageKeyError> {
        validate_namespace(namespace)?;
        if identity.user_id().is_some_and(|id| id.as_str().is_empty()) {
            return Err(StorageKeyError::EmptyUserId);
        }

        Ok(Self {
            kind,
            identity: identity.clone(),
            rendered: format!("{namespace}:{kind}:{identity}"),
        })
    }

    /// Parse a raw key that was produced under `namespace`.
    ///
    /// # Errors
    ///
    /// Returns `StorageKeyError::ForeignNamespace` for keys of another
    /// namespace, and a specific error for any malformed segment.
    pub fn parse(namespace: &str, raw: &str) -> Result<Self, StorageKeyError> {
        validate_namespace(namespace)?;
        let rest = raw
            .strip_prefix(namespace)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(|| StorageKeyError::ForeignNamespace(namespace.to_owned()))?;

        let (kind, identity) = rest
            .split_once(':')
            .ok_or_else(|| StorageKeyError::MalformedIdentity(raw.to_owned()))?;
        let kind: CollectionKind = kind.parse()?;

        let identity = if identity == GUEST_SEGMENT {
            Identity::Guest
        } else {
            match identity.split_once(':') {
                Some((USER_SEGMENT, id)) if !id.is_empty() => Identity::user(id),
                _ => return Err(StorageKeyError::MalformedIdentity(raw.to_owned())),
            }
        };

        Ok(Self {
            kind,
            identity,
            rendered: raw.to_owned(),
        })
    }

    /// The collection kind encoded in this key.
    #[must_use]
    pub const fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// The identity encoded in this key.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The rendered key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Namespaces are plain ASCII words so they can never contain the `:` separator.
///
/// # Errors
///
/// Returns `StorageKeyError::InvalidNamespace` when the namespace is empty or
/// contains anything but ASCII alphanumerics, `-` and `_`.
pub fn validate_namespace(namespace: &str) -> Result<(), StorageKeyError> {
    let valid = !namespace.is_empty()
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageKeyError::InvalidNamespace(namespace.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_and_user_keys_differ() {
        let guest = StorageKey::new("shop", CollectionKind::Cart, &Identity::Guest).unwrap();
        let user = StorageKey::new("shop", CollectionKind::Cart, &Identity::user("u123")).unwrap();

        assert_eq!(guest.as_str(), "shop:cart:guest");
        assert_eq!(user.as_str(), "shop:cart:user:u123");
        assert_ne!(guest, user);
    }

    #[test]
    fn test_user_named_guest_does_not_collide() {
        let sentinel = StorageKey::new("shop", CollectionKind::Cart, &Identity::Guest).unwrap();
        let named = StorageKey::new("shop", CollectionKind::Cart, &Identity::user("guest")).unwrap();
        assert_ne!(sentinel.as_str(), named.as_str());
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let cart = StorageKey::new("shop", CollectionKind::Cart, &Identity::Guest).unwrap();
        let wishlist =
            StorageKey::new("shop", CollectionKind::Wishlist, &Identity::Guest).unwrap();
        assert_ne!(cart.as_str(), wishlist.as_str());
    }

    #[test]
    fn test_parse_round_trips_user_ids_with_colons() {
        let key = StorageKey::new(
            "shop",
            CollectionKind::Wishlist,
            &Identity::user("oauth:google:42"),
        )
        .unwrap();
        let parsed = StorageKey::parse("shop", key.as_str()).unwrap();

        assert_eq!(parsed.kind(), CollectionKind::Wishlist);
        assert_eq!(parsed.identity(), &Identity::user("oauth:google:42"));
    }

    #[test]
    fn test_parse_rejects_foreign_namespace() {
        assert_eq!(
            StorageKey::parse("shop", "other:cart:guest"),
            Err(StorageKeyError::ForeignNamespace("shop".to_owned()))
        );
        // Prefix match alone is not enough.
        assert!(StorageKey::parse("shop", "shopping:cart:guest").is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_identity() {
        assert!(StorageKey::parse("shop", "shop:cart:visitor").is_err());
        assert!(StorageKey::parse("shop", "shop:cart:user:").is_err());
        assert!(StorageKey::parse("shop", "shop:basket:guest").is_err());
    }

    #[test]
    fn test_invalid_namespace() {
        assert!(StorageKey::new("", CollectionKind::Cart, &Identity::Guest).is_err());
        assert!(StorageKey::new("a:b", CollectionKind::Cart, &Identity::Guest).is_err());
    }

    #[test]
    fn test_empty_user_id_rejected() {
        assert_eq!(
            StorageKey::new("shop", CollectionKind::Cart, &Identity::user("")),
            Err(StorageKeyError::EmptyUserId)
        );
    }
}
