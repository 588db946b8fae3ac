//! User profiles and the avatar storage rule.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{Credits, UserId};
use crate::error::MarketError;

/// A marketplace member. One per authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Profile {
    /// Identity shared with the bearer token `sub` claim.
    pub id: UserId,
    /// Public display name.
    pub display_name: String,
    /// Free-form biography.
    pub bio: Option<String>,
    /// Object key of the avatar inside the public avatars bucket.
    pub avatar_path: Option<String>,
    /// Current credit balance. Never negative.
    pub credit_balance: Credits,
    /// Signup completion time.
    pub created_at: DateTime<Utc>,
    /// Last profile edit or balance change.
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Creates a profile with a zero balance; the signup grant is applied
    /// by the store together with its ledger row.
    #[must_use]
    pub fn new(id: UserId, display_name: String, bio: Option<String>, avatar_path: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            display_name,
            bio,
            avatar_path,
            credit_balance: Credits::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update applied by `PATCH /profiles/me`.
///
/// `None` leaves a field untouched; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// New display name.
    pub display_name: Option<String>,
    /// New biography.
    pub bio: Option<Option<String>>,
    /// New avatar object key.
    pub avatar_path: Option<Option<String>>,
}

impl ProfileUpdate {
    /// Returns `true` when the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.bio.is_none() && self.avatar_path.is_none()
    }

    /// Applies the update to `profile` in place.
    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(name) = &self.display_name {
            profile.display_name.clone_from(name);
        }
        if let Some(bio) = &self.bio {
            profile.bio.clone_from(bio);
        }
        if let Some(avatar) = &self.avatar_path {
            profile.avatar_path.clone_from(avatar);
        }
        profile.updated_at = Utc::now();
    }
}

/// Checks that an avatar object key lives under the owner's folder.
///
/// Avatar uploads are scoped by path prefix: `"{user_id}/…"`.
///
/// # Errors
///
/// Returns [`MarketError::Forbidden`] when the first path segment is not
/// the owner's id, and [`MarketError::InvalidRequest`] for empty file names
/// or `..` segments.
pub fn check_avatar_path(owner: UserId, path: &str) -> Result<(), MarketError> {
    let Some((folder, file)) = path.split_once('/') else {
        return Err(MarketError::InvalidRequest(
            "avatar path must be \"<user id>/<file name>\"".to_string(),
        ));
    };
    if file.is_empty() || file.split('/').any(|seg| seg.is_empty() || seg == "..") {
        return Err(MarketError::InvalidRequest("invalid avatar file name".to_string()));
    }
    if folder != owner.to_string() {
        return Err(MarketError::Forbidden(
            "avatar must be stored under your own folder".to_string(),
        ));
    }
    Ok(())
}

/// Builds the public URL of an avatar object.
#[must_use]
pub fn avatar_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avatar_under_own_folder_is_allowed() {
        let owner = UserId::new();
        assert!(check_avatar_path(owner, &format!("{owner}/me.png")).is_ok());
    }

    #[test]
    fn avatar_under_other_folder_is_forbidden() {
        let owner = UserId::new();
        let other = UserId::new();
        let result = check_avatar_path(owner, &format!("{other}/me.png"));
        assert!(matches!(result, Err(MarketError::Forbidden(_))));
    }

    #[test]
    fn avatar_path_rejects_traversal_and_bare_names() {
        let owner = UserId::new();
        assert!(check_avatar_path(owner, "me.png").is_err());
        assert!(check_avatar_path(owner, &format!("{owner}/")).is_err());
        assert!(check_avatar_path(owner, &format!("{owner}/../x.png")).is_err());
    }

    #[test]
    fn avatar_url_joins_without_double_slash() {
        assert_eq!(avatar_url("http://cdn/avatars/", "a/b.png"), "http://cdn/avatars/a/b.png");
    }

    #[test]
    fn update_applies_only_present_fields() {
        let mut profile = Profile::new(UserId::new(), "Ada".to_string(), Some("bio".to_string()), None);
        let update = ProfileUpdate {
            bio: Some(None),
            ..ProfileUpdate::default()
        };
        update.apply_to(&mut profile);
        assert_eq!(profile.display_name, "Ada");
        assert_eq!(profile.bio, None);
        assert!(ProfileUpdate::default().is_empty());
    }
}
