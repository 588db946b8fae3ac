//! Profile, skill and credit DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::PaginationMeta;
use crate::domain::{CreditTransaction, Credits, Profile, ProfileUpdate, Skill, SkillId, UserId};
use crate::store::ProfileSkills;

/// Request body for `POST /profiles`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateProfileRequest {
    /// Public name, 1–80 characters.
    pub display_name: String,
    /// Optional biography, up to 500 characters.
    #[serde(default)]
    pub bio: Option<String>,
    /// Optional avatar object key, `"<your id>/<file>"`.
    #[serde(default)]
    pub avatar_path: Option<String>,
}

/// Request body for `PATCH /profiles/me`. Omitted fields are left alone;
/// `null` clears `bio` or `avatar_path`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    /// New public name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// New biography.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub bio: Option<Option<String>>,
    /// New avatar object key.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub avatar_path: Option<Option<String>>,
}

/// Distinguishes an explicit `null` from a missing field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(req: UpdateProfileRequest) -> Self {
        Self {
            display_name: req.display_name,
            bio: req.bio,
            avatar_path: req.avatar_path,
        }
    }
}

/// The caller's own profile, including the balance.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProfileResponse {
    /// User id.
    pub id: UserId,
    /// Public name.
    pub display_name: String,
    /// Biography.
    pub bio: Option<String>,
    /// Avatar object key.
    pub avatar_path: Option<String>,
    /// Public avatar URL.
    pub avatar_url: Option<String>,
    /// Current balance.
    pub credit_balance: Credits,
    /// Signup time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl ProfileResponse {
    /// Builds the private view of `profile`.
    #[must_use]
    pub fn new(profile: Profile, avatar_url: Option<String>) -> Self {
        Self {
            id: profile.id,
            display_name: profile.display_name,
            bio: profile.bio,
            avatar_path: profile.avatar_path,
            avatar_url,
            credit_balance: profile.credit_balance,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

/// Another member's profile as anyone may see it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicProfileDto {
    /// User id.
    pub id: UserId,
    /// Public name.
    pub display_name: String,
    /// Biography.
    pub bio: Option<String>,
    /// Public avatar URL.
    pub avatar_url: Option<String>,
    /// Member since.
    pub created_at: DateTime<Utc>,
}

impl PublicProfileDto {
    /// Builds the public view of `profile`.
    #[must_use]
    pub fn new(profile: Profile, avatar_url: Option<String>) -> Self {
        Self {
            id: profile.id,
            display_name: profile.display_name,
            bio: profile.bio,
            avatar_url,
            created_at: profile.created_at,
        }
    }
}

/// Response for `GET /profiles/{id}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProfileDetailResponse {
    /// Public profile.
    pub profile: PublicProfileDto,
    /// Skills taught.
    pub teaches: Vec<Skill>,
    /// Skills wanted.
    pub learns: Vec<Skill>,
}

/// Response for `GET /profiles`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProfileListResponse {
    /// Page of profiles.
    pub data: Vec<PublicProfileDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Query parameters for `GET /profiles`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BrowseProfilesParams {
    /// Only members teaching this skill.
    pub teaches: Option<SkillId>,
}

/// Request body for `PUT /profiles/me/skills`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReplaceSkillsRequest {
    /// Skills the caller teaches.
    #[serde(default)]
    pub teaches: Vec<SkillId>,
    /// Skills the caller wants to learn.
    #[serde(default)]
    pub learns: Vec<SkillId>,
}

/// A member's teach and learn sets.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProfileSkillsResponse {
    /// Skills taught.
    pub teaches: Vec<Skill>,
    /// Skills wanted.
    pub learns: Vec<Skill>,
}

impl From<ProfileSkills> for ProfileSkillsResponse {
    fn from(skills: ProfileSkills) -> Self {
        Self {
            teaches: skills.teaches,
            learns: skills.learns,
        }
    }
}

/// Query parameters for `GET /skills`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SkillQuery {
    /// Category filter (case-insensitive).
    pub category: Option<String>,
}

/// Request body for `POST /credits/top-up`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TopUpRequest {
    /// Credits to add, as a decimal string or number.
    pub amount: Credits,
}

/// A balance after a change.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BalanceResponse {
    /// Current balance.
    pub credit_balance: Credits,
}

/// Response for `GET /credits/transactions`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionListResponse {
    /// Current balance.
    pub credit_balance: Credits,
    /// Ledger rows, newest first.
    pub data: Vec<CreditTransaction>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn patch_distinguishes_null_from_missing() {
        let Ok(req) = serde_json::from_str::<UpdateProfileRequest>(r#"{"bio": null}"#) else {
            panic!("parse failed");
        };
        assert_eq!(req.bio, Some(None));
        assert_eq!(req.avatar_path, None);

        let update = ProfileUpdate::from(req);
        assert!(!update.is_empty());
    }

    #[test]
    fn top_up_accepts_string_or_number() {
        let Ok(a) = serde_json::from_str::<TopUpRequest>(r#"{"amount": "2.50"}"#) else {
            panic!("parse failed");
        };
        let Ok(b) = serde_json::from_str::<TopUpRequest>(r#"{"amount": 2.5}"#) else {
            panic!("parse failed");
        };
        assert_eq!(a.amount, b.amount);
    }
}
