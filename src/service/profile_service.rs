//! Profiles, skill sets, the skill catalog and credit top-ups.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::profile::{avatar_url, check_avatar_path};
use crate::domain::validate::{bounded_text, optional_text};
use crate::domain::{
    CreditTransaction, Credits, Profile, ProfileUpdate, Skill, SkillId, TransactionType, UserId,
};
use crate::error::MarketError;
use crate::store::{MarketStore, Page, ProfileSkills};

use super::{require_profile, require_skill};

const DISPLAY_NAME_MAX: usize = 80;
const BIO_MAX: usize = 500;
const AVATAR_PATH_MAX: usize = 512;

/// Tunables for [`ProfileService`], taken from configuration.
#[derive(Debug, Clone)]
pub struct ProfileSettings {
    /// Credits granted on profile creation.
    pub signup_bonus: Credits,
    /// Largest single top-up.
    pub max_top_up: Credits,
    /// Public base URL of the avatars bucket.
    pub avatar_public_base_url: String,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            signup_bonus: Credits::whole(3),
            max_top_up: Credits::whole(100),
            avatar_public_base_url: "http://localhost:54321/storage/v1/object/public/avatars"
                .to_string(),
        }
    }
}

/// Orchestrates profile and credit operations.
#[derive(Debug, Clone)]
pub struct ProfileService {
    store: Arc<dyn MarketStore>,
    settings: ProfileSettings,
}

impl ProfileService {
    /// Creates a new `ProfileService`.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>, settings: ProfileSettings) -> Self {
        Self { store, settings }
    }

    /// Public URL of a profile's avatar, if it has one.
    #[must_use]
    pub fn avatar_url(&self, profile: &Profile) -> Option<String> {
        profile
            .avatar_path
            .as_deref()
            .map(|path| avatar_url(&self.settings.avatar_public_base_url, path))
    }

    /// Completes signup for `user` and grants the signup bonus.
    ///
    /// # Errors
    ///
    /// [`MarketError::InvalidRequest`] for bad fields,
    /// [`MarketError::Forbidden`] for an avatar outside the user's folder,
    /// [`MarketError::Conflict`] if the profile already exists.
    pub async fn create_profile(
        &self,
        user: UserId,
        display_name: &str,
        bio: Option<&str>,
        avatar_path: Option<&str>,
    ) -> Result<Profile, MarketError> {
        let display_name = bounded_text("display_name", display_name, 1, DISPLAY_NAME_MAX)?;
        let bio = optional_text("bio", bio, BIO_MAX)?;
        let avatar_path = self.checked_avatar(user, avatar_path)?;

        let grant = self.settings.signup_bonus.is_positive().then(|| {
            CreditTransaction::new(
                user,
                self.settings.signup_bonus,
                TransactionType::SignupBonus,
                None,
                "Welcome bonus",
            )
        });

        let profile = self
            .store
            .create_profile(Profile::new(user, display_name, bio, avatar_path), grant)
            .await?;
        tracing::info!(user_id = %user, balance = %profile.credit_balance, "profile created");
        Ok(profile)
    }

    /// Loads any profile.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] if it does not exist.
    pub async fn get_profile(&self, id: UserId) -> Result<Profile, MarketError> {
        require_profile(self.store.as_ref(), id).await
    }

    /// Applies a partial update to the caller's profile.
    ///
    /// # Errors
    ///
    /// [`MarketError::InvalidRequest`] for bad fields or an empty update,
    /// [`MarketError::NotFound`] if the caller has no profile.
    pub async fn update_profile(
        &self,
        user: UserId,
        update: ProfileUpdate,
    ) -> Result<Profile, MarketError> {
        if update.is_empty() {
            return Err(MarketError::InvalidRequest("nothing to update".to_string()));
        }
        let checked = ProfileUpdate {
            display_name: update
                .display_name
                .as_deref()
                .map(|name| bounded_text("display_name", name, 1, DISPLAY_NAME_MAX))
                .transpose()?,
            bio: update
                .bio
                .map(|bio| optional_text("bio", bio.as_deref(), BIO_MAX))
                .transpose()?,
            avatar_path: update
                .avatar_path
                .map(|path| self.checked_avatar(user, path.as_deref()))
                .transpose()?,
        };
        let profile = self.store.update_profile(user, &checked).await?;
        tracing::info!(user_id = %user, "profile updated");
        Ok(profile)
    }

    /// Lists profiles, optionally only tutors of `teaches`.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] if `teaches` names an unknown skill.
    pub async fn browse(
        &self,
        teaches: Option<SkillId>,
        page: Page,
    ) -> Result<(Vec<Profile>, u64), MarketError> {
        if let Some(skill) = teaches {
            require_skill(self.store.as_ref(), skill).await?;
        }
        self.store.list_profiles(teaches, page).await
    }

    /// A profile's teach and learn sets.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] if the profile does not exist.
    pub async fn skills_of(&self, user: UserId) -> Result<ProfileSkills, MarketError> {
        require_profile(self.store.as_ref(), user).await?;
        self.store.profile_skills(user).await
    }

    /// Replaces the caller's teach and learn sets. Duplicate ids collapse.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] for a missing profile or unknown skill.
    pub async fn replace_skills(
        &self,
        user: UserId,
        teaches: &[SkillId],
        learns: &[SkillId],
    ) -> Result<ProfileSkills, MarketError> {
        let teaches: Vec<SkillId> = teaches.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let learns: Vec<SkillId> = learns.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let skills = self
            .store
            .replace_profile_skills(user, &teaches, &learns)
            .await?;
        tracing::info!(
            user_id = %user,
            teaches = skills.teaches.len(),
            learns = skills.learns.len(),
            "profile skills replaced"
        );
        Ok(skills)
    }

    /// The skill catalog, optionally filtered by category.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on store failure.
    pub async fn catalog(&self, category: Option<&str>) -> Result<Vec<Skill>, MarketError> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        self.store.list_skills(category).await
    }

    /// Adds `amount` credits to the caller's balance.
    ///
    /// # Errors
    ///
    /// [`MarketError::InvalidRequest`] unless `0 < amount <= max_top_up`,
    /// [`MarketError::NotFound`] if the caller has no profile.
    pub async fn top_up(&self, user: UserId, amount: Credits) -> Result<Credits, MarketError> {
        if !amount.is_positive() {
            return Err(MarketError::InvalidRequest(
                "amount must be positive".to_string(),
            ));
        }
        if amount > self.settings.max_top_up {
            return Err(MarketError::InvalidRequest(format!(
                "amount must be at most {}",
                self.settings.max_top_up
            )));
        }
        let entry = CreditTransaction::new(
            user,
            amount,
            TransactionType::TopUp,
            None,
            format!("Credit top-up: {amount}"),
        );
        let balance = self.store.apply_transaction(entry).await?;
        tracing::info!(user_id = %user, %amount, %balance, "credits topped up");
        Ok(balance)
    }

    /// The caller's ledger page, the total row count and current balance.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] if the caller has no profile.
    pub async fn transactions(
        &self,
        user: UserId,
        page: Page,
    ) -> Result<(Vec<CreditTransaction>, u64, Credits), MarketError> {
        let profile = require_profile(self.store.as_ref(), user).await?;
        let (rows, total) = self.store.list_transactions(user, page).await?;
        Ok((rows, total, profile.credit_balance))
    }

    fn checked_avatar(&self, user: UserId, path: Option<&str>) -> Result<Option<String>, MarketError> {
        let Some(path) = optional_text("avatar_path", path, AVATAR_PATH_MAX)? else {
            return Ok(None);
        };
        check_avatar_path(user, &path)?;
        Ok(Some(path))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::service::testing::{any_skill, balance, member, store};

    fn service(store: Arc<dyn MarketStore>) -> ProfileService {
        ProfileService::new(store, ProfileSettings::default())
    }

    #[tokio::test]
    async fn signup_grants_bonus_with_ledger_row() {
        let store = store();
        let svc = service(Arc::clone(&store));
        let user = UserId::new();
        let Ok(profile) = svc.create_profile(user, "  Ada  ", Some("hi"), None).await else {
            panic!("signup failed");
        };
        assert_eq!(profile.display_name, "Ada");
        assert_eq!(profile.credit_balance, Credits::whole(3));

        let Ok((rows, total, current)) = svc.transactions(user, Page::ALL).await else {
            panic!("ledger failed");
        };
        assert_eq!(total, 1);
        assert_eq!(current, Credits::whole(3));
        assert_eq!(rows.first().map(|t| t.kind), Some(TransactionType::SignupBonus));
    }

    #[tokio::test]
    async fn second_signup_conflicts() {
        let svc = service(store());
        let user = UserId::new();
        assert!(svc.create_profile(user, "Ada", None, None).await.is_ok());
        let again = svc.create_profile(user, "Ada", None, None).await;
        assert!(matches!(again, Err(MarketError::Conflict(_))));
    }

    #[tokio::test]
    async fn blank_display_name_is_rejected() {
        let svc = service(store());
        let result = svc.create_profile(UserId::new(), "   ", None, None).await;
        assert!(matches!(result, Err(MarketError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn avatar_must_live_in_own_folder() {
        let svc = service(store());
        let user = UserId::new();
        let other = UserId::new();
        let foreign = format!("{other}/a.png");
        let result = svc.create_profile(user, "Ada", None, Some(&foreign)).await;
        assert!(matches!(result, Err(MarketError::Forbidden(_))));

        let own = format!("{user}/a.png");
        let Ok(profile) = svc.create_profile(user, "Ada", None, Some(&own)).await else {
            panic!("signup failed");
        };
        let Some(url) = svc.avatar_url(&profile) else {
            panic!("avatar url missing");
        };
        assert!(url.ends_with(&own));
    }

    #[tokio::test]
    async fn update_clears_bio_and_keeps_name() {
        let svc = service(store());
        let user = UserId::new();
        assert!(svc.create_profile(user, "Ada", Some("bio"), None).await.is_ok());
        let update = ProfileUpdate {
            bio: Some(None),
            ..ProfileUpdate::default()
        };
        let Ok(profile) = svc.update_profile(user, update).await else {
            panic!("update failed");
        };
        assert_eq!(profile.display_name, "Ada");
        assert_eq!(profile.bio, None);

        let empty = svc.update_profile(user, ProfileUpdate::default()).await;
        assert!(matches!(empty, Err(MarketError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn top_up_is_bounded() {
        let store = store();
        let svc = service(Arc::clone(&store));
        let user = member(&store, "Ada", Credits::ZERO).await;

        assert!(matches!(
            svc.top_up(user, Credits::ZERO).await,
            Err(MarketError::InvalidRequest(_))
        ));
        assert!(matches!(
            svc.top_up(user, Credits::whole(101)).await,
            Err(MarketError::InvalidRequest(_))
        ));
        let Ok(after) = svc.top_up(user, Credits::from_cents(250)).await else {
            panic!("top-up failed");
        };
        assert_eq!(after, Credits::from_cents(250));
        assert_eq!(balance(&store, user).await, Credits::from_cents(250));
    }

    #[tokio::test]
    async fn browse_by_taught_skill() {
        let store = store();
        let svc = service(Arc::clone(&store));
        let skill = any_skill(&store).await;
        let tutor = member(&store, "Tutor", Credits::ZERO).await;
        let _other = member(&store, "Other", Credits::ZERO).await;
        assert!(svc.replace_skills(tutor, &[skill.id, skill.id], &[]).await.is_ok());

        let Ok((found, total)) = svc.browse(Some(skill.id), Page::ALL).await else {
            panic!("browse failed");
        };
        assert_eq!(total, 1);
        assert_eq!(found.first().map(|p| p.id), Some(tutor));

        let unknown = svc.browse(Some(SkillId::new()), Page::ALL).await;
        assert!(matches!(unknown, Err(MarketError::NotFound { .. })));
    }

    #[tokio::test]
    async fn catalog_filters_by_category() {
        let svc = service(store());
        let Ok(music) = svc.catalog(Some("Music")).await else {
            panic!("catalog failed");
        };
        assert!(!music.is_empty());
        assert!(music.iter().all(|s| s.category == "Music"));
    }
}
