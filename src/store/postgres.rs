//! PostgreSQL implementation of [`MarketStore`].
//!
//! Compound writes run in one `sqlx` transaction. Status preconditions are
//! compare-and-set updates (`UPDATE … WHERE status IN (…) RETURNING`) and
//! every balance change carries a `balance + delta >= 0` guard, so two
//! concurrent accepts or completions cannot both succeed.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::models::{
    ConversationRow, MessageRow, ProfileRow, RequestRow, ReviewRow, SessionRow, SkillRow,
    TransactionRow, convert_all,
};
use super::{
    Acceptance, Completion, ConversationOverview, MarketStore, Page, Party, ProfileSkills,
    RequestFilter,
};
use crate::config::MarketConfig;
use crate::domain::{
    Conversation, ConversationId, CreditTransaction, Credits, LearningRequest, Message,
    ParticipantPair, Profile, ProfileUpdate, RequestId, RequestStatus, Review, Session, SessionId,
    SessionStatus, Settlement, Skill, SkillId, UserId,
};
use crate::error::MarketError;

const PROFILE_COLUMNS: &str =
    "id, display_name, bio, avatar_path, credit_balance_cents, created_at, updated_at";
const REQUEST_COLUMNS: &str =
    "id, learner_id, tutor_id, skill_id, message, proposed_time, status, created_at, updated_at";
const SESSION_COLUMNS: &str = "id, tutor_id, learner_id, skill_id, request_id, scheduled_at, \
     duration_minutes, status, notes, is_ai_session, created_at, completed_at";
const TRANSACTION_COLUMNS: &str =
    "id, user_id, amount_cents, type, session_id, description, created_at";
const CONVERSATION_COLUMNS: &str =
    "id, participant_a, participant_b, created_at, last_message_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, read_at, created_at";
const REVIEW_COLUMNS: &str =
    "id, session_id, reviewer_id, reviewee_id, rating, comment, created_at";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects using the database settings in `config` and applies the
    /// bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] if the connection or a
    /// migration fails.
    pub async fn connect(config: &MarketConfig) -> Result<Self, MarketError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| MarketError::Persistence(format!("migration failed: {e}")))?;
        tracing::info!("database migrations applied");
        Ok(Self::new(pool))
    }
}

/// Applies one ledger entry inside an open transaction and returns the new
/// balance.
async fn apply_entry(conn: &mut PgConnection, entry: &CreditTransaction) -> Result<Credits, MarketError> {
    let updated = sqlx::query_scalar::<_, i64>(
        "UPDATE profiles SET credit_balance_cents = credit_balance_cents + $2, updated_at = now() \
         WHERE id = $1 AND credit_balance_cents + $2 >= 0 RETURNING credit_balance_cents",
    )
    .bind(entry.user_id.as_uuid())
    .bind(entry.amount.cents())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(balance) = updated else {
        let current = sqlx::query_scalar::<_, i64>(
            "SELECT credit_balance_cents FROM profiles WHERE id = $1",
        )
        .bind(entry.user_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;
        return Err(match current {
            Some(cents) => MarketError::InsufficientCredits {
                required: -entry.amount,
                available: Credits::from_cents(cents),
            },
            None => MarketError::not_found("profile", entry.user_id),
        });
    };

    sqlx::query(
        "INSERT INTO credit_transactions (id, user_id, amount_cents, type, session_id, description, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.id.as_uuid())
    .bind(entry.user_id.as_uuid())
    .bind(entry.amount.cents())
    .bind(entry.kind.as_str())
    .bind(entry.session_id.map(Uuid::from))
    .bind(&entry.description)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(Credits::from_cents(balance))
}

/// Returns the conversation for `pair`, inserting it if missing.
async fn upsert_conversation(
    conn: &mut PgConnection,
    pair: ParticipantPair,
) -> Result<Conversation, MarketError> {
    let fresh = Conversation::new(pair);
    // The no-op update makes RETURNING yield the existing row on conflict.
    let row = sqlx::query_as::<_, ConversationRow>(&format!(
        "INSERT INTO conversations ({CONVERSATION_COLUMNS}) VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (participant_a, participant_b) \
         DO UPDATE SET participant_a = conversations.participant_a \
         RETURNING {CONVERSATION_COLUMNS}"
    ))
    .bind(fresh.id.as_uuid())
    .bind(fresh.participant_a.as_uuid())
    .bind(fresh.participant_b.as_uuid())
    .bind(fresh.created_at)
    .bind(fresh.last_message_at)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.into())
}

/// Inserts a message row and bumps its conversation's activity time.
async fn insert_message_row(conn: &mut PgConnection, message: &Message) -> Result<(), MarketError> {
    let touched = sqlx::query("UPDATE conversations SET last_message_at = $2 WHERE id = $1")
        .bind(message.conversation_id.as_uuid())
        .bind(message.created_at)
        .execute(&mut *conn)
        .await?;
    if touched.rows_affected() == 0 {
        return Err(MarketError::not_found("conversation", message.conversation_id));
    }
    sqlx::query(&format!(
        "INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
    ))
    .bind(message.id.as_uuid())
    .bind(message.conversation_id.as_uuid())
    .bind(message.sender_id.as_uuid())
    .bind(&message.content)
    .bind(message.read_at)
    .bind(message.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_session_row(conn: &mut PgConnection, session: &Session) -> Result<(), MarketError> {
    let duration = i32::try_from(session.duration_minutes)
        .map_err(|_| MarketError::InvalidRequest("duration_minutes out of range".to_string()))?;
    sqlx::query(&format!(
        "INSERT INTO sessions ({SESSION_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
    ))
    .bind(session.id.as_uuid())
    .bind(session.tutor_id.map(Uuid::from))
    .bind(session.learner_id.as_uuid())
    .bind(session.skill_id.as_uuid())
    .bind(session.request_id.map(Uuid::from))
    .bind(session.scheduled_at)
    .bind(duration)
    .bind(session.status.as_str())
    .bind(&session.notes)
    .bind(session.is_ai_session)
    .bind(session.created_at)
    .bind(session.completed_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn fetch_skills(
    conn: &mut PgConnection,
    user: UserId,
    table: &str,
) -> Result<Vec<Skill>, MarketError> {
    let rows = sqlx::query_as::<_, SkillRow>(&format!(
        "SELECT s.id, s.name, s.category FROM skills s \
         JOIN {table} j ON j.skill_id = s.id WHERE j.profile_id = $1 ORDER BY s.name"
    ))
    .bind(user.as_uuid())
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

fn limit_of(page: Page) -> i64 {
    i64::from(page.limit)
}

fn offset_of(page: Page) -> i64 {
    i64::from(page.offset)
}

fn count_of(total: i64) -> u64 {
    u64::try_from(total).unwrap_or(0)
}

#[async_trait]
impl MarketStore for PostgresStore {
    async fn ping(&self) -> Result<(), MarketError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_profile(
        &self,
        profile: Profile,
        grant: Option<CreditTransaction>,
    ) -> Result<Profile, MarketError> {
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(&format!(
            "INSERT INTO profiles ({PROFILE_COLUMNS}) VALUES ($1, $2, $3, $4, 0, $5, $6) \
             ON CONFLICT (id) DO NOTHING"
        ))
        .bind(profile.id.as_uuid())
        .bind(&profile.display_name)
        .bind(&profile.bio)
        .bind(&profile.avatar_path)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(MarketError::Conflict(format!(
                "profile {} already exists",
                profile.id
            )));
        }
        if let Some(grant) = grant {
            apply_entry(&mut tx, &grant).await?;
        }
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(profile.id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, MarketError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> Result<Profile, MarketError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| MarketError::not_found("profile", id))?;

        let mut profile = Profile::from(row);
        update.apply_to(&mut profile);

        sqlx::query(
            "UPDATE profiles SET display_name = $2, bio = $3, avatar_path = $4, updated_at = $5 \
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(&profile.display_name)
        .bind(&profile.bio)
        .bind(&profile.avatar_path)
        .bind(profile.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(profile)
    }

    async fn list_profiles(
        &self,
        teaches: Option<SkillId>,
        page: Page,
    ) -> Result<(Vec<Profile>, u64), MarketError> {
        let filter = "($1::uuid IS NULL OR EXISTS (SELECT 1 FROM profile_teaches t \
                      WHERE t.profile_id = p.id AND t.skill_id = $1))";
        let skill = teaches.map(Uuid::from);

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM profiles p WHERE {filter}"
        ))
        .bind(skill)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles p WHERE {filter} \
             ORDER BY display_name, id LIMIT $2 OFFSET $3"
        ))
        .bind(skill)
        .bind(limit_of(page))
        .bind(offset_of(page))
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), count_of(total)))
    }

    async fn replace_profile_skills(
        &self,
        id: UserId,
        teaches: &[SkillId],
        learns: &[SkillId],
    ) -> Result<ProfileSkills, MarketError> {
        let mut tx = self.pool.begin().await?;
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM profiles WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(MarketError::not_found("profile", id));
        }

        for (table, skills) in [("profile_teaches", teaches), ("profile_learns", learns)] {
            sqlx::query(&format!("DELETE FROM {table} WHERE profile_id = $1"))
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await?;
            for skill in skills {
                let known = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM skills WHERE id = $1)",
                )
                .bind(skill.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
                if !known {
                    return Err(MarketError::not_found("skill", skill));
                }
                sqlx::query(&format!(
                    "INSERT INTO {table} (profile_id, skill_id) VALUES ($1, $2) \
                     ON CONFLICT DO NOTHING"
                ))
                .bind(id.as_uuid())
                .bind(skill.as_uuid())
                .execute(&mut *tx)
                .await?;
            }
        }

        let result = ProfileSkills {
            teaches: fetch_skills(&mut tx, id, "profile_teaches").await?,
            learns: fetch_skills(&mut tx, id, "profile_learns").await?,
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn profile_skills(&self, id: UserId) -> Result<ProfileSkills, MarketError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ProfileSkills {
            teaches: fetch_skills(&mut conn, id, "profile_teaches").await?,
            learns: fetch_skills(&mut conn, id, "profile_learns").await?,
        })
    }

    async fn apply_transaction(&self, entry: CreditTransaction) -> Result<Credits, MarketError> {
        let mut tx = self.pool.begin().await?;
        let balance = apply_entry(&mut tx, &entry).await?;
        tx.commit().await?;
        Ok(balance)
    }

    async fn list_transactions(
        &self,
        user: UserId,
        page: Page,
    ) -> Result<(Vec<CreditTransaction>, u64), MarketError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM credit_transactions WHERE user_id = $1",
        )
        .bind(user.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM credit_transactions WHERE user_id = $1 \
             ORDER BY created_at DESC, id LIMIT $2 OFFSET $3"
        ))
        .bind(user.as_uuid())
        .bind(limit_of(page))
        .bind(offset_of(page))
        .fetch_all(&self.pool)
        .await?;
        Ok((convert_all(rows)?, count_of(total)))
    }

    async fn list_skills(&self, category: Option<&str>) -> Result<Vec<Skill>, MarketError> {
        let rows = sqlx::query_as::<_, SkillRow>(
            "SELECT id, name, category FROM skills \
             WHERE $1::text IS NULL OR lower(category) = lower($1) ORDER BY category, name",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_skill(&self, id: SkillId) -> Result<Option<Skill>, MarketError> {
        let row = sqlx::query_as::<_, SkillRow>("SELECT id, name, category FROM skills WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_request(&self, request: LearningRequest) -> Result<LearningRequest, MarketError> {
        sqlx::query(&format!(
            "INSERT INTO learning_requests ({REQUEST_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(request.id.as_uuid())
        .bind(request.learner_id.as_uuid())
        .bind(request.tutor_id.as_uuid())
        .bind(request.skill_id.as_uuid())
        .bind(&request.message)
        .bind(request.proposed_time)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(request)
    }

    async fn get_request(&self, id: RequestId) -> Result<Option<LearningRequest>, MarketError> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM learning_requests WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(LearningRequest::try_from).transpose()
    }

    async fn list_requests(
        &self,
        user: UserId,
        filter: RequestFilter,
    ) -> Result<Vec<LearningRequest>, MarketError> {
        let party = match filter.role {
            Some(Party::Learner) => "learner_id = $1",
            Some(Party::Tutor) => "tutor_id = $1",
            None => "(learner_id = $1 OR tutor_id = $1)",
        };
        let rows = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM learning_requests \
             WHERE {party} AND ($2::text IS NULL OR status = $2) ORDER BY created_at DESC"
        ))
        .bind(user.as_uuid())
        .bind(filter.status.map(RequestStatus::as_str))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn resolve_request(
        &self,
        id: RequestId,
        to: RequestStatus,
    ) -> Result<LearningRequest, MarketError> {
        if matches!(to, RequestStatus::Pending | RequestStatus::Accepted) {
            return Err(MarketError::InvalidRequest(format!(
                "cannot resolve a request to {to}"
            )));
        }
        let mut tx = self.pool.begin().await?;
        let request = claim_pending(&mut tx, id, to).await?;
        tx.commit().await?;
        Ok(request)
    }

    async fn accept_request(
        &self,
        id: RequestId,
        session: Session,
        greeting: String,
    ) -> Result<Acceptance, MarketError> {
        let mut tx = self.pool.begin().await?;
        let request = claim_pending(&mut tx, id, RequestStatus::Accepted).await?;
        insert_session_row(&mut tx, &session).await?;

        let pair = ParticipantPair::new(request.tutor_id, request.learner_id)?;
        let conversation = upsert_conversation(&mut tx, pair).await?;
        let message = Message::new(conversation.id, request.tutor_id, greeting);
        insert_message_row(&mut tx, &message).await?;
        tx.commit().await?;

        let conversation = Conversation {
            last_message_at: message.created_at,
            ..conversation
        };
        Ok(Acceptance {
            request,
            session,
            conversation,
            message,
        })
    }

    async fn insert_session(&self, session: Session) -> Result<Session, MarketError> {
        let mut conn = self.pool.acquire().await?;
        insert_session_row(&mut conn, &session).await?;
        Ok(session)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, MarketError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Session::try_from).transpose()
    }

    async fn list_sessions(
        &self,
        user: UserId,
        status: Option<SessionStatus>,
    ) -> Result<Vec<Session>, MarketError> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE (learner_id = $1 OR tutor_id = $1) AND ($2::text IS NULL OR status = $2) \
             ORDER BY scheduled_at DESC"
        ))
        .bind(user.as_uuid())
        .bind(status.map(SessionStatus::as_str))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn transition_session(
        &self,
        id: SessionId,
        to: SessionStatus,
    ) -> Result<Session, MarketError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| MarketError::not_found("session", id))?;
        let mut session = Session::try_from(row)?;
        match to {
            SessionStatus::InProgress => session.start()?,
            SessionStatus::Cancelled => session.cancel()?,
            other => {
                return Err(MarketError::InvalidRequest(format!(
                    "cannot transition a session to {other}"
                )));
            }
        }
        sqlx::query("UPDATE sessions SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(session.status.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(session)
    }

    async fn complete_session(
        &self,
        id: SessionId,
        notes: Option<String>,
        settlement: &Settlement,
    ) -> Result<Completion, MarketError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "UPDATE sessions SET status = 'completed', completed_at = $2, notes = COALESCE($3, notes) \
             WHERE id = $1 AND status IN ('scheduled', 'in_progress') \
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(Utc::now())
        .bind(&notes)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            let current = current_session(&mut tx, id).await?;
            return Err(MarketError::SessionClosed(current.status));
        };
        let session = Session::try_from(row)?;

        let mut learner_balance = None;
        for entry in &settlement.entries {
            let balance = apply_entry(&mut tx, entry).await?;
            if entry.user_id == session.learner_id {
                learner_balance = Some(balance);
            }
        }
        let learner_balance = match learner_balance {
            Some(balance) => balance,
            None => {
                let cents = sqlx::query_scalar::<_, i64>(
                    "SELECT credit_balance_cents FROM profiles WHERE id = $1",
                )
                .bind(session.learner_id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
                Credits::from_cents(cents)
            }
        };
        tx.commit().await?;

        Ok(Completion {
            session,
            learner_balance,
            transactions: settlement.entries.clone(),
        })
    }

    async fn get_or_create_conversation(
        &self,
        pair: ParticipantPair,
    ) -> Result<Conversation, MarketError> {
        let mut conn = self.pool.acquire().await?;
        upsert_conversation(&mut conn, pair).await
    }

    async fn get_conversation(&self, id: ConversationId) -> Result<Option<Conversation>, MarketError> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_conversations(&self, user: UserId) -> Result<Vec<ConversationOverview>, MarketError> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid, Uuid, DateTime<Utc>, DateTime<Utc>, i64)>(
            "SELECT c.id, c.participant_a, c.participant_b, c.created_at, c.last_message_at, \
                    (SELECT COUNT(*) FROM messages m \
                     WHERE m.conversation_id = c.id AND m.sender_id <> $1 AND m.read_at IS NULL) \
             FROM conversations c \
             WHERE c.participant_a = $1 OR c.participant_b = $1 \
             ORDER BY c.last_message_at DESC",
        )
        .bind(user.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(
                |(id, participant_a, participant_b, created_at, last_message_at, unread)| {
                    ConversationOverview {
                        conversation: ConversationRow {
                            id,
                            participant_a,
                            participant_b,
                            created_at,
                            last_message_at,
                        }
                        .into(),
                        unread_count: count_of(unread),
                    }
                },
            )
            .collect())
    }

    async fn insert_message(&self, message: Message) -> Result<Message, MarketError> {
        let mut tx = self.pool.begin().await?;
        insert_message_row(&mut tx, &message).await?;
        tx.commit().await?;
        Ok(message)
    }

    async fn list_messages(
        &self,
        conversation: ConversationId,
        page: Page,
    ) -> Result<(Vec<Message>, u64), MarketError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = $1",
        )
        .bind(conversation.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = $1 \
             ORDER BY created_at, id LIMIT $2 OFFSET $3"
        ))
        .bind(conversation.as_uuid())
        .bind(limit_of(page))
        .bind(offset_of(page))
        .fetch_all(&self.pool)
        .await?;
        Ok((rows.into_iter().map(Into::into).collect(), count_of(total)))
    }

    async fn mark_read(
        &self,
        conversation: ConversationId,
        reader: UserId,
        at: DateTime<Utc>,
    ) -> Result<u64, MarketError> {
        let result = sqlx::query(
            "UPDATE messages SET read_at = $3 \
             WHERE conversation_id = $1 AND sender_id <> $2 AND read_at IS NULL",
        )
        .bind(conversation.as_uuid())
        .bind(reader.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_review(&self, review: Review) -> Result<Review, MarketError> {
        sqlx::query(&format!(
            "INSERT INTO reviews ({REVIEW_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(review.id.as_uuid())
        .bind(review.session_id.as_uuid())
        .bind(review.reviewer_id.as_uuid())
        .bind(review.reviewee_id.as_uuid())
        .bind(i16::from(review.rating.get()))
        .bind(&review.comment)
        .bind(review.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                MarketError::Conflict("you have already reviewed this session".to_string())
            }
            other => MarketError::from(other),
        })?;
        Ok(review)
    }

    async fn list_reviews_for(&self, user: UserId) -> Result<Vec<Review>, MarketError> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE reviewee_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }
}

/// Compare-and-set a pending request to `to`, returning the updated row.
async fn claim_pending(
    conn: &mut PgConnection,
    id: RequestId,
    to: RequestStatus,
) -> Result<LearningRequest, MarketError> {
    let row = sqlx::query_as::<_, RequestRow>(&format!(
        "UPDATE learning_requests SET status = $2, updated_at = now() \
         WHERE id = $1 AND status = 'pending' RETURNING {REQUEST_COLUMNS}"
    ))
    .bind(id.as_uuid())
    .bind(to.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some(row) => LearningRequest::try_from(row),
        None => {
            let status = sqlx::query_scalar::<_, String>(
                "SELECT status FROM learning_requests WHERE id = $1",
            )
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| MarketError::not_found("request", id))?;
            Err(MarketError::NotPending(status.parse()?))
        }
    }
}

async fn current_session(conn: &mut PgConnection, id: SessionId) -> Result<Session, MarketError> {
    let row = sqlx::query_as::<_, SessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| MarketError::not_found("session", id))?;
    Session::try_from(row)
}

/// These need a live PostgreSQL reachable through `DATABASE_URL`; run with
/// `cargo test -- --ignored`. `sqlx::test` creates a scratch database per
/// test and applies `migrations/`.
#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::TransactionType;

    async fn member(store: &PostgresStore, cents: i64) -> UserId {
        let id = UserId::new();
        let grant = CreditTransaction::new(
            id,
            Credits::from_cents(cents),
            TransactionType::SignupBonus,
            None,
            "Welcome bonus",
        );
        let profile = Profile::new(id, format!("member-{id}"), None, None);
        let Ok(_) = store.create_profile(profile, Some(grant)).await else {
            panic!("profile insert failed");
        };
        id
    }

    async fn any_skill(store: &PostgresStore) -> Skill {
        let Ok(skills) = store.list_skills(None).await else {
            panic!("catalog query failed");
        };
        let Some(skill) = skills.into_iter().next() else {
            panic!("catalog is empty");
        };
        skill
    }

    async fn balance(store: &PostgresStore, id: UserId) -> Credits {
        let Ok(Some(profile)) = store.get_profile(id).await else {
            panic!("profile missing");
        };
        profile.credit_balance
    }

    async fn booked_session(store: &PostgresStore, learner: UserId, tutor: UserId) -> (Session, Skill) {
        let skill = any_skill(store).await;
        let Ok(request) = store
            .insert_request(LearningRequest::new(learner, tutor, skill.id, None, None))
            .await
        else {
            panic!("request insert failed");
        };
        let session = Session::from_request(&request, Utc::now(), 60);
        let Ok(acceptance) = store.accept_request(request.id, session, "booked".into()).await else {
            panic!("accept failed");
        };
        (acceptance.session, skill)
    }

    #[sqlx::test]
    #[ignore = "needs PostgreSQL"]
    async fn concurrent_accepts_have_one_winner(pool: PgPool) {
        let store = Arc::new(PostgresStore::new(pool));
        let learner = member(&store, 300).await;
        let tutor = member(&store, 0).await;
        let skill = any_skill(&store).await;
        let Ok(request) = store
            .insert_request(LearningRequest::new(learner, tutor, skill.id, None, None))
            .await
        else {
            panic!("request insert failed");
        };

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let id = request.id;
            let session = Session::from_request(&request, Utc::now(), 60);
            handles.push(tokio::spawn(async move {
                store.accept_request(id, session, "booked".into()).await
            }));
        }
        let mut wins = 0;
        for handle in handles {
            let Ok(result) = handle.await else {
                panic!("task panicked");
            };
            match result {
                Ok(_) => wins += 1,
                Err(MarketError::NotPending(RequestStatus::Accepted)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(wins, 1);
        let Ok(sessions) = store.list_sessions(learner, None).await else {
            panic!("session query failed");
        };
        assert_eq!(sessions.len(), 1);
    }

    #[sqlx::test]
    #[ignore = "needs PostgreSQL"]
    async fn completion_settles_exactly_once(pool: PgPool) {
        let store = Arc::new(PostgresStore::new(pool));
        let learner = member(&store, 300).await;
        let tutor = member(&store, 0).await;
        let (session, skill) = booked_session(&store, learner, tutor).await;
        let settlement = Arc::new(Settlement::for_session(&session, &skill.name));

        let session_id = session.id;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let settlement = Arc::clone(&settlement);
            handles.push(tokio::spawn(async move {
                store.complete_session(session_id, None, &settlement).await
            }));
        }
        let mut wins = 0;
        for handle in handles {
            let Ok(result) = handle.await else {
                panic!("task panicked");
            };
            match result {
                Ok(_) => wins += 1,
                Err(MarketError::SessionClosed(SessionStatus::Completed)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(balance(&store, learner).await, Credits::whole(2));
        assert_eq!(balance(&store, tutor).await, Credits::whole(1));
        let Ok((_, rows)) = store.list_transactions(tutor, Page::ALL).await else {
            panic!("ledger query failed");
        };
        assert_eq!(rows, 2);
    }

    #[sqlx::test]
    #[ignore = "needs PostgreSQL"]
    async fn broke_learner_cannot_complete(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let learner = member(&store, 50).await;
        let tutor = member(&store, 0).await;
        let (session, skill) = booked_session(&store, learner, tutor).await;
        let settlement = Settlement::for_session(&session, &skill.name);

        let result = store.complete_session(session.id, None, &settlement).await;
        assert!(matches!(result, Err(MarketError::InsufficientCredits { .. })));

        // The status change rolled back with the failed debit.
        let Ok(Some(current)) = store.get_session(session.id).await else {
            panic!("session missing");
        };
        assert_eq!(current.status, SessionStatus::Scheduled);
        assert_eq!(balance(&store, learner).await, Credits::from_cents(50));
        assert_eq!(balance(&store, tutor).await, Credits::ZERO);
    }

    #[sqlx::test]
    #[ignore = "needs PostgreSQL"]
    async fn overdraft_is_refused(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let id = member(&store, 50).await;
        let debit = CreditTransaction::new(
            id,
            Credits::whole(-1),
            TransactionType::SessionPayment,
            None,
            "x",
        );
        let result = store.apply_transaction(debit).await;
        assert!(matches!(result, Err(MarketError::InsufficientCredits { .. })));
        assert_eq!(balance(&store, id).await, Credits::from_cents(50));
        let Ok((_, rows)) = store.list_transactions(id, Page::ALL).await else {
            panic!("ledger query failed");
        };
        assert_eq!(rows, 1);
    }

    #[sqlx::test]
    #[ignore = "needs PostgreSQL"]
    async fn ping_reaches_the_database(pool: PgPool) {
        let store = PostgresStore::new(pool);
        tokio_test::assert_ok!(store.ping().await);
    }
}
