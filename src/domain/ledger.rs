//! Append-only credit ledger and session settlement.
//!
//! Every balance change is paired with exactly one [`CreditTransaction`]
//! written in the same atomic store operation, so the sum of a user's
//! ledger always equals their balance.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Credits, Session, SessionId, TransactionId, UserId};
use crate::error::MarketError;

/// Price a learner pays for a completed human session.
pub const HUMAN_SESSION_COST: Credits = Credits::whole(1);

/// Amount a tutor earns for a completed human session.
pub const TUTOR_PAYOUT: Credits = Credits::whole(1);

/// Price a learner pays for a completed AI-assisted session.
pub const AI_SESSION_COST: Credits = Credits::from_cents(50);

/// Balance a learner needs before sending a learning request.
pub const MIN_BALANCE_TO_REQUEST: Credits = HUMAN_SESSION_COST;

/// Reason a ledger row exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credits granted when the profile is created.
    SignupBonus,
    /// Credits bought by the user.
    TopUp,
    /// Learner paying for a human session.
    SessionPayment,
    /// Tutor paid for a human session.
    SessionEarning,
    /// Learner paying for an AI session.
    AiSession,
}

impl TransactionType {
    /// Returns the type as its wire/database string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SignupBonus => "signup_bonus",
            Self::TopUp => "top_up",
            Self::SessionPayment => "session_payment",
            Self::SessionEarning => "session_earning",
            Self::AiSession => "ai_session",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signup_bonus" => Ok(Self::SignupBonus),
            "top_up" => Ok(Self::TopUp),
            "session_payment" => Ok(Self::SessionPayment),
            "session_earning" => Ok(Self::SessionEarning),
            "ai_session" => Ok(Self::AiSession),
            other => Err(MarketError::Internal(format!(
                "unknown transaction type: {other}"
            ))),
        }
    }
}

/// One immutable ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CreditTransaction {
    /// Row identifier.
    pub id: TransactionId,
    /// Account holder.
    pub user_id: UserId,
    /// Signed change applied to the balance.
    pub amount: Credits,
    /// Why the balance changed.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Session that caused the change, if any.
    pub session_id: Option<SessionId>,
    /// Human-readable description.
    pub description: String,
    /// Write time.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Creates a ledger row stamped now.
    #[must_use]
    pub fn new(
        user_id: UserId,
        amount: Credits,
        kind: TransactionType,
        session_id: Option<SessionId>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            user_id,
            amount,
            kind,
            session_id,
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

/// Balance changes produced by completing a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Session being settled.
    pub session_id: SessionId,
    /// Learner paying for the session.
    pub learner_id: UserId,
    /// Ledger rows to append; each amount is applied to its user.
    pub entries: Vec<CreditTransaction>,
}

impl Settlement {
    /// Plans the settlement of `session`.
    ///
    /// Human sessions move [`HUMAN_SESSION_COST`] from the learner and pay
    /// [`TUTOR_PAYOUT`] to the tutor. AI sessions only charge the learner
    /// [`AI_SESSION_COST`].
    #[must_use]
    pub fn for_session(session: &Session, skill_name: &str) -> Self {
        let entries = match session.tutor_id.filter(|_| !session.is_ai_session) {
            Some(tutor_id) => vec![
                CreditTransaction::new(
                    session.learner_id,
                    -HUMAN_SESSION_COST,
                    TransactionType::SessionPayment,
                    Some(session.id),
                    format!("Learning session: {skill_name}"),
                ),
                CreditTransaction::new(
                    tutor_id,
                    TUTOR_PAYOUT,
                    TransactionType::SessionEarning,
                    Some(session.id),
                    format!("Teaching session: {skill_name}"),
                ),
            ],
            None => vec![CreditTransaction::new(
                session.learner_id,
                -AI_SESSION_COST,
                TransactionType::AiSession,
                Some(session.id),
                format!("AI learning session: {skill_name}"),
            )],
        };
        Self {
            session_id: session.id,
            learner_id: session.learner_id,
            entries,
        }
    }

    /// Total the learner is charged (positive).
    #[must_use]
    pub fn learner_cost(&self) -> Credits {
        -self
            .entries
            .iter()
            .filter(|e| e.user_id == self.learner_id && e.amount.is_negative())
            .fold(Credits::ZERO, |acc, e| acc + e.amount)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{LearningRequest, SkillId};

    fn human_session() -> Session {
        let req = LearningRequest::new(UserId::new(), UserId::new(), SkillId::new(), None, None);
        Session::from_request(&req, Utc::now(), 60)
    }

    #[test]
    fn human_settlement_moves_one_credit() {
        let session = human_session();
        let settlement = Settlement::for_session(&session, "Guitar");
        assert_eq!(settlement.entries.len(), 2);

        let debit = settlement.entries.iter().find(|e| e.user_id == session.learner_id);
        let credit = settlement.entries.iter().find(|e| Some(e.user_id) == session.tutor_id);
        assert_eq!(debit.map(|e| (e.amount, e.kind)), Some((Credits::whole(-1), TransactionType::SessionPayment)));
        assert_eq!(credit.map(|e| (e.amount, e.kind)), Some((Credits::whole(1), TransactionType::SessionEarning)));
        assert_eq!(settlement.learner_cost(), Credits::whole(1));

        let net = settlement.entries.iter().fold(Credits::ZERO, |acc, e| acc + e.amount);
        assert_eq!(net, Credits::ZERO);
    }

    #[test]
    fn ai_settlement_charges_half_credit_only() {
        let session = Session::ai(UserId::new(), SkillId::new(), Utc::now(), 30);
        let settlement = Settlement::for_session(&session, "Rust");
        assert_eq!(settlement.entries.len(), 1);
        let Some(entry) = settlement.entries.first() else {
            panic!("expected one entry");
        };
        assert_eq!(entry.user_id, session.learner_id);
        assert_eq!(entry.amount, Credits::from_cents(-50));
        assert_eq!(entry.kind, TransactionType::AiSession);
        assert_eq!(entry.session_id, Some(session.id));
        assert_eq!(settlement.learner_cost(), AI_SESSION_COST);
    }

    #[test]
    fn type_serializes_under_type_key() {
        let tx = CreditTransaction::new(UserId::new(), Credits::whole(3), TransactionType::SignupBonus, None, "Welcome");
        let Ok(json) = serde_json::to_value(&tx) else {
            panic!("serialization failed");
        };
        assert_eq!(json.get("type").and_then(|v| v.as_str()), Some("signup_bonus"));
        assert_eq!(json.get("amount").and_then(|v| v.as_str()), Some("3.00"));
    }

    #[test]
    fn type_strings_parse_back() {
        for kind in [
            TransactionType::SignupBonus,
            TransactionType::TopUp,
            TransactionType::SessionPayment,
            TransactionType::SessionEarning,
            TransactionType::AiSession,
        ] {
            assert_eq!(kind.as_str().parse::<TransactionType>().ok(), Some(kind));
        }
    }
}
