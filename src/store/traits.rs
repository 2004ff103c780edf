//! `ProfileStore` trait — single async interface for all persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::insights::model::IndustryInsight;
use crate::profile::model::{NewUser, ProfileUpdate, User};

/// Backend-agnostic persistence trait covering users and industry insights.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Users ───────────────────────────────────────────────────────

    /// Provision a user row for an identity-provider subject.
    /// Fails with a constraint error if the subject or email already exists.
    async fn create_user(&self, new_user: &NewUser) -> Result<User, DatabaseError>;

    /// Look up a user by their session subject.
    async fn find_user_by_subject(&self, subject: &str) -> Result<Option<User>, DatabaseError>;

    // ── Industry insights ───────────────────────────────────────────

    /// Look up the insight row for an industry, if any.
    async fn find_insight(&self, industry: &str)
    -> Result<Option<IndustryInsight>, DatabaseError>;

    /// Insert a new insight row. Fails with a constraint error if a row for
    /// the industry already exists.
    async fn create_insight(&self, insight: &IndustryInsight) -> Result<(), DatabaseError>;

    /// Apply a profile update inside a single bounded transaction.
    ///
    /// In the transaction: re-check for the industry's insight row, insert
    /// `generated` if the row is still missing, update the user's profile
    /// fields, and read back the updated user. The re-check is what resolves
    /// two concurrent updates targeting the same new industry; if a row
    /// exists by the time the transaction runs, `generated` is discarded.
    async fn commit_profile_update(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
        generated: Option<&IndustryInsight>,
    ) -> Result<User, DatabaseError>;
}
