//! ProfileService — the server-side actions behind the profile API.
//!
//! Every method starts by resolving the bearer token to a session subject
//! and loading that subject's user row; without a session the caller gets
//! `Unauthorized`, without a row `UserNotFound`. Anything that goes wrong
//! further down is logged with its original message and replaced by the
//! operation's fixed generic error, so internal detail never reaches the
//! client.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::auth::{SessionProvider, SessionSubject};
use crate::cache::CacheInvalidator;
use crate::error::{AppError, Result};
use crate::insights::generator::InsightGenerator;
use crate::insights::model::IndustryInsight;
use crate::profile::model::{OnboardingStatus, ProfileUpdate, User};
use crate::store::ProfileStore;

/// Path invalidated after a successful profile update.
const FRONT_PAGE: &str = "/";

/// Orchestrates profile reads and updates over the injected collaborators.
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
    sessions: Arc<dyn SessionProvider>,
    generator: Arc<dyn InsightGenerator>,
    cache: Arc<dyn CacheInvalidator>,
    insight_refresh_days: u32,
}

impl ProfileService {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        sessions: Arc<dyn SessionProvider>,
        generator: Arc<dyn InsightGenerator>,
        cache: Arc<dyn CacheInvalidator>,
        insight_refresh_days: u32,
    ) -> Self {
        Self {
            store,
            sessions,
            generator,
            cache,
            insight_refresh_days,
        }
    }

    /// Update the caller's profile fields, creating the industry's insight
    /// row first if this is the first user to pick that industry.
    ///
    /// Insight generation runs before the store transaction so the
    /// transaction budget is spent on database work only. The transaction
    /// itself re-checks for the insight row; see
    /// `ProfileStore::commit_profile_update`.
    pub async fn update_profile(
        &self,
        token: Option<&str>,
        update: ProfileUpdate,
    ) -> std::result::Result<User, AppError> {
        let subject = self.authenticate(token).await?;
        let user = match self.store.find_user_by_subject(subject.as_str()).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AppError::UserNotFound),
            Err(e) => {
                error!(error = %e, subject = %subject, "User lookup failed");
                return Err(AppError::ProfileUpdateFailed);
            }
        };

        let updated = match self.apply_update(&user, &update).await {
            Ok(updated) => updated,
            Err(e) => {
                error!(
                    error = %e,
                    subject = %subject,
                    industry = %update.industry,
                    "Profile update failed"
                );
                return Err(AppError::ProfileUpdateFailed);
            }
        };

        // The row is committed at this point; a failed invalidation still
        // fails the operation, with the committed values left in place.
        if let Err(e) = self.cache.invalidate(FRONT_PAGE).await {
            error!(error = %e, subject = %subject, "Cache invalidation failed after profile update");
            return Err(AppError::ProfileUpdateFailed);
        }

        info!(subject = %subject, industry = %update.industry, "Profile updated");
        Ok(updated)
    }

    /// Whether the caller has completed onboarding (picked an industry).
    pub async fn onboarding_status(
        &self,
        token: Option<&str>,
    ) -> std::result::Result<OnboardingStatus, AppError> {
        let subject = self.authenticate(token).await?;
        match self.store.find_user_by_subject(subject.as_str()).await {
            Ok(Some(user)) => Ok(OnboardingStatus {
                is_onboarded: user.is_onboarded(),
            }),
            Ok(None) => Err(AppError::UserNotFound),
            Err(e) => {
                error!(error = %e, subject = %subject, "Onboarding status check failed");
                Err(AppError::OnboardingCheckFailed)
            }
        }
    }

    /// The caller's user record.
    pub async fn get_profile(&self, token: Option<&str>) -> std::result::Result<User, AppError> {
        let subject = self.authenticate(token).await?;
        match self.store.find_user_by_subject(subject.as_str()).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(AppError::UserNotFound),
            Err(e) => {
                error!(error = %e, subject = %subject, "Profile fetch failed");
                Err(AppError::ProfileFetchFailed)
            }
        }
    }

    /// The insight row for the caller's industry, generated on first access.
    ///
    /// A stale row is served as-is; refreshing is an out-of-band job.
    pub async fn industry_insight(
        &self,
        token: Option<&str>,
    ) -> std::result::Result<IndustryInsight, AppError> {
        let subject = self.authenticate(token).await?;
        let user = match self.store.find_user_by_subject(subject.as_str()).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AppError::UserNotFound),
            Err(e) => {
                error!(error = %e, subject = %subject, "User lookup failed");
                return Err(AppError::InsightFetchFailed);
            }
        };
        let Some(industry) = user.industry.filter(|i| !i.is_empty()) else {
            // Not onboarded yet, so there is no industry to report on.
            return Err(AppError::UserNotFound);
        };

        match self.fetch_or_create_insight(&industry).await {
            Ok(insight) => Ok(insight),
            Err(e) => {
                error!(error = %e, industry = %industry, "Insight fetch failed");
                Err(AppError::InsightFetchFailed)
            }
        }
    }

    async fn authenticate(
        &self,
        token: Option<&str>,
    ) -> std::result::Result<SessionSubject, AppError> {
        let Some(token) = token else {
            return Err(AppError::Unauthorized);
        };
        self.sessions
            .authenticate(token)
            .await
            .ok_or(AppError::Unauthorized)
    }

    /// The two-phase write: generate outside the transaction if the industry
    /// has no insight row yet, then commit everything in one bounded
    /// transaction.
    async fn apply_update(&self, user: &User, update: &ProfileUpdate) -> Result<User> {
        let generated = match self.store.find_insight(&update.industry).await? {
            Some(_) => None,
            None => {
                let data = self.generator.generate(&update.industry).await?;
                Some(IndustryInsight::new(
                    &update.industry,
                    data,
                    self.insight_refresh_days,
                ))
            }
        };

        let updated = self
            .store
            .commit_profile_update(user.id, update, generated.as_ref())
            .await?;
        Ok(updated)
    }

    async fn fetch_or_create_insight(&self, industry: &str) -> Result<IndustryInsight> {
        if let Some(existing) = self.store.find_insight(industry).await? {
            debug!(
                industry = industry,
                stale = existing.is_stale(),
                "Serving stored insight"
            );
            return Ok(existing);
        }

        let data = self.generator.generate(industry).await?;
        let insight = IndustryInsight::new(industry, data, self.insight_refresh_days);
        self.store.create_insight(&insight).await?;
        Ok(insight)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use tokio::sync::Mutex;

    use super::*;
    use crate::auth::StaticSessions;
    use crate::cache::NoopInvalidator;
    use crate::error::{CacheError, InsightError, LlmError};
    use crate::insights::model::{DemandLevel, InsightData, MarketOutlook, SalaryRange};
    use crate::profile::model::NewUser;
    use crate::store::LibSqlBackend;

    fn sample_data() -> InsightData {
        InsightData {
            salary_ranges: vec![SalaryRange {
                role: "Engineer".to_string(),
                min: dec!(80000),
                max: dec!(160000),
                median: dec!(120000),
                location: None,
            }],
            growth_rate: 4.2,
            demand_level: DemandLevel::High,
            top_skills: vec!["Rust".to_string()],
            market_outlook: MarketOutlook::Positive,
            key_trends: vec!["AI".to_string()],
            recommended_skills: vec!["SQL".to_string()],
        }
    }

    /// Generator stub that counts invocations.
    struct CountingGenerator {
        calls: AtomicUsize,
    }

    impl CountingGenerator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InsightGenerator for CountingGenerator {
        async fn generate(&self, _industry: &str) -> std::result::Result<InsightData, InsightError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(sample_data())
        }
    }

    /// Generator stub that always fails.
    struct FailingGenerator;

    #[async_trait]
    impl InsightGenerator for FailingGenerator {
        async fn generate(&self, _industry: &str) -> std::result::Result<InsightData, InsightError> {
            Err(InsightError::Generation(LlmError::RequestFailed {
                provider: "stub".to_string(),
                reason: "unavailable".to_string(),
            }))
        }
    }

    /// Invalidator that records every path it is asked to invalidate.
    #[derive(Default)]
    struct RecordingInvalidator {
        paths: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CacheInvalidator for RecordingInvalidator {
        async fn invalidate(&self, path: &str) -> std::result::Result<(), CacheError> {
            self.paths.lock().await.push(path.to_string());
            Ok(())
        }
    }

    /// Invalidator that always fails.
    struct FailingInvalidator;

    #[async_trait]
    impl CacheInvalidator for FailingInvalidator {
        async fn invalidate(&self, _path: &str) -> std::result::Result<(), CacheError> {
            Err(CacheError::Rejected { status: 503 })
        }
    }

    struct Fixture {
        service: ProfileService,
        store: Arc<LibSqlBackend>,
        generator: Arc<CountingGenerator>,
        cache: Arc<RecordingInvalidator>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(
            LibSqlBackend::new_memory(Duration::from_secs(10))
                .await
                .unwrap(),
        );
        let generator = Arc::new(CountingGenerator::new());
        let cache = Arc::new(RecordingInvalidator::default());
        let sessions = Arc::new(
            StaticSessions::new()
                .with_token("tok-1", "user_1")
                .with_token("tok-2", "user_2")
                .with_token("tok-ghost", "user_ghost"),
        );
        let service = ProfileService::new(
            store.clone(),
            sessions,
            generator.clone(),
            cache.clone(),
            7,
        );
        Fixture {
            service,
            store,
            generator,
            cache,
        }
    }

    async fn seed_user(store: &LibSqlBackend, subject: &str) -> User {
        store
            .create_user(&NewUser {
                subject: subject.to_string(),
                email: format!("{subject}@example.com"),
                name: None,
                image_url: None,
            })
            .await
            .unwrap()
    }

    fn update(industry: &str) -> ProfileUpdate {
        ProfileUpdate {
            industry: industry.to_string(),
            experience: 3,
            bio: Some("x".to_string()),
            skills: vec!["js".to_string()],
        }
    }

    #[tokio::test]
    async fn rejects_missing_and_unknown_tokens() {
        let f = fixture().await;

        let err = f.service.update_profile(None, update("tech")).await.unwrap_err();
        assert_eq!(err, AppError::Unauthorized);

        let err = f
            .service
            .update_profile(Some("bogus"), update("tech"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::Unauthorized);

        let err = f.service.onboarding_status(None).await.unwrap_err();
        assert_eq!(err, AppError::Unauthorized);

        // Nothing downstream ran.
        assert_eq!(f.generator.count(), 0);
    }

    #[tokio::test]
    async fn rejects_session_without_user_row() {
        let f = fixture().await;

        let err = f
            .service
            .update_profile(Some("tok-ghost"), update("tech"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::UserNotFound);

        let err = f.service.onboarding_status(Some("tok-ghost")).await.unwrap_err();
        assert_eq!(err, AppError::UserNotFound);

        assert_eq!(f.generator.count(), 0);
    }

    #[tokio::test]
    async fn first_update_generates_once_and_persists() {
        let f = fixture().await;
        seed_user(&f.store, "user_1").await;

        let before = chrono::Utc::now();
        let user = f
            .service
            .update_profile(Some("tok-1"), update("tech"))
            .await
            .unwrap();

        assert_eq!(user.industry.as_deref(), Some("tech"));
        assert_eq!(user.experience, Some(3));
        assert_eq!(user.bio.as_deref(), Some("x"));
        assert_eq!(user.skills, vec!["js"]);

        assert_eq!(f.generator.count(), 1);

        let insight = f.store.find_insight("tech").await.unwrap().unwrap();
        assert_eq!(insight.industry, "tech");
        // next_update sits one refresh window after last_updated.
        assert_eq!(
            insight.next_update - insight.last_updated,
            chrono::Duration::days(7)
        );
        assert!(insight.last_updated >= before - chrono::Duration::seconds(1));

        assert_eq!(*f.cache.paths.lock().await, vec!["/".to_string()]);
    }

    #[tokio::test]
    async fn existing_industry_skips_generation() {
        let f = fixture().await;
        seed_user(&f.store, "user_1").await;
        seed_user(&f.store, "user_2").await;

        f.service
            .update_profile(Some("tok-1"), update("tech"))
            .await
            .unwrap();
        assert_eq!(f.generator.count(), 1);

        // Second user picks the same industry: the stored row is reused.
        f.service
            .update_profile(Some("tok-2"), update("tech"))
            .await
            .unwrap();
        assert_eq!(f.generator.count(), 1);
    }

    #[tokio::test]
    async fn onboarding_status_follows_industry() {
        let f = fixture().await;
        seed_user(&f.store, "user_1").await;

        let status = f.service.onboarding_status(Some("tok-1")).await.unwrap();
        assert!(!status.is_onboarded);

        f.service
            .update_profile(Some("tok-1"), update("tech"))
            .await
            .unwrap();

        let status = f.service.onboarding_status(Some("tok-1")).await.unwrap();
        assert!(status.is_onboarded);
    }

    #[tokio::test]
    async fn generation_failure_surfaces_generic_error() {
        let f = fixture().await;
        seed_user(&f.store, "user_1").await;

        let service = ProfileService::new(
            f.store.clone(),
            Arc::new(StaticSessions::new().with_token("tok-1", "user_1")),
            Arc::new(FailingGenerator),
            Arc::new(NoopInvalidator),
            7,
        );

        let err = service
            .update_profile(Some("tok-1"), update("tech"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::ProfileUpdateFailed);

        // Nothing was written.
        let user = f.store.find_user_by_subject("user_1").await.unwrap().unwrap();
        assert_eq!(user.industry, None);
        assert!(f.store.find_insight("tech").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalidation_failure_surfaces_generic_error() {
        let f = fixture().await;
        seed_user(&f.store, "user_1").await;

        let service = ProfileService::new(
            f.store.clone(),
            Arc::new(StaticSessions::new().with_token("tok-1", "user_1")),
            f.generator.clone(),
            Arc::new(FailingInvalidator),
            7,
        );

        let err = service
            .update_profile(Some("tok-1"), update("tech"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::ProfileUpdateFailed);

        // The transaction had already committed when invalidation failed.
        let user = f.store.find_user_by_subject("user_1").await.unwrap().unwrap();
        assert_eq!(user.industry.as_deref(), Some("tech"));
        assert!(f.store.find_insight("tech").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn get_profile_returns_stored_record() {
        let f = fixture().await;
        let seeded = seed_user(&f.store, "user_1").await;

        let user = f.service.get_profile(Some("tok-1")).await.unwrap();
        assert_eq!(user.id, seeded.id);
        assert_eq!(user.email, "user_1@example.com");
    }

    #[tokio::test]
    async fn insight_endpoint_requires_onboarding() {
        let f = fixture().await;
        seed_user(&f.store, "user_1").await;

        let err = f.service.industry_insight(Some("tok-1")).await.unwrap_err();
        assert_eq!(err, AppError::UserNotFound);
        assert_eq!(f.generator.count(), 0);
    }

    #[tokio::test]
    async fn insight_endpoint_serves_stored_row() {
        let f = fixture().await;
        seed_user(&f.store, "user_1").await;

        f.service
            .update_profile(Some("tok-1"), update("tech"))
            .await
            .unwrap();
        assert_eq!(f.generator.count(), 1);

        // The row created during the update is served without regenerating.
        let insight = f.service.industry_insight(Some("tok-1")).await.unwrap();
        assert_eq!(insight.industry, "tech");
        assert_eq!(f.generator.count(), 1);
    }

    #[tokio::test]
    async fn insight_endpoint_regenerates_missing_row() {
        let f = fixture().await;
        seed_user(&f.store, "user_1").await;

        f.service
            .update_profile(Some("tok-1"), update("tech"))
            .await
            .unwrap();
        assert_eq!(f.generator.count(), 1);

        // Drop the row out from under the onboarded user; the endpoint
        // regenerates and persists it.
        f.store
            .raw_conn()
            .execute("DELETE FROM industry_insights WHERE industry = 'tech'", ())
            .await
            .unwrap();

        let insight = f.service.industry_insight(Some("tok-1")).await.unwrap();
        assert_eq!(insight.industry, "tech");
        assert_eq!(f.generator.count(), 2);
        assert!(f.store.find_insight("tech").await.unwrap().is_some());
    }
}
