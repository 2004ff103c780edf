//! libSQL backend — async `ProfileStore` implementation.
//!
//! Supports local file and in-memory databases. The profile-update
//! transaction runs under a wall-clock budget; insight generation happens
//! before the transaction, so the budget covers only database work.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, TransactionBehavior, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::insights::model::{DemandLevel, IndustryInsight, InsightData, MarketOutlook};
use crate::profile::model::{NewUser, ProfileUpdate, User};
use crate::store::migrations;
use crate::store::traits::ProfileStore;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations. Every
/// trait method holds `txn_gate` while it runs its statements, so nothing
/// can execute inside another caller's open transaction window on the
/// shared connection.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    txn_gate: tokio::sync::Mutex<()>,
    txn_budget: Duration,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path, txn_budget: Duration) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            txn_gate: tokio::sync::Mutex::new(()),
            txn_budget,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory(txn_budget: Duration) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            txn_gate: tokio::sync::Mutex::new(()),
            txn_budget,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Raw connection access for tests that stage data directly.
    #[cfg(test)]
    pub(crate) fn raw_conn(&self) -> &Connection {
        &self.conn
    }

    /// The transaction of `commit_profile_update`. Runs with the transaction
    /// gate held; the budget deadline starts here and covers the whole
    /// BEGIN..COMMIT window.
    async fn profile_update_txn(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
        generated: Option<&IndustryInsight>,
    ) -> Result<User, DatabaseError> {
        let deadline = TxnDeadline::start(self.txn_budget);
        let tx = self
            .conn()
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|e| DatabaseError::Query(format!("begin profile update: {e}")))?;

        match apply_profile_update(&tx, user_id, update, generated, &deadline).await {
            Ok(user) => {
                tx.commit()
                    .await
                    .map_err(|e| DatabaseError::Query(format!("commit profile update: {e}")))?;
                Ok(user)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }
}

/// Wall-clock deadline for the profile-update transaction. Local SQLite
/// statements never yield to the runtime, so the budget is enforced by
/// checks between statements rather than a timer.
struct TxnDeadline {
    started: Instant,
    budget: Duration,
}

impl TxnDeadline {
    fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    fn check(&self) -> Result<(), DatabaseError> {
        if self.started.elapsed() >= self.budget {
            return Err(DatabaseError::TxnTimeout(self.budget));
        }
        Ok(())
    }
}

/// The body of the profile-update transaction: re-check, conditional insert,
/// user update, read-back, each step checked against the budget deadline.
/// Commit and rollback belong to the caller.
async fn apply_profile_update(
    tx: &Connection,
    user_id: Uuid,
    update: &ProfileUpdate,
    generated: Option<&IndustryInsight>,
    deadline: &TxnDeadline,
) -> Result<User, DatabaseError> {
    // Re-check inside the transaction: a concurrent update may have created
    // the row after this caller's pre-check.
    deadline.check()?;
    let existing = query_insight(tx, &update.industry).await?;
    match (existing, generated) {
        (None, Some(insight)) => {
            deadline.check()?;
            insert_insight(tx, insight).await?;
            debug!(industry = %update.industry, "Insight row created in transaction");
        }
        (None, None) => {
            return Err(DatabaseError::NotFound {
                entity: "industry_insight".to_string(),
                id: update.industry.clone(),
            });
        }
        (Some(_), _) => {
            // Row exists; a generated candidate, if any, is discarded.
        }
    }

    let skills_json = serde_json::to_string(&update.skills)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
    let now = Utc::now().to_rfc3339();
    deadline.check()?;
    let affected = tx
        .execute(
            "UPDATE users SET industry = ?1, experience = ?2, bio = ?3, skills = ?4, \
             updated_at = ?5 WHERE id = ?6",
            params![
                update.industry.clone(),
                update.experience,
                opt_text(update.bio.as_deref()),
                skills_json,
                now,
                user_id.to_string()
            ],
        )
        .await
        .map_err(map_write_err)?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity: "user".to_string(),
            id: user_id.to_string(),
        });
    }

    deadline.check()?;
    query_user_by_id(tx, user_id)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "user".to_string(),
            id: user_id.to_string(),
        })
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql write error, surfacing UNIQUE violations as constraint errors.
fn map_write_err(e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(msg)
    } else {
        DatabaseError::Query(msg)
    }
}

/// Convert a DemandLevel to its DB string.
fn demand_to_str(level: DemandLevel) -> &'static str {
    match level {
        DemandLevel::High => "high",
        DemandLevel::Medium => "medium",
        DemandLevel::Low => "low",
    }
}

/// Parse a demand level string from the DB.
fn str_to_demand(s: &str) -> DemandLevel {
    match s {
        "high" => DemandLevel::High,
        "low" => DemandLevel::Low,
        _ => DemandLevel::Medium,
    }
}

fn outlook_to_str(outlook: MarketOutlook) -> &'static str {
    match outlook {
        MarketOutlook::Positive => "positive",
        MarketOutlook::Neutral => "neutral",
        MarketOutlook::Negative => "negative",
    }
}

fn str_to_outlook(s: &str) -> MarketOutlook {
    match s {
        "positive" => MarketOutlook::Positive,
        "negative" => MarketOutlook::Negative,
        _ => MarketOutlook::Neutral,
    }
}

const USER_COLUMNS: &str =
    "id, subject, email, name, image_url, industry, experience, bio, skills, created_at, updated_at";

const INSIGHT_COLUMNS: &str = "id, industry, salary_ranges, growth_rate, demand_level, top_skills, \
                               market_outlook, key_trends, recommended_skills, last_updated, next_update";

/// Map a libsql Row to a User.
///
/// Column order matches USER_COLUMNS:
/// 0:id, 1:subject, 2:email, 3:name, 4:image_url, 5:industry, 6:experience,
/// 7:bio, 8:skills, 9:created_at, 10:updated_at
fn row_to_user(row: &libsql::Row) -> Result<User, libsql::Error> {
    let id_str: String = row.get(0)?;
    let subject: String = row.get(1)?;
    let email: String = row.get(2)?;
    let name: Option<String> = row.get(3)?;
    let image_url: Option<String> = row.get(4)?;
    let industry: Option<String> = row.get(5)?;
    let experience: Option<i64> = row.get(6)?;
    let bio: Option<String> = row.get(7)?;
    let skills_str: String = row.get(8)?;
    let created_str: String = row.get(9)?;
    let updated_str: String = row.get(10)?;

    Ok(User {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        subject,
        email,
        name,
        image_url,
        industry,
        experience,
        bio,
        skills: serde_json::from_str(&skills_str).unwrap_or_default(),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql Row to an IndustryInsight.
///
/// Column order matches INSIGHT_COLUMNS:
/// 0:id, 1:industry, 2:salary_ranges, 3:growth_rate, 4:demand_level,
/// 5:top_skills, 6:market_outlook, 7:key_trends, 8:recommended_skills,
/// 9:last_updated, 10:next_update
fn row_to_insight(row: &libsql::Row) -> Result<IndustryInsight, libsql::Error> {
    let id_str: String = row.get(0)?;
    let industry: String = row.get(1)?;
    let salary_str: String = row.get(2)?;
    let growth_rate: f64 = row.get(3)?;
    let demand_str: String = row.get(4)?;
    let top_skills_str: String = row.get(5)?;
    let outlook_str: String = row.get(6)?;
    let trends_str: String = row.get(7)?;
    let recommended_str: String = row.get(8)?;
    let last_updated_str: String = row.get(9)?;
    let next_update_str: String = row.get(10)?;

    Ok(IndustryInsight {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        industry,
        data: InsightData {
            salary_ranges: serde_json::from_str(&salary_str).unwrap_or_default(),
            growth_rate,
            demand_level: str_to_demand(&demand_str),
            top_skills: serde_json::from_str(&top_skills_str).unwrap_or_default(),
            market_outlook: str_to_outlook(&outlook_str),
            key_trends: serde_json::from_str(&trends_str).unwrap_or_default(),
            recommended_skills: serde_json::from_str(&recommended_str).unwrap_or_default(),
        },
        last_updated: parse_datetime(&last_updated_str),
        next_update: parse_datetime(&next_update_str),
    })
}

/// Query one user by internal id. Works on a plain connection or inside a
/// transaction.
async fn query_user_by_id(
    conn: &Connection,
    user_id: Uuid,
) -> Result<Option<User>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![user_id.to_string()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("query_user_by_id: {e}")))?;

    match rows.next().await {
        Ok(Some(row)) => {
            let user = row_to_user(&row)
                .map_err(|e| DatabaseError::Query(format!("query_user_by_id row parse: {e}")))?;
            Ok(Some(user))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(DatabaseError::Query(format!("query_user_by_id: {e}"))),
    }
}

async fn query_user_by_subject(
    conn: &Connection,
    subject: &str,
) -> Result<Option<User>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE subject = ?1"),
            params![subject],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("query_user_by_subject: {e}")))?;

    match rows.next().await {
        Ok(Some(row)) => {
            let user = row_to_user(&row).map_err(|e| {
                DatabaseError::Query(format!("query_user_by_subject row parse: {e}"))
            })?;
            Ok(Some(user))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(DatabaseError::Query(format!("query_user_by_subject: {e}"))),
    }
}

/// Query one insight by industry. Works on a plain connection or inside a
/// transaction.
async fn query_insight(
    conn: &Connection,
    industry: &str,
) -> Result<Option<IndustryInsight>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {INSIGHT_COLUMNS} FROM industry_insights WHERE industry = ?1"),
            params![industry],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("query_insight: {e}")))?;

    match rows.next().await {
        Ok(Some(row)) => {
            let insight = row_to_insight(&row)
                .map_err(|e| DatabaseError::Query(format!("query_insight row parse: {e}")))?;
            Ok(Some(insight))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(DatabaseError::Query(format!("query_insight: {e}"))),
    }
}

/// Insert an insight row. No ON CONFLICT clause: a duplicate industry is a
/// constraint error the caller must surface.
async fn insert_insight(conn: &Connection, insight: &IndustryInsight) -> Result<(), DatabaseError> {
    let salary_json = serde_json::to_string(&insight.data.salary_ranges)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
    let top_skills_json = serde_json::to_string(&insight.data.top_skills)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
    let trends_json = serde_json::to_string(&insight.data.key_trends)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
    let recommended_json = serde_json::to_string(&insight.data.recommended_skills)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

    conn.execute(
        "INSERT INTO industry_insights (id, industry, salary_ranges, growth_rate, demand_level, \
         top_skills, market_outlook, key_trends, recommended_skills, last_updated, next_update) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            insight.id.to_string(),
            insight.industry.clone(),
            salary_json,
            insight.data.growth_rate,
            demand_to_str(insight.data.demand_level),
            top_skills_json,
            outlook_to_str(insight.data.market_outlook),
            trends_json,
            recommended_json,
            insight.last_updated.to_rfc3339(),
            insight.next_update.to_rfc3339()
        ],
    )
    .await
    .map_err(map_write_err)?;

    Ok(())
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl ProfileStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let _gate = self.txn_gate.lock().await;
        migrations::run_migrations(self.conn()).await
    }

    async fn create_user(&self, new_user: &NewUser) -> Result<User, DatabaseError> {
        let _gate = self.txn_gate.lock().await;
        let conn = self.conn();
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO users (id, subject, email, name, image_url, skills, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, '[]', ?6, ?6)",
            params![
                id.to_string(),
                new_user.subject.clone(),
                new_user.email.clone(),
                opt_text(new_user.name.as_deref()),
                opt_text(new_user.image_url.as_deref()),
                now.to_rfc3339()
            ],
        )
        .await
        .map_err(map_write_err)?;

        debug!(subject = %new_user.subject, user_id = %id, "User provisioned");
        Ok(User {
            id,
            subject: new_user.subject.clone(),
            email: new_user.email.clone(),
            name: new_user.name.clone(),
            image_url: new_user.image_url.clone(),
            industry: None,
            experience: None,
            bio: None,
            skills: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_user_by_subject(&self, subject: &str) -> Result<Option<User>, DatabaseError> {
        let _gate = self.txn_gate.lock().await;
        query_user_by_subject(self.conn(), subject).await
    }

    async fn find_insight(
        &self,
        industry: &str,
    ) -> Result<Option<IndustryInsight>, DatabaseError> {
        let _gate = self.txn_gate.lock().await;
        query_insight(self.conn(), industry).await
    }

    async fn create_insight(&self, insight: &IndustryInsight) -> Result<(), DatabaseError> {
        let _gate = self.txn_gate.lock().await;
        insert_insight(self.conn(), insight).await?;
        debug!(industry = %insight.industry, "Insight row created");
        Ok(())
    }

    async fn commit_profile_update(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
        generated: Option<&IndustryInsight>,
    ) -> Result<User, DatabaseError> {
        let _gate = self.txn_gate.lock().await;
        self.profile_update_txn(user_id, update, generated).await
    }
}
