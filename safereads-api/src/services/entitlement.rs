//! Entitlement gate
//!
//! Active subscribers always have access. Everyone else gets a lifetime
//! quota of fresh analyses (`free_analysis_limit`). Only fresh model results
//! are charged; cache hits are free.

use safereads_common::models::{AccessStatus, SubscriptionStatus, UserRecord};
use safereads_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::users;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionDetails {
    pub is_subscribed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriptionStatus>,
    /// Unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<i64>,
    pub analysis_count: i64,
    pub free_remaining: u32,
}

#[derive(Clone)]
pub struct EntitlementGate {
    db: SqlitePool,
    free_limit: u32,
}

impl EntitlementGate {
    pub fn new(db: SqlitePool, free_limit: u32) -> Self {
        Self { db, free_limit }
    }

    pub fn free_limit(&self) -> u32 {
        self.free_limit
    }

    /// Access policy for a known user record
    pub fn access_for(&self, user: &UserRecord) -> AccessStatus {
        let is_subscribed = user.is_subscribed();
        let free_remaining = self.free_remaining(user.analysis_count);

        AccessStatus {
            has_access: is_subscribed || free_remaining > 0,
            free_remaining,
            is_subscribed,
        }
    }

    /// Unknown users have no access
    pub async fn check_access(&self, user_id: &str) -> Result<AccessStatus> {
        Ok(match users::load_user(&self.db, user_id).await? {
            Some(user) => self.access_for(&user),
            None => AccessStatus::denied(),
        })
    }

    /// [`check_access`](Self::check_access), failing with `QuotaExceeded`
    pub async fn require_access(&self, user_id: &str) -> Result<AccessStatus> {
        let access = self.check_access(user_id).await?;
        if !access.has_access {
            tracing::info!(user_id = %user_id, "Free analysis quota exhausted");
            return Err(Error::QuotaExceeded {
                free_remaining: access.free_remaining,
                is_subscribed: access.is_subscribed,
            });
        }
        Ok(access)
    }

    /// Charge one fresh analysis
    pub async fn increment_count(&self, user_id: &str) -> Result<()> {
        users::increment_analysis_count(&self.db, user_id).await
    }

    pub async fn subscription_details(&self, user_id: &str) -> Result<SubscriptionDetails> {
        Ok(match users::load_user(&self.db, user_id).await? {
            Some(user) => SubscriptionDetails {
                is_subscribed: user.is_subscribed(),
                status: user.subscription_status,
                current_period_end: user.subscription_current_period_end,
                analysis_count: user.analysis_count,
                free_remaining: self.free_remaining(user.analysis_count),
            },
            None => SubscriptionDetails {
                is_subscribed: false,
                status: None,
                current_period_end: None,
                analysis_count: 0,
                free_remaining: self.free_limit,
            },
        })
    }

    fn free_remaining(&self, analysis_count: i64) -> u32 {
        let used = u32::try_from(analysis_count.max(0)).unwrap_or(u32::MAX);
        self.free_limit.saturating_sub(used)
    }
}

/// Admin allow-list, matched case-insensitively on email
#[derive(Debug, Clone, Default)]
pub struct AdminAllowList {
    emails: Vec<String>,
}

impl AdminAllowList {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.emails.iter().any(|e| *e == email)
    }

    pub fn is_admin(&self, user: &UserRecord) -> bool {
        self.is_admin_email(&user.email)
    }
}
