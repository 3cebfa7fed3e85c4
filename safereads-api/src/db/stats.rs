//! Aggregate counts for the admin dashboard

use safereads_common::models::Verdict;
use safereads_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;

use super::{analyses, books};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStats {
    pub user_count: i64,
    pub active_subscribers: i64,
    pub book_count: i64,
    pub analysis_count: i64,
    /// Fresh analyses counted against users
    pub total_user_analyses: i64,
    pub verdict_counts: VerdictBreakdown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerdictBreakdown {
    pub safe: i64,
    pub caution: i64,
    pub warning: i64,
    pub no_verdict: i64,
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<ServiceStats> {
    let (user_count, active_subscribers, total_user_analyses): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(CASE WHEN subscription_status = 'active' THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(analysis_count), 0)
        FROM users
        "#,
    )
    .fetch_one(pool)
    .await?;

    let mut verdicts = VerdictBreakdown::default();
    for (verdict, count) in analyses::count_by_verdict(pool).await? {
        match verdict {
            Verdict::Safe => verdicts.safe = count,
            Verdict::Caution => verdicts.caution = count,
            Verdict::Warning => verdicts.warning = count,
            Verdict::NoVerdict => verdicts.no_verdict = count,
        }
    }

    Ok(ServiceStats {
        user_count,
        active_subscribers,
        book_count: books::count_books(pool).await?,
        analysis_count: verdicts.safe + verdicts.caution + verdicts.warning + verdicts.no_verdict,
        total_user_analyses,
        verdict_counts: verdicts,
    })
}
