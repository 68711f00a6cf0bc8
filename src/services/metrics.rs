//! Metrics repository: idempotent writes and merged history reads.

use crate::db::MetricsStore;
use crate::error::Result;
use crate::models::{DailyScore, HistoryDay, ProviderMetrics, ProviderSnapshot};
use crate::time_utils::{days_before, today_utc};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Upsert/read access to per-user daily snapshots and scores.
#[derive(Clone)]
pub struct MetricsRepository {
    store: Arc<dyn MetricsStore>,
}

impl MetricsRepository {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self { store }
    }

    /// Write (or overwrite) the snapshot for `(user_id, date, provider)`.
    pub async fn upsert_provider_snapshot(
        &self,
        user_id: u64,
        date: NaiveDate,
        metrics: ProviderMetrics,
    ) -> Result<()> {
        let snapshot = ProviderSnapshot::new(user_id, date, metrics);
        self.store.upsert_snapshot(&snapshot).await?;
        tracing::debug!(
            user_id,
            provider = %snapshot.provider,
            date = %date,
            "Upserted provider snapshot"
        );
        Ok(())
    }

    /// Write (or overwrite) the score row for `(score.user_id, score.date)`.
    pub async fn upsert_daily_score(&self, score: &DailyScore) -> Result<()> {
        self.store.upsert_daily_score(score).await
    }

    /// The last `days` complete days, newest first. Today is excluded.
    pub async fn read_history(&self, user_id: u64, days: u32) -> Result<Vec<HistoryDay>> {
        self.read_history_before(user_id, days, today_utc()).await
    }

    /// History for the `days` days strictly before `today`.
    pub async fn read_history_before(
        &self,
        user_id: u64,
        days: u32,
        today: NaiveDate,
    ) -> Result<Vec<HistoryDay>> {
        let since = days_before(today, days);

        let snapshots = self.store.list_snapshots(user_id, since, today).await?;
        let scores = self.store.list_daily_scores(user_id, since, today).await?;

        let mut by_date: BTreeMap<NaiveDate, HistoryDay> = BTreeMap::new();

        for snapshot in snapshots {
            let day = history_day(&mut by_date, snapshot.date);
            match snapshot.metrics {
                ProviderMetrics::Whoop(m) => day.whoop = Some(m),
                ProviderMetrics::Oura(m) => day.oura = Some(m),
            }
        }
        for score in scores {
            let date = score.date;
            history_day(&mut by_date, date).scores = Some(score);
        }

        Ok(by_date.into_values().rev().collect())
    }
}

fn history_day(by_date: &mut BTreeMap<NaiveDate, HistoryDay>, date: NaiveDate) -> &mut HistoryDay {
    by_date.entry(date).or_insert_with(|| HistoryDay {
        date,
        whoop: None,
        oura: None,
        scores: None,
    })
}
