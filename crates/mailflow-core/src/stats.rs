//! Owner statistics

use mailflow_common::types::UserId;
use mailflow_common::Result;
use mailflow_storage::db::DatabasePool;
use mailflow_storage::models::AttemptStatus;
use mailflow_storage::repository::{
    AttemptRepository, AttemptRepositoryTrait, MailingRepository, MailingRepositoryTrait,
};
use serde::Serialize;

/// Delivery statistics scoped to one owner.
///
/// Monotonically non-decreasing while a mailing is active, so a short
/// public cache window at the HTTP layer only makes it briefly stale,
/// never wrong in kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OwnerStats {
    pub total_mailings: i64,
    pub success_attempts: i64,
    pub failed_attempts: i64,
    /// Alias of success_attempts, kept for the statistics screen
    pub messages_sent: i64,
}

impl OwnerStats {
    pub fn new(total_mailings: i64, success_attempts: i64, failed_attempts: i64) -> Self {
        Self {
            total_mailings,
            success_attempts,
            failed_attempts,
            messages_sent: success_attempts,
        }
    }
}

/// Statistics service
pub struct StatsService {
    mailing_repo: MailingRepository,
    attempt_repo: AttemptRepository,
}

impl StatsService {
    pub fn new(db_pool: DatabasePool) -> Self {
        Self {
            mailing_repo: MailingRepository::new(db_pool.clone()),
            attempt_repo: AttemptRepository::new(db_pool),
        }
    }

    /// Aggregate counts for the given owner. Read-only.
    pub async fn for_owner(&self, owner_id: UserId) -> Result<OwnerStats> {
        let total_mailings = self.mailing_repo.count_by_owner(owner_id).await?;
        let success_attempts = self
            .attempt_repo
            .count_by_owner(owner_id, AttemptStatus::Success)
            .await?;
        let failed_attempts = self
            .attempt_repo
            .count_by_owner(owner_id, AttemptStatus::Failed)
            .await?;

        Ok(OwnerStats::new(
            total_mailings,
            success_attempts,
            failed_attempts,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn messages_sent_aliases_success_attempts() {
        let stats = OwnerStats::new(2, 2, 1);
        assert_eq!(stats.total_mailings, 2);
        assert_eq!(stats.success_attempts, 2);
        assert_eq!(stats.failed_attempts, 1);
        assert_eq!(stats.messages_sent, stats.success_attempts);
    }

    #[test]
    fn zero_attempt_owners_get_zero_counts() {
        let stats = OwnerStats::new(2, 0, 0);
        assert_eq!(stats.messages_sent, 0);
        assert_eq!(stats.failed_attempts, 0);
    }
}
