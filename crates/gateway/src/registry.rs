//! # ジョブレジストリ
//!
//! 内部ジョブIDからプロバイダのジョブIDへの対応表。
//! クライアントにはプロバイダのIDを見せず、内部IDのみを返す。
//!
//! 期限切れエントリの回収はバックグラウンドタイマーではなく、
//! アップロードのたびに `sweep` を呼ぶことで行う。

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::error::RelayError;

/// エントリの保持期間: 1時間
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

/// 変換ジョブ1件分の記録。作成後は変更しない。
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub provider_job_id: String,
    pub created_at: Instant,
}

/// プロセス内ジョブレジストリ。
///
/// `create` / `lookup` / `sweep` は内部の `RwLock` で直列化されるので、
/// 呼び出し側でロックを取る必要はない。
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobRecord>>,
    retention: Duration,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// プロバイダのジョブIDを登録し、新しい内部ID（UUID v4）を返す。
    pub async fn create(&self, provider_job_id: &str) -> String {
        self.create_at(provider_job_id, Instant::now()).await
    }

    pub(crate) async fn create_at(&self, provider_job_id: &str, created_at: Instant) -> String {
        let mut jobs = self.jobs.write().await;
        loop {
            let internal_id = uuid::Uuid::new_v4().to_string();
            if let Entry::Vacant(slot) = jobs.entry(internal_id.clone()) {
                slot.insert(JobRecord {
                    provider_job_id: provider_job_id.to_string(),
                    created_at,
                });
                return internal_id;
            }
        }
    }

    /// 内部IDに対応するプロバイダのジョブIDを返す。
    pub async fn lookup(&self, internal_id: &str) -> Result<String, RelayError> {
        self.jobs
            .read()
            .await
            .get(internal_id)
            .map(|record| record.provider_job_id.clone())
            .ok_or(RelayError::NotFound)
    }

    /// 保持期間を超えたエントリを削除し、削除件数を返す。
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    /// `now` 時点で経過時間が保持期間を厳密に超えたエントリを削除する。
    pub(crate) async fn sweep_at(&self, now: Instant) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, record| now.saturating_duration_since(record.created_at) <= self.retention);
        before - jobs.len()
    }

    /// 保持中のジョブ件数。
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}
