use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{Config, SeedConfig};
use crate::constants::seed::{INSERT_REPLIES, INSERT_REVIEWS, REPLY_PHRASES, REVIEW_PHRASES};
use crate::constants::{with_schema, SEED_BATCH_SIZE};
use crate::db::partition::{add_months, month_start, PartitionManager};
use crate::db::DatabasePool;
use crate::error::Result;
use crate::metrics::RunMetrics;

/// 답글은 리뷰 작성 후 최대 이 시간 안에 달림
const MAX_REPLY_DELAY_MINUTES: i64 = 72 * 60;

/// 삽입할 답글
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyDraft {
    pub user_id: i32,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// 삽입할 리뷰
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewDraft {
    pub game_id: i32,
    pub user_id: i32,
    pub rating: i32,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub reply: Option<ReplyDraft>,
}

/// 샘플 데이터 생성 범위의 시작 시각
pub fn seed_window_start(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    let start = add_months(now.date_naive(), -(months.min(i32::MAX as u32) as i32));
    start.and_time(NaiveTime::MIN).and_utc()
}

/// 시드가 같으면 항상 같은 데이터를 생성
pub fn generate(config: &SeedConfig, now: DateTime<Utc>) -> Vec<ReviewDraft> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let start = seed_window_start(now, config.months);
    let span_seconds = (now - start).num_seconds().max(1);
    let games = i32::try_from(config.games).unwrap_or(i32::MAX).max(1);
    let users = i32::try_from(config.users).unwrap_or(i32::MAX).max(1);

    (0..config.reviews)
        .map(|_| {
            let created_at = start + Duration::seconds(rng.random_range(0..span_seconds));
            let review_phrase = REVIEW_PHRASES[rng.random_range(0..REVIEW_PHRASES.len())];

            let reply = rng.random_bool(config.reply_ratio).then(|| {
                let delay = Duration::minutes(rng.random_range(1..=MAX_REPLY_DELAY_MINUTES));
                ReplyDraft {
                    user_id: rng.random_range(1..=users),
                    content: REPLY_PHRASES[rng.random_range(0..REPLY_PHRASES.len())].to_string(),
                    created_at: (created_at + delay).min(now),
                }
            });

            ReviewDraft {
                game_id: rng.random_range(1..=games),
                user_id: rng.random_range(1..=users),
                rating: rng.random_range(1..=5),
                content: review_phrase.to_string(),
                created_at,
                reply,
            }
        })
        .collect()
}

/// 삽입 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub reviews: u64,
    pub replies: u64,
}

/// 리뷰/답글 샘플 데이터 삽입 담당
pub struct Seeder {
    pool: Arc<DatabasePool>,
    schema: String,
    config: SeedConfig,
    partitions: PartitionManager,
    metrics: Arc<RunMetrics>,
}

impl Seeder {
    pub fn new(pool: Arc<DatabasePool>, config: &Config, metrics: Arc<RunMetrics>) -> Self {
        let partitions = PartitionManager::new(
            pool.clone(),
            &config.schema,
            config.database.partitioning.clone(),
        );
        Self {
            pool,
            schema: config.schema.clone(),
            config: config.seed.clone(),
            partitions,
            metrics,
        }
    }

    /// 기간을 덮는 파티션을 만든 뒤 한 트랜잭션으로 삽입
    pub async fn run(&self, now: DateTime<Utc>) -> Result<SeedSummary> {
        let start = seed_window_start(now, self.config.months);
        let first_month = month_start(start.date_naive());
        self.partitions
            .ensure_months(first_month, self.config.months.saturating_add(1))
            .await?;

        let drafts = generate(&self.config, now);
        info!(
            "샘플 데이터 생성: 리뷰 {} 건 (게임 {}, 사용자 {}, {} 이후, seed {})",
            drafts.len(),
            self.config.games,
            self.config.users,
            start.format("%Y-%m-%d"),
            self.config.seed
        );

        let insert_reviews = with_schema(INSERT_REVIEWS, &self.schema);
        let insert_replies = with_schema(INSERT_REPLIES, &self.schema);

        let mut client = self.pool.get_client_with_retry().await?;
        let tx = client.transaction().await?;
        let mut summary = SeedSummary::default();

        for (batch_no, batch) in drafts.chunks(SEED_BATCH_SIZE).enumerate() {
            let game_ids: Vec<i32> = batch.iter().map(|r| r.game_id).collect();
            let user_ids: Vec<i32> = batch.iter().map(|r| r.user_id).collect();
            let ratings: Vec<i32> = batch.iter().map(|r| r.rating).collect();
            let contents: Vec<String> = batch.iter().map(|r| r.content.clone()).collect();
            let created: Vec<DateTime<Utc>> = batch.iter().map(|r| r.created_at).collect();

            // RETURNING 순서는 UNNEST 입력 순서와 같음
            let rows = tx
                .query(
                    &insert_reviews,
                    &[&game_ids, &user_ids, &ratings, &contents, &created],
                )
                .await?;
            summary.reviews += rows.len() as u64;

            let mut reply_review_ids: Vec<i64> = Vec::new();
            let mut reply_users: Vec<i32> = Vec::new();
            let mut reply_contents: Vec<String> = Vec::new();
            let mut reply_created: Vec<DateTime<Utc>> = Vec::new();
            for (row, draft) in rows.iter().zip(batch) {
                if let Some(reply) = &draft.reply {
                    reply_review_ids.push(row.get(0));
                    reply_users.push(reply.user_id);
                    reply_contents.push(reply.content.clone());
                    reply_created.push(reply.created_at);
                }
            }

            if !reply_review_ids.is_empty() {
                summary.replies += tx
                    .execute(
                        &insert_replies,
                        &[&reply_review_ids, &reply_users, &reply_contents, &reply_created],
                    )
                    .await?;
            }
            debug!("배치 {} 삽입 완료 ({} 건)", batch_no + 1, batch.len());
        }

        tx.commit().await?;
        self.metrics.add_rows(summary.reviews + summary.replies);
        info!("샘플 데이터 삽입 완료: 리뷰 {} 건, 답글 {} 건", summary.reviews, summary.replies);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn config(reviews: u32, reply_ratio: f64) -> SeedConfig {
        SeedConfig {
            reviews,
            reply_ratio,
            ..SeedConfig::default()
        }
    }

    #[test]
    fn same_seed_same_data() {
        let a = generate(&config(50, 0.5), now());
        let b = generate(&config(50, 0.5), now());
        assert_eq!(a, b);

        let other = SeedConfig {
            seed: 7,
            ..config(50, 0.5)
        };
        assert_ne!(a, generate(&other, now()));
    }

    #[test]
    fn values_stay_in_range() {
        let cfg = config(500, 0.3);
        let start = seed_window_start(now(), cfg.months);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 4, 19, 0, 0, 0).unwrap());

        for review in generate(&cfg, now()) {
            assert!((1..=5).contains(&review.rating));
            assert!((1..=cfg.games as i32).contains(&review.game_id));
            assert!((1..=cfg.users as i32).contains(&review.user_id));
            assert!(review.created_at >= start && review.created_at <= now());
            if let Some(reply) = review.reply {
                assert!(reply.created_at >= review.created_at);
                assert!(reply.created_at <= now());
            }
        }
    }

    #[test]
    fn reply_ratio_extremes() {
        assert!(generate(&config(100, 0.0), now()).iter().all(|r| r.reply.is_none()));
        assert!(generate(&config(100, 1.0), now()).iter().all(|r| r.reply.is_some()));
    }

    #[test]
    fn zero_month_window_does_not_panic() {
        let cfg = SeedConfig {
            months: 0,
            ..config(10, 0.5)
        };
        assert_eq!(generate(&cfg, now()).len(), 10);
    }

    #[test]
    fn oversized_id_ranges_are_clamped() {
        let cfg = SeedConfig {
            games: 3_000_000_000,
            users: u32::MAX,
            ..config(20, 0.5)
        };
        for review in generate(&cfg, now()) {
            assert!(review.game_id >= 1);
            assert!(review.user_id >= 1);
        }
    }
}
