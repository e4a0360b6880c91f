/// 샘플 데이터 생성에 사용하는 SQL 쿼리
/// 배치 단위로 배열 파라미터를 UNNEST 해서 한 번에 삽입

/// 리뷰 배치 삽입 쿼리
pub const INSERT_REVIEWS: &str = "
    INSERT INTO {schema}.reviews_partitioned (game_id, user_id, rating, content, created_at)
    SELECT * FROM UNNEST($1::INTEGER[], $2::INTEGER[], $3::INTEGER[], $4::TEXT[], $5::TIMESTAMPTZ[])
    RETURNING review_id::BIGINT, created_at";

/// 답글 배치 삽입 쿼리
pub const INSERT_REPLIES: &str = "
    INSERT INTO {schema}.review_replies_partitioned (review_id, user_id, content, created_at)
    SELECT * FROM UNNEST($1::BIGINT[], $2::INTEGER[], $3::TEXT[], $4::TIMESTAMPTZ[])";

/// 리뷰 본문 샘플
pub const REVIEW_PHRASES: [&str; 8] = [
    "Great pacing and a satisfying ending.",
    "Controls feel sluggish on the later levels.",
    "Beautiful art direction, shallow combat.",
    "Co-op mode is the highlight.",
    "Too many microtransactions.",
    "Runs smoothly even on older hardware.",
    "Story drags in the middle chapters.",
    "Would play again on a harder difficulty.",
];

/// 답글 본문 샘플
pub const REPLY_PHRASES: [&str; 4] = [
    "Agreed, the last boss was brutal.",
    "Did you try the latest patch?",
    "Completely different experience for me.",
    "Thanks, this helped me decide.",
];
