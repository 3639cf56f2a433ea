use chrono::{DateTime, NaiveDate, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use sqlx::SqlitePool;
use vocabtamil_algo::MasteryLevel;

use crate::db::operations::progress::{
    self, category_counts, due_reviews, mastery_counts, ProgressRecord,
};
use crate::db::operations::user::UserRecord;
use crate::db::operations::word::{count_words, find_word, unseen_words, Word};

pub const REVIEW_LIMIT: i64 = 100;
pub const WEAK_WORDS_LIMIT: i64 = 20;
pub const MAX_DAILY_LIMIT: usize = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub mastery_level: MasteryLevel,
    pub times_seen: u32,
    pub times_correct: u32,
    pub times_incorrect: u32,
    pub accuracy_percentage: f64,
    pub next_review_date: NaiveDate,
    pub review_interval_days: u32,
    pub ease_factor: f64,
    pub average_response_time: Option<f64>,
    pub last_reviewed_at: DateTime<Utc>,
    pub is_due: bool,
}

impl ProgressView {
    pub fn from_record(record: &ProgressRecord, today: NaiveDate) -> Self {
        let progress = &record.progress;
        Self {
            mastery_level: progress.mastery_level,
            times_seen: progress.times_seen,
            times_correct: progress.times_correct,
            times_incorrect: progress.times_incorrect,
            accuracy_percentage: progress.accuracy_percentage(),
            next_review_date: progress.next_review_date,
            review_interval_days: progress.review_interval_days,
            ease_factor: progress.ease_factor,
            average_response_time: progress.average_response_time,
            last_reviewed_at: record.last_reviewed_at,
            is_due: progress.is_due(today),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordWithProgress {
    #[serde(flatten)]
    pub word: Word,
    pub progress: Option<ProgressView>,
}

fn with_progress(pairs: Vec<(Word, ProgressRecord)>, today: NaiveDate) -> Vec<WordWithProgress> {
    pairs
        .into_iter()
        .map(|(word, record)| WordWithProgress {
            progress: Some(ProgressView::from_record(&record, today)),
            word,
        })
        .collect()
}

/// Today's study set: due reviews first, topped up with unseen words in the
/// user's difficulty band, then shuffled.
pub async fn daily_words(
    pool: &SqlitePool,
    user: &UserRecord,
    limit: usize,
    today: NaiveDate,
) -> Result<Vec<WordWithProgress>, sqlx::Error> {
    let limit = limit.clamp(1, MAX_DAILY_LIMIT);
    let reviews = due_reviews(pool, &user.id, today, limit as i64).await?;

    let remaining = limit.saturating_sub(reviews.len());
    let fresh = if remaining > 0 {
        unseen_words(
            pool,
            &user.id,
            user.tamil_level.difficulty_range(),
            remaining as i64,
        )
        .await?
    } else {
        Vec::new()
    };

    let mut words = with_progress(reviews, today);
    words.extend(fresh.into_iter().map(|word| WordWithProgress {
        word,
        progress: None,
    }));

    {
        let mut rng = rand::rng();
        words.shuffle(&mut rng);
    }
    words.truncate(limit);
    Ok(words)
}

pub async fn review_words(
    pool: &SqlitePool,
    user_id: &str,
    today: NaiveDate,
) -> Result<Vec<WordWithProgress>, sqlx::Error> {
    let pairs = due_reviews(pool, user_id, today, REVIEW_LIMIT).await?;
    Ok(with_progress(pairs, today))
}

pub async fn weak_words(
    pool: &SqlitePool,
    user_id: &str,
    today: NaiveDate,
) -> Result<Vec<WordWithProgress>, sqlx::Error> {
    let pairs = progress::weak_words(pool, user_id, WEAK_WORDS_LIMIT).await?;
    Ok(with_progress(pairs, today))
}

pub async fn word_detail(
    pool: &SqlitePool,
    user_id: &str,
    word_id: &str,
    today: NaiveDate,
) -> Result<Option<WordWithProgress>, sqlx::Error> {
    let Some(word) = find_word(pool, word_id).await? else {
        return Ok(None);
    };
    let record = progress::find_progress(pool, user_id, word_id).await?;
    Ok(Some(WordWithProgress {
        word,
        progress: record.map(|r| ProgressView::from_record(&r, today)),
    }))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryBreakdown {
    pub new: i64,
    pub learning: i64,
    pub familiar: i64,
    pub mastered: i64,
}

impl MasteryBreakdown {
    /// `counts` indexed by mastery ordinal; words without a progress row count as new.
    pub fn from_counts(counts: [i64; 4], total_words: i64) -> Self {
        let seen: i64 = counts.iter().sum();
        Self {
            new: counts[0] + (total_words - seen).max(0),
            learning: counts[1],
            familiar: counts[2],
            mastered: counts[3],
        }
    }
}

pub async fn mastery_breakdown(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<MasteryBreakdown, sqlx::Error> {
    let counts = mastery_counts(pool, user_id).await?;
    let total = count_words(pool).await?;
    Ok(MasteryBreakdown::from_counts(counts, total))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryProgress {
    pub category: String,
    pub words_learned: i64,
    pub words_mastered: i64,
    pub total_words: i64,
    pub mastery_rate: f64,
}

/// Share of learned words per category, one decimal, highest first.
pub async fn category_progress(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<CategoryProgress>, sqlx::Error> {
    let mut progress: Vec<CategoryProgress> = category_counts(pool, user_id)
        .await?
        .into_iter()
        .map(|counts| {
            let rate = if counts.total_words > 0 {
                counts.words_learned as f64 / counts.total_words as f64 * 100.0
            } else {
                0.0
            };
            CategoryProgress {
                category: counts.category,
                words_learned: counts.words_learned,
                words_mastered: counts.words_mastered,
                total_words: counts.total_words,
                mastery_rate: (rate * 10.0).round() / 10.0,
            }
        })
        .collect();

    progress.sort_by(|a, b| b.mastery_rate.total_cmp(&a.mastery_rate));
    Ok(progress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_words_count_as_new() {
        let breakdown = MasteryBreakdown::from_counts([2, 3, 1, 1], 20);
        assert_eq!(breakdown.new, 15);
        assert_eq!(breakdown.learning, 3);
        assert_eq!(breakdown.mastered, 1);
    }

    #[test]
    fn breakdown_never_goes_negative() {
        let breakdown = MasteryBreakdown::from_counts([0, 5, 0, 0], 3);
        assert_eq!(breakdown.new, 0);
    }
}
