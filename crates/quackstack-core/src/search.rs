//! Similarity ranking and context assembly.
//!
//! The ranker operates on an already-fetched fragment set and a query
//! vector projected into the same [`VectorSpace`](crate::vector_space::VectorSpace).
//! It has no store or configuration dependencies.
//!
//! # Scoring Algorithm
//!
//! 1. `score = cosine(query, embedding)`.
//! 2. With `boost_recent`, a last commit at most `recent_days` old
//!    multiplies the score by `1 + 0.2 × (1 − days / recent_days)`.
//! 3. With `boost_frequent`, a known commit count multiplies the score by
//!    `1 + min(total_commits, 50) / 50 × 0.15`.
//! 4. Stable sort by score (desc); ties keep corpus order.
//! 5. Keep the first result per `file_path`.
//! 6. Truncate to `limit`.

use chrono::{DateTime, Utc};

use crate::embedding::cosine_similarity;
use crate::models::{Fragment, RankedResult};

/// Default cap on returned results.
pub const DEFAULT_LIMIT: usize = 5;
/// Default recency window in days.
pub const DEFAULT_RECENT_DAYS: u32 = 30;
/// Separator between rendered results in the context string.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const RECENCY_WEIGHT: f64 = 0.2;
const FREQUENCY_WEIGHT: f64 = 0.15;
const FREQUENCY_CAP: i64 = 50;
const COMMIT_MESSAGE_MAX_CHARS: usize = 80;

/// Ranking options, decoupled from application config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankOptions {
    pub boost_recent: bool,
    pub boost_frequent: bool,
    /// Only fragments whose last committer or primary author has this
    /// email. Applied by the store fetch, not by [`rank`].
    pub filter_author: Option<String>,
    pub recent_days: u32,
    pub limit: usize,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            boost_recent: false,
            boost_frequent: false,
            filter_author: None,
            recent_days: DEFAULT_RECENT_DAYS,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Multiplier for a last commit `days` old.
///
/// Non-increasing over `[0, recent_days]`, exactly `1.0` beyond it. Commits
/// dated in the future count as zero days old.
pub fn recency_boost(days: f64, recent_days: u32) -> f64 {
    let window = recent_days.max(1) as f64;
    let days = days.max(0.0);
    if days > window {
        return 1.0;
    }
    1.0 + RECENCY_WEIGHT * (1.0 - days / window)
}

/// Multiplier for a file with `total_commits` commits.
pub fn frequency_boost(total_commits: i64) -> f64 {
    let capped = total_commits.clamp(0, FREQUENCY_CAP) as f64;
    1.0 + capped / FREQUENCY_CAP as f64 * FREQUENCY_WEIGHT
}

fn days_between(earlier: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - earlier).num_milliseconds() as f64 / 86_400_000.0
}

/// Score, order, deduplicate, and truncate `fragments` against `query_vec`.
///
/// `fragments` must be in corpus order and already filtered by author.
/// `now` anchors the recency boost.
pub fn rank(
    query_vec: &[f32],
    fragments: &[Fragment],
    options: &RankOptions,
    now: DateTime<Utc>,
) -> Vec<RankedResult> {
    let mut scored: Vec<(f64, &Fragment)> = fragments
        .iter()
        .map(|f| {
            let mut score = cosine_similarity(query_vec, &f.embedding) as f64;
            if options.boost_recent {
                if let Some(date) = f.revision.last_commit_date {
                    score *= recency_boost(days_between(date, now), options.recent_days);
                }
            }
            if options.boost_frequent {
                if let Some(commits) = f.revision.total_commits {
                    score *= frequency_boost(commits);
                }
            }
            (score, f)
        })
        .collect();

    // `sort_by` is stable.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut seen = std::collections::HashSet::new();
    scored
        .into_iter()
        .filter(|(_, f)| seen.insert(f.file_path.as_str()))
        .take(options.limit)
        .map(|(score, f)| RankedResult {
            id: f.id,
            content: f.content.clone(),
            file_path: f.file_path.clone(),
            function_name: f.function_name.clone(),
            line_start: f.line_start,
            line_end: f.line_end,
            score,
            revision: f.revision.clone(),
        })
        .collect()
}

/// Provenance header for the result at 1-based `position`.
///
/// `[1] src/a.ts (foo) [Jane Doe, 3 days ago]`
pub fn context_header(position: usize, result: &RankedResult, now: DateTime<Utc>) -> String {
    let mut header = format!("[{}] {}", position, result.file_path);
    if let Some(name) = &result.function_name {
        header.push_str(&format!(" ({})", name));
    }

    let author = result
        .revision
        .last_commit_author
        .as_deref()
        .or(result.revision.primary_author.as_deref());
    let age = result
        .revision
        .last_commit_date
        .map(|date| format_age(days_between(date, now)));
    match (author, age) {
        (Some(author), Some(age)) => header.push_str(&format!(" [{}, {}]", author, age)),
        (Some(author), None) => header.push_str(&format!(" [{}]", author)),
        (None, Some(age)) => header.push_str(&format!(" [{}]", age)),
        (None, None) => {}
    }

    if let Some(message) = result.revision.last_commit_message.as_deref() {
        let message = message.lines().next().unwrap_or("").trim();
        if !message.is_empty() {
            header.push_str("\nLast commit: ");
            header.push_str(&truncate_chars(message, COMMIT_MESSAGE_MAX_CHARS));
        }
    }
    header
}

/// Join ranked results into the context string handed to an answer provider.
pub fn build_context(results: &[RankedResult], now: DateTime<Utc>) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}\n{}", context_header(i + 1, r, now), r.content))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

fn format_age(days: f64) -> String {
    let days = days.max(0.0).floor() as i64;
    match days {
        0 => "today".to_string(),
        1 => "1 day ago".to_string(),
        n => format!("{} days ago", n),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RevisionInfo;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn fragment(id: i64, path: &str, embedding: Vec<f32>) -> Fragment {
        Fragment {
            id,
            content: format!("content {}", id),
            file_path: path.to_string(),
            project_name: "demo".to_string(),
            language: ".ts".to_string(),
            function_name: None,
            line_start: Some(1),
            line_end: Some(3),
            embedding,
            revision: RevisionInfo::default(),
            updated_at: 0,
        }
    }

    #[test]
    fn test_recency_boost_bounds() {
        assert!((recency_boost(0.0, 30) - 1.2).abs() < 1e-12);
        assert!((recency_boost(30.0, 30) - 1.0).abs() < 1e-12);
        assert_eq!(recency_boost(31.0, 30), 1.0);
        assert_eq!(recency_boost(365.0, 30), 1.0);
        assert!((recency_boost(-2.0, 30) - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_recency_boost_non_increasing() {
        let mut previous = f64::INFINITY;
        for step in 0..=60 {
            let boost = recency_boost(step as f64 * 0.5, 30);
            assert!(boost <= previous);
            previous = boost;
        }
    }

    #[test]
    fn test_frequency_boost() {
        assert_eq!(frequency_boost(0), 1.0);
        assert!((frequency_boost(25) - 1.075).abs() < 1e-12);
        assert!((frequency_boost(50) - 1.15).abs() < 1e-12);
        assert!((frequency_boost(500) - 1.15).abs() < 1e-12);
    }

    #[test]
    fn test_rank_sorted_and_unique_paths() {
        let query = vec![1.0, 0.0];
        let fragments = vec![
            fragment(1, "a.ts", vec![0.2, 1.0]),
            fragment(2, "b.ts", vec![1.0, 0.0]),
            fragment(3, "b.ts", vec![1.0, 0.1]),
            fragment(4, "c.ts", vec![1.0, 0.5]),
        ];
        let results = rank(&query, &fragments, &RankOptions::default(), now());

        let ids: Vec<i64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 4, 1]);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_rank_ties_keep_corpus_order() {
        let query = vec![1.0];
        let fragments = vec![
            fragment(7, "x.ts", vec![2.0]),
            fragment(3, "y.ts", vec![5.0]),
            fragment(9, "z.ts", vec![1.0]),
        ];
        let results = rank(&query, &fragments, &RankOptions::default(), now());
        let ids: Vec<i64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![7, 3, 9]);
    }

    #[test]
    fn test_rank_truncates_to_limit() {
        let query = vec![1.0, 1.0];
        let fragments: Vec<Fragment> = (0..12)
            .map(|i| fragment(i, &format!("f{}.ts", i), vec![1.0, i as f32 / 10.0]))
            .collect();
        assert_eq!(rank(&query, &fragments, &RankOptions::default(), now()).len(), 5);

        let options = RankOptions {
            limit: 2,
            ..RankOptions::default()
        };
        assert_eq!(rank(&query, &fragments, &options, now()).len(), 2);
    }

    #[test]
    fn test_rank_empty_corpus() {
        assert!(rank(&[1.0], &[], &RankOptions::default(), now()).is_empty());
    }

    #[test]
    fn test_recency_boost_reorders() {
        let query = vec![1.0, 0.0];
        let mut stale = fragment(1, "stale.ts", vec![1.0, 0.1]);
        stale.revision.last_commit_date = Some(now() - Duration::days(400));
        let mut fresh = fragment(2, "fresh.ts", vec![1.0, 0.3]);
        fresh.revision.last_commit_date = Some(now() - Duration::days(1));
        let fragments = vec![stale, fresh];

        let plain = rank(&query, &fragments, &RankOptions::default(), now());
        assert_eq!(plain[0].file_path, "stale.ts");

        let options = RankOptions {
            boost_recent: true,
            ..RankOptions::default()
        };
        let boosted = rank(&query, &fragments, &options, now());
        assert_eq!(boosted[0].file_path, "fresh.ts");
    }

    #[test]
    fn test_frequency_boost_applies_only_when_enabled() {
        let query = vec![1.0];
        let mut busy = fragment(1, "busy.ts", vec![1.0]);
        busy.revision.total_commits = Some(50);

        let plain = rank(&query, &[busy.clone()], &RankOptions::default(), now());
        assert!((plain[0].score - 1.0).abs() < 1e-6);

        let options = RankOptions {
            boost_frequent: true,
            ..RankOptions::default()
        };
        let boosted = rank(&query, &[busy], &options, now());
        assert!((boosted[0].score - 1.15).abs() < 1e-6);
    }

    #[test]
    fn test_zero_query_scores_zero() {
        let fragments = vec![fragment(1, "a.ts", vec![1.0, 2.0])];
        let results = rank(&[0.0, 0.0], &fragments, &RankOptions::default(), now());
        assert_eq!(results[0].score, 0.0);
    }

    #[test]
    fn test_build_context_format() {
        let query = vec![1.0];
        let mut a = fragment(1, "A.ts", vec![1.0]);
        a.function_name = Some("foo".to_string());
        a.content = "function foo() {}".to_string();
        let b = fragment(2, "B.ts", vec![0.5]);
        let results = rank(&query, &[a, b], &RankOptions::default(), now());

        let context = build_context(&results, now());
        assert_eq!(
            context,
            "[1] A.ts (foo)\nfunction foo() {}\n\n---\n\n[2] B.ts\ncontent 2"
        );
    }

    #[test]
    fn test_context_header_annotations() {
        let mut f = fragment(1, "src/db.ts", vec![1.0]);
        f.revision.last_commit_author = Some("Jane Doe".to_string());
        f.revision.last_commit_date = Some(now() - Duration::days(3));
        f.revision.last_commit_message = Some(format!("{}\n\nbody", "x".repeat(100)));
        let result = &rank(&[1.0], &[f], &RankOptions::default(), now())[0];

        let header = context_header(2, result, now());
        let mut lines = header.lines();
        assert_eq!(lines.next(), Some("[2] src/db.ts [Jane Doe, 3 days ago]"));
        assert_eq!(
            lines.next(),
            Some(format!("Last commit: {}...", "x".repeat(80)).as_str())
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_build_context_empty() {
        assert_eq!(build_context(&[], now()), "");
    }
}
