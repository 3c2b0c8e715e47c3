// ── Memory Engine: Relevance Ranking ───────────────────────────────────────
//
// Scores and orders memories by effective importance, recency, and access
// frequency. Pure with respect to its inputs: the access bookkeeping that
// search performs as a side effect lives in `store::MemoryStore::record_access`,
// not here, so ranking and bookkeeping are testable separately.

use crate::atoms::types::{Memory, MemoryQuery};
use crate::engine::decay::{age_days, effective_importance};

// ── Constants ──────────────────────────────────────────────────────────────

/// Weight of effective importance in the relevance score.
const IMPORTANCE_WEIGHT: f64 = 10.0;

/// Recency contributes `max(0, RECENCY_WINDOW_DAYS - age_days)`.
const RECENCY_WINDOW_DAYS: f64 = 100.0;

/// Access frequency contributes `min(access_count * 5, 50)`.
const ACCESS_SCORE_PER_HIT: f64 = 5.0;
const ACCESS_SCORE_CAP: f64 = 50.0;

// ── Scoring ────────────────────────────────────────────────────────────────

/// Relevance of one memory at `now_ms`:
/// `effective_importance * 10 + recency + capped access score`.
pub fn relevance_score(memory: &Memory, now_ms: i64) -> f64 {
    let importance_score = effective_importance(memory, now_ms) * IMPORTANCE_WEIGHT;
    let recency_score = (RECENCY_WINDOW_DAYS - age_days(memory, now_ms)).max(0.0);
    let access_score = (memory.access_count as f64 * ACCESS_SCORE_PER_HIT).min(ACCESS_SCORE_CAP);
    importance_score + recency_score + access_score
}

// ── Filtering + ranking ────────────────────────────────────────────────────

fn matches(memory: &Memory, query: &MemoryQuery, now_ms: i64) -> bool {
    if let Some(wanted) = query.memory_type {
        if memory.memory_type != wanted {
            return false;
        }
    }
    if let Some(min) = query.min_importance {
        if effective_importance(memory, now_ms) < min {
            return false;
        }
    }
    if let Some(ref keyword) = query.keyword {
        let needle = keyword.to_lowercase();
        let in_content = memory.content.to_lowercase().contains(&needle);
        let in_tags = memory
            .tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(&needle));
        if !in_content && !in_tags {
            return false;
        }
    }
    true
}

/// Filter and order memories for a query. Returns copies; no bookkeeping.
///
/// Sort is descending by relevance score and stable, so ties keep the
/// original insertion order. `limit` is applied after ranking.
pub fn rank(memories: &[Memory], query: &MemoryQuery, now_ms: i64) -> Vec<Memory> {
    let mut results: Vec<Memory> = memories
        .iter()
        .filter(|m| matches(m, query, now_ms))
        .cloned()
        .collect();

    // Vec::sort_by is stable; NaN cannot occur for finite inputs.
    results.sort_by(|a, b| {
        relevance_score(b, now_ms)
            .partial_cmp(&relevance_score(a, now_ms))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if let Some(limit) = query.limit {
        results.truncate(limit);
    }
    results
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::MemoryType;
    use crate::engine::decay::decay_rate;

    const DAY: i64 = 86_400_000;

    fn make_mem(id: &str, content: &str, importance: f64, timestamp: i64) -> Memory {
        Memory {
            id: id.to_string(),
            memory_type: MemoryType::Fact,
            content: content.to_string(),
            importance,
            timestamp,
            tags: vec![],
            decay_rate: decay_rate(MemoryType::Fact, importance),
            last_accessed: timestamp,
            access_count: 0,
            related_memories: None,
        }
    }

    #[test]
    fn test_keyword_matches_content_case_insensitive() {
        let mems = vec![
            make_mem("a", "Likes HIKING in autumn", 6.0, 0),
            make_mem("b", "works as a nurse", 6.0, 0),
        ];
        let query = MemoryQuery { keyword: Some("hiking".to_string()), ..Default::default() };
        let results = rank(&mems, &query, DAY);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[test]
    fn test_keyword_matches_tags() {
        let mut mem = make_mem("a", "something unrelated", 6.0, 0);
        mem.tags = vec!["Travel".to_string(), "plans".to_string()];
        let query = MemoryQuery { keyword: Some("travel".to_string()), ..Default::default() };
        assert_eq!(rank(&[mem], &query, DAY).len(), 1);
    }

    #[test]
    fn test_keyword_no_match_excluded() {
        let mems = vec![make_mem("a", "likes tea", 6.0, 0)];
        let query = MemoryQuery { keyword: Some("coffee".to_string()), ..Default::default() };
        assert!(rank(&mems, &query, DAY).is_empty());
    }

    #[test]
    fn test_type_filter_exact() {
        let mut a = make_mem("a", "x", 6.0, 0);
        a.memory_type = MemoryType::Event;
        let b = make_mem("b", "y", 6.0, 0);
        let query = MemoryQuery { memory_type: Some(MemoryType::Event), ..Default::default() };
        let results = rank(&[a, b], &query, DAY);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[test]
    fn test_min_importance_uses_effective_value() {
        // Old low-importance emotion decays below the threshold; a fresh
        // memory with the same persisted importance does not.
        let mut old = make_mem("old", "x", 5.0, 0);
        old.memory_type = MemoryType::Emotion;
        old.decay_rate = decay_rate(MemoryType::Emotion, 5.0);
        let fresh = make_mem("fresh", "y", 5.0, 100 * DAY);
        let query = MemoryQuery { min_importance: Some(4.0), ..Default::default() };
        let results = rank(&[old, fresh], &query, 100 * DAY);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "fresh");
    }

    #[test]
    fn test_sort_descending_by_relevance() {
        let weak = make_mem("weak", "x", 2.0, 0);
        let strong = make_mem("strong", "y", 9.0, 0);
        let results = rank(&[weak, strong], &MemoryQuery::default(), DAY);
        assert_eq!(results[0].id, "strong");
        assert_eq!(results[1].id, "weak");
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let a = make_mem("first", "same", 5.0, 0);
        let b = make_mem("second", "same", 5.0, 0);
        let results = rank(&[a, b], &MemoryQuery::default(), DAY);
        assert_eq!(results[0].id, "first");
        assert_eq!(results[1].id, "second");
    }

    #[test]
    fn test_rank_is_deterministic() {
        let mems: Vec<Memory> = (0..10)
            .map(|i| make_mem(&format!("m{}", i), "content", 3.0 + i as f64 * 0.5, i * DAY))
            .collect();
        let query = MemoryQuery::default();
        let first = rank(&mems, &query, 20 * DAY);
        let second = rank(&mems, &query, 20 * DAY);
        let ids_first: Vec<&str> = first.iter().map(|m| m.id.as_str()).collect();
        let ids_second: Vec<&str> = second.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids_first, ids_second);
    }

    #[test]
    fn test_limit_applied_after_ranking() {
        let mems: Vec<Memory> = (0..5)
            .map(|i| make_mem(&format!("m{}", i), "x", 1.0 + i as f64 * 2.0, 0))
            .collect();
        let query = MemoryQuery { limit: Some(2), ..Default::default() };
        let results = rank(&mems, &query, DAY);
        assert_eq!(results.len(), 2);
        // Highest importance first, so the cap keeps the best two.
        assert_eq!(results[0].id, "m4");
        assert_eq!(results[1].id, "m3");
    }

    #[test]
    fn test_access_score_capped() {
        // 20 accesses already saturate both the access score (cap 50) and
        // the effective-importance bonus (cap +2); more must change nothing.
        let mut a = make_mem("a", "x", 5.0, 0);
        a.access_count = 20;
        let mut b = a.clone();
        b.access_count = 500;
        let now = 0;
        let diff = relevance_score(&b, now) - relevance_score(&a, now);
        assert!(diff.abs() < 1e-9, "access score exceeded cap: diff {}", diff);
    }
}
