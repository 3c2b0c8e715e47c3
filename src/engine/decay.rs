// ── Memory Engine: Decay Model ─────────────────────────────────────────────
//
// Pure functions computing the age- and access-adjusted importance of a
// memory at query time (Ebbinghaus-style exponential forgetting).
//
// Nothing here mutates a stored memory: callers apply the result to a
// transient copy for ranking and display. The persisted `importance` field
// is only ever changed by explicit edits, never by decay.

use crate::atoms::types::{Memory, MemoryType};

// ── Constants ──────────────────────────────────────────────────────────────

/// Lower bound of persisted and effective importance.
pub const IMPORTANCE_MIN: f64 = 1.0;

/// Upper bound of persisted and effective importance.
pub const IMPORTANCE_MAX: f64 = 10.0;

/// Access-frequency bonus per recall.
const ACCESS_BONUS_PER_HIT: f64 = 0.1;

/// Cap on the total access bonus. Frequent recall can keep a memory
/// relevant despite decay, but cannot revive importance unboundedly.
const ACCESS_BONUS_CAP: f64 = 2.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

// ── Decay rate ─────────────────────────────────────────────────────────────

/// Base forgetting speed per memory type. Slower = more durable:
/// relationship < preference < fact < event < emotion.
fn base_rate(memory_type: MemoryType) -> f64 {
    match memory_type {
        MemoryType::Fact => 0.1,
        MemoryType::Event => 0.2,
        MemoryType::Preference => 0.05,
        MemoryType::Emotion => 0.3,
        MemoryType::Relationship => 0.02,
    }
}

/// Forgetting speed for a new memory, derived once at creation.
///
/// Higher original importance yields a smaller rate (slower forgetting),
/// scaled linearly: `base * (11 - importance) / 10`.
pub fn decay_rate(memory_type: MemoryType, importance: f64) -> f64 {
    let importance = clamp_importance(importance);
    base_rate(memory_type) * (11.0 - importance) / 10.0
}

/// Clamp a persisted importance into `[1, 10]`.
pub fn clamp_importance(importance: f64) -> f64 {
    importance.clamp(IMPORTANCE_MIN, IMPORTANCE_MAX)
}

// ── Effective importance ───────────────────────────────────────────────────

/// Age of a memory in (fractional) days at `now_ms`.
pub fn age_days(memory: &Memory, now_ms: i64) -> f64 {
    ((now_ms - memory.timestamp) as f64 / MILLIS_PER_DAY).max(0.0)
}

/// The unclamped decayed importance:
/// `importance * exp(-decay_rate * age_days) + min(access_count * 0.1, 2)`.
///
/// Used by the cleanup pass, where a fully decayed memory must be able to
/// fall below the floor of 1 — the clamped form never can.
pub fn decayed_importance(memory: &Memory, now_ms: i64) -> f64 {
    let decay_factor = (-memory.decay_rate * age_days(memory, now_ms)).exp();
    let access_bonus = (memory.access_count as f64 * ACCESS_BONUS_PER_HIT).min(ACCESS_BONUS_CAP);
    memory.importance * decay_factor + access_bonus
}

/// The decayed importance clamped to `[1, 10]` — the value used for
/// ranking, filtering, and display.
pub fn effective_importance(memory: &Memory, now_ms: i64) -> f64 {
    decayed_importance(memory, now_ms).clamp(IMPORTANCE_MIN, IMPORTANCE_MAX)
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn make_mem(memory_type: MemoryType, importance: f64, timestamp: i64) -> Memory {
        Memory {
            id: "m1".to_string(),
            memory_type,
            content: "test".to_string(),
            importance,
            timestamp,
            tags: vec![],
            decay_rate: decay_rate(memory_type, importance),
            last_accessed: timestamp,
            access_count: 0,
            related_memories: None,
        }
    }

    #[test]
    fn test_decay_rate_type_ordering() {
        // Same importance: relationship slowest, emotion fastest.
        let imp = 5.0;
        let relationship = decay_rate(MemoryType::Relationship, imp);
        let preference = decay_rate(MemoryType::Preference, imp);
        let fact = decay_rate(MemoryType::Fact, imp);
        let event = decay_rate(MemoryType::Event, imp);
        let emotion = decay_rate(MemoryType::Emotion, imp);
        assert!(relationship < preference);
        assert!(preference < fact);
        assert!(fact < event);
        assert!(event < emotion);
    }

    #[test]
    fn test_decay_rate_importance_scaling() {
        // Higher original importance → slower forgetting.
        assert!(decay_rate(MemoryType::Fact, 10.0) < decay_rate(MemoryType::Fact, 1.0));
        // Linear scale endpoints: base * 1/10 and base * 10/10.
        assert!((decay_rate(MemoryType::Fact, 10.0) - 0.01).abs() < 1e-12);
        assert!((decay_rate(MemoryType::Fact, 1.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_decay_rate_clamps_out_of_range_importance() {
        assert_eq!(
            decay_rate(MemoryType::Event, 42.0),
            decay_rate(MemoryType::Event, 10.0)
        );
        assert_eq!(
            decay_rate(MemoryType::Event, -3.0),
            decay_rate(MemoryType::Event, 1.0)
        );
    }

    #[test]
    fn test_effective_importance_fresh_memory() {
        let mem = make_mem(MemoryType::Fact, 7.0, 1_000_000);
        // At creation time, no decay and no access bonus.
        assert!((effective_importance(&mem, 1_000_000) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_decay_monotonic_in_age() {
        let mem = make_mem(MemoryType::Event, 8.0, 0);
        let day = 86_400_000i64;
        let mut prev = effective_importance(&mem, 0);
        for d in 1..120 {
            let cur = effective_importance(&mem, d * day);
            assert!(
                cur <= prev + 1e-12,
                "importance rose with age at day {}: {} > {}",
                d,
                cur,
                prev
            );
            prev = cur;
        }
    }

    #[test]
    fn test_access_bonus_capped_at_two() {
        let mut mem = make_mem(MemoryType::Emotion, 5.0, 0);
        let now = 365 * 86_400_000i64; // a year: decay factor ~0
        mem.access_count = 20;
        let at_cap = decayed_importance(&mem, now);
        mem.access_count = 1_000_000;
        let way_past_cap = decayed_importance(&mem, now);
        assert!((way_past_cap - at_cap).abs() < 1e-9, "access bonus exceeded cap");
        assert!(at_cap < 2.0 + 1e-6);
    }

    #[test]
    fn test_effective_importance_clamped_to_floor() {
        // Fully decayed with zero accesses: effective clamps to 1,
        // while the raw decayed value sinks below it.
        let mem = make_mem(MemoryType::Emotion, 1.0, 0);
        let now = 365 * 86_400_000i64;
        assert!(decayed_importance(&mem, now) < 1.0);
        assert_eq!(effective_importance(&mem, now), 1.0);
    }

    #[test]
    fn test_age_days_never_negative() {
        let mem = make_mem(MemoryType::Fact, 5.0, 10_000);
        // Clock skew: now before creation.
        assert_eq!(age_days(&mem, 0), 0.0);
    }
}
