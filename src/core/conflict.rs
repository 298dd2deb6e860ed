use chrono::{DateTime, Utc};

/// Half-open overlap test: `[a_start, a_end)` and `[b_start, b_end)` overlap
/// iff `a_start < b_end && b_start < a_end`. Touching intervals do not overlap.
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Index of the first existing interval the candidate overlaps, if any.
pub fn first_overlap(
    candidate_start: DateTime<Utc>,
    candidate_end: DateTime<Utc>,
    existing: &[(DateTime<Utc>, DateTime<Utc>)],
) -> Option<usize> {
    existing
        .iter()
        .position(|&(start, end)| intervals_overlap(candidate_start, candidate_end, start, end))
}

/// Linear scan; `existing` needs no particular order. Callers pass only the
/// same subject's reservations for the same day.
pub fn has_overlap(
    candidate_start: DateTime<Utc>,
    candidate_end: DateTime<Utc>,
    existing: &[(DateTime<Utc>, DateTime<Utc>)],
) -> bool {
    first_overlap(candidate_start, candidate_end, existing).is_some()
}
