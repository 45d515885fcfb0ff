//! Candidate filtering by address overlap, then time-offset histogram
//! verification.

use std::collections::HashMap;

use crate::store::FingerprintStore;

/// Result of a successful match: the identified track and its coherent
/// score (the size of its largest time-offset histogram bucket).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub track_id: u32,
    pub score: u32,
}

/// Tunable thresholds for [`query`], mirroring the `Config` table.
#[derive(Debug, Clone, Copy)]
pub struct MatcherParams {
    pub k_min: usize,
    pub s_min: u32,
    pub margin: u32,
    pub bucket: i64,
}

/// Bucket a time offset `delta` into a bucket of width `bucket` frames,
/// using floor division so negative offsets bucket consistently.
fn bucket_of(delta: i64, bucket: i64) -> i64 {
    delta.div_euclid(bucket)
}

/// Query the store with a fingerprint set, returning at most one best match.
///
/// Stage 1 accumulates per-track offsets `t_db - t_q` from every posting
/// under each query address, discarding tracks with fewer than `k_min`
/// total matches. Stage 2 scores each surviving track by its largest
/// offset-histogram bucket. The top track wins only if its score is at
/// least `s_min` and beats the runner-up by more than `margin`.
pub fn query(store: &FingerprintStore, fps: &[(u32, u32)], params: &MatcherParams) -> Option<MatchResult> {
    let mut offsets_by_track: HashMap<u32, Vec<i64>> = HashMap::new();

    for &(address, t_q) in fps {
        for posting in store.recall(address) {
            let delta = posting.t_anchor as i64 - t_q as i64;
            offsets_by_track.entry(posting.track_id).or_default().push(delta);
        }
    }

    offsets_by_track.retain(|_, offsets| offsets.len() >= params.k_min);
    if offsets_by_track.is_empty() {
        return None;
    }

    let mut scores: Vec<(u32, u32)> = offsets_by_track
        .into_iter()
        .map(|(track_id, offsets)| (track_id, coherent_score(&offsets, params.bucket)))
        .collect();

    // Highest score first; ties broken by lower track_id for determinism.
    scores.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let (best_id, best_score) = scores[0];
    let runner_up_score = scores.get(1).map(|&(_, s)| s).unwrap_or(0);

    if best_score >= params.s_min && best_score > runner_up_score + params.margin {
        Some(MatchResult {
            track_id: best_id,
            score: best_score,
        })
    } else {
        None
    }
}

/// Largest histogram bucket among `offsets`, grouped by floor-division
/// into buckets of width `bucket`. Ties between equally-populated buckets
/// are broken toward the bucket closest to `delta = 0`.
fn coherent_score(offsets: &[i64], bucket: i64) -> u32 {
    let mut counts: HashMap<i64, u32> = HashMap::new();
    for &delta in offsets {
        *counts.entry(bucket_of(delta, bucket)).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.abs().cmp(&a.0.abs())))
        .map(|(_, count)| count)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> MatcherParams {
        MatcherParams {
            k_min: 3,
            s_min: 3,
            margin: 1,
            bucket: 1,
        }
    }

    fn build_store_with_track(fps: &[(u32, u32)]) -> (FingerprintStore, u32) {
        let mut store = FingerprintStore::new();
        let id = store.insert("track", fps);
        (store, id)
    }

    #[test]
    fn no_matches_returns_none() {
        let store = FingerprintStore::new();
        let result = query(&store, &[(1, 0), (2, 1)], &params());
        assert!(result.is_none());
    }

    #[test]
    fn fewer_than_k_min_matches_is_discarded() {
        let (store, _id) = build_store_with_track(&[(1, 10), (2, 11)]);
        // Query offset 10 aligns both, but k_min is 3 and only 2 match.
        let query_fps = vec![(1, 0), (2, 1)];
        assert!(query(&store, &query_fps, &params()).is_none());
    }

    #[test]
    fn coherent_offsets_identify_the_track() {
        let (store, id) = build_store_with_track(&[(1, 10), (2, 11), (3, 12), (4, 50)]);
        // Query anchors at 0,1,2,9: delta = 10,10,10,(50-9=41) -> bucket {10:3, 41:1}
        let query_fps = vec![(1, 0), (2, 1), (3, 2), (4, 9)];
        let result = query(&store, &query_fps, &params()).unwrap();
        assert_eq!(result.track_id, id);
        assert_eq!(result.score, 3);
    }

    #[test]
    fn below_s_min_is_rejected() {
        let (store, _id) = build_store_with_track(&[(1, 10), (2, 11), (3, 99)]);
        let query_fps = vec![(1, 0), (2, 1), (3, 2)];
        // Offsets: 10, 10, 97 -> best bucket score 2, below s_min of 3.
        assert!(query(&store, &query_fps, &params()).is_none());
    }

    #[test]
    fn ambiguous_tie_is_rejected_by_margin() {
        let mut store = FingerprintStore::new();
        let a = store.insert("a", &[(1, 10), (2, 11), (3, 12)]);
        let b = store.insert("b", &[(1, 20), (2, 21), (3, 22)]);
        let query_fps = vec![(1, 0), (2, 1), (3, 2)];
        // Both tracks score 3 with margin 1 required strictly: 3 > 3+1 is false.
        let result = query(&store, &query_fps, &params());
        assert!(result.is_none(), "expected ambiguous match to be rejected: {:?} vs {:?}", a, b);
    }

    #[test]
    fn bucket_width_groups_nearby_offsets() {
        let (store, id) = build_store_with_track(&[(1, 10), (2, 12), (3, 11)]);
        let query_fps = vec![(1, 0), (2, 0), (3, 0)];
        let wide = MatcherParams {
            k_min: 3,
            s_min: 3,
            margin: 1,
            bucket: 5,
        };
        let result = query(&store, &query_fps, &wide).unwrap();
        assert_eq!(result.track_id, id);
        assert_eq!(result.score, 3);
    }
}
