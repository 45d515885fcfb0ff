//! Combinatorial pairing of peaks into fingerprint addresses.

use crate::peaks::Peak;

/// Bits allotted to the anchor frequency bin within a packed address.
const F_ANCHOR_BITS: u32 = 10;
/// Bits allotted to the target frequency bin.
const F_TARGET_BITS: u32 = 10;
/// Bits allotted to the anchor-to-target frame delta.
const DT_BITS: u32 = 12;

const F_MASK: u32 = (1 << F_ANCHOR_BITS) - 1;
const DT_MASK: u32 = (1 << DT_BITS) - 1;

/// A single fingerprint: a packed `(bin_anchor, bin_target, delta_frame)`
/// address plus the anchor's frame index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub address: u32,
    pub anchor_time: u32,
}

/// Pack `(f_anchor, f_target, dt)` into a 32-bit address: 10 bits for each
/// frequency bin (masked to 0..=1023) and 12 bits for the frame delta
/// (masked to 0..=4095). Collision-free for any `window_len <= 2048`
/// (giving at most 1025 bins) and `dt_max <= 4095`, both well above this
/// crate's defaults.
pub fn encode_address(f_anchor: u32, f_target: u32, dt: u32) -> u32 {
    ((f_anchor & F_MASK) << (F_TARGET_BITS + DT_BITS))
        | ((f_target & F_MASK) << DT_BITS)
        | (dt & DT_MASK)
}

/// Pair peaks inside each anchor's target zone into fingerprints.
///
/// For anchor peak `(t_a, f_a)`, a peak `(t_t, f_t)` is an eligible target
/// iff `dt_min <= t_t - t_a <= dt_max` and `|f_t - f_a| <= df_max`. At most
/// `fanout` targets are kept per anchor, closest-first by
/// `(t_t - t_a, |f_t - f_a|)`.
///
/// `peaks` must be sorted by `(frame, bin)` ascending, as returned by
/// [`crate::peaks::find_peaks`].
pub fn build_fingerprints(
    peaks: &[Peak],
    dt_min: u32,
    dt_max: u32,
    df_max: u32,
    fanout: usize,
) -> Vec<Fingerprint> {
    let mut fingerprints = Vec::new();

    for (i, anchor) in peaks.iter().enumerate() {
        let mut candidates: Vec<(u32, u32, &Peak)> = Vec::new();

        for target in &peaks[i + 1..] {
            let delta_t = (target.frame - anchor.frame) as u32;
            if delta_t > dt_max {
                break; // peaks are frame-ascending; nothing further qualifies
            }
            if delta_t < dt_min {
                continue;
            }
            let df = (target.bin as i64 - anchor.bin as i64).unsigned_abs() as u32;
            if df > df_max {
                continue;
            }
            candidates.push((delta_t, df, target));
        }

        candidates.sort_by_key(|&(dt, df, _)| (dt, df));

        for &(dt, _df, target) in candidates.iter().take(fanout) {
            let address = encode_address(anchor.bin as u32, target.bin as u32, dt);
            fingerprints.push(Fingerprint {
                address,
                anchor_time: anchor.frame as u32,
            });
        }
    }

    fingerprints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak(frame: usize, bin: usize) -> Peak {
        Peak { frame, bin }
    }

    #[test]
    fn no_peaks_no_fingerprints() {
        assert!(build_fingerprints(&[], 1, 32, 64, 5).is_empty());
    }

    #[test]
    fn single_peak_has_no_targets() {
        let peaks = vec![peak(0, 10)];
        assert!(build_fingerprints(&peaks, 1, 32, 64, 5).is_empty());
    }

    #[test]
    fn pairs_within_target_zone() {
        let peaks = vec![peak(0, 10), peak(5, 20)];
        let fps = build_fingerprints(&peaks, 1, 32, 64, 5);
        assert_eq!(fps.len(), 1);
        assert_eq!(fps[0].anchor_time, 0);
        assert_eq!(fps[0].address, encode_address(10, 20, 5));
    }

    #[test]
    fn rejects_pairs_outside_time_window() {
        let peaks = vec![peak(0, 10), peak(40, 20)];
        assert!(build_fingerprints(&peaks, 1, 32, 64, 5).is_empty());
    }

    #[test]
    fn rejects_pairs_outside_freq_window() {
        let peaks = vec![peak(0, 10), peak(5, 200)];
        assert!(build_fingerprints(&peaks, 1, 32, 64, 5).is_empty());
    }

    #[test]
    fn fanout_caps_targets_per_anchor_closest_first() {
        let mut peaks = vec![peak(0, 100)];
        for t in 1..=10 {
            peaks.push(peak(t, 100 + t));
        }
        let fps = build_fingerprints(&peaks, 1, 32, 64, 3);
        // Exactly 3 fingerprints from the anchor at frame 0, since nothing
        // else produces targets (frame 1..10 all have larger anchors behind
        // them that are themselves too close to frame 0 to be anchors with
        // earlier targets).
        let from_anchor_zero: Vec<_> = fps.iter().filter(|fp| fp.anchor_time == 0).collect();
        assert_eq!(from_anchor_zero.len(), 3);
    }

    #[test]
    fn fingerprint_count_is_bounded_by_peaks_times_fanout() {
        let peaks: Vec<Peak> = (0..50).map(|t| peak(t, 10)).collect();
        let fps = build_fingerprints(&peaks, 1, 32, 64, 5);
        assert!(fps.len() <= peaks.len() * 5);
    }

    #[test]
    fn address_encoding_is_collision_free_over_small_ranges() {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        for f_a in 0..8u32 {
            for f_t in 0..8u32 {
                for dt in 0..8u32 {
                    let addr = encode_address(f_a, f_t, dt);
                    assert!(seen.insert(addr), "collision for {:?}", (f_a, f_t, dt));
                }
            }
        }
    }

    #[test]
    fn is_deterministic_across_runs() {
        let peaks: Vec<Peak> = vec![peak(0, 10), peak(2, 20), peak(3, 15), peak(9, 30)];
        let a = build_fingerprints(&peaks, 1, 32, 64, 5);
        let b = build_fingerprints(&peaks, 1, 32, 64, 5);
        assert_eq!(a, b);
    }
}
