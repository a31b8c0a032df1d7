//! Approximate sequence alignment
//!
//! Reconciles a list of expected durations with a list of detected ones.
//! Two values are *equivalent* when their relative error, measured against
//! the expected value, is below a threshold:
//!
//! ```text
//! |expected - observed| / expected < threshold
//! ```
//!
//! The alignment is a longest common subsequence under that predicate: the
//! largest set of equivalent pairs such that no element is used twice and
//! pairs never cross (if `e[i] ↔ o[j]` and `e[i'] ↔ o[j']` with `i < i'`,
//! then `j < j'`).
//!
//! ```text
//! expected:  0.3         0.4
//!             │           │
//! observed:  0.001 0.299 0.002 0.401 0.001
//!                   ▲           ▲
//! ```

/// Whether `observed` is within `threshold` relative error of `expected`.
///
/// `expected` must be non-zero.
pub fn is_equivalent(expected: f64, observed: f64, threshold: f64) -> bool {
    debug_assert!(expected != 0.0, "expected value must be non-zero");
    (expected - observed).abs() / expected < threshold
}

/// Align `expected` against `observed`, returning which positions of each
/// were matched.
///
/// Every value in `expected` must be non-zero.
pub fn align(expected: &[f64], observed: &[f64], threshold: f64) -> (Vec<bool>, Vec<bool>) {
    let (n, m) = (expected.len(), observed.len());

    // table[i][j]: most pairs using the first i expected and first j observed
    let mut table: Vec<Vec<usize>> = (0..=n).map(|_| vec![0; m + 1]).collect();

    for i in 1..=n {
        for j in 1..=m {
            let mut best = table[i - 1][j].max(table[i][j - 1]);
            if is_equivalent(expected[i - 1], observed[j - 1], threshold) {
                best = best.max(table[i - 1][j - 1] + 1);
            }
            table[i][j] = best;
        }
    }

    let mut expected_matched = vec![false; n];
    let mut observed_matched = vec![false; m];
    let (mut i, mut j) = (n, m);

    while i > 0 && j > 0 {
        if table[i][j] == table[i - 1][j - 1] + 1
            && is_equivalent(expected[i - 1], observed[j - 1], threshold)
        {
            expected_matched[i - 1] = true;
            observed_matched[j - 1] = true;
            i -= 1;
            j -= 1;
        } else if table[i][j] == table[i - 1][j] {
            i -= 1;
        } else {
            j -= 1;
        }
    }

    (expected_matched, observed_matched)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // EQUIVALENCE PREDICATE
    // ==========================================================================

    #[test]
    fn test_equivalence_is_relative_to_expected() {
        // 0.1 off a 1.0 expectation is 10%
        assert!(is_equivalent(1.0, 1.1, 0.2));
        assert!(!is_equivalent(1.0, 1.3, 0.2));
        // Same absolute error against a smaller expectation is too much
        assert!(!is_equivalent(0.1, 0.2, 0.2));
    }

    #[test]
    fn test_equivalence_threshold_is_strict() {
        assert!(!is_equivalent(1.0, 1.5, 0.5));
        assert!(is_equivalent(1.0, 1.49, 0.5));
    }

    // ==========================================================================
    // ALIGNMENT
    // ==========================================================================

    #[test]
    fn test_align_skips_spurious_delays() {
        let (expected, observed) = align(&[0.3, 0.4], &[0.001, 0.299, 0.002, 0.401, 0.001], 0.01);

        assert_eq!(expected, vec![true, true]);
        assert_eq!(observed, vec![false, true, false, true, false]);
    }

    #[test]
    fn test_align_empty_inputs() {
        assert_eq!(align(&[], &[], 0.2), (vec![], vec![]));
        assert_eq!(align(&[0.5, 1.0], &[], 0.2), (vec![false, false], vec![]));
        assert_eq!(align(&[], &[0.5], 0.2), (vec![], vec![false]));
    }

    #[test]
    fn test_align_identical_sequences() {
        let values = [0.2, 0.5, 0.5, 1.0];
        let (expected, observed) = align(&values, &values, 0.01);
        assert!(expected.iter().all(|&m| m));
        assert!(observed.iter().all(|&m| m));
    }

    #[test]
    fn test_align_preserves_order() {
        // 1.0 and 0.5 appear in the opposite order, so only one can match
        let (expected, observed) = align(&[1.0, 0.5], &[0.5, 1.0], 0.1);

        assert_eq!(expected.iter().filter(|&&m| m).count(), 1);
        assert_eq!(observed.iter().filter(|&&m| m).count(), 1);
    }

    #[test]
    fn test_align_unmatched_expected_is_reported() {
        let (expected, observed) = align(&[0.5, 2.0, 1.0], &[0.52, 0.98], 0.2);

        assert_eq!(expected, vec![true, false, true]);
        assert_eq!(observed, vec![true, true]);
    }

    #[test]
    fn test_align_finds_maximum_matching() {
        let expected = [1.0, 1.0];
        let observed = [1.0, 5.0, 1.0];
        let (e, o) = align(&expected, &observed, 0.2);

        assert_eq!(e, vec![true, true]);
        assert_eq!(o.iter().filter(|&&m| m).count(), 2);
        assert!(!o[1]);
    }

    #[test]
    fn test_align_only_last_expected_matches() {
        let (e, o) = align(&[1.0, 2.0, 3.0], &[3.0], 0.1);
        assert_eq!(e, vec![false, false, true]);
        assert_eq!(o, vec![true]);
    }
}
