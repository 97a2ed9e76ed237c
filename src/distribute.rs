//! Splitting a total item count across workers.

/// Splits `total` into `parts` shares that differ by at most one and sum to
/// `total`. The first `total % parts` shares carry the extra item.
///
/// Returns an empty vector when `parts` is 0.
pub fn split_evenly(total: usize, parts: usize) -> Vec<usize> {
    if parts == 0 {
        return Vec::new();
    }
    let base = total / parts;
    let extra = total % parts;
    (0..parts).map(|i| base + usize::from(i < extra)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_even_split() {
        assert_eq!(split_evenly(1000, 4), vec![250; 4]);
    }

    #[test]
    fn test_remainder_goes_to_first_shares() {
        assert_eq!(split_evenly(37, 5), vec![8, 8, 7, 7, 7]);
    }

    #[test]
    fn test_more_parts_than_items() {
        assert_eq!(split_evenly(2, 4), vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_zero_parts() {
        assert!(split_evenly(10, 0).is_empty());
    }

    proptest! {
        #[test]
        fn test_shares_sum_to_total(total in 0usize..100_000, parts in 1usize..64) {
            let shares = split_evenly(total, parts);
            prop_assert_eq!(shares.len(), parts);
            prop_assert_eq!(shares.iter().sum::<usize>(), total);

            let max = *shares.iter().max().unwrap();
            let min = *shares.iter().min().unwrap();
            prop_assert!(max - min <= 1);
        }
    }
}
