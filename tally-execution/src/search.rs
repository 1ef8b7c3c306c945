use crate::numeric::average;

/// First index in the ascending, duplicate-free `ids` whose value is `>= key`.
/// Returns `ids.len()` when every element is smaller.
pub fn upper_bound(ids: &[u64], key: u64) -> usize {
    if ids.is_empty() {
        return 0;
    }

    let mut low = 0usize;
    let mut high = ids.len();
    while low < high {
        let mid = average(low as u64, high as u64) as usize;
        if ids[mid] > key {
            high = mid;
        } else {
            low = mid + 1;
        }
    }

    // `low` is now the exclusive upper bound; step back onto an exact match.
    if low > 0 && ids[low - 1] == key {
        low - 1
    } else {
        low
    }
}
