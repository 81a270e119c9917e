//! Round-robin job partitioning.
//!
//! Item `k` goes to worker `k % w`, so worker `i` gets items `i, i+w, i+2w…`
//! in their original order. Pages of a comic tend to be similar in size, and
//! striping spreads any run of unusually large pages across all workers
//! instead of handing it to one.

/// Split `items` into exactly `workers` ordered sublists.
///
/// Sublist lengths differ by at most one. With fewer items than workers the
/// trailing sublists are empty. `workers == 0` is treated as 1.
pub fn partition<T>(items: impl IntoIterator<Item = T>, workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1);
    let mut sets: Vec<Vec<T>> = (0..workers).map(|_| Vec::new()).collect();
    for (i, item) in items.into_iter().enumerate() {
        sets[i % workers].push(item);
    }
    sets
}
