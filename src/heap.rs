use num_traits::Float;
use std::cmp::Ordering;

/// Index sentinel for a heap slot that has not accepted a candidate yet.
pub const EMPTY_SLOT: i64 = -1;

/// Offer a candidate to a bounded max-heap kept in two parallel slices.
///
/// `distances` is heap-ordered with the worst kept candidate at the root,
/// so a candidate that cannot beat `distances[0]` is rejected in O(1).
/// Accepted candidates replace the root and sift down; `indices` is
/// permuted in lockstep. Ties on the way down go to the left child.
#[inline]
pub fn push<T: Float>(distances: &mut [T], indices: &mut [i64], value: T, index: i64) {
    debug_assert_eq!(distances.len(), indices.len());

    if value >= distances[0] {
        return;
    }

    let k = distances.len();
    distances[0] = value;
    indices[0] = index;

    let mut node = 0;
    loop {
        let left = 2 * node + 1;
        if left >= k {
            break;
        }
        let right = left + 1;
        let child = if right < k && distances[right] > distances[left] {
            right
        } else {
            left
        };
        if distances[child] > distances[node] {
            distances.swap(node, child);
            indices.swap(node, child);
            node = child;
        } else {
            break;
        }
    }
}

/// Sort both slices by ascending distance, indices permuted identically.
///
/// Equal distances are ordered by ascending index, which makes the output
/// deterministic regardless of the order candidates were offered in.
pub fn simultaneous_sort<T: Float>(distances: &mut [T], indices: &mut [i64]) {
    debug_assert_eq!(distances.len(), indices.len());

    let mut entries: Vec<(T, i64)> = distances
        .iter()
        .copied()
        .zip(indices.iter().copied())
        .collect();
    entries.sort_unstable_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });
    for (slot, (dist, index)) in entries.into_iter().enumerate() {
        distances[slot] = dist;
        indices[slot] = index;
    }
}
