//! Data-oblivious shuffle.
//!
//! A Waksman permutation network over power-of-two inputs, with a k-way
//! decomposition for vectors too large to shuffle in one batch. Switch
//! control bits come from the keyed PRF in [`prf`](super::prf); the
//! sequence of memory accesses is a function of the (public) input length
//! only.
//!
//! Canonical padding rule: inputs are padded with `SortPadding` rows to
//! `next_pow2(n)` when `n ≤ SHUFFLE_BATCH`, otherwise to
//! `SHUFFLE_BATCH · K^b` for the smallest sufficient `b`. Padding is
//! appended before the shuffle and stripped after, on every path.

use crate::entry::Entry;
use crate::oblivious::prf::ShuffleRng;
use crate::oblivious::swap::oblivious_swap_at;
use tracing::trace;

/// Largest vector shuffled by a single Waksman network.
pub const SHUFFLE_BATCH: usize = 2048;

/// Fan-out of the large-vector decomposition.
pub const SHUFFLE_K: usize = 8;

/// Bounded per-group transfer buffer.
const GROUP_BUFFER: usize = SHUFFLE_BATCH / SHUFFLE_K;

/// Output switches draw bits from a disjoint level band.
const OUTPUT_SWITCH_LEVEL: u32 = 10_000;

/// Reconstruction rounds draw bits from a disjoint level band.
const RECONSTRUCT_LEVEL: u32 = 100_000;

/// Level spacing between decomposition rounds; each round's Waksman over
/// k elements consumes log2(k) input levels plus the output band.
const ROUND_LEVEL_STRIDE: u32 = 16;

/// Group I/O capability for the k-way path.
///
/// The decompose/reconstruct rounds move data through this surface so the
/// algorithm is agnostic to whether groups live in memory or on disk.
pub trait GroupStore {
    /// Append `items` to the given group.
    fn push(&mut self, group: usize, items: &[Entry]);
    /// Fill `buf` from the group's read cursor; returns the count filled.
    fn pull(&mut self, group: usize, buf: &mut [Entry]) -> usize;
}

/// In-memory group store.
#[derive(Debug, Default)]
pub struct VecGroupStore {
    groups: Vec<Vec<Entry>>,
    positions: Vec<usize>,
}

impl VecGroupStore {
    pub fn new(k: usize) -> Self {
        VecGroupStore {
            groups: vec![Vec::new(); k],
            positions: vec![0; k],
        }
    }

    pub fn group_mut(&mut self, group: usize) -> &mut Vec<Entry> {
        &mut self.groups[group]
    }
}

impl GroupStore for VecGroupStore {
    fn push(&mut self, group: usize, items: &[Entry]) {
        self.groups[group].extend_from_slice(items);
    }

    fn pull(&mut self, group: usize, buf: &mut [Entry]) -> usize {
        let pos = self.positions[group];
        let available = self.groups[group].len() - pos;
        let count = available.min(buf.len());
        buf[..count].copy_from_slice(&self.groups[group][pos..pos + count]);
        self.positions[group] += count;
        count
    }
}

/// Padded length under the canonical rule.
pub fn padded_len(n: usize) -> usize {
    if n <= SHUFFLE_BATCH {
        n.next_power_of_two()
    } else {
        let mut m = SHUFFLE_BATCH;
        while m < n {
            m *= SHUFFLE_K;
        }
        m
    }
}

/// Uniformly permute `rows` with a fresh per-invocation nonce.
pub fn shuffle(rows: &mut Vec<Entry>) {
    shuffle_with(rows, &ShuffleRng::fresh());
}

/// Permute `rows` with switch bits from the given source.
pub fn shuffle_with(rows: &mut Vec<Entry>, rng: &ShuffleRng) {
    let n = rows.len();
    if n <= 1 {
        return;
    }
    let m = padded_len(n);
    trace!(n, padded = m, "oblivious shuffle");
    rows.resize(m, Entry::padding());
    shuffle_padded(rows, rng);
    rows.retain(|e| !e.is_padding());
    debug_assert_eq!(rows.len(), n);
}

fn shuffle_padded(rows: &mut [Entry], rng: &ShuffleRng) {
    let n = rows.len();
    if n <= 1 {
        return;
    }
    if n <= SHUFFLE_BATCH {
        debug_assert!(n.is_power_of_two());
        waksman(rows, 0, 1, n, 0, rng);
        return;
    }

    debug_assert!(n % SHUFFLE_K == 0);
    let mut store = VecGroupStore::new(SHUFFLE_K);
    decompose(rows, &mut store, &rng.derive(1));
    for g in 0..SHUFFLE_K {
        shuffle_padded(store.group_mut(g), &rng.derive(2 + g as u64));
    }
    reconstruct(&mut store, rows, &rng.derive(0x5eed));
}

/// Recursive 2-way Waksman network over `n` elements of `rows`, starting
/// at `start` with the given `stride`. `n` must be a power of two.
fn waksman(rows: &mut [Entry], start: usize, stride: usize, n: usize, level: u32, rng: &ShuffleRng) {
    if n <= 1 {
        return;
    }
    if n == 2 {
        let bit = rng.switch_bit(level, start as u64);
        oblivious_swap_at(rows, start, start + stride, bit);
        return;
    }

    let half = n / 2;

    // Input switches, one per pair.
    for i in 0..half {
        let idx1 = start + (i * 2) * stride;
        let idx2 = start + (i * 2 + 1) * stride;
        let bit = rng.switch_bit(level, idx1 as u64);
        oblivious_swap_at(rows, idx1, idx2, bit);
    }

    // Two interleaved subnetworks with doubled stride.
    waksman(rows, start, stride * 2, half, level + 1, rng);
    waksman(rows, start + stride, stride * 2, half, level + 1, rng);

    // Output switches; the first pair has none (Waksman property).
    for i in 1..half {
        let idx1 = start + (i * 2) * stride;
        let idx2 = start + (i * 2 + 1) * stride;
        let bit = rng.switch_bit(level + OUTPUT_SWITCH_LEVEL, idx1 as u64);
        oblivious_swap_at(rows, idx1, idx2, bit);
    }
}

/// Route `rows` into `SHUFFLE_K` groups: each round pulls k consecutive
/// elements, Waksman-shuffles them, and sends element i to group i through
/// a bounded buffer.
fn decompose<S: GroupStore>(rows: &[Entry], store: &mut S, rng: &ShuffleRng) {
    let k = SHUFFLE_K;
    debug_assert!(rows.len() % k == 0);
    let rounds = rows.len() / k;
    let mut buffers = vec![Vec::with_capacity(GROUP_BUFFER); k];
    let mut temp = [Entry::padding(); SHUFFLE_K];

    for round in 0..rounds {
        temp.copy_from_slice(&rows[round * k..(round + 1) * k]);
        waksman(&mut temp, 0, 1, k, (round as u32) * ROUND_LEVEL_STRIDE, rng);
        for (g, item) in temp.iter().enumerate() {
            buffers[g].push(*item);
            if buffers[g].len() >= GROUP_BUFFER {
                store.push(g, &buffers[g]);
                buffers[g].clear();
            }
        }
    }
    for (g, buf) in buffers.iter().enumerate() {
        if !buf.is_empty() {
            store.push(g, buf);
        }
    }
}

/// Inverse routing: each round pulls one element from every group,
/// Waksman-shuffles the k of them, and emits them in order.
fn reconstruct<S: GroupStore>(store: &mut S, out: &mut [Entry], rng: &ShuffleRng) {
    let k = SHUFFLE_K;
    debug_assert!(out.len() % k == 0);
    let rounds = out.len() / k;

    let mut buffers = vec![[Entry::padding(); GROUP_BUFFER]; k];
    let mut filled = vec![0usize; k];
    let mut pos = vec![0usize; k];
    let mut temp = [Entry::padding(); SHUFFLE_K];

    for round in 0..rounds {
        for g in 0..k {
            if pos[g] >= filled[g] {
                filled[g] = store.pull(g, &mut buffers[g]);
                pos[g] = 0;
                debug_assert!(filled[g] > 0, "group {g} exhausted at round {round}");
            }
            temp[g] = buffers[g][pos[g]];
            pos[g] += 1;
        }
        waksman(
            &mut temp,
            0,
            1,
            k,
            RECONSTRUCT_LEVEL + (round as u32) * ROUND_LEVEL_STRIDE,
            rng,
        );
        out[round * k..(round + 1) * k].copy_from_slice(&temp);
    }
}
