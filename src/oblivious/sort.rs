//! External k-way merge sort, and the shuffle-then-sort combinator.
//!
//! The merge sort itself is not oblivious — its comparison outcomes depend
//! on the data. It is only ever used on inputs whose order has first been
//! randomized by the oblivious shuffle ([`shuffle_sort`]), or where the
//! produced order feeds a subsequent oblivious pass.

use crate::entry::Entry;
use crate::oblivious::compare::Comparator;
use crate::oblivious::shuffle::shuffle;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::trace;

/// Maximum entries per in-memory sorted run.
pub const SORT_RUN: usize = 2048;

/// Merge fan-in.
pub const MERGE_K: usize = 8;

/// Bounded pull buffer per run during a merge.
const MERGE_BUFFER: usize = SORT_RUN / MERGE_K;

/// In-place heap sort of one run.
pub fn heap_sort(rows: &mut [Entry], cmp: Comparator) {
    let n = rows.len();
    if n <= 1 {
        return;
    }
    for i in (0..n / 2).rev() {
        sift_down(rows, i, n, cmp);
    }
    for end in (1..n).rev() {
        rows.swap(0, end);
        sift_down(rows, 0, end, cmp);
    }
}

fn sift_down(rows: &mut [Entry], mut root: usize, end: usize, cmp: Comparator) {
    loop {
        let mut largest = root;
        let left = 2 * root + 1;
        let right = left + 1;
        if left < end && cmp.compare(&rows[left], &rows[largest]) == Ordering::Greater {
            largest = left;
        }
        if right < end && cmp.compare(&rows[right], &rows[largest]) == Ordering::Greater {
            largest = right;
        }
        if largest == root {
            return;
        }
        rows.swap(root, largest);
        root = largest;
    }
}

/// Buffered reader over one sorted run.
struct RunReader {
    run: Vec<Entry>,
    pos: usize,
    buf: Vec<Entry>,
    buf_pos: usize,
}

impl RunReader {
    fn new(run: Vec<Entry>) -> Self {
        RunReader {
            run,
            pos: 0,
            buf: Vec::new(),
            buf_pos: 0,
        }
    }

    fn next(&mut self) -> Option<Entry> {
        if self.buf_pos == self.buf.len() {
            let remaining = self.run.len() - self.pos;
            let count = remaining.min(MERGE_BUFFER);
            if count == 0 {
                return None;
            }
            self.buf.clear();
            self.buf.extend_from_slice(&self.run[self.pos..self.pos + count]);
            self.pos += count;
            self.buf_pos = 0;
        }
        let item = self.buf[self.buf_pos];
        self.buf_pos += 1;
        Some(item)
    }
}

/// Min-heap item keyed by (comparator key, run index).
struct HeapItem {
    entry: Entry,
    run: usize,
    cmp: Comparator,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    // Reversed: BinaryHeap is a max-heap, we want the smallest key first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cmp
            .compare(&other.entry, &self.entry)
            .then_with(|| other.run.cmp(&self.run))
    }
}

fn k_way_merge(runs: Vec<Vec<Entry>>, cmp: Comparator) -> Vec<Entry> {
    let total: usize = runs.iter().map(Vec::len).sum();
    let mut readers: Vec<RunReader> = runs.into_iter().map(RunReader::new).collect();
    let mut heap = BinaryHeap::with_capacity(readers.len());
    for (run, reader) in readers.iter_mut().enumerate() {
        if let Some(entry) = reader.next() {
            heap.push(HeapItem { entry, run, cmp });
        }
    }

    let mut out = Vec::with_capacity(total);
    while let Some(HeapItem { entry, run, .. }) = heap.pop() {
        out.push(entry);
        if let Some(next) = readers[run].next() {
            heap.push(HeapItem {
                entry: next,
                run,
                cmp,
            });
        }
    }
    out
}

/// Sort by the chosen comparator: heap-sorted runs of at most
/// [`SORT_RUN`] entries, then repeated [`MERGE_K`]-way merges.
pub fn merge_sort(rows: &mut Vec<Entry>, cmp: Comparator) {
    if rows.len() <= 1 {
        return;
    }
    trace!(n = rows.len(), ?cmp, "external merge sort");

    let input = std::mem::take(rows);
    let mut runs: Vec<Vec<Entry>> = Vec::new();
    let mut iter = input.into_iter().peekable();
    while iter.peek().is_some() {
        let mut run: Vec<Entry> = iter.by_ref().take(SORT_RUN).collect();
        heap_sort(&mut run, cmp);
        runs.push(run);
    }

    while runs.len() > 1 {
        let mut merged = Vec::with_capacity(runs.len().div_ceil(MERGE_K));
        let mut drain = runs.into_iter().peekable();
        while drain.peek().is_some() {
            let group: Vec<Vec<Entry>> = drain.by_ref().take(MERGE_K).collect();
            merged.push(if group.len() == 1 {
                group.into_iter().next().unwrap_or_default()
            } else {
                k_way_merge(group, cmp)
            });
        }
        runs = merged;
    }

    *rows = runs.pop().unwrap_or_default();
}

/// Oblivious-overall ordering: shuffle first so the merge sort's
/// comparisons see an order independent of the original values.
pub fn shuffle_sort(rows: &mut Vec<Entry>, cmp: Comparator) {
    shuffle(rows);
    merge_sort(rows, cmp);
}
