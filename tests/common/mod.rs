//! Shared test helpers: table builders, a deterministic PRNG, and a
//! nested-loop reference engine the oblivious pipeline must agree with.
#![allow(dead_code)]

use oblijoin::query::ParsedQuery;
use oblijoin::{Entry, Schema, Table};
use std::collections::HashMap;

pub fn table(name: &str, cols: &[&str], rows: &[&[i32]]) -> Table {
    let schema = Schema::new(cols.iter().map(|c| c.to_string()).collect()).unwrap();
    let mut t = Table::new(name, schema);
    for row in rows {
        t.push(Entry::from_attributes(row));
    }
    t
}

pub fn table_from_vecs(name: &str, cols: &[&str], rows: &[Vec<i32>]) -> Table {
    let schema = Schema::new(cols.iter().map(|c| c.to_string()).collect()).unwrap();
    let mut t = Table::new(name, schema);
    for row in rows {
        t.push(Entry::from_attributes(row));
    }
    t
}

pub fn table_map(tables: Vec<Table>) -> HashMap<String, Table> {
    tables
        .into_iter()
        .map(|t| (t.name().to_string(), t))
        .collect()
}

/// Result rows as sorted vectors of attribute values, for multiset
/// comparison.
pub fn sorted_rows(result: &Table) -> Vec<Vec<i32>> {
    let width = result.schema().len();
    let mut rows: Vec<Vec<i32>> = result
        .rows()
        .iter()
        .map(|e| e.attributes[..width].to_vec())
        .collect();
    rows.sort();
    rows
}

// ── Deterministic PRNG (SplitMix64) ────────────────────────────────────

pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Rng { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    pub fn i32_range(&mut self, min: i32, max: i32) -> i32 {
        let span = (max as i64 - min as i64 + 1) as u64;
        min + (self.next_u64() % span) as i32
    }

    pub fn usize_range(&mut self, min: usize, max: usize) -> usize {
        min + (self.next_u64() as usize) % (max - min + 1)
    }
}

// ── Nested-loop reference engine ───────────────────────────────────────

/// Evaluate the parsed query the obvious way: enumerate every combination
/// of one row per table, keep those satisfying all joins and filters, and
/// emit the concatenated attribute rows in FROM order.
pub fn reference_join(query: &ParsedQuery, tables: &HashMap<String, Table>) -> Vec<Vec<i32>> {
    let resolved: Vec<&Table> = query
        .tables
        .iter()
        .map(|r| tables.get(&r.name).expect("reference: table missing"))
        .collect();
    let alias_pos: HashMap<&str, usize> = query
        .tables
        .iter()
        .enumerate()
        .map(|(i, r)| (r.alias.as_str(), i))
        .collect();

    let mut out = Vec::new();
    let mut picks = vec![0usize; resolved.len()];
    'outer: loop {
        if resolved.iter().zip(&picks).all(|(t, &p)| p < t.len()) {
            let ok_filters = query.filters.iter().all(|f| {
                let ti = alias_pos[f.alias.as_str()];
                let value = resolved[ti].attribute(picks[ti], &f.column).unwrap();
                f.evaluate(i64::from(value)) == 1
            });
            let ok_joins = query.joins.iter().all(|c| {
                let si = alias_pos[c.source_table.as_str()];
                let ti = alias_pos[c.target_table.as_str()];
                let s = resolved[si].attribute(picks[si], &c.source_column).unwrap();
                let t = resolved[ti].attribute(picks[ti], &c.target_column).unwrap();
                c.satisfied_by(i64::from(s), i64::from(t))
            });
            if ok_filters && ok_joins {
                let mut row = Vec::new();
                for (t, &p) in resolved.iter().zip(&picks) {
                    let width = t.schema().len();
                    row.extend_from_slice(&t.rows()[p].attributes[..width]);
                }
                out.push(row);
            }
        }

        // Mixed-radix increment over the pick vector.
        for i in (0..picks.len()).rev() {
            picks[i] += 1;
            if picks[i] < resolved[i].len().max(1) {
                continue 'outer;
            }
            picks[i] = 0;
        }
        break;
    }
    out.sort();
    out
}
