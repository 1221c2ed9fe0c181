//! End-to-end pipeline tests: the literal scenarios from the design plus
//! randomized multiset comparison against the nested-loop reference.

mod common;

use common::{Rng, reference_join, sorted_rows, table, table_from_vecs, table_map};
use oblijoin::oblivious::ShuffleRng;
use oblijoin::oblivious::shuffle::shuffle_with;
use oblijoin::{Entry, ObliviousJoinError, execute, parse};

// ── Literal scenarios ──────────────────────────────────────────────────

#[test]
fn test_s1_equality_join_two_tables() {
    let tables = table_map(vec![
        table("R", &["k", "v"], &[&[1, 10], &[2, 20], &[3, 30]]),
        table("S", &["k", "w"], &[&[2, 200], &[3, 300], &[4, 400]]),
    ]);
    let result = execute("SELECT * FROM R AS r, S AS s WHERE r.k = s.k", &tables).unwrap();
    assert_eq!(
        sorted_rows(&result),
        vec![vec![2, 20, 2, 200], vec![3, 30, 3, 300]]
    );
}

#[test]
fn test_s2_band_join_one_sided() {
    let tables = table_map(vec![
        table("A", &["x"], &[&[1], &[5], &[10]]),
        table("B", &["y"], &[&[3], &[7]]),
    ]);
    let result = execute("SELECT * FROM A AS a, B AS b WHERE a.x >= b.y", &tables).unwrap();
    assert_eq!(
        sorted_rows(&result),
        vec![vec![5, 3], vec![10, 3], vec![10, 7]]
    );
}

#[test]
fn test_s3_band_join_with_intersection() {
    let tables = table_map(vec![
        table("P", &["v"], &[&[100], &[105], &[110]]),
        table("Q", &["w"], &[&[100]]),
    ]);
    let result = execute(
        "SELECT * FROM P AS p, Q AS q WHERE p.v >= q.w - 3 AND p.v <= q.w + 7",
        &tables,
    )
    .unwrap();
    assert_eq!(sorted_rows(&result), vec![vec![100, 100], vec![105, 100]]);
}

#[test]
fn test_s4_three_way_chain() {
    // Lineitem names encoded A=0, B=1, C=2, D=3.
    let tables = table_map(vec![
        table("C", &["ck"], &[&[1], &[2]]),
        table("O", &["ck", "ok"], &[&[1, 10], &[1, 11], &[2, 20]]),
        table(
            "L",
            &["ok", "ln"],
            &[&[10, 0], &[10, 1], &[11, 2], &[20, 3]],
        ),
    ]);
    let sql = "SELECT * FROM C AS c, O AS o, L AS l \
               WHERE c.ck = o.ck AND o.ok = l.ok";
    let result = execute(sql, &tables).unwrap();
    let rows = sorted_rows(&result);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows, reference_join(&parse(sql).unwrap(), &tables));
}

#[test]
fn test_s5_filter_applied_before_join() {
    let tables = table_map(vec![
        table("R", &["k", "v"], &[&[1, 10], &[2, 20], &[3, 30]]),
        table("S", &["k", "w"], &[&[2, 200], &[3, 300], &[4, 400]]),
    ]);
    let result = execute(
        "SELECT * FROM R AS r, S AS s WHERE r.k = s.k AND r.v > 20",
        &tables,
    )
    .unwrap();
    assert_eq!(sorted_rows(&result), vec![vec![3, 30, 3, 300]]);
}

#[test]
fn test_s6_shuffle_determinism_under_fixed_nonce() {
    let numbered = |n: usize| -> Vec<Entry> {
        (0..n)
            .map(|i| {
                let mut e = Entry::from_attributes(&[i as i32]);
                e.original_index = i as i64;
                e
            })
            .collect()
    };
    let order = |rows: &[Entry]| -> Vec<i64> { rows.iter().map(|e| e.original_index).collect() };

    let rng = ShuffleRng::with_key_nonce(0x0B11_6A70, 77);
    let mut a = numbered(32);
    let mut b = numbered(32);
    shuffle_with(&mut a, &rng);
    shuffle_with(&mut b, &rng);
    assert_eq!(order(&a), order(&b), "same (key, nonce) must repeat");

    let mut c = numbered(32);
    shuffle_with(&mut c, &ShuffleRng::with_key_nonce(0x0B11_6A70, 78));
    assert_ne!(order(&a), order(&c), "different nonces must diverge");
}

// ── Boundary behaviors ─────────────────────────────────────────────────

#[test]
fn test_empty_table_on_either_side() {
    let tables = table_map(vec![
        table("R", &["k"], &[&[1], &[2]]),
        table("S", &["k"], &[]),
    ]);
    let result = execute("SELECT * FROM R AS r, S AS s WHERE r.k = s.k", &tables).unwrap();
    assert!(result.is_empty());

    let tables = table_map(vec![
        table("R", &["k"], &[]),
        table("S", &["k"], &[&[1]]),
    ]);
    let result = execute("SELECT * FROM R AS r, S AS s WHERE r.k = s.k", &tables).unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_single_row_tables_matching_keys() {
    let tables = table_map(vec![
        table("R", &["k"], &[&[42]]),
        table("S", &["k"], &[&[42]]),
    ]);
    let result = execute("SELECT * FROM R AS r, S AS s WHERE r.k = s.k", &tables).unwrap();
    assert_eq!(sorted_rows(&result), vec![vec![42, 42]]);
}

#[test]
fn test_zero_width_band_equals_equality_join() {
    let tables = table_map(vec![
        table("R", &["k"], &[&[1], &[2], &[2], &[3]]),
        table("S", &["k"], &[&[2], &[3], &[5]]),
    ]);
    let eq = execute("SELECT * FROM R AS r, S AS s WHERE r.k = s.k", &tables).unwrap();
    let band = execute(
        "SELECT * FROM R AS r, S AS s WHERE r.k >= s.k + 0 AND r.k <= s.k + 0",
        &tables,
    )
    .unwrap();
    assert_eq!(sorted_rows(&eq), sorted_rows(&band));
}

#[test]
fn test_strict_band_excludes_boundaries() {
    let tables = table_map(vec![
        table("A", &["x"], &[&[3], &[5], &[8]]),
        table("B", &["y"], &[&[3], &[5]]),
    ]);
    let sql = "SELECT * FROM A AS a, B AS b WHERE a.x > b.y AND a.x < b.y + 3";
    let result = execute(sql, &tables).unwrap();
    assert_eq!(
        sorted_rows(&result),
        reference_join(&parse(sql).unwrap(), &tables)
    );
}

#[test]
fn test_cross_product_star_query() {
    let tables = table_map(vec![
        table("M", &["a", "b"], &[&[1, 2], &[1, 9]]),
        table("X", &["k", "u"], &[&[1, 100], &[1, 101]]),
        table("Y", &["k", "w"], &[&[2, 200], &[2, 201], &[9, 202]]),
    ]);
    let sql = "SELECT * FROM M AS m, X AS x, Y AS y \
               WHERE x.k = m.a AND y.k = m.b";
    let result = execute(sql, &tables).unwrap();
    assert_eq!(
        sorted_rows(&result),
        reference_join(&parse(sql).unwrap(), &tables)
    );
}

#[test]
fn test_duplicate_heavy_join() {
    let tables = table_map(vec![
        table("R", &["k", "v"], &[&[7, 1], &[7, 2], &[7, 3]]),
        table("S", &["k", "w"], &[&[7, 4], &[7, 5]]),
    ]);
    let result = execute("SELECT * FROM R AS r, S AS s WHERE r.k = s.k", &tables).unwrap();
    assert_eq!(result.len(), 6);
}

#[test]
fn test_four_table_chain_with_bands_and_filters() {
    let tables = table_map(vec![
        table("A", &["k", "v"], &[&[1, 5], &[2, 6], &[3, 7]]),
        table("B", &["k", "m"], &[&[1, 10], &[2, 20], &[3, 30]]),
        table("C", &["m", "x"], &[&[10, 0], &[15, 1], &[25, 2], &[30, 3]]),
        table("D", &["x"], &[&[0], &[1], &[2], &[3], &[4]]),
    ]);
    let sql = "SELECT * FROM A AS a, B AS b, C AS c, D AS d \
               WHERE a.k = b.k AND c.m >= b.m AND c.m <= b.m + 5 \
               AND d.x = c.x AND a.v > 5";
    let result = execute(sql, &tables).unwrap();
    assert_eq!(
        sorted_rows(&result),
        reference_join(&parse(sql).unwrap(), &tables)
    );
}

#[test]
fn test_filter_that_empties_a_table() {
    let tables = table_map(vec![
        table("R", &["k", "v"], &[&[1, 1], &[2, 2]]),
        table("S", &["k"], &[&[1], &[2]]),
    ]);
    let result = execute(
        "SELECT * FROM R AS r, S AS s WHERE r.k = s.k AND r.v > 100",
        &tables,
    )
    .unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_error_surfaces() {
    let tables = table_map(vec![
        table("R", &["k"], &[&[1]]),
        table("S", &["k"], &[&[1]]),
    ]);
    // Disconnected.
    assert!(matches!(
        execute("SELECT * FROM R AS r, S AS s", &tables),
        Err(ObliviousJoinError::CyclicOrDisconnected(_))
    ));
    // Unsupported join operator.
    assert!(matches!(
        execute("SELECT * FROM R AS r, S AS s WHERE r.k != s.k", &tables),
        Err(ObliviousJoinError::UnsupportedPredicate(_))
    ));
    // Unknown column.
    assert!(matches!(
        execute("SELECT * FROM R AS r, S AS s WHERE r.zzz = s.k", &tables),
        Err(ObliviousJoinError::SchemaError(_))
    ));
}

// ── Randomized comparison against the reference engine ─────────────────

fn random_table(rng: &mut Rng, name: &str, cols: &[&str], max_rows: usize, max_val: i32) -> oblijoin::Table {
    let rows = rng.usize_range(0, max_rows);
    let data: Vec<Vec<i32>> = (0..rows)
        .map(|_| cols.iter().map(|_| rng.i32_range(0, max_val)).collect())
        .collect();
    table_from_vecs(name, cols, &data)
}

#[test]
fn test_randomized_equality_joins_match_reference() {
    let mut rng = Rng::new(0xA11CE);
    for cycle in 0..30 {
        let tables = table_map(vec![
            random_table(&mut rng, "R", &["k", "v"], 8, 4),
            random_table(&mut rng, "S", &["k", "w"], 8, 4),
        ]);
        let sql = "SELECT * FROM R AS r, S AS s WHERE r.k = s.k";
        let result = execute(sql, &tables).unwrap();
        assert_eq!(
            sorted_rows(&result),
            reference_join(&parse(sql).unwrap(), &tables),
            "cycle {cycle}"
        );
    }
}

#[test]
fn test_randomized_band_joins_match_reference() {
    let mut rng = Rng::new(0xBAD5EED);
    let queries = [
        "SELECT * FROM R AS r, S AS s WHERE r.k >= s.k - 1 AND r.k <= s.k + 2",
        "SELECT * FROM R AS r, S AS s WHERE r.k > s.k",
        "SELECT * FROM R AS r, S AS s WHERE r.k < s.k + 3 AND r.k > s.k - 3",
        "SELECT * FROM R AS r, S AS s WHERE r.k = s.k AND r.v >= 2",
    ];
    for cycle in 0..20 {
        let tables = table_map(vec![
            random_table(&mut rng, "R", &["k", "v"], 7, 5),
            random_table(&mut rng, "S", &["k", "w"], 7, 5),
        ]);
        for sql in &queries {
            let result = execute(sql, &tables).unwrap();
            assert_eq!(
                sorted_rows(&result),
                reference_join(&parse(sql).unwrap(), &tables),
                "cycle {cycle}: {sql}"
            );
        }
    }
}

#[test]
fn test_randomized_three_table_trees_match_reference() {
    let mut rng = Rng::new(0x7EE5);
    let queries = [
        // Chain.
        "SELECT * FROM A AS a, B AS b, C AS c WHERE a.k = b.k AND b.m = c.m",
        // Star on b.
        "SELECT * FROM A AS a, B AS b, C AS c WHERE a.k = b.k AND c.m = b.m",
        // Band edge in a chain.
        "SELECT * FROM A AS a, B AS b, C AS c \
         WHERE a.k = b.k AND c.m >= b.m AND c.m <= b.m + 1",
        // With a filter.
        "SELECT * FROM A AS a, B AS b, C AS c \
         WHERE a.k = b.k AND b.m = c.m AND a.v != 1",
    ];
    for cycle in 0..12 {
        let tables = table_map(vec![
            random_table(&mut rng, "A", &["k", "v"], 5, 3),
            random_table(&mut rng, "B", &["k", "m"], 5, 3),
            random_table(&mut rng, "C", &["m", "w"], 5, 3),
        ]);
        for sql in &queries {
            let result = execute(sql, &tables).unwrap();
            assert_eq!(
                sorted_rows(&result),
                reference_join(&parse(sql).unwrap(), &tables),
                "cycle {cycle}: {sql}"
            );
        }
    }
}
