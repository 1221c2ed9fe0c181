//! Step-wise table dumps for debugging phase behavior.
//!
//! When the debug level reaches the dump threshold, each call writes one
//! JSON-lines file `<step>_<table>.jsonl` under the configured directory:
//! one object per row with the attributes and the metadata columns that
//! matter when chasing a multiplicity bug. Dumps never run in the default
//! configuration and the engine's results do not depend on them.

use crate::config::debug_config;
use crate::entry::Entry;
use crate::table::Schema;
use serde_json::json;
use std::fs;
use std::io::Write;
use tracing::warn;

/// Dump `rows` after a named step. Best-effort: dump failures are logged,
/// never propagated into the query result.
pub fn dump_rows(step: &str, table_name: &str, schema: &Schema, rows: &[Entry]) {
    let config = debug_config();
    if !config.dumps_enabled() {
        return;
    }
    if let Err(err) = write_dump(step, table_name, schema, rows) {
        warn!(step, table_name, %err, "debug dump failed");
    }
}

fn write_dump(
    step: &str,
    table_name: &str,
    schema: &Schema,
    rows: &[Entry],
) -> std::io::Result<()> {
    let config = debug_config();
    fs::create_dir_all(&config.dir)?;
    let path = config.dir.join(format!("{step}_{table_name}.jsonl"));
    let mut file = fs::File::create(path)?;
    for row in rows {
        let attrs: Vec<i32> = row.attributes[..schema.len()].to_vec();
        let line = json!({
            "attrs": attrs,
            "field_type": format!("{:?}", row.field_type),
            "join_attr": row.join_attr,
            "original_index": row.original_index,
            "local_mult": row.local_mult,
            "final_mult": row.final_mult,
            "foreign_sum": row.foreign_sum,
            "local_cumsum": row.local_cumsum,
            "local_interval": row.local_interval,
            "copy_index": row.copy_index,
            "alignment_key": row.alignment_key,
            "dst_idx": row.dst_idx,
        });
        writeln!(file, "{line}")?;
    }
    Ok(())
}
