//! Leaf scans over inline CSV, inline JSON-lines, and CSV files.

use std::fs::File;
use std::io::{BufRead, BufReader};

use brook_common::{BrookError, ExecStats, Result};
use brook_plan::OpNode;

use crate::vars::{Emit, Vars};

pub(crate) fn exec(op: &OpNode, vars: &Vars, out: &mut Emit<'_>) -> Result<()> {
    match op.param_str(0)? {
        "csvData" => {
            let mut stats = ScanStats::new(vars);
            for line in op.param_str(1)?.lines() {
                yield_csv_line(line, &mut stats, out)?;
            }
            stats.finish();
            Ok(())
        }
        "jsonsData" => {
            let mut stats = ScanStats::new(vars);
            for line in op.param_str(1)?.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                stats.row(line.len());
                (*out)(&[line.as_bytes()])?;
            }
            stats.finish();
            Ok(())
        }
        "filePath" => {
            let path = op.param_str(1)?;
            if !path.ends_with(".csv") {
                return Err(BrookError::Unsupported(format!(
                    "scan file is not csv: {path:?}"
                )));
            }
            let reader = BufReader::new(File::open(path)?);
            let mut stats = ScanStats::new(vars);
            for line in reader.lines() {
                yield_csv_line(&line?, &mut stats, out)?;
            }
            stats.finish();
            Ok(())
        }
        other => Err(BrookError::Unsupported(format!(
            "unknown scan kind: {other:?}"
        ))),
    }
}

fn yield_csv_line(line: &str, stats: &mut ScanStats<'_>, out: &mut Emit<'_>) -> Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }
    let vals: Vec<&[u8]> = line.split(',').map(str::as_bytes).collect();
    stats.row(line.len());
    (*out)(&vals)
}

// Periodic row/byte reports through the context's stats callback.
struct ScanStats<'v> {
    vars: &'v Vars,
    interval: u64,
    rows: u64,
    bytes: u64,
}

impl<'v> ScanStats<'v> {
    fn new(vars: &'v Vars) -> Self {
        Self {
            vars,
            interval: vars.ctx().cfg.stats_interval_rows,
            rows: 0,
            bytes: 0,
        }
    }

    fn row(&mut self, bytes: usize) {
        self.rows += 1;
        self.bytes += bytes as u64;
        if self.interval > 0 && self.rows % self.interval == 0 {
            self.report();
        }
    }

    fn finish(&self) {
        if self.interval > 0 && self.rows > 0 {
            self.report();
        }
    }

    fn report(&self) {
        if let Some(yield_stats) = &self.vars.ctx().yield_stats {
            yield_stats(&ExecStats {
                phase: "scan",
                rows_in: 0,
                rows_out: self.rows,
                bytes_out: self.bytes,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::execute;
    use brook_common::EngineConfig;
    use serde_json::json;

    fn scan_node(kind: &str, data: &str, labels: &[&str]) -> OpNode {
        OpNode {
            kind: "scan".to_string(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            params: vec![json!(kind), json!(data)],
            children: vec![],
        }
    }

    fn run(op: &OpNode) -> Vec<Vec<Vec<u8>>> {
        let vars = Vars::from_config(EngineConfig::default());
        let mut rows = Vec::new();
        execute(op, &vars, |vals| {
            rows.push(vals.iter().map(|v| v.to_vec()).collect());
            Ok(())
        })
        .expect("execute");
        rows
    }

    #[test]
    fn csv_data_splits_on_commas_and_skips_blanks() {
        let rows = run(&scan_node("csvData", "\n10,20,30\n11,21,31\n\n", &["a", "b", "c"]));
        assert_eq!(
            rows,
            vec![
                vec![b"10".to_vec(), b"20".to_vec(), b"30".to_vec()],
                vec![b"11".to_vec(), b"21".to_vec(), b"31".to_vec()],
            ]
        );
    }

    #[test]
    fn jsons_data_yields_one_document_per_line() {
        let rows = run(&scan_node("jsonsData", "\n{\"a\":1}\n{\"a\":2}\n", &["."]));
        assert_eq!(
            rows,
            vec![vec![b"{\"a\":1}".to_vec()], vec![b"{\"a\":2}".to_vec()]]
        );
    }

    #[test]
    fn empty_csv_yields_nothing() {
        assert!(run(&scan_node("csvData", "", &["a"])).is_empty());
    }

    #[test]
    fn unknown_scan_kind_is_unsupported() {
        let vars = Vars::from_config(EngineConfig::default());
        let op = scan_node("parquet", "x", &["a"]);
        let err = execute(&op, &vars, |_| Ok(())).expect_err("must fail");
        assert!(matches!(err, BrookError::Unsupported(_)));
    }

    #[test]
    fn non_csv_file_path_is_rejected() {
        let vars = Vars::from_config(EngineConfig::default());
        let op = scan_node("filePath", "/tmp/data.parquet", &["a"]);
        let err = execute(&op, &vars, |_| Ok(())).expect_err("must fail");
        assert!(matches!(err, BrookError::Unsupported(_)));
    }
}
