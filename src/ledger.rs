//! Result ledger: the sorted, incrementally-persisted record of every
//! completed job (spec.md §4.8, §6).

use std::path::Path;

use crate::objective::Objective;

/// The terminal record of one evaluation, with its assigned sequence
/// number (spec.md §3).
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub result: f64,
    pub params_string: String,
    pub status: String,
    pub sequence_number: u64,
}

/// Append-only, re-sorted-after-every-append list of `JobOutcome`s. Every
/// mutation triggers a full rewrite of the output file (no incremental
/// append), preserving global order (spec.md §4.8).
pub struct ResultLedger {
    objective: Objective,
    result_pattern: String,
    rows: Vec<JobOutcome>,
}

impl ResultLedger {
    pub fn new(objective: Objective, result_pattern: impl Into<String>) -> Self {
        Self {
            objective,
            result_pattern: result_pattern.into(),
            rows: Vec::new(),
        }
    }

    /// Insert an outcome and re-sort: ascending by result for Minimize,
    /// descending for Maximize, ties broken by sequence number (insertion
    /// order).
    pub fn push(&mut self, outcome: JobOutcome) {
        self.rows.push(outcome);
        self.rows.sort_by(|a, b| {
            let ordering = a
                .result
                .partial_cmp(&b.result)
                .unwrap_or(std::cmp::Ordering::Equal);
            let ordering = match self.objective {
                Objective::Minimize => ordering,
                Objective::Maximize => ordering.reverse(),
            };
            ordering.then_with(|| a.sequence_number.cmp(&b.sequence_number))
        });
    }

    pub fn rows(&self) -> &[JobOutcome] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rewrite the output file in full: header row of exactly four columns
    /// (`result_pattern`, `params`, `status`, `job_id`), the first header
    /// cell being the user-supplied `result_pattern` verbatim (spec.md §6).
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record([self.result_pattern.as_str(), "params", "status", "job_id"])?;
        for row in &self.rows {
            writer.write_record([
                format_result(row.result),
                row.params_string.clone(),
                row.status.clone(),
                row.sequence_number.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn format_result(value: f64) -> String {
    if value.is_infinite() {
        if value > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(result: f64, seq: u64) -> JobOutcome {
        JobOutcome {
            result,
            params_string: format!("seq={seq}"),
            status: "Job succeeded".to_string(),
            sequence_number: seq,
        }
    }

    #[test]
    fn minimize_sorts_ascending() {
        let mut ledger = ResultLedger::new(Objective::Minimize, "Result:");
        ledger.push(outcome(3.0, 1));
        ledger.push(outcome(1.0, 2));
        ledger.push(outcome(2.0, 3));
        let values: Vec<f64> = ledger.rows().iter().map(|r| r.result).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn maximize_sorts_descending() {
        let mut ledger = ResultLedger::new(Objective::Maximize, "Score:");
        ledger.push(outcome(0.3, 1));
        ledger.push(outcome(0.7, 2));
        let values: Vec<f64> = ledger.rows().iter().map(|r| r.result).collect();
        assert_eq!(values, vec![0.7, 0.3]);
    }

    #[test]
    fn ties_break_by_sequence_number() {
        let mut ledger = ResultLedger::new(Objective::Minimize, "Result:");
        ledger.push(outcome(1.0, 2));
        ledger.push(outcome(1.0, 1));
        let seqs: Vec<u64> = ledger.rows().iter().map(|r| r.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn failed_rows_sort_last_when_minimizing() {
        let mut ledger = ResultLedger::new(Objective::Minimize, "Result:");
        ledger.push(outcome(Objective::Minimize.failure_score(), 1));
        ledger.push(outcome(5.0, 2));
        assert_eq!(ledger.rows()[0].sequence_number, 2);
        assert_eq!(ledger.rows()[1].sequence_number, 1);
    }

    #[test]
    fn write_to_produces_header_and_rows() {
        let mut ledger = ResultLedger::new(Objective::Minimize, "Result:");
        ledger.push(outcome(1.5, 1));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        ledger.write_to(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), "Result:,params,status,job_id");
        assert_eq!(lines.next().unwrap(), "1.5,seq=1,Job succeeded,1");
    }
}
