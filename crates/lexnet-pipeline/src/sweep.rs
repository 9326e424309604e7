//! Sweep runner with per-unit failure isolation.

use rayon::prelude::*;
use std::fmt::Display;
use tracing::{error, info};

use lexnet_core::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct UnitFailure {
    pub unit: String,
    pub error: String,
}

/// Outcome of a sweep, in unit order.
#[derive(Debug, Clone)]
pub struct SweepReport<T> {
    pub succeeded: Vec<(String, T)>,
    pub failed: Vec<UnitFailure>,
}

impl<T> SweepReport<T> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run `job` on every unit, on the rayon pool when `parallel` is set.
///
/// A failing unit is logged and recorded, the others keep running.
pub fn run_sweep<U, T, F>(units: &[U], parallel: bool, job: F) -> SweepReport<T>
where
    U: Display + Sync,
    T: Send,
    F: Fn(&U) -> Result<T> + Sync,
{
    let run_one = |unit: &U| {
        let name = unit.to_string();
        let outcome = job(unit);
        if let Err(err) = &outcome {
            error!(unit = %name, error = %err, "unit failed");
        }
        (name, outcome)
    };

    let outcomes: Vec<(String, Result<T>)> = if parallel {
        units.par_iter().map(run_one).collect()
    } else {
        units.iter().map(run_one).collect()
    };

    let mut report = SweepReport {
        succeeded: Vec::new(),
        failed: Vec::new(),
    };
    for (unit, outcome) in outcomes {
        match outcome {
            Ok(value) => report.succeeded.push((unit, value)),
            Err(err) => report.failed.push(UnitFailure {
                unit,
                error: err.to_string(),
            }),
        }
    }
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "sweep finished"
    );
    report
}

/// Keep units whose name contains one of `selected`. An empty selection
/// keeps everything.
pub fn filter_selected<U>(units: Vec<U>, selected: &[String], name: impl Fn(&U) -> String) -> Vec<U> {
    if selected.is_empty() {
        return units;
    }
    units
        .into_iter()
        .filter(|u| {
            let name = name(u);
            selected.iter().any(|s| name.contains(s.as_str()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexnet_core::error::LexnetError;

    fn job(n: &u32) -> Result<u32> {
        if n % 3 == 0 {
            Err(LexnetError::integrity(format!("{n} is divisible by three")))
        } else {
            Ok(n * 2)
        }
    }

    #[test]
    fn failures_do_not_stop_siblings() {
        let units: Vec<u32> = (1..=7).collect();
        for parallel in [false, true] {
            let report = run_sweep(&units, parallel, job);
            assert_eq!(report.total(), 7);
            assert_eq!(report.failed.len(), 2);
            assert_eq!(report.failed[0].unit, "3");
            let values: Vec<u32> = report.succeeded.iter().map(|(_, v)| *v).collect();
            assert_eq!(values, vec![2, 4, 8, 10, 14]);
        }
    }

    #[test]
    fn selection_is_a_substring_match() {
        let units = vec!["2019_1-0_a-infomap", "2020_1-0_a-louvain", "2020_1-0_a-infomap"];
        let picked = filter_selected(units.clone(), &["2020".to_string()], |u| u.to_string());
        assert_eq!(picked, vec!["2020_1-0_a-louvain", "2020_1-0_a-infomap"]);
        let all = filter_selected(units.clone(), &[], |u| u.to_string());
        assert_eq!(all.len(), 3);
    }
}
