//! Side-by-side demo: several independent viewer processes of the same
//! executable, awaited together.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitStatus;

use futures::future::join_all;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// What to launch and how many times.
#[derive(Debug, Clone, PartialEq)]
pub struct FanoutPlan {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub copies: usize,
}

impl FanoutPlan {
    /// Re-invokes the running executable with `args`.
    pub fn current_exe(args: Vec<OsString>, copies: usize) -> Result<Self> {
        let program = std::env::current_exe().map_err(crate::volume_loader::VolumeLoaderError::Io)?;
        Ok(Self {
            program,
            args,
            copies,
        })
    }
}

async fn run_child(plan: &FanoutPlan, index: usize) -> std::io::Result<ExitStatus> {
    let mut command = Command::new(&plan.program);
    command.args(&plan.args).kill_on_drop(true);
    let mut child = command.spawn()?;
    info!(index, pid = child.id(), "started viewer process");
    child.wait().await
}

/// Spawns every copy, waits for all of them, and fails if any copy could
/// not start or exited unsuccessfully.
pub async fn run(plan: &FanoutPlan) -> Result<()> {
    if plan.copies == 0 {
        return Err(Error::invalid("copies", "must be at least 1"));
    }
    let outcomes = join_all((0..plan.copies).map(|index| run_child(plan, index))).await;

    let mut failed = 0;
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(status) if status.success() => info!(index, %status, "viewer process finished"),
            Ok(status) => {
                failed += 1;
                warn!(index, %status, "viewer process failed");
            }
            Err(err) => {
                failed += 1;
                warn!(index, %err, "viewer process could not be started");
            }
        }
    }

    if failed > 0 {
        return Err(Error::ChildProcesses {
            failed,
            total: plan.copies,
        });
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn plan(program: &str, args: &[&str], copies: usize) -> FanoutPlan {
        FanoutPlan {
            program: PathBuf::from(program),
            args: args.iter().map(OsString::from).collect(),
            copies,
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn all_children_succeed() {
        run(&plan("sh", &["-c", "exit 0"], 3)).await.unwrap();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failures_are_counted() {
        let err = run(&plan("sh", &["-c", "exit 3"], 2)).await.unwrap_err();
        assert!(matches!(err, Error::ChildProcesses { failed: 2, total: 2 }));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_program_is_a_failure() {
        let err = run(&plan("/nonexistent/segview", &[], 1)).await.unwrap_err();
        assert!(matches!(err, Error::ChildProcesses { failed: 1, total: 1 }));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn zero_copies_is_rejected() {
        let err = run(&plan("sh", &[], 0)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "copies", .. }));
    }
}
