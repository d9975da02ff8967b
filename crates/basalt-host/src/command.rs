use crate::error::{HostError, Result};
use basalt_core::ReqContext;
use tracing::debug;

/// Output from an external utility invocation
#[derive(Debug, Clone)]
pub struct CmdOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Combined stdout+stderr, the way callers match on utility output.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        out.push_str(&self.stderr);
        out
    }
}

/// Run a host utility and return its output regardless of exit status.
///
/// The executor never retries and never parses program output; each caller
/// performs its own matching. A program that cannot be spawned at all
/// surfaces as `CommandFailed` with exit code -1.
pub async fn run(ctx: &ReqContext, program: &str, args: &[&str]) -> Result<CmdOutput> {
    debug!(req = ctx.req, tid = %ctx.tid, "Executing: {} {}", program, args.join(" "));

    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| {
            HostError::command_failed(
                format!("{} {}", program, args.join(" ")),
                -1,
                e.to_string(),
            )
        })?;

    let out = CmdOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    };

    debug!(
        req = ctx.req, tid = %ctx.tid,
        "Command exited with code {}: {} {}",
        out.exit_code, program, args.join(" ")
    );

    Ok(out)
}

/// Run a host utility and fail on non-zero exit, carrying the combined
/// output in the error.
pub async fn run_checked(ctx: &ReqContext, program: &str, args: &[&str]) -> Result<CmdOutput> {
    let output = run(ctx, program, args).await?;
    if !output.success() {
        return Err(HostError::command_failed(
            format!("{} {}", program, args.join(" ")),
            output.exit_code,
            output.combined(),
        ));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ReqContext {
        ReqContext::new("test")
    }

    #[tokio::test]
    async fn test_run_captures_output_and_exit_code() {
        let out = run(&ctx(), "sh", &["-c", "echo out; echo err >&2; exit 3"])
            .await
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(!out.success());
        assert!(out.combined().contains("out"));
        assert!(out.combined().contains("err"));
    }

    #[tokio::test]
    async fn test_run_checked_fails_on_nonzero_exit() {
        let err = run_checked(&ctx(), "sh", &["-c", "echo boom >&2; exit 1"])
            .await
            .unwrap_err();
        match err {
            HostError::CommandFailed {
                exit_code, output, ..
            } => {
                assert_eq!(exit_code, 1);
                assert!(output.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_surfaces_as_command_failed() {
        let err = run(&ctx(), "definitely-not-a-real-binary", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HostError::CommandFailed { exit_code: -1, .. }
        ));
    }
}
