mod common;

use std::fs;

use clap::Parser;
use common::{TestResult, with_timeout};
use jobctl::cli::CliArgs;
use tempfile::tempdir;

fn args(extra: &[&str]) -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse_from(std::iter::once("jobctl").chain(extra.iter().copied()))
}

#[tokio::test]
async fn test_run_subcommand_exit_codes() -> TestResult {
    let dir = tempdir()?;
    let cfg = dir.path().join("jobctl.toml");
    fs::write(&cfg, "[monitor]\npoll_interval = \"100ms\"\n")?;
    let cfg = cfg.to_string_lossy().into_owned();

    let ok = args(&["--config", &cfg, "run", "--", "sh", "-c", "echo hi"])?;
    assert_eq!(with_timeout(jobctl::run(ok)).await?, 0);

    let failed = args(&["--config", &cfg, "run", "--json", "--", "sh", "-c", "exit 4"])?;
    assert_eq!(with_timeout(jobctl::run(failed)).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_is_an_error() -> TestResult {
    let dir = tempdir()?;
    let cfg = dir.path().join("jobctl.toml");
    fs::write(&cfg, "[monitor]\npoll_interval = \"0s\"\n")?;
    let cfg = cfg.to_string_lossy().into_owned();

    let parsed = args(&["--config", &cfg, "run", "--", "true"])?;
    assert!(jobctl::run(parsed).await.is_err());
    Ok(())
}

#[test]
fn test_run_requires_a_command() {
    assert!(args(&["run"]).is_err());
    assert!(args(&["samba", "restart"]).is_err());
    assert!(args(&["samba", "enable", "--json"]).is_ok());
}
