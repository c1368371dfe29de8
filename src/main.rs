// src/main.rs

use std::process::ExitCode;

use jobctl::{cli, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    // No `process::exit`: the runtime must drop tasks that own child processes.
    match run_main().await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("jobctl error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run_main() -> anyhow::Result<i32> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    Ok(run(args).await?)
}
