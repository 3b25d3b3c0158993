use anyhow::{Context as _, Result};
use clap::Parser as _;
use latprobe::{cli::Command, logging, scenario::Scenario};

fn main() -> Result<()> {
    let command = Command::parse();
    logging::try_init(command.verbose)?;

    let config = command.into_config();
    let mut scenario = Scenario::build(&config).context("invalid scenario")?;

    let report = scenario.run();
    scenario.export(&config.output)?;

    println!("{report}");
    match scenario.recorder().and_then(|recorder| recorder.summary()) {
        Some(summary) => println!("latency (s): {summary}"),
        None => println!("latency (s): no sample recorded"),
    }

    Ok(())
}
