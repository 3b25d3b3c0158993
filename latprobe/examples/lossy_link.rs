/*!
Run the reference scenario over a lossy link and print how the latency
is distributed.

```sh
cargo run --example lossy_link -- 2%
```
*/

use anyhow::Result;
use latprobe::{
    logging,
    scenario::{Scenario, ScenarioConfig},
};
use latprobe_core::{measure::PacketLoss, time::SimTime};

fn main() -> Result<()> {
    logging::try_init(false)?;

    let packet_loss: PacketLoss = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => PacketLoss::rate(0.01)?,
    };
    let config = ScenarioConfig {
        packet_loss,
        sink_stop: SimTime::from_secs(120),
        sender_stop: SimTime::from_secs(120),
        stop_time: None,
        ..ScenarioConfig::default()
    };

    let mut scenario = Scenario::build(&config)?;
    let report = scenario.run();
    println!("{report}");

    let Some(recorder) = scenario.recorder() else {
        return Ok(());
    };
    let Some(summary) = recorder.summary() else {
        println!("nothing received");
        return Ok(());
    };
    println!("{summary}");

    let cdf = recorder.cdf();
    for decile in 1..=10 {
        let target = decile as f64 / 10.0;
        if let Some((latency, _)) = cdf.iter().find(|(_, fraction)| *fraction >= target) {
            println!("{:>4}%  {latency:.6}s", decile * 10);
        }
    }

    Ok(())
}
