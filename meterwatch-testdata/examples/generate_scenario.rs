//! Example: synthesize both scenarios and print them.
//!
//! Run with: cargo run -p meterwatch-testdata --example generate_scenario

use meterwatch::{ReadingSource, SourceConfig, TIMESTAMP_FORMAT};
use meterwatch_testdata::{Scenario, Synthesizer};

fn main() {
    println!("Meterwatch Scenario Generator");
    println!("=============================\n");

    let mut source = ReadingSource::simulated(&SourceConfig::simulation());
    let synth = Synthesizer::default().with_seed(42);

    for scenario in Scenario::ALL {
        let generated = synth.generate(&mut source, scenario);
        println!("Scenario: {} ({} points)", scenario, generated.len());
        println!("timestamp,consumption");
        for point in generated.series.points() {
            println!(
                "{},{:.2}",
                point.timestamp.format(TIMESTAMP_FORMAT),
                point.consumption.kwh()
            );
        }
        println!();
    }
}
