//! # Loopback Radio Simulation Entry Point
//!
//! Runs a transmitting node (sampler + transmitter) and a receiving node over
//! an in-memory radio link, then exports per-node counters and event logs.
//!
//! ## Modes
//! - **Demo:** 3-second transmission period, readings fill one frame per period.
//! - **Field cadence:** the deployed 2-minute transmission period.
//! - **Saturation:** sampling four times faster than the batch can carry.
//! - **Lossy link:** 30% of sends fail; frames are dropped, never retried.
//!
//! ## Outputs
//! - `data/tx/metrics_summary.csv`, `data/rx/metrics_summary.csv`
//! - `data/tx/logs/events.csv`, `data/rx/logs/events.csv`

use std::{
    io::{stdin, stdout, Write},
    path::Path,
    thread,
    time::Duration,
};

use log::info;

use lora_batch::{
    component_a::sensor::SimulatedSensor,
    component_b::publisher::LogPublisher,
    config::NodeConfig,
    link::loopback::LoopbackConfig,
    protocol::layout::{CAPACITY, FRAME_BYTES, PADDING_BYTES},
    simulation::run_loopback,
};

const DEFAULT_RUN_SECS: u64 = 20;
const DEMO_TX_PERIOD: Duration = Duration::from_secs(3);

fn main() {
    env_logger::init();
    info!("=== LORA BATCH SIMULATION START ===");
    println!(
        "Frame: {} bytes, {} readings per frame, {} padding bytes",
        FRAME_BYTES, CAPACITY, PADDING_BYTES
    );

    loop {
        let choice = prompt_menu();
        let config = match choice.as_str() {
            "1" | "" => NodeConfig::with_tx_period(DEMO_TX_PERIOD),
            "2" => NodeConfig::default(),
            "3" => {
                let mut c = NodeConfig::with_tx_period(DEMO_TX_PERIOD);
                c.sample_period /= 4;
                c
            }
            "4" => NodeConfig::with_tx_period(DEMO_TX_PERIOD),
            "5" => {
                println!("Exiting. Goodbye!");
                info!("=== LORA BATCH SIMULATION FINISHED ===");
                return;
            }
            other => {
                println!("Unrecognized option '{}', please try again.", other);
                continue;
            }
        };

        let link = LoopbackConfig {
            send_failure_rate: if choice == "4" { 0.3 } else { 0.0 },
            ..LoopbackConfig::default()
        };
        let secs = prompt_duration();

        let report = run_loopback(
            &config,
            link,
            SimulatedSensor::new(),
            LogPublisher::new(config.topic.clone()),
            Duration::from_secs(secs),
        );
        report.export(Path::new("data"));

        let (tx, rx) = (report.tx(), report.rx());
        println!("\n Transmitter: {:?}", tx);
        println!(" Receiver:    {:?}", rx);
        println!("\n Simulation completed. Returning to menu...\n");
        thread::sleep(Duration::from_secs(1));
    }
}

fn prompt_menu() -> String {
    println!("\n┌─────────────────────────────────────────────┐");
    println!("│     SELECT SIMULATION MODE                  │");
    println!("├─────────────────────────────────────────────┤");
    println!("│  1) Demo cadence (3 s frames)               │");
    println!("│  2) Field cadence (2 min frames)            │");
    println!("│  3) Saturation (4x oversampling)            │");
    println!("│  4) Lossy link (30% send failures)          │");
    println!("│  5) Exit                                    │");
    println!("└─────────────────────────────────────────────┘");
    print!("Select [1/2/3/4/5] (default: 1): ");
    let _ = stdout().flush();

    let mut input = String::new();
    let _ = stdin().read_line(&mut input);
    input.trim().to_string()
}

fn prompt_duration() -> u64 {
    print!("Run for how many seconds? [default: {}]: ", DEFAULT_RUN_SECS);
    let _ = stdout().flush();
    let mut input = String::new();
    let _ = stdin().read_line(&mut input);
    input.trim().parse::<u64>().unwrap_or(DEFAULT_RUN_SECS)
}
