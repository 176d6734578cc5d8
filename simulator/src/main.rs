mod device;

use clap::Parser;
use device::{corrupt, SimulatedDevice};
use rand::Rng;
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Generates vital readings for a fleet of fake devices and POSTs them to the ingestor.
#[derive(Debug, Parser)]
#[command(name = "simulator", version)]
struct Args {
    /// Base URL of the ingestor
    #[arg(long, env = "API_URL", default_value = "http://localhost:8080")]
    api_url: String,

    /// Readings per second across all devices
    #[arg(long, env = "RATE", default_value_t = 10)]
    rate: u64,

    /// Number of simulated devices
    #[arg(long, env = "DEVICES", default_value_t = 5)]
    devices: usize,

    /// Fraction of readings deliberately pushed out of range
    #[arg(long, env = "INVALID_RATIO", default_value_t = 0.02, value_parser = parse_ratio)]
    invalid_ratio: f64,

    /// Stop after this many readings (runs forever when absent)
    #[arg(long, env = "COUNT")]
    count: Option<u64>,
}

/// Accepts a finite probability in `[0, 1]`.
fn parse_ratio(raw: &str) -> Result<f64, String> {
    let ratio: f64 = raw
        .trim()
        .parse()
        .map_err(|e| format!("`{raw}` is not a number: {e}"))?;
    if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
        return Err(format!("`{raw}` must be a finite value between 0 and 1"));
    }
    Ok(ratio)
}

#[derive(Debug, Default)]
struct Tally {
    accepted: u64,
    rejected: u64,
    failed: u64,
}

impl Tally {
    fn total(&self) -> u64 {
        self.accepted + self.rejected + self.failed
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if args.rate == 0 || args.devices == 0 {
        error!("RATE and DEVICES must both be greater than zero");
        std::process::exit(1);
    }

    info!("Starting vitals simulator");
    info!(
        "Target: {}, Rate: {} readings/s, Devices: {}, Invalid ratio: {}",
        args.api_url, args.rate, args.devices, args.invalid_ratio
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|e| {
            error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        });

    let url = format!("{}/api/vitals", args.api_url.trim_end_matches('/'));

    let mut rng = rand::thread_rng();
    let mut fleet: Vec<SimulatedDevice> = (0..args.devices)
        .map(|i| SimulatedDevice::new(format!("sim-device-{}", i), &mut rng))
        .collect();

    let interval = Duration::from_micros(1_000_000 / args.rate);
    let mut tally = Tally::default();
    let mut counter = 0u64;

    loop {
        if args.count.is_some_and(|limit| counter >= limit) {
            break;
        }

        let tick = Instant::now();
        let device = &mut fleet[(counter % args.devices as u64) as usize];
        let mut reading = device.next_reading(&mut rng);
        if rng.gen_bool(args.invalid_ratio) {
            corrupt(&mut reading, &mut rng);
        }

        match client.post(&url).json(&reading).send().await {
            Ok(resp) if resp.status() == StatusCode::CREATED => tally.accepted += 1,
            Ok(resp) if resp.status() == StatusCode::BAD_REQUEST => {
                tally.rejected += 1;
                let body = resp.text().await.unwrap_or_default();
                debug!("Reading from {} rejected: {}", reading.device_id, body);
            }
            Ok(resp) => {
                tally.failed += 1;
                warn!("Unexpected status {} for {}", resp.status(), reading.device_id);
            }
            Err(e) => {
                tally.failed += 1;
                warn!("Failed to post reading: {}", e);
            }
        }
        counter += 1;

        // Log progress periodically
        if counter % 100 == 0 {
            info!(
                "Sent {} readings: {} accepted, {} rejected, {} failed",
                tally.total(),
                tally.accepted,
                tally.rejected,
                tally.failed
            );
        }

        let elapsed = tick.elapsed();
        if elapsed < interval {
            tokio::time::sleep(interval - elapsed).await;
        } else if elapsed > interval * 2 {
            debug!("Request took {:?}, target interval is {:?}", elapsed, interval);
        }
    }

    info!(
        "Done: {} accepted, {} rejected, {} failed",
        tally.accepted, tally.rejected, tally.failed
    );
}
