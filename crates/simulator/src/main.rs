use synth_common::config::AppConfig;
use synth_sim::scenario::{Scenario, Simulation};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "synth_engine=info,synth_sim=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("SynthVault simulator starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    let path = std::env::args()
        .nth(1)
        .or_else(|| config.scenario_path.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("usage: synth-sim <scenario.json> (or set SCENARIO_PATH)")
        })?;

    let scenario = Scenario::from_file(&path)?;
    tracing::info!(
        scenario = %scenario.name,
        steps = scenario.steps.len(),
        assets = scenario.assets.len(),
        "Scenario loaded"
    );

    let mut simulation = Simulation::new(&config, &scenario)?;
    let report = simulation.run(&scenario)?;

    tracing::info!(
        scenario = %report.name,
        rejected = report.rejected(),
        synthetic_supply = %report.synthetic_supply,
        "Scenario finished"
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
