//! Stride demo binary
//!
//! Runs a simulated workout end to end: authorization, session start,
//! scripted heart-rate / calorie / distance samples, per-second snapshot
//! logging, clean shutdown on duration expiry or ctrl-c, and the final
//! snapshot as JSON on stdout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stride::sim::{FeedStep, ScriptedFeed, StaticAuthorizer};
use stride::{spawn_session, RawSample, SessionState, SessionUpdate};
use strideconf::StrideConfig;

#[derive(Parser, Debug)]
#[command(name = "stride", version, about = "Workout session engine demo")]
struct Args {
    /// Config file (takes the place of the local stride.toml override)
    #[arg(long)]
    config: Option<PathBuf>,

    /// How long to run the simulated workout, in seconds
    #[arg(long, default_value_t = 30)]
    duration_secs: u64,

    /// Exercise the authorization-denied path instead of working out
    #[arg(long)]
    deny: bool,
}

/// A plausible jog: heart rate wanders in the 140s-150s, distance and
/// calories accumulate at roughly 6 mph.
fn jog_script(duration_secs: u64) -> Vec<FeedStep> {
    let mut script = Vec::new();
    let mut distance_mi = 0.0;
    let mut calories_kcal = 0.0;

    for i in 0..duration_secs {
        distance_mi += 0.001667;
        calories_kcal += 0.18;

        script.push(FeedStep::new(
            Duration::from_secs(1),
            RawSample::distance(distance_mi),
        ));
        script.push(FeedStep::new(
            Duration::ZERO,
            RawSample::active_calories(calories_kcal),
        ));
        if i % 2 == 0 {
            let bpm = 148.0 + ((i * 7) % 9) as f64;
            script.push(FeedStep::new(Duration::ZERO, RawSample::heart_rate(bpm)));
        }
    }
    script
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, sources) = match &args.config {
        Some(path) => StrideConfig::load_from(path)?,
        None => StrideConfig::load_with_sources()?,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_files = ?sources.files,
        "stride starting"
    );

    let auth: Arc<StaticAuthorizer> = if args.deny {
        Arc::new(StaticAuthorizer::denying())
    } else {
        Arc::new(StaticAuthorizer::granting())
    };
    let feed = Arc::new(ScriptedFeed::new(jog_script(args.duration_secs)));

    let handle = spawn_session(&config.session, auth, feed);
    let mut updates = handle.subscribe();

    handle.authorize();

    let deadline = tokio::time::sleep(Duration::from_secs(args.duration_secs));
    tokio::pin!(deadline);
    let mut log_tick = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("workout duration reached");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, ending session");
                break;
            }
            _ = log_tick.tick() => {
                let snapshot = handle.snapshot().await?;
                info!(
                    elapsed_seconds = snapshot.elapsed_seconds,
                    heart_rate_bpm = snapshot.heart_rate_bpm,
                    active_calories_kcal = snapshot.active_calories_kcal,
                    distance_mi = snapshot.distance_mi,
                    pace = ?snapshot.pace,
                    "workout snapshot"
                );
            }
            update = updates.recv() => match update {
                Ok(SessionUpdate::AuthorizationFailed { reason }) => {
                    error!(%reason, "authorization failed");
                    handle.shutdown();
                    anyhow::bail!("authorization failed: {reason}");
                }
                Ok(SessionUpdate::StateChanged { from, to }) => {
                    info!(%from, %to, "session state changed");
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    handle.end();

    // The end is asynchronous; wait for the state machine to settle.
    let settle = tokio::time::Instant::now() + Duration::from_secs(2);
    while handle.state().await? != SessionState::Ended {
        if tokio::time::Instant::now() > settle {
            error!("session did not end cleanly");
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let final_snapshot = handle.snapshot().await?;
    println!("{}", serde_json::to_string_pretty(&final_snapshot)?);

    handle.shutdown();
    info!("stride shutdown complete");
    Ok(())
}
