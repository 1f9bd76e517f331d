use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, bail};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trip_tracker_data_management::{
    config_file::load_config,
    fix_source::ScriptedFixSource,
    gpx_util::{export_trip_gpx, read_gpx_fixes},
    recorder::{Recorder, RecorderStatus},
    replay_player::{ReplayEvent, ReplayPlayer},
    service::{Command, RecorderService},
    storage::FileStorage,
};

#[derive(Parser)]
#[command(name = "trip_tracker")]
#[command(about = "Record, list and replay GPS trips", long_about = None)]
struct Cli {
    /// Directory holding the trip archive. Defaults to data/ under the project root
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Tracker config file. Defaults to data/tracker.conf under the project root
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved trips, newest first
    List,
    /// Delete a saved trip
    Delete { trip_id: i64 },
    /// Record a trip by feeding the track points of a GPX file through the tracker
    Record {
        gpx_file: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Print the positions of a saved trip at replay speed
    Replay { trip_id: i64 },
    /// Write a saved trip to a GPX file
    ExportGpx { trip_id: i64, out: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}=trace,trip_tracker_data_management=info,trip_tracker_lib=info",
                    env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let storage = match cli.data_dir {
        Some(dir) => FileStorage::new(dir),
        None => FileStorage::open_default()?,
    };
    tracing::debug!("Using trip storage in {:?}", storage.dir());

    let mut recorder = Recorder::new(config.clone(), storage);

    match cli.command {
        Commands::List => {
            for trip in recorder.archive().trips() {
                println!(
                    "{}\t{}\t{:.2} km\t{:.1} km/h\t{} points",
                    trip.id,
                    trip.name,
                    trip.distance_km,
                    trip.top_speed_kmh,
                    trip.path.len()
                );
            }
        }
        Commands::Delete { trip_id } => {
            if !recorder.delete_trip(trip_id) {
                bail!("No trip with id {trip_id}");
            }
            println!("Deleted trip {trip_id}");
        }
        Commands::Record { gpx_file, name } => {
            let fixes = read_gpx_fixes(&gpx_file)?;
            let fix_count = fixes.len();

            let source = ScriptedFixSource::from_fixes(fixes, Duration::ZERO);
            let exhausted = source.exhausted();
            let (service, handle) = RecorderService::new(recorder, source);
            let service = tokio::spawn(service.run());

            handle.send(Command::Start);
            exhausted.notified().await;
            handle.send(Command::Stop { name });
            handle.send(Command::Shutdown);
            let recorder = service.await?;

            match (recorder.status(), recorder.archive().trips().first()) {
                (RecorderStatus::Saved(_), Some(trip)) => println!(
                    "Saved trip {} \"{}\": {:.2} km, top speed {:.1} km/h, kept {} of {} points",
                    trip.id,
                    trip.name,
                    trip.distance_km,
                    trip.top_speed_kmh,
                    trip.path.len(),
                    fix_count
                ),
                (status, _) => println!("{status}"),
            }
        }
        Commands::Replay { trip_id } => {
            let path = recorder
                .trip_path(trip_id)
                .ok_or_else(|| anyhow!("No trip with id {trip_id}"))?;

            let (tx, mut rx) = mpsc::unbounded_channel();
            let mut player = ReplayPlayer::new(config.replay_cadence);
            player.replay(path, tx);

            while let Some(event) = rx.recv().await {
                match event {
                    ReplayEvent::Position { index, position, .. } => {
                        println!("{index}\t{:.6}\t{:.6}", position.latitude, position.longitude)
                    }
                    ReplayEvent::Finished { .. } => break,
                }
            }
        }
        Commands::ExportGpx { trip_id, out } => {
            let trip = recorder
                .archive()
                .get(trip_id)
                .ok_or_else(|| anyhow!("No trip with id {trip_id}"))?;
            export_trip_gpx(trip, &out)?;
            println!("Exported trip {trip_id} to {}", out.display());
        }
    }

    Ok(())
}
