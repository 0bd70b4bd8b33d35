use std::path::Path;

use clap::Parser;
use engine::{Bootstrap, EngineSettings};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use viewer::config::{Args, BasemapConfig, ViewerConfig};
use viewer::controls::parse_filter_line;
use viewer::symbology::{ClassRamp, PresentationLayer};
use viewer::{Controller, Status};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ViewerConfig::from_args(Args::parse(), BasemapConfig::from_env());
    if config.basemap.token.is_none() {
        warn!(
            "{} is not set; terrain basemap will be unavailable",
            BasemapConfig::TOKEN_VAR
        );
    }
    info!(
        url = %config.pipeline.source.url,
        range = ?config.initial_range,
        "starting viewer"
    );

    let controller = Controller::new(config.pipeline.clone(), config.initial_range);
    let mut status_rx = controller.subscribe_status();
    controller.start(bootstrapper(config.engine.clone()));

    let mut layer = PresentationLayer::new(ClassRamp::default());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = !config.once;

    println!("status: {}", *status_rx.borrow_and_update());
    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = status_rx.borrow_and_update().clone();
                println!("status: {status}");

                if let (Status::Loaded { .. }, Some(collection)) = (&status, controller.collection()) {
                    layer.update(collection, controller.filter());
                    if let Some(out) = &config.out {
                        write_geojson(&layer, out).await?;
                    }
                }
                if matches!(status, Status::EngineFailed(_)) && controller.latest_run().0 == 0 {
                    // Nothing can run without an engine.
                    break;
                }
                if config.once && status.is_terminal() {
                    break;
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => match parse_filter_line(&line) {
                        Ok(range) => {
                            if controller.set_filter(range).is_none() {
                                println!("range unchanged or engine not ready");
                            }
                        }
                        Err(err) => eprintln!("{err}"),
                    },
                    None => {
                        stdin_open = false;
                        if controller.status().is_terminal() {
                            break;
                        }
                    }
                }
            }
        }
    }

    controller.shutdown();
    if controller.status().is_failure() {
        std::process::exit(1);
    }
    Ok(())
}

async fn write_geojson(
    layer: &PresentationLayer,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(value) = layer.to_geojson_value() else {
        return Ok(());
    };
    tokio::fs::write(path, serde_json::to_vec_pretty(&value)?).await?;
    info!("wrote {}", path.display());
    Ok(())
}

#[cfg(feature = "duckdb")]
fn bootstrapper(settings: EngineSettings) -> Box<dyn Bootstrap> {
    Box::new(engine::duckdb_backend::DuckDbBootstrapper::new(settings))
}

#[cfg(not(feature = "duckdb"))]
fn bootstrapper(_settings: EngineSettings) -> Box<dyn Bootstrap> {
    tracing::error!("viewer was built without an engine backend; rebuild with --features duckdb");
    Box::new(engine::FnBootstrap(|| async {
        Err::<engine::EngineHandle, _>(engine::EngineError::Bootstrap(
            "no engine backend compiled in".to_string(),
        ))
    }))
}
