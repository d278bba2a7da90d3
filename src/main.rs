use std::env;
use std::io;
use std::process::ExitCode;

use delivery_core::csv::{read_actions, write_orders};
use delivery_core::{Config, Session};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: delivery-core <script.csv>");
        return ExitCode::FAILURE;
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    // the reader moves into the feeding task, so it must own its path
    let actions = match read_actions(path) {
        Ok(actions) => actions,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut session = match Session::open(&config).await {
        Ok(session) => session,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let (action_sender, action_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in actions {
            match result {
                Ok(action) => {
                    if action_sender.send(action).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    session.run(ReceiverStream::new(action_receiver)).await;

    if let Err(e) = write_orders(session.orders().order_history(), io::stdout().lock()) {
        error!("failed to write orders: {e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = session.dispose().await {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
