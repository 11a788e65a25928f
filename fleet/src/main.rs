//! kudufleet - Entry Point
//!
//! Redeploys the Function Apps of the resource groups in `AZ_RG` from the
//! repository in `GIT_URL`, printing one report line per app on stdout.

use std::env;
use std::process;

use kudufleet::app::options::AppOptions;
use kudufleet::app::run::run;
use kudufleet::app::settings::{parse_args, Settings};
use kudufleet::logs::init_logging;
use kudufleet::utils::version_info;

use tracing::{error, info, warn};

/// Exit code after SIGINT/SIGTERM
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli_args = match parse_args(env::args().skip(1)) {
        Ok(cli_args) => cli_args,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Unable to render version: {e}"),
        }
        return;
    }

    // Logging is not up yet, configuration errors go straight to stderr
    let settings = match Settings::load(&cli_args, |key| env::var(key).ok()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };
    let options = match AppOptions::from_settings(settings) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    // Initialize logging
    let guard = match init_logging(&options.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    info!("kudufleet {} ({})", version.version, version.git_hash);
    for (key, value) in options.summary() {
        info!("{} = {}", key, value);
    }

    let code = tokio::select! {
        result = run(options) => match result {
            Ok(()) => 0,
            Err(e) => {
                error!("Failed to run kudufleet: {e}");
                1
            }
        },
        _ = await_shutdown_signal() => {
            warn!("Deployments interrupted, pending results are lost");
            INTERRUPTED_EXIT_CODE
        }
    };

    // Flush the log file before exiting
    drop(guard);
    if code != 0 {
        process::exit(code);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    warn!("Unable to install signal handlers, only Ctrl+C is handled");
                    return await_ctrl_c().await;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = await_ctrl_c() => {}
        }
    }

    #[cfg(not(unix))]
    await_ctrl_c().await;
}

async fn await_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl+C received, shutting down..."),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await
        }
    }
}
