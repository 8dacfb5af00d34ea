use std::path::PathBuf;
use std::process;

use clap::Parser;
use trellis_wm::common::config::{Config, config_file};
use trellis_wm::common::log;

#[derive(Parser)]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Set by the login item. Exits unless `start_at_login` is enabled.
    #[arg(long)]
    started_at_login: bool,

    /// Check the configuration and exit.
    #[arg(long)]
    validate: bool,
}

fn main() {
    let opt = Cli::parse();

    if std::env::var_os("RUST_BACKTRACE").is_none() {
        // SAFETY: We are single threaded at this point.
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }
    log::init_logging();
    install_panic_hook();

    let config_path = opt.config.clone().unwrap_or_else(config_file);
    let config = if config_path.exists() {
        match Config::read(&config_path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{}: {err:#}", config_path.display());
                process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let issues = config.validate();
    for issue in &issues {
        eprintln!("{issue}");
    }
    if opt.validate {
        if issues.is_empty() {
            println!("Config validation passed");
            return;
        }
        process::exit(1);
    }

    if opt.started_at_login && !config.settings.start_at_login {
        tracing::info!("started at login but start_at_login is disabled; exiting");
        return;
    }

    platform::run(config);
}

#[cfg(target_os = "macos")]
mod platform {
    use std::process;
    use std::sync::Arc;
    use std::thread;

    use objc2::MainThreadMarker;
    use objc2_app_kit::{NSApplication, NSApplicationActivationPolicy};
    use tracing::error;
    use trellis_wm::actor;
    use trellis_wm::actor::session::Session;
    use trellis_wm::common::config::Config;
    use trellis_wm::sys::macos::{self, MacConnector, MacWindowServer, ScreenCache};

    pub fn run(config: Config) {
        let Some(mtm) = MainThreadMarker::new() else {
            eprintln!("trellis must be started on the main thread");
            process::exit(1);
        };
        let app = NSApplication::sharedApplication(mtm);
        let _ = app.setActivationPolicy(NSApplicationActivationPolicy::Accessory);
        app.finishLaunching();

        if !macos::is_accessibility_trusted() {
            eprintln!(
                "trellis needs accessibility access. Grant it in System Settings > \
Privacy & Security > Accessibility and restart trellis."
            );
            process::exit(1);
        }
        macos::set_messaging_timeout(1.0);

        let screens = ScreenCache::default();
        screens.refresh(mtm);
        let server = MacWindowServer::new(screens.clone());
        let token = tokio_util::sync::CancellationToken::new();
        let (events_tx, events_rx) = actor::channel();

        let signal_token = token.clone();
        if let Err(err) = ctrlc::set_handler(move || signal_token.cancel()) {
            error!(%err, "could not install Ctrl+C handler");
        }

        let coordinator_server = server.clone();
        let coordinator_token = token.clone();
        let coordinator = thread::Builder::new().name("coordinator".into()).spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!(%err, "could not start runtime");
                    coordinator_token.cancel();
                    return;
                }
            };
            let (ax_tx, ax_rx) = actor::channel();
            let session = Session::new(
                config,
                Box::new(coordinator_server),
                Arc::new(MacConnector),
                ax_tx,
            );
            let session_token = session.token().clone();
            runtime.block_on(async {
                let run = async {
                    session.run(ax_rx, events_rx).await;
                    coordinator_token.cancel();
                };
                let stop = async {
                    coordinator_token.cancelled().await;
                    session_token.cancel();
                };
                tokio::join!(run, stop);
            });
        });
        if let Err(err) = coordinator {
            eprintln!("could not start coordinator thread: {err}");
            process::exit(1);
        }

        macos::run_main_loop(mtm, screens, server, events_tx, token);
    }
}

#[cfg(not(target_os = "macos"))]
mod platform {
    use trellis_wm::common::config::Config;

    pub fn run(_config: Config) {
        eprintln!("trellis only runs on macOS");
        std::process::exit(1);
    }
}

#[cfg(panic = "unwind")]
fn install_panic_hook() {
    // Abort on panic instead of propagating panics to the main thread.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        original_hook(info);
        std::process::abort();
    }));
}

#[cfg(not(panic = "unwind"))]
fn install_panic_hook() {}
