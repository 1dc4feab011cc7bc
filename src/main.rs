//! Speck
//!
//! A minimal floating X11 window manager: one monitor, one tag per window,
//! click-to-focus, keyboard-driven tag switching and pointer move/resize.

mod config;
mod shared;
mod wm;
mod x11_async;

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::wm::WindowManager;
use crate::wm::server::WindowServer;
use crate::wm::x11::X11Server;
use crate::x11_async::X11EventStream;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Handle events until quit is requested or a termination signal arrives
async fn run(wm: &mut WindowManager<X11Server>, stream: &X11EventStream) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigchld = signal(SignalKind::child())?;

    info!("Starting main event loop");
    loop {
        wm.dispatch_pending()?;
        wm.server.flush()?;
        if !wm.is_running() {
            return Ok(());
        }

        tokio::select! {
            ready = stream.wait_readable() => ready?,
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                wm.quit();
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                wm.quit();
            }
            _ = sigchld.recv() => {
                wm.launcher_mut().reap();
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => {}
        [flag] if flag == "-v" => {
            println!("speck-{}", VERSION);
            return Ok(());
        }
        _ => {
            eprintln!("usage: speck [-v]");
            std::process::exit(1);
        }
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "speck=info,warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting speck {}", VERSION);

    let config = Config::load().context("Failed to load configuration")?;
    let server = X11Server::connect(None)?;
    let stream = X11EventStream::new(server.connection())?;
    let mut wm = WindowManager::new(server, config)?;

    wm.setup()?;
    wm.scan()?;
    let result = run(&mut wm, &stream).await;
    if let Err(e) = &result {
        error!("Event loop failed: {:#}", e);
    }

    if let Err(e) = wm.cleanup() {
        error!("Cleanup failed: {:#}", e);
    }
    info!("Exiting");
    result
}
