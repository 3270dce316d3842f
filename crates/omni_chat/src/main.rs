use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use omni_api::OmniApiConfig;
use omni_chat::app::App;
use omni_chat::backend::{ApiBackend, Backend};
use omni_chat::console::ConsoleRenderer;
use omni_chat::providers;
use omni_chat::runtime::ConnectionManager;
use omni_stream::{logging, EnvConfig};
use tracing::{debug, info};

const PUMP_INTERVAL: Duration = Duration::from_millis(30);
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> io::Result<()> {
    let config = EnvConfig::from_env();
    logging::init(&config);

    let transport = providers::transport_from_config(&config).map_err(io::Error::other)?;
    let profile = transport.profile();
    let mut backend = ApiBackend::new(OmniApiConfig::new(config.api_url.clone()).with_timeout(HTTP_TIMEOUT))
        .map_err(io::Error::other)?;

    let app = Arc::new(Mutex::new(App::from_config(&config)));
    match backend.brains() {
        Ok(catalog) => lock_unpoisoned(&app).select_initial_brain(&catalog),
        Err(error) => debug!(%error, "brain catalog unavailable"),
    }

    let mut host = ConnectionManager::new(Arc::clone(&app), transport, config.idle_timeout);
    info!(transport = %profile.transport_id, endpoint = %profile.endpoint, "console ready");

    let lines = spawn_stdin_reader()?;
    let stdout = io::stdout();
    let mut renderer = ConsoleRenderer::new();
    println!(
        "omni {} (brain: {}). Type /help for commands.",
        profile.endpoint,
        lock_unpoisoned(&app).brain()
    );

    loop {
        host.pump(PUMP_INTERVAL);

        {
            let mut app = lock_unpoisoned(&app);
            let mut out = stdout.lock();
            renderer.render(app.session(), &mut out)?;
            for notice in app.take_notices() {
                writeln!(out, "{notice}")?;
            }
            if app.should_exit {
                break;
            }
        }

        match lines.try_recv() {
            Ok(line) => lock_unpoisoned(&app).on_submit(&line, &mut host, &mut backend),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                // Input is gone; let the current reply finish, then leave.
                let mut app = lock_unpoisoned(&app);
                if !app.is_streaming() {
                    app.on_quit(&mut host);
                }
            }
        }
    }

    let deadline = Instant::now() + SHUTDOWN_GRACE;
    while host.active_turn_id().is_some() && Instant::now() < deadline {
        host.pump(PUMP_INTERVAL);
    }

    Ok(())
}

fn spawn_stdin_reader() -> io::Result<Receiver<String>> {
    let (lines_tx, lines_rx) = mpsc::channel();
    thread::Builder::new()
        .name("omni-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if lines_tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(lines_rx)
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
