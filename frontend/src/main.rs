// frontend/src/main.rs
//
// Terminal driver for the client core. Reads chat lines from stdin and
// prints whatever the core asks the UI to render. The browser build enters
// through the library's wasm start hook instead.

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    terminal::main()
}

#[cfg(not(target_arch = "wasm32"))]
mod terminal {
    use anyhow::Context;
    use clap::Parser;
    use safeindy_frontend::config::SimulatedFix;
    use safeindy_frontend::{
        logging, session_from_config, task, AlertDeliveryError, AlertUi, ClientConfig, DispatchOutcome,
        LocationBannerState, PlatformSession, RetryHandle,
    };
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tracing::{info, warn};

    #[derive(Debug, Parser)]
    #[command(name = "safeindy", version, about = "SafeIndy assistant chat client")]
    struct Args {
        /// JSON config file (defaults to the platform config dir)
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        base_url: Option<String>,

        #[arg(long)]
        session_id: Option<String>,

        /// Pretend the device is at LAT LON
        #[arg(long, num_args = 2, value_names = ["LAT", "LON"], allow_negative_numbers = true)]
        at: Option<Vec<f64>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Command {
        Chat(String),
        Retry,
        Locate,
        History,
        Clear,
        Status,
        Test,
        Help,
        Quit,
        Unknown(String),
    }

    impl Command {
        fn parse(line: &str) -> Option<Self> {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            if !line.starts_with('/') {
                return Some(Command::Chat(line.to_string()));
            }
            Some(match line {
                "/retry" => Command::Retry,
                "/locate" => Command::Locate,
                "/history" => Command::History,
                "/clear" => Command::Clear,
                "/status" => Command::Status,
                "/test" => Command::Test,
                "/help" => Command::Help,
                "/quit" | "/exit" => Command::Quit,
                other => Command::Unknown(other.to_string()),
            })
        }
    }

    #[derive(Default)]
    struct TerminalUi {
        last_retry: RefCell<Option<RetryHandle>>,
    }

    impl TerminalUi {
        fn take_retry(&self) -> Option<RetryHandle> {
            self.last_retry.borrow_mut().take()
        }
    }

    impl AlertUi for TerminalUi {
        fn render_emergency_banner(&self, location_shared: bool) {
            println!("!! EMERGENCY DETECTED. If you are in immediate danger, call 911.");
            if location_shared {
                println!("!! Your location is being shared with emergency services.");
            } else {
                println!("!! Location not available yet. Type /locate to share it.");
            }
        }

        fn render_alert_confirmation(&self) {
            println!("** Emergency services have been notified with your location.");
        }

        fn render_alert_failure(&self, error: &AlertDeliveryError, retry: RetryHandle) {
            println!(
                "** Emergency alert failed: {error} (attempt {}). Type /retry to try again.",
                retry.attempt_count()
            );
            *self.last_retry.borrow_mut() = Some(retry);
        }

        fn render_location_banner(&self, state: &LocationBannerState) {
            match state {
                LocationBannerState::Prompt => {
                    println!("-- Share your location for faster emergency response. Type /locate.")
                }
                LocationBannerState::Acquiring => println!("-- Getting your location..."),
                LocationBannerState::Acquired { accuracy_meters } => {
                    println!("-- Location acquired (±{accuracy_meters:.0}m).")
                }
                LocationBannerState::Resolved { address } => println!("-- Location: {address}"),
                LocationBannerState::Failed(err) => println!("-- {err} Type /locate to try again."),
            }
        }
    }

    fn print_help() {
        println!("Type a message to chat. Commands: /locate /retry /history /clear /status /test /quit");
    }

    fn print_outcome(outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::NothingPending => println!("No pending emergency alert to retry."),
            DispatchOutcome::AlreadySending => println!("An emergency alert is already being sent."),
            DispatchOutcome::Queued => println!("Another alert is in flight; this one goes out right after."),
            DispatchOutcome::Locating => println!("Still getting your location for the pending alert."),
            DispatchOutcome::LocationUnavailable(err) => {
                println!("Alert is waiting for your location: {err}")
            }
            _ => {}
        }
    }

    pub fn main() -> anyhow::Result<()> {
        logging::init_logging()?;
        let args = Args::parse();

        let mut config = ClientConfig::load(args.config.as_deref())?;
        if let Some(url) = args.base_url {
            config.base_url = url;
        }
        if let Some(id) = args.session_id {
            config.session_id = id;
        }
        if let Some([latitude, longitude]) = args.at.as_deref().and_then(|v| <[f64; 2]>::try_from(v).ok()) {
            config.simulated_fix = Some(SimulatedFix {
                latitude,
                longitude,
                accuracy_meters: config.simulated_fix.map_or(10.0, |f| f.accuracy_meters),
            });
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("building tokio runtime")?;
        let local = tokio::task::LocalSet::new();
        local.block_on(&runtime, run(config))
    }

    async fn run(config: ClientConfig) -> anyhow::Result<()> {
        let ui = Rc::new(TerminalUi::default());
        let session = session_from_config(&config, ui.clone()).context("building chat session")?;
        info!(base_url = %config.resolved_base_url(), session = %config.session_id, "safeindy client ready");

        let tracker = session.tracker().clone();
        task::spawn_local(async move {
            tracker.prompt_if_unlocated().await;
        });
        if session.tracker().is_supported() {
            if let Err(err) = session.start_tracking().await {
                warn!(%err, "initial location request failed");
            }
        }

        print_help();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("reading stdin")? {
            let Some(command) = Command::parse(&line) else {
                continue;
            };
            if command == Command::Quit {
                break;
            }
            handle(&session, &ui, command).await;
        }

        if session.should_warn_before_unload() {
            warn!("exiting with an emergency alert still pending");
        }
        session.shutdown();
        Ok(())
    }

    async fn handle(session: &PlatformSession, ui: &TerminalUi, command: Command) {
        match command {
            Command::Chat(text) => match session.send(&text).await {
                Ok(Some(reply)) => {
                    if let Some(error) = &reply.response.error {
                        println!("Error: {error}");
                    } else {
                        println!("{}", reply.response.response.as_deref().unwrap_or(""));
                    }
                    if reply.response.map_html.is_some() {
                        println!("(a map is available for this answer)");
                    }
                    if let Some(outcome) = &reply.emergency {
                        print_outcome(outcome);
                    }
                }
                Ok(None) => {}
                Err(err) => println!("Sorry, I'm having trouble connecting right now. ({err})"),
            },
            Command::Retry => {
                let outcome = match ui.take_retry() {
                    Some(handle) => handle.retry().await,
                    None => session.retry_alert().await,
                };
                print_outcome(&outcome);
            }
            Command::Locate => {
                if let Ok(fix) = session.request_location().await {
                    println!("{}", fix.maps_url());
                }
            }
            Command::History => match session.history_transcript().await {
                Ok(text) if text.is_empty() => println!("No chat history yet."),
                Ok(text) => print!("{text}"),
                Err(err) => println!("Could not load history: {err}"),
            },
            Command::Clear => match session.clear().await {
                Ok(()) => println!("Chat cleared."),
                Err(err) => println!("Could not clear chat: {err}"),
            },
            Command::Status => {
                let status = session.status();
                println!(
                    "location: {} | watching: {} | pending emergency: {} | dispatcher: {}",
                    status
                        .location
                        .as_ref()
                        .map(|f| format!("{:.5}, {:.5} ±{:.0}m", f.latitude, f.longitude, f.accuracy_meters))
                        .unwrap_or_else(|| "none".into()),
                    status.location_watching,
                    status.pending_emergency,
                    status.dispatch_state,
                );
                println!("backend: {}", session.backend_health().await);
            }
            Command::Test => match session.test_emergency("Test emergency message").await {
                Some(outcome) => print_outcome(&outcome),
                None => println!("Please enable location first to test emergency functionality."),
            },
            Command::Help => print_help(),
            Command::Quit => {}
            Command::Unknown(cmd) => println!("Unknown command {cmd}. Type /help."),
        }
    }

}
