use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tally::app::{App, CalculatorState, DataMode, StatusLevel};
use tally::config;
use tally::core::Action;
use tally::domain::nonce::{LocalDayClock, NonceTracker};
use tally::infrastructure::ethereum::{
    create_provider, ProviderConfig, ScriptedProvider, WalletProvider,
};
use tally::infrastructure::runtime::{ProviderSource, RuntimeBridge, WorkerSetup};
use tally::modules::export::ExportFormat;
use tally::store::{KeyValueStore, MemoryStore, PersistentStateStore, SqliteStore};
use tally::ui;

#[derive(Debug, Parser)]
#[command(
    name = "tally",
    version,
    about = "Tally: watch an account's nonce and count its transactions per day"
)]
struct Args {
    /// HTTP JSON-RPC endpoint (e.g. http://localhost:8545)
    #[arg(long)]
    rpc: Option<String>,

    /// WebSocket endpoint (e.g. ws://localhost:8546)
    #[arg(long)]
    ws: Option<String>,

    /// IPC path (e.g. ~/.ethereum/geth.ipc). Unix only.
    #[arg(long)]
    ipc: Option<PathBuf>,

    /// Account to track; defaults to the configured, remembered or first node account
    #[arg(long)]
    address: Option<String>,

    /// Auto refresh period in seconds
    #[arg(long)]
    interval: Option<u64>,

    /// Use the built-in demo provider instead of a node
    #[arg(long)]
    mock: bool,

    /// Refresh once, print the result as JSON and exit
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.once);

    let config = config::load();
    let (state_store, store_warning) = open_state_store();

    if args.once {
        return run_once(&args, &config, state_store);
    }

    let (source, endpoint_names) = if args.mock {
        (ProviderSource::Mock, vec!["demo".to_string()])
    } else {
        let (endpoints, labels) = endpoints_from_args_and_config(&args, &config)?;
        (ProviderSource::Endpoints(endpoints), labels)
    };
    let initial_endpoint_display = endpoint_names
        .first()
        .cloned()
        .unwrap_or_else(|| "localhost:8545".to_string());
    let refresh_interval = args
        .interval
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.refresh_interval());

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let data_mode = if args.mock {
        DataMode::Mock
    } else {
        DataMode::Rpc
    };

    // Create the runtime bridge
    let runtime = RuntimeBridge::new(WorkerSetup {
        source,
        store: state_store.clone(),
        clock: Arc::new(LocalDayClock),
        address: args.address.clone().or_else(|| config.address.clone()),
        refresh_interval,
        provider_timeout: config.provider_timeout(),
        history_days: config.history_days,
    })?;

    let mut app = App::new(
        data_mode,
        refresh_interval,
        CalculatorState::from(&config.calculator),
    );
    app.endpoint = initial_endpoint_display;
    app.endpoints = endpoint_names;
    app.store = Some(state_store);
    match store_warning {
        Some(warning) => app.set_status(warning, StatusLevel::Warn),
        None => app.set_status("Connecting…", StatusLevel::Info),
    }

    let res = run_app(&mut terminal, app, runtime);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("{err:?}");
    }

    Ok(())
}

/// Log to a file while the TUI owns the terminal, to stderr otherwise
fn init_logging(to_stderr: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if to_stderr {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
        return;
    }

    let Some(path) = config::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let Ok(file) = fs::OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
}

/// Open the SQLite state database; falls back to memory with a warning
fn open_state_store() -> (PersistentStateStore, Option<String>) {
    let opened = config::state_db_path()
        .context("no data directory available")
        .and_then(|db_path| {
            if let Some(parent) = db_path.parent() {
                fs::create_dir_all(parent)?;
            }
            SqliteStore::open(&db_path)
        });

    let (kv, warning): (Arc<dyn KeyValueStore>, Option<String>) = match opened {
        Ok(store) => (Arc::new(store), None),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "state database disabled");
            (
                Arc::new(MemoryStore::new()),
                Some(format!("State DB disabled, nothing will be saved: {err}")),
            )
        }
    };
    (PersistentStateStore::new(kv), warning)
}

fn run_once(args: &Args, config: &config::Config, store: PersistentStateStore) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let provider: Arc<dyn WalletProvider> = if args.mock {
            Arc::new(ScriptedProvider::demo())
        } else {
            let endpoint = endpoints_from_args_and_config(args, config)?
                .0
                .into_iter()
                .next()
                .context("no endpoint configured")?;
            create_provider(endpoint).await?
        };

        let address = match args
            .address
            .clone()
            .or_else(|| config.address.clone())
            .or_else(|| store.connected_address())
        {
            Some(address) => address,
            None => provider
                .accounts()
                .await?
                .into_iter()
                .next()
                .context("no account available; pass --address")?,
        };

        // a single headless refresh; the remembered account is left as is
        let tracker = Arc::new(
            NonceTracker::new(store, Arc::new(LocalDayClock))
                .with_provider(provider)
                .with_timeout(config.provider_timeout())
                .with_history_days(config.history_days),
        );

        let refresh = tracker.refresh(&address).await?;
        info!(address = %refresh.address, nonce = refresh.current_nonce, "refreshed");
        println!("{}", serde_json::to_string_pretty(&refresh)?);
        Ok::<(), anyhow::Error>(())
    })
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    runtime: RuntimeBridge,
) -> Result<()> {
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();

    loop {
        pump_background(&mut app, &runtime);
        terminal.draw(|f| ui::draw(f, &app))?;
        if app.should_quit {
            return Ok(());
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                handle_key(&mut app, key, &runtime);
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = Instant::now();
        }
    }
}

fn pump_background(app: &mut App, runtime: &RuntimeBridge) {
    for event in runtime.poll_events() {
        app.apply_event(event);
    }
}

fn handle_key(app: &mut App, key: KeyEvent, runtime: &RuntimeBridge) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    if app.help_open {
        if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
            app.help_open = false;
        }
        return;
    }

    let action = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('c') => Action::Connect,
        KeyCode::Char('d') => Action::Disconnect,
        KeyCode::Char('r') => Action::RefreshNonce,
        KeyCode::Char('b') => Action::FetchBalance,
        KeyCode::Char('s') => Action::SignMessage,
        KeyCode::Char('g') => Action::QuoteGas,
        KeyCode::Char('n') => Action::CycleChain,
        KeyCode::Char('p') => Action::NextEndpoint,
        KeyCode::Char('e') => Action::Export(ExportFormat::Csv),
        KeyCode::Char('E') => Action::Export(ExportFormat::Json),
        KeyCode::Char('?') => Action::ToggleHelp,
        _ => Action::None,
    };

    if let Some(cmd) = app.apply_action(action) {
        if let Err(err) = runtime.send(cmd) {
            app.set_status(format!("{err}"), StatusLevel::Error);
        }
    }
}

/// Endpoints in connection order, with a display label for each
fn endpoints_from_args_and_config(
    args: &Args,
    config: &config::Config,
) -> Result<(Vec<ProviderConfig>, Vec<String>)> {
    use std::collections::BTreeSet;

    fn push_endpoint(
        endpoints: &mut Vec<ProviderConfig>,
        labels: &mut Vec<String>,
        seen: &mut BTreeSet<String>,
        endpoint: ProviderConfig,
        name: Option<&str>,
    ) {
        let display = endpoint.display();
        if !seen.insert(display.to_lowercase()) {
            return;
        }
        let label = name
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|name| format!("{name} ({display})"))
            .unwrap_or(display);
        labels.push(label);
        endpoints.push(endpoint);
    }

    let mut endpoints = Vec::new();
    let mut labels = Vec::new();
    let mut seen = BTreeSet::<String>::new();

    // CLI arguments take precedence
    if let Some(ipc) = args.ipc.clone() {
        #[cfg(unix)]
        {
            push_endpoint(
                &mut endpoints,
                &mut labels,
                &mut seen,
                ProviderConfig::Ipc(ipc),
                Some("cli"),
            );
        }
        #[cfg(not(unix))]
        {
            let _ = ipc;
            return Err(anyhow::anyhow!("IPC is not supported on this platform"));
        }
    } else if let Some(ws) = args.ws.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        push_endpoint(
            &mut endpoints,
            &mut labels,
            &mut seen,
            ProviderConfig::WebSocket(ws.to_string()),
            Some("cli"),
        );
    } else if let Some(rpc) = args.rpc.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        push_endpoint(
            &mut endpoints,
            &mut labels,
            &mut seen,
            ProviderConfig::Http(normalize_http_endpoint(rpc)),
            Some("cli"),
        );
    }

    // Config file endpoints
    for entry in &config.endpoints {
        let name = entry.name.as_deref();
        if let Some(rpc) = entry.rpc.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            push_endpoint(
                &mut endpoints,
                &mut labels,
                &mut seen,
                ProviderConfig::Http(normalize_http_endpoint(rpc)),
                name,
            );
            continue;
        }
        #[cfg(unix)]
        {
            if let Some(ipc_path) = entry.ipc.as_deref().and_then(expand_path) {
                push_endpoint(
                    &mut endpoints,
                    &mut labels,
                    &mut seen,
                    ProviderConfig::Ipc(ipc_path),
                    name,
                );
            }
        }
    }

    // Default fallback
    if endpoints.is_empty() {
        push_endpoint(
            &mut endpoints,
            &mut labels,
            &mut seen,
            ProviderConfig::Http(normalize_http_endpoint("localhost:8545")),
            Some("local"),
        );
    }

    Ok((endpoints, labels))
}

fn normalize_http_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[cfg(unix)]
fn expand_path(path: &str) -> Option<PathBuf> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            return Some(home.join(rest));
        }
    }

    let mut buf = PathBuf::from(trimmed);
    if buf.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            buf = cwd.join(buf);
        }
    }
    Some(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally::config::EndpointConfig;

    #[test]
    fn test_endpoint_labels_use_config_names() {
        let args = Args::parse_from(["tally", "--rpc", "127.0.0.1:8545"]);
        let config = config::Config {
            endpoints: vec![
                EndpointConfig {
                    name: Some("archive".to_string()),
                    rpc: Some("https://archive.example".to_string()),
                    ipc: None,
                },
                EndpointConfig {
                    name: None,
                    rpc: Some("http://127.0.0.1:8545".to_string()),
                    ipc: None,
                },
            ],
            ..config::Config::default()
        };

        let (endpoints, labels) = endpoints_from_args_and_config(&args, &config).unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(
            labels,
            vec![
                "cli (http://127.0.0.1:8545)".to_string(),
                "archive (https://archive.example)".to_string(),
            ]
        );
    }

    #[test]
    fn test_default_endpoint_when_nothing_configured() {
        let args = Args::parse_from(["tally"]);
        let (endpoints, labels) =
            endpoints_from_args_and_config(&args, &config::Config::default()).unwrap();
        assert_eq!(endpoints[0].display(), "http://localhost:8545");
        assert_eq!(labels, vec!["local (http://localhost:8545)".to_string()]);
    }
}
