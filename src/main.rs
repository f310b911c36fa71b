use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use log::error;
use ratatui::prelude::*;

use mailsync::app::{App, AppResult};
use mailsync::config::{Config, Overrides};
use mailsync::event::AccountId;
use mailsync::session::SyncConnection;
use mailsync::ui::ui;

/// Live progress of a server-side mail synchronization
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to config file
    #[clap(short, long, default_value = "~/.config/mailsync/config.json")]
    config: String,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,

    /// Log file (defaults to the user cache directory)
    #[clap(long)]
    log_file: Option<String>,

    /// Sync server host[:port], overrides the config file
    #[clap(long)]
    host: Option<String>,

    /// Connect with wss:// instead of ws://
    #[clap(long, conflicts_with = "insecure")]
    secure: bool,

    /// Connect with ws:// even if the config asks for wss://
    #[clap(long)]
    insecure: bool,

    /// Account to synchronize, overrides the config file
    #[clap(short, long)]
    account: Option<String>,

    /// Keep at most this many rows in the emails table
    #[clap(long)]
    max_rows: Option<usize>,

    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set the sync server
    SetServer {
        /// Server host[:port]
        #[clap(long)]
        host: String,

        /// Use wss://
        #[clap(long)]
        secure: bool,
    },

    /// Set the account synchronized on startup
    SetAccount {
        /// Account identifier as known by the server
        #[clap(long)]
        id: String,
    },

    /// Forget the startup account; the monitor then only watches
    ClearAccount,

    /// Print the current configuration
    ShowConfig,
}

fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("mailsync")
        .join("mailsync.log")
}

fn init_logging(args: &Args) -> Result<()> {
    let path = match &args.log_file {
        Some(path) => PathBuf::from(shellexpand::tilde(path).into_owned()),
        None => default_log_path(),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    // The terminal belongs to the UI, so logs go to the file only
    env_logger::Builder::new()
        .filter_level(if args.debug { log::LevelFilter::Debug } else { log::LevelFilter::Info })
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();

    Ok(())
}

fn save_config(config: &Config, config_path: &str) {
    if let Err(e) = config.save(config_path) {
        println!("Failed to save config: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let config_path = shellexpand::tilde(&args.config).into_owned();
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    if let Some(cmd) = args.command {
        match cmd {
            Commands::SetServer { host, secure } => {
                config.server.host = host;
                config.server.secure = secure;
                save_config(&config, &config_path);
                println!("Sync server set to {}", config.server.endpoint_url());
            }
            Commands::SetAccount { id } => {
                config.account_id = Some(AccountId::from(id));
                save_config(&config, &config_path);
                println!("Startup account saved.");
            }
            Commands::ClearAccount => {
                config.account_id = None;
                save_config(&config, &config_path);
                println!("Startup account cleared.");
            }
            Commands::ShowConfig => {
                println!("Config file: {}", config_path);
                println!("Endpoint:    {}", config.server.endpoint_url());
                match &config.account_id {
                    Some(id) => println!("Account:     {}", id),
                    None => println!("Account:     (none)"),
                }
                match config.ui.max_rows {
                    Some(max) => println!("Max rows:    {}", max),
                    None => println!("Max rows:    unlimited"),
                }
            }
        }
        return Ok(());
    }

    config.apply_overrides(Overrides {
        host: args.host,
        secure: match (args.secure, args.insecure) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
        account_id: args.account.map(AccountId::from),
        max_rows: args.max_rows,
    });

    let endpoint = config.server.endpoint_url();
    let connection = SyncConnection::open(&endpoint)
        .await
        .context("Could not reach the sync server")?;

    let mut app = App::new(connection, endpoint, config.ui.max_rows);

    match config.account_id.clone() {
        Some(account_id) => app
            .start_sync(account_id)
            .context("Failed to request synchronization")?,
        None => log::info!("No account configured, watching without starting a sync"),
    }

    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    io::stdout()
        .execute(EnterAlternateScreen)
        .context("Failed to enter alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("Failed to create terminal")?;

    let result = run_app(
        &mut terminal,
        &mut app,
        Duration::from_millis(config.ui.refresh_interval),
    );

    // Restore terminal
    disable_raw_mode().context("Failed to disable raw mode")?;
    io::stdout()
        .execute(LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;

    app.connection.shutdown();

    if let Err(err) = result {
        error!("Error: {:?}", err);
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App, refresh: Duration) -> AppResult<()> {
    loop {
        terminal.draw(|frame| ui(frame, app))?;

        if event::poll(refresh)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key_event(key)?;

                    if app.should_quit {
                        return Ok(());
                    }
                }
            }
        }

        app.tick()?;
    }
}
