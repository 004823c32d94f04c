use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use markdex::index::IndexStore;
use markdex::output::{print_report, print_results};
use markdex::utils::{get_config_path, progress};
use markdex::{Config, Service};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "markdex")]
#[command(about = "Serve and search a tree of markup documents")]
struct Cli {
    /// Config file (default: config.json in the app data directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Don't route requests through a running daemon
    #[arg(long, global = true)]
    direct: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index if it doesn't exist yet
    Index {
        /// Throw away the existing index and build it again
        #[arg(short, long)]
        force: bool,
    },
    /// Bring the index in line with the document tree
    Reconcile,
    /// Search the documents
    Search {
        #[arg(required = true, trailing_var_arg = true)]
        terms: Vec<String>,

        #[arg(long)]
        no_color: bool,
    },
    /// Show index statistics
    Stats,
    /// Render a markup file to HTML with the configured converter
    Render {
        /// Path relative to the document root
        path: String,
    },
    /// Run the request daemon
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Start the daemon in background
    Start,
    /// Stop the running daemon
    Stop,
    /// Check daemon status
    Status,
    /// Run daemon in foreground (for debugging)
    Foreground,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.command);

    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Index { force } => index(config, force)?,
        Commands::Reconcile => reconcile(config, cli.direct)?,
        Commands::Search { terms, no_color } => search(config, &terms.join(" "), !no_color, cli.direct)?,
        Commands::Stats => stats(config)?,
        Commands::Render { path } => render(config, &path, cli.direct)?,
        Commands::Daemon { action } => handle_daemon_command(config, action)?,
    }

    Ok(())
}

fn init_logging(command: &Commands) {
    let default = match command {
        Commands::Daemon { .. } => "info",
        _ => "warn",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None => get_config_path()?,
    };
    Config::load(&path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn open_service(config: Config) -> Result<Service> {
    let spinner = progress::spinner("Opening index...", config.index_dir.is_none());
    let (service, report) = Service::open(config)?;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    if let Some(report) = report {
        println!("Built index:");
        print_report(&report)?;
    }
    Ok(service)
}

#[cfg(all(unix, feature = "daemon"))]
fn connect(direct: bool) -> Option<markdex::server::IndexClient> {
    if direct {
        None
    } else {
        markdex::server::IndexClient::connect()
    }
}

fn index(config: Config, force: bool) -> Result<()> {
    let index_dir = config
        .index_dir
        .clone()
        .context("No index_dir configured; searches use the fallback scanner")?;

    if force {
        #[cfg(all(unix, feature = "daemon"))]
        if markdex::server::is_daemon_running() {
            anyhow::bail!("The daemon is using the index. Stop it first with 'markdex daemon stop'");
        }

        println!("Rebuilding index at {}", index_dir.display());
        let spinner = progress::spinner("Indexing documents...", false);
        let (_, report) = Service::rebuild(config)?;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }
        if let Some(report) = report {
            print_report(&report)?;
        }
        return Ok(());
    }

    if IndexStore::exists(&index_dir) {
        println!(
            "Index already exists at {}. Use 'markdex reconcile' to update it or --force to rebuild.",
            index_dir.display()
        );
        return Ok(());
    }

    open_service(config)?;
    Ok(())
}

fn reconcile(config: Config, direct: bool) -> Result<()> {
    #[cfg(all(unix, feature = "daemon"))]
    {
        if let Some(mut client) = connect(direct) {
            let report = client.reconcile().context("Reconcile failed")?;
            print_report(&report)?;
            return Ok(());
        }
    }
    #[cfg(not(all(unix, feature = "daemon")))]
    let _ = direct;

    let service = open_service(config)?;
    let spinner = progress::spinner("Reconciling...", false);
    let report = service.reconcile();
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    print_report(&report.context("Reconcile failed")?)?;
    Ok(())
}

fn search(config: Config, terms: &str, color: bool, direct: bool) -> Result<()> {
    let (open, close) = (config.highlight_open.clone(), config.highlight_close.clone());

    #[cfg(all(unix, feature = "daemon"))]
    {
        if let Some(mut client) = connect(direct) {
            let response = client.search(terms).context("Search failed")?;
            log::debug!("daemon answered in {:.1}ms (cached: {})", response.duration_ms, response.cached);
            print_results(&response.results, &open, &close, color)?;
            return Ok(());
        }
    }
    #[cfg(not(all(unix, feature = "daemon")))]
    let _ = direct;

    let service = open_service(config)?;
    let results = service.search(terms).context("Search failed")?;
    if results.is_empty() {
        eprintln!("No matches for '{}'", terms);
    }
    print_results(&results, &open, &close, color)?;
    Ok(())
}

fn stats(config: Config) -> Result<()> {
    let Some(index_dir) = config.index_dir.clone() else {
        println!("No index configured; searches scan {}", config.document_root.display());
        return Ok(());
    };
    if !IndexStore::exists(&index_dir) {
        println!("No index at {}. Run 'markdex index' first.", index_dir.display());
        return Ok(());
    }

    let service = open_service(config)?;
    print!("{}", service.stats()?);
    Ok(())
}

fn render(config: Config, path: &str, direct: bool) -> Result<()> {
    #[cfg(all(unix, feature = "daemon"))]
    {
        if let Some(mut client) = connect(direct) {
            print!("{}", client.render(path)?);
            return Ok(());
        }
    }
    #[cfg(not(all(unix, feature = "daemon")))]
    let _ = direct;

    // Rendering needs no index
    let config = Config {
        index_dir: None,
        ..config
    };
    let (service, _) = Service::open(config)?;
    print!("{}", service.render(path)?);
    Ok(())
}

#[cfg(all(unix, feature = "daemon"))]
fn handle_daemon_command(config: Config, action: DaemonAction) -> Result<()> {
    use markdex::server::{IndexClient, daemon, get_socket_path, is_daemon_running};
    use markdex::utils::get_app_data_dir;

    match action {
        DaemonAction::Start => {
            if is_daemon_running() {
                println!("Daemon is already running");
                return Ok(());
            }

            println!("Starting markdex daemon...");
            daemon::daemonize(config)?;

            // Wait a moment for daemon to start
            std::thread::sleep(std::time::Duration::from_millis(500));

            if is_daemon_running() {
                println!("Daemon started (socket: {})", get_socket_path().display());
            } else {
                println!(
                    "Daemon may have failed to start. Check {}",
                    get_app_data_dir()?.join("daemon-error.log").display()
                );
            }
        }

        DaemonAction::Stop => {
            if !is_daemon_running() {
                println!("Daemon is not running");
                return Ok(());
            }

            println!("Stopping daemon...");

            // Try graceful shutdown via client first
            if let Some(mut client) = IndexClient::connect() {
                let _ = client.shutdown();
                std::thread::sleep(std::time::Duration::from_millis(500));
            }

            // Force stop if still running
            if is_daemon_running() {
                daemon::stop_daemon()?;
            }

            println!("Daemon stopped");
        }

        DaemonAction::Status => {
            if !is_daemon_running() {
                println!("Daemon is not running");
                return Ok(());
            }

            match IndexClient::connect() {
                Some(mut client) => match client.status() {
                    Ok(status) => {
                        println!("markdex daemon status:");
                        println!("  Uptime: {}s", status.uptime_secs);
                        println!("  Backend: {}", status.backend);
                        println!("  Document root: {}", status.document_root.display());
                        if let Some(docs) = status.doc_count {
                            println!("  Documents: {}", docs);
                        }
                        println!("  Queries served: {}", status.queries_served);
                        println!("  Reconciliations: {}", status.reconciliations);
                        println!("  Cache hit rate: {:.1}%", status.cache_hit_rate * 100.0);
                    }
                    Err(e) => {
                        println!("Failed to get status: {}", e);
                    }
                },
                None => {
                    println!("Daemon is running but not responding");
                }
            }
        }

        DaemonAction::Foreground => {
            if is_daemon_running() {
                println!("Daemon is already running in background. Stop it first with 'markdex daemon stop'");
                return Ok(());
            }

            println!("Running daemon in foreground (Ctrl+C to stop)...");
            daemon::run_foreground(config)?;
        }
    }

    Ok(())
}

#[cfg(not(all(unix, feature = "daemon")))]
fn handle_daemon_command(_config: Config, _action: DaemonAction) -> Result<()> {
    anyhow::bail!("This build has no daemon support (needs Unix and the 'daemon' feature)")
}
