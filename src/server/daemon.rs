//! Unix daemon serving one [`Service`] over a Unix socket.
//!
//! Every connection gets its own thread. Searches run concurrently; a
//! reconcile request blocks its own connection until the commit is done,
//! and a second one arriving meanwhile is answered with a `busy` error.

use crate::config::Config;
use crate::index::{IndexReport, SearchResults};
use crate::search::{BackendKind, Service};
use crate::server::protocol::{
    ErrorKind, Request, Response, SearchResponse, StatusResponse, read_message, write_message,
};
use crate::server::{get_pid_path, get_socket_path};
use crate::utils::get_app_data_dir;
use anyhow::{Context, Result};
use lru::LruCache;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::num::NonZeroUsize;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// LRU cache size for search results
const CACHE_SIZE: NonZeroUsize = NonZeroUsize::new(128).unwrap();

/// Connection timeout
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(300);

/// Results cached against the index state they were computed from
struct CachedResults {
    version: Vec<(String, Option<u64>)>,
    results: SearchResults,
}

/// Statistics for the server
struct ServerStats {
    start_time: Instant,
    queries_served: AtomicU64,
    reconciliations: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl ServerStats {
    fn new() -> Self {
        Self {
            start_time: Instant::now(),
            queries_served: AtomicU64::new(0),
            reconciliations: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    fn cache_hit_rate(&self) -> f32 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f32 / total as f32
        }
    }
}

/// The markdex daemon
pub struct IndexServer {
    service: Service,
    query_cache: Mutex<LruCache<String, CachedResults>>,
    stats: ServerStats,
    shutdown: AtomicBool,
    socket_path: PathBuf,
    pid_path: PathBuf,
}

impl IndexServer {
    /// Server on the default per-user socket
    pub fn new(service: Service) -> Arc<Self> {
        Self::with_paths(service, get_socket_path(), get_pid_path())
    }

    pub fn with_paths(service: Service, socket_path: PathBuf, pid_path: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            service,
            query_cache: Mutex::new(LruCache::new(CACHE_SIZE)),
            stats: ServerStats::new(),
            shutdown: AtomicBool::new(false),
            socket_path,
            pid_path,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Start the server (blocking)
    pub fn run(self: &Arc<Self>) -> Result<()> {
        let listener = self.bind()?;
        self.serve(listener);
        Ok(())
    }

    /// Create the socket and PID file
    pub fn bind(&self) -> Result<UnixListener> {
        if let Some(parent) = self.socket_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Remove stale socket file
        if self.socket_path.exists() {
            fs::remove_file(&self.socket_path)?;
        }

        fs::write(&self.pid_path, format!("{}", std::process::id()))?;

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("Failed to bind to {}", self.socket_path.display()))?;

        // Set socket permissions (user only)
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.socket_path, fs::Permissions::from_mode(0o600))?;
        }

        log::info!(
            "listening on {} ({} backend, root {})",
            self.socket_path.display(),
            self.service.backend().kind(),
            self.service.config().document_root.display()
        );
        Ok(listener)
    }

    /// Accept connections until a shutdown request arrives
    pub fn serve(self: &Arc<Self>, listener: UnixListener) {
        for stream in listener.incoming() {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            match stream {
                Ok(stream) => {
                    let _ = stream.set_read_timeout(Some(CONNECTION_TIMEOUT));
                    let _ = stream.set_write_timeout(Some(CONNECTION_TIMEOUT));

                    let server = Arc::clone(self);
                    thread::spawn(move || {
                        if let Err(e) = server.handle_connection(stream) {
                            log::warn!("connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    log::warn!("accept error: {}", e);
                }
            }
        }

        let _ = fs::remove_file(&self.socket_path);
        let _ = fs::remove_file(&self.pid_path);
        log::info!("shut down");
    }

    /// Handle a single client connection
    fn handle_connection(&self, stream: UnixStream) -> Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = BufWriter::new(stream);

        loop {
            let request: Request = match read_message(&mut reader) {
                Ok(req) => req,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    // Client disconnected
                    break;
                }
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    let resp = Response::Error {
                        kind: ErrorKind::InvalidRequest,
                        message: format!("Invalid request: {}", e),
                    };
                    write_message(&mut writer, &resp)?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let response = self.handle_request(request);
            write_message(&mut writer, &response)?;

            if matches!(response, Response::ShuttingDown) {
                // Wake the accept loop so it sees the flag
                let _ = UnixStream::connect(&self.socket_path);
                break;
            }
        }

        Ok(())
    }

    fn handle_request(&self, request: Request) -> Response {
        match request {
            Request::Search { terms } => self.handle_search(terms),

            Request::Reconcile => match self.reconcile() {
                Ok(report) => Response::Reconciled(report),
                Err(e) => Response::from_error(&e),
            },

            Request::Render { path } => match self.service.render(&path) {
                Ok(html) => Response::Rendered { html },
                Err(e) => {
                    log::warn!("render {}: {}", path, e);
                    Response::from_error(&e)
                }
            },

            Request::Status => self.handle_status(),

            Request::Shutdown => {
                self.shutdown.store(true, Ordering::Relaxed);
                Response::ShuttingDown
            }

            Request::Ping => Response::Pong,
        }
    }

    fn handle_search(&self, terms: String) -> Response {
        let start = Instant::now();
        self.stats.queries_served.fetch_add(1, Ordering::Relaxed);

        // Only index results can be cached; a scan sees the tree as it is now
        let version = match self.service.backend().store() {
            Some(store) => match store.refresh() {
                Ok(()) => Some(store.version()),
                Err(e) => return Response::from_error(&e),
            },
            None => None,
        };

        if let Some(version) = &version
            && let Ok(mut cache) = self.query_cache.lock()
            && let Some(entry) = cache.get(&terms)
            && &entry.version == version
        {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Response::Search(SearchResponse {
                results: entry.results.clone(),
                duration_ms: start.elapsed().as_secs_f64() * 1000.0,
                cached: true,
            });
        }
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        let results = match self.service.search(&terms) {
            Ok(results) => results,
            Err(e) => {
                log::warn!("search {:?}: {}", terms, e);
                return Response::from_error(&e);
            }
        };

        if let Some(version) = version
            && let Ok(mut cache) = self.query_cache.lock()
        {
            cache.put(
                terms,
                CachedResults {
                    version,
                    results: results.clone(),
                },
            );
        }

        Response::Search(SearchResponse {
            results,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            cached: false,
        })
    }

    fn reconcile(&self) -> crate::error::Result<IndexReport> {
        let report = self.service.reconcile()?;
        self.stats.reconciliations.fetch_add(1, Ordering::Relaxed);

        if !report.is_noop()
            && let Ok(mut cache) = self.query_cache.lock()
        {
            cache.clear();
        }
        Ok(report)
    }

    fn handle_status(&self) -> Response {
        let backend = self.service.backend();
        let doc_count = backend.store().map(|store| {
            if let Err(e) = store.refresh() {
                log::debug!("status: cannot refresh reader: {}", e);
            }
            store.num_docs()
        });

        Response::Status(StatusResponse {
            uptime_secs: self.stats.start_time.elapsed().as_secs(),
            backend: backend.kind(),
            document_root: self.service.config().document_root.clone(),
            doc_count,
            queries_served: self.stats.queries_served.load(Ordering::Relaxed),
            reconciliations: self.stats.reconciliations.load(Ordering::Relaxed),
            cache_hit_rate: self.stats.cache_hit_rate(),
        })
    }
}

/// Open the service for `config`, logging what startup population did
fn open_service(config: Config) -> Result<Service> {
    let (service, report) = Service::open(config).context("Failed to open service")?;
    if let Some(report) = report {
        log::info!("built index: {} documents in {:.2?}", report.added, report.duration);
    }
    if service.backend().kind() == BackendKind::Unindexed {
        log::info!("serving without an index");
    }
    Ok(service)
}

/// Daemonize the current process
pub fn daemonize(config: Config) -> Result<()> {
    // Fork using double-fork technique for proper daemonization
    match unsafe { libc::fork() } {
        -1 => anyhow::bail!("First fork failed"),
        0 => {
            // Child process
            // Create new session
            if unsafe { libc::setsid() } == -1 {
                anyhow::bail!("setsid failed");
            }

            // Second fork to prevent acquiring a controlling terminal
            match unsafe { libc::fork() } {
                -1 => anyhow::bail!("Second fork failed"),
                0 => {
                    // Grandchild - this becomes the daemon
                    unsafe {
                        libc::close(0);
                        libc::close(1);
                        libc::close(2);

                        let null = libc::open(c"/dev/null".as_ptr(), libc::O_RDWR);
                        if null != -1 {
                            libc::dup2(null, 0);
                            libc::dup2(null, 1);
                            libc::dup2(null, 2);
                            if null > 2 {
                                libc::close(null);
                            }
                        }
                    }

                    // Change to root directory to avoid holding mounts
                    let _ = std::env::set_current_dir("/");

                    // The index is opened here, after both forks, so no
                    // engine threads are lost across fork()
                    let outcome = open_service(config).and_then(|service| IndexServer::new(service).run());
                    if let Err(e) = outcome {
                        // stderr is gone; leave the reason next to the app data
                        if let Ok(dir) = get_app_data_dir() {
                            let _ = fs::write(dir.join("daemon-error.log"), format!("{:#}", e));
                        }
                    }
                    std::process::exit(0);
                }
                _ => {
                    // First child exits immediately
                    std::process::exit(0);
                }
            }
        }
        _ => {
            // Parent process - wait for first child then exit
            unsafe {
                let mut status: libc::c_int = 0;
                libc::wait(&mut status);
            }
            Ok(())
        }
    }
}

/// Start the daemon in foreground (for debugging)
pub fn run_foreground(config: Config) -> Result<()> {
    let service = open_service(config)?;
    IndexServer::new(service).run()
}

/// Stop the running daemon
pub fn stop_daemon() -> Result<bool> {
    let pid_path = get_pid_path();

    if !pid_path.exists() {
        return Ok(false);
    }

    let pid_str = fs::read_to_string(&pid_path)?;
    let pid: i32 = pid_str.trim().parse().context("Corrupt PID file")?;

    // Send SIGTERM
    unsafe {
        if libc::kill(pid, libc::SIGTERM) == 0 {
            // Wait a bit for graceful shutdown
            thread::sleep(Duration::from_millis(500));

            // Check if still running, send SIGKILL if needed
            if libc::kill(pid, 0) == 0 {
                thread::sleep(Duration::from_secs(1));
                if libc::kill(pid, 0) == 0 {
                    libc::kill(pid, libc::SIGKILL);
                }
            }
        }
    }

    let _ = fs::remove_file(get_socket_path());
    let _ = fs::remove_file(&pid_path);

    Ok(true)
}
