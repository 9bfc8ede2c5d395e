// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level wrapper runner — shared by `main` and integration tests.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::board::TaskBoard;
use crate::config::Config;
use crate::controller::{ControllerConfig, IdentityConfig, TerminalController};
use crate::external::ExternalRegistry;
use crate::history::HistoryStore;
use crate::paths;
use crate::ports::PortManager;
use crate::profile::Profile;
use crate::pty::ExitStatus;
use crate::registry::{self, AgentRecord, AgentRegistry};
use crate::reply_stack::ReplyStack;
use crate::status::AgentStatus;
use crate::task_store::TaskStore;
use crate::transport::auth::AuthConfig;
use crate::transport::state::{ServerSettings, Store};
use crate::transport::build_router;
use crate::webhooks::{WebhookConfig, WebhookRegistry};

pub struct RunResult {
    pub status: ExitStatus,
    pub store: Arc<Store>,
}

/// A fully-prepared wrapper ready to run.
pub struct PreparedWrapper {
    pub store: Arc<Store>,
    config: Config,
    shutdown: CancellationToken,
}

/// Run a wrapper to completion: prepare, serve, wait for the child.
pub async fn run(config: Config) -> anyhow::Result<RunResult> {
    prepare(config).await?.run().await
}

/// Initialize tracing/logging from config.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    // Priority: --log-level / SYNAPSE_LOG_LEVEL > RUST_LOG > "info".
    let filter = if std::env::var("SYNAPSE_LOG_LEVEL").is_err() && config.log_level == "info" {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    } else {
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Prepare a wrapper: allocate a port, spawn the child under its PTY,
/// write the registry record, and start the HTTP servers.
pub async fn prepare(config: Config) -> anyhow::Result<PreparedWrapper> {
    init_tracing(&config);
    let _ = rustls::crypto::ring::default_provider().install_default();

    let shutdown = CancellationToken::new();
    let registry = Arc::new(AgentRegistry::new());

    // 1. Load the profile and resolve the port from its band.
    let profile = Profile::load(&config.profile)?;
    let port = match config.port {
        Some(port) => port,
        None => {
            let ports = PortManager::new(&registry);
            match ports.available_port(&profile.name) {
                Some(port) => port,
                None => anyhow::bail!("{}", ports.exhaustion_report(&profile.name)),
            }
        }
    };
    let agent_id = registry::agent_id(&profile.name, port);
    let endpoint = format!("http://127.0.0.1:{port}");

    // 2. Socket path: clear any stale socket from a previous run.
    let uds_path = paths::socket_path(&agent_id);
    if let Some(parent) = uds_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let _ = std::fs::remove_file(&uds_path);

    // 3. Build the child command and environment.
    let mut command = vec![profile.command.clone()];
    command.extend(profile.args.iter().cloned());
    command.extend(config.resolved_tool_args());

    let mut envs: Vec<(String, String)> =
        profile.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    // Exported so CLI tools inside the child can identify their wrapper.
    envs.push(("SYNAPSE_AGENT_ID".to_owned(), agent_id.clone()));
    envs.push(("SYNAPSE_AGENT_TYPE".to_owned(), profile.name.clone()));
    envs.push(("SYNAPSE_PORT".to_owned(), port.to_string()));

    // 4. Build and start the controller.
    let controller = TerminalController::new(
        ControllerConfig {
            command,
            envs,
            submit_sequence: profile.submit_sequence.clone(),
            idle: profile.idle_detection.clone(),
            waiting_regex: profile.waiting_regex.clone(),
            identity: IdentityConfig {
                agent_id: agent_id.clone(),
                agent_type: profile.name.clone(),
                port,
                name: config.name.clone(),
                role: config.role.clone(),
                skill_set: config.skill_set.clone(),
                instruction: config.resolved_instruction()?,
                skip_initial_instructions: config.skip_initial_instructions,
            },
            cols: config.cols,
            rows: config.rows,
        },
        Arc::clone(&registry),
    );
    if !config.interactive {
        controller.start()?;
    }

    // 5. Registry record; PROCESSING keeps the port probe off our back
    //    while the child boots.
    let now = Utc::now();
    registry.register(&AgentRecord {
        agent_id: agent_id.clone(),
        agent_type: profile.name.clone(),
        port,
        endpoint: endpoint.clone(),
        uds_path: Some(uds_path.display().to_string()),
        pid: std::process::id(),
        working_dir: std::env::current_dir()
            .map(|d| d.display().to_string())
            .unwrap_or_default(),
        status: AgentStatus::Processing,
        name: config.name.clone(),
        role: config.role.clone(),
        transport: "uds".to_owned(),
        current_task_preview: None,
        registered_at: now,
        updated_at: now,
    })?;

    // 6. Persistence. The board is not optional — a failed open is fatal.
    let board = if config.task_board_enabled {
        let db_path = config.task_board_db.clone().unwrap_or_else(paths::task_board_db_path);
        Arc::new(TaskBoard::open(db_path).context("task board initialization failed")?)
    } else {
        // Disabled boards still serve the API against an isolated throwaway
        // file so endpoints behave uniformly.
        let fallback = std::env::temp_dir().join(format!("synapse-board-{agent_id}.db"));
        Arc::new(TaskBoard::open(fallback).context("task board initialization failed")?)
    };
    let history = Arc::new(HistoryStore::open(paths::history_db_path(), config.history_enabled));

    // 7. Assemble the store.
    let store = Arc::new(Store {
        controller: controller.clone(),
        tasks: TaskStore::new(),
        replies: ReplyStack::new(),
        registry: Arc::clone(&registry),
        external: ExternalRegistry::new(),
        board,
        history,
        webhooks: Arc::new(WebhookRegistry::new(WebhookConfig::from_env())),
        settings: ServerSettings {
            agent_id: agent_id.clone(),
            agent_type: profile.name.clone(),
            port,
            name: config.name.clone(),
            role: config.role.clone(),
            endpoint: endpoint.clone(),
            uds_path: Some(uds_path.display().to_string()),
            auth: AuthConfig::from_env(),
        },
        session_id: tokio::sync::RwLock::new(uuid::Uuid::new_v4().to_string()),
    });

    // 8. TCP listener (TLS when certs are configured).
    let router = build_router(Arc::clone(&store));
    let addr = format!("{}:{port}", config.host);
    match (&config.ssl_cert, &config.ssl_key) {
        (Some(cert), Some(key)) => {
            let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key)
                .await
                .context("load TLS certificate")?;
            let addr: std::net::SocketAddr = addr.parse()?;
            info!("HTTPS listening on {addr}");
            let app = router.clone();
            tokio::spawn(async move {
                let service =
                    app.into_make_service_with_connect_info::<std::net::SocketAddr>();
                if let Err(e) = axum_server::bind_rustls(addr, tls).serve(service).await {
                    error!("HTTPS server error: {e}");
                }
            });
        }
        _ => {
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("bind {addr}"))?;
            info!("HTTP listening on {}", listener.local_addr()?);
            let app = router.clone();
            let sd = shutdown.clone();
            tokio::spawn(async move {
                let service =
                    app.into_make_service_with_connect_info::<std::net::SocketAddr>();
                let result = axum::serve(listener, service)
                    .with_graceful_shutdown(sd.cancelled_owned())
                    .await;
                if let Err(e) = result {
                    error!("HTTP server error: {e}");
                }
            });
        }
    }

    // 9. Unix socket server.
    {
        let uds_listener = tokio::net::UnixListener::bind(&uds_path)
            .with_context(|| format!("bind {}", uds_path.display()))?;
        info!("Unix socket listening on {}", uds_path.display());
        let sd = shutdown.clone();
        let app = router.clone();
        tokio::spawn(async move {
            let mut make_svc = app.into_make_service();
            loop {
                tokio::select! {
                    _ = sd.cancelled() => break,
                    accept = uds_listener.accept() => {
                        match accept {
                            Ok((stream, _)) => {
                                let svc_future = <_ as tower::Service<_>>::call(&mut make_svc, ());
                                tokio::spawn(async move {
                                    let Ok(svc) = svc_future.await;
                                    let io = hyper_util::rt::TokioIo::new(stream);
                                    let hyper_svc =
                                        hyper_util::service::TowerToHyperService::new(svc);
                                    let _ = hyper_util::server::conn::auto::Builder::new(
                                        hyper_util::rt::TokioExecutor::new(),
                                    )
                                    .serve_connection_with_upgrades(io, hyper_svc)
                                    .await;
                                });
                            }
                            Err(e) => {
                                tracing::debug!("unix socket accept error: {e}");
                            }
                        }
                    }
                }
            }
        });
    }

    // 10. Signal handler: first signal drains, second forces exit.
    {
        let sd = shutdown.clone();
        tokio::spawn(async move {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
            let mut sigint =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

            tokio::select! {
                _ = async {
                    if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
                } => {
                    info!("received SIGTERM");
                }
                _ = async {
                    if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
                } => {
                    info!("received SIGINT");
                }
            }
            sd.cancel();

            tokio::select! {
                _ = async {
                    if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
                } => {
                    info!("received SIGTERM again, forcing exit");
                }
                _ = async {
                    if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
                } => {
                    info!("received SIGINT again, forcing exit");
                }
            }
            std::process::exit(130);
        });
    }

    info!(agent_id = %agent_id, port, "wrapper ready");
    Ok(PreparedWrapper { store, config, shutdown })
}

impl PreparedWrapper {
    /// Run until the child exits or shutdown is requested.
    pub async fn run(self) -> anyhow::Result<RunResult> {
        let controller = self.store.controller.clone();

        let status = if self.config.interactive {
            let result = controller.run_interactive().await;
            match result {
                Ok(status) => status,
                Err(e) => {
                    error!("interactive session failed: {e:#}");
                    ExitStatus { code: Some(1), signal: None }
                }
            }
        } else {
            tokio::select! {
                status = controller.wait() => {
                    status.unwrap_or(ExitStatus { code: Some(0), signal: None })
                }
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested; stopping child");
                    ExitStatus { code: Some(0), signal: None }
                }
            }
        };

        self.cleanup().await;
        Ok(RunResult { status, store: self.store })
    }

    /// Graceful teardown: child, registry record, socket file.
    pub async fn cleanup(&self) {
        self.store.controller.stop().await;
        self.store.registry.unregister(&self.store.settings.agent_id);
        if let Some(ref uds) = self.store.settings.uds_path {
            let _ = std::fs::remove_file(uds);
        }
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
