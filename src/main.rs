// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client, ResourceExt,
};
use ldapy::{
    constants::{
        ERROR_REQUEUE_DURATION_SECS, KIND_LDAP_GROUP, KIND_LDAP_SERVER, KIND_LDAP_USER,
        METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH, METRICS_SERVER_PORT,
        TOKIO_WORKER_THREADS,
    },
    context::{Context, Stores},
    crd::{LDAPGroup, LDAPServer, LDAPUser},
    metrics,
    reconcilers::{reconcile_ldapgroup, reconcile_ldapserver, reconcile_ldapuser},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("ldapy-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Format: timestamp file:line LEVEL message
    // RUST_LOG sets the filter (default info), RUST_LOG_FORMAT=json switches to JSON output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting LDAP directory controller");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let server_controller =
        Controller::new(Api::<LDAPServer>::all(client.clone()), Config::default());
    let user_controller = Controller::new(Api::<LDAPUser>::all(client.clone()), Config::default());
    let group_controller =
        Controller::new(Api::<LDAPGroup>::all(client.clone()), Config::default());

    let context = Arc::new(Context {
        client: client.clone(),
        stores: Stores {
            ldap_servers: server_controller.store(),
            ldap_users: user_controller.store(),
            ldap_groups: group_controller.store(),
        },
    });

    info!("Starting all controllers");

    // Controllers should never exit - if one does, log it and exit the process
    tokio::select! {
        result = run_ldapserver_controller(server_controller, context.clone()) => {
            error!("CRITICAL: LDAPServer controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("LDAPServer controller exited unexpectedly without error")
        }
        result = run_ldapuser_controller(user_controller, context.clone()) => {
            error!("CRITICAL: LDAPUser controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("LDAPUser controller exited unexpectedly without error")
        }
        result = run_ldapgroup_controller(group_controller, context.clone()) => {
            error!("CRITICAL: LDAPGroup controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("LDAPGroup controller exited unexpectedly without error")
        }
        result = run_metrics_server() => {
            error!("CRITICAL: Metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        () = shutdown_signal() => {
            info!("Shutdown signal received, stopping controllers");
            Ok(())
        }
    }
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// Run the `LDAPServer` controller
async fn run_ldapserver_controller(
    controller: Controller<LDAPServer>,
    context: Arc<Context>,
) -> Result<()> {
    info!("Starting LDAPServer controller");

    controller
        .run(reconcile_ldapserver_wrapper, error_policy, context)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `LDAPUser` controller.
///
/// Also watches `LDAPServer` so that users re-reconcile when the server they
/// reference changes connectivity.
async fn run_ldapuser_controller(
    controller: Controller<LDAPUser>,
    context: Arc<Context>,
) -> Result<()> {
    info!("Starting LDAPUser controller");

    let stores = context.stores.clone();
    controller
        .watches(
            Api::<LDAPServer>::all(context.client.clone()),
            Config::default(),
            move |server| stores.users_referencing_server(&server),
        )
        .run(reconcile_ldapuser_wrapper, error_policy, context)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `LDAPGroup` controller
async fn run_ldapgroup_controller(
    controller: Controller<LDAPGroup>,
    context: Arc<Context>,
) -> Result<()> {
    info!("Starting LDAPGroup controller");

    let stores = context.stores.clone();
    controller
        .watches(
            Api::<LDAPServer>::all(context.client.clone()),
            Config::default(),
            move |server| stores.groups_referencing_server(&server),
        )
        .run(reconcile_ldapgroup_wrapper, error_policy, context)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `LDAPServer`
async fn reconcile_ldapserver_wrapper(
    server: Arc<LDAPServer>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    debug!(
        server = %server.name_any(),
        namespace = ?server.namespace(),
        "Reconcile wrapper called for LDAPServer"
    );

    match reconcile_ldapserver(ctx, (*server).clone()).await {
        Ok(action) => {
            metrics::record_reconciliation_success(KIND_LDAP_SERVER, start.elapsed());
            Ok(action)
        }
        Err(e) => {
            error!("Failed to reconcile LDAPServer {}: {:#}", server.name_any(), e);
            metrics::record_reconciliation_error(KIND_LDAP_SERVER, start.elapsed());
            metrics::record_error(KIND_LDAP_SERVER, "reconcile");
            Err(e.into())
        }
    }
}

/// Reconcile wrapper for `LDAPUser`
async fn reconcile_ldapuser_wrapper(
    user: Arc<LDAPUser>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();

    match reconcile_ldapuser(ctx, (*user).clone()).await {
        Ok(action) => {
            metrics::record_reconciliation_success(KIND_LDAP_USER, start.elapsed());
            Ok(action)
        }
        Err(e) => {
            error!("Failed to reconcile LDAPUser {}: {:#}", user.name_any(), e);
            metrics::record_reconciliation_error(KIND_LDAP_USER, start.elapsed());
            metrics::record_error(KIND_LDAP_USER, "reconcile");
            Err(e.into())
        }
    }
}

/// Reconcile wrapper for `LDAPGroup`
async fn reconcile_ldapgroup_wrapper(
    group: Arc<LDAPGroup>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();

    match reconcile_ldapgroup(ctx, (*group).clone()).await {
        Ok(action) => {
            metrics::record_reconciliation_success(KIND_LDAP_GROUP, start.elapsed());
            Ok(action)
        }
        Err(e) => {
            error!("Failed to reconcile LDAPGroup {}: {:#}", group.name_any(), e);
            metrics::record_reconciliation_error(KIND_LDAP_GROUP, start.elapsed());
            metrics::record_error(KIND_LDAP_GROUP, "reconcile");
            Err(e.into())
        }
    }
}

/// Error policy for all controllers
fn error_policy<K>(_resource: Arc<K>, _err: &ReconcileError, _ctx: Arc<Context>) -> Action {
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

/// Serve Prometheus metrics until the listener fails.
async fn run_metrics_server() -> Result<()> {
    let addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Metrics server listening on {}{}", addr, METRICS_SERVER_PATH);

    axum::serve(listener, metrics_router()).await?;
    Ok(())
}

fn metrics_router() -> Router {
    Router::new().route(METRICS_SERVER_PATH, get(metrics_handler))
}

async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(output) => Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )
            .body(Body::from(output))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
