use std::{process, sync::Arc, time::Duration};

use realworld::{
    application::{
        articles::ArticleService,
        auth::TokenService,
        comments::CommentService,
        error::AppError,
        repos::{ArticlesRepo, CommentsRepo},
        users::UserService,
    },
    cache, config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState, HttpState, RouterState},
        telemetry,
    },
};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;
    info!(
        target = "realworld::config",
        settings = %settings.redacted(),
        "configuration loaded"
    );

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;
    migrate(&pool).await?;
    info!(target = "realworld::migrate", "migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;
    if settings.database.migrate {
        migrate(&pool).await?;
    }

    let repositories = Arc::new(PostgresRepositories::new(pool));
    let router_state = build_router_state(&settings, repositories).await?;
    serve_http(&settings, router_state).await
}

async fn connect_pool(settings: &config::Settings) -> Result<PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or(InfraError::MissingDatabaseUrl)?;

    let pool = PostgresRepositories::connect(database_url, &settings.database)
        .await
        .map_err(InfraError::from)?;
    Ok(pool)
}

async fn migrate(pool: &PgPool) -> Result<(), AppError> {
    PostgresRepositories::run_migrations(pool)
        .await
        .map_err(InfraError::from)?;
    Ok(())
}

async fn build_router_state(
    settings: &config::Settings,
    repositories: Arc<PostgresRepositories>,
) -> Result<RouterState, AppError> {
    let tokens = Arc::new(TokenService::from_settings(&settings.jwt)?);

    let users = cache::users_repo(&settings.cache, repositories.clone())
        .await
        .map_err(InfraError::from)?;
    let articles: Arc<dyn ArticlesRepo> = repositories.clone();
    let comments: Arc<dyn CommentsRepo> = repositories.clone();

    let api = ApiState {
        users: Arc::new(UserService::new(users.clone(), tokens.clone())),
        articles: Arc::new(ArticleService::new(articles.clone(), users.clone())),
        comments: Arc::new(CommentService::new(comments, articles, users)),
        tokens,
    };

    let docs = &settings.server.docs;
    let http = HttpState {
        db: repositories,
        docs: docs.enabled.then(|| docs.path.clone()),
    };

    Ok(RouterState { http, api })
}

async fn serve_http(settings: &config::Settings, state: RouterState) -> Result<(), AppError> {
    let router = http::build_router(state, &settings.server);
    let addr = settings.server.addr;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| InfraError::Bind { addr, source })?;
    info!(
        target = "realworld::http",
        %addr,
        "listening"
    );

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => return server_outcome(result),
        () = shutdown_signal() => {}
    }

    let grace = settings.server.graceful_shutdown;
    info!(
        target = "realworld::http",
        grace_seconds = grace.as_secs(),
        "shutting down"
    );
    let _ = stop_tx.send(());
    wait_for_drain(server, grace).await
}

async fn wait_for_drain(
    server: tokio::task::JoinHandle<std::io::Result<()>>,
    grace: Duration,
) -> Result<(), AppError> {
    match tokio::time::timeout(grace, server).await {
        Ok(result) => server_outcome(result),
        Err(_) => {
            warn!(
                target = "realworld::http",
                "graceful shutdown timed out; dropping in-flight requests"
            );
            Ok(())
        }
    }
}

fn server_outcome(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(InfraError::Serve(err).into()),
        Err(err) => Err(AppError::Join(err)),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "realworld::http", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "realworld::http", error = %err, "failed to listen for SIGTERM");
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
