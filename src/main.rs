use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use idclaim::config::Config;
use idclaim::db::SqliteStore;
use idclaim::directory::IdmDirectory;
use idclaim::mailer::LogMailer;
use idclaim::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "idclaim=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    let pool = idclaim::db::create_pool(&config.database_url)
        .await
        .expect("failed to create database pool");

    let directory =
        IdmDirectory::new(config.directory.clone()).expect("failed to configure directory client");
    let mailer = LogMailer::new(config.site.clone(), config.dev_mode);
    let port = config.port;

    let state = AppState::new(
        config,
        Arc::new(SqliteStore::new(pool)),
        Arc::new(directory),
        Arc::new(mailer),
    );

    let sweeper_flashes = Arc::clone(&state.flashes);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let dropped = sweeper_flashes.sweep();
            if dropped > 0 {
                tracing::debug!("dropped {dropped} expired credential flash(es)");
            }
        }
    });

    let app = idclaim::routes::router(state);

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .expect("failed to bind");

    let actual_port = listener
        .local_addr()
        .expect("failed to get local address")
        .port();
    eprintln!("  \x1b[32m→ listening on 0.0.0.0:{actual_port}\x1b[0m");
    eprintln!();

    axum::serve(listener, app).await.expect("server error");
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");

    eprintln!();
    eprintln!("  \x1b[1;36midclaim\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2msite\x1b[0m         {}", config.site.site_name);
    eprintln!("  \x1b[2mport\x1b[0m         {}", config.port);
    eprintln!("  \x1b[2mdatabase\x1b[0m     {}", config.database_url);
    eprintln!("  \x1b[2mdirectory\x1b[0m    {}", config.directory.host);
    eprintln!(
        "  \x1b[2mgroups\x1b[0m       {} optional, {} default",
        config.optional_groups.len(),
        config.directory.add_groups.len()
    );

    if config.dev_mode {
        eprintln!();
        eprintln!("  \x1b[33m! dev mode enabled, otp codes are logged\x1b[0m");
    }

    eprintln!();
}
