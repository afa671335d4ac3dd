mod app;
mod auth;
mod config;
mod error;
mod receipts;
mod reports;
mod schema;
mod state;
mod storage;
mod users;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "fieldreport=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;

    if app_state.config.auto_init_schema {
        if let Err(e) = schema::handlers::apply_schema(&app_state).await {
            tracing::warn!(error = %format!("{e:#}"), "schema init at startup failed; continuing");
        }
    }
    if app_state.config.reset_token.is_none() {
        tracing::info!("RESET_DB_TOKEN not set; /admin/reset-db is disabled");
    }

    let bind = app_state.config.bind_address();
    let app = app::build_app(app_state);
    app::serve(app, &bind).await
}
