use axum::Router;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use ticketchain_server::config::Config;
use ticketchain_server::handlers::AppState;
use ticketchain_server::ledger::TicketLedger;
use ticketchain_server::routes::create_routes;
use ticketchain_server::transfer::MockTransfer;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    // The chain-backed transfer client is wired in by the deployment; the
    // mock stands in everywhere else.
    let ledger = TicketLedger::open(config.ledger_settings(), MockTransfer::shared())
        .expect("Failed to open ledger journal");

    tracing::info!(
        journal = %config.journal_path.display(),
        creation_fee = config.creation_fee,
        events = ledger.list_events().len(),
        "ledger ready"
    );

    let state = AppState {
        ledger: Arc::new(ledger),
        conflict_retries: config.conflict_retries,
    };
    let app: Router = create_routes(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
