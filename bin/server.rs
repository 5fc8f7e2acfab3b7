// Debt Ledger - Web Server
// REST API with Axum. Every request reads a fresh snapshot from SQLite and
// runs the pure reconciler / alert engine over it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Local;
use clap::Parser;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use debt_ledger::{
    add_to_debts, get_all_credit_entries, get_all_debts, get_credit_entry, get_debt, link_debt,
    setup_database, AlertEngine, AlertSettings, Config, DebtSummary, ReconciliationReport,
};

#[derive(Parser)]
#[command(name = "debt-ledger-server")]
#[command(about = "JSON API over the debt ledger")]
#[command(version)]
struct Args {
    /// SQLite database path
    #[arg(long, env = "DEBT_LEDGER_DB")]
    db: Option<PathBuf>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 127.0.0.1:3000
    #[arg(long)]
    addr: Option<String>,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    alerts: AlertSettings,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn error_response(status: StatusCode, error: &anyhow::Error) -> Response {
    log::error!("{:#}", error);
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(format!("{:#}", error)),
        }),
    )
        .into_response()
}

fn lock_db(state: &AppState) -> std::sync::MutexGuard<'_, Connection> {
    // A panic while holding the lock leaves the connection itself usable
    state.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Deserialize)]
struct LinkRequest {
    debt_id: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// GET /api/debts
async fn get_debts(State(state): State<AppState>) -> Response {
    let conn = lock_db(&state);
    match get_all_debts(&conn) {
        Ok(debts) => ApiResponse::ok(debts),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

/// GET /api/credit-entries
async fn get_credit_entries(State(state): State<AppState>) -> Response {
    let conn = lock_db(&state);
    match get_all_credit_entries(&conn) {
        Ok(entries) => ApiResponse::ok(entries),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

/// GET /api/reconciliation - 204 when no credit report has been imported
async fn get_reconciliation(State(state): State<AppState>) -> Response {
    let snapshot = {
        let conn = lock_db(&state);
        get_all_credit_entries(&conn).and_then(|entries| Ok((entries, get_all_debts(&conn)?)))
    };

    match snapshot {
        Ok((entries, debts)) => match ReconciliationReport::build(&entries, &debts) {
            Some(report) => ApiResponse::ok(report),
            None => StatusCode::NO_CONTENT.into_response(),
        },
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

/// GET /api/alerts
async fn get_alerts(State(state): State<AppState>) -> Response {
    let debts = get_all_debts(&lock_db(&state));

    match debts {
        Ok(debts) => {
            let engine = AlertEngine::with_settings(state.alerts.clone());
            ApiResponse::ok(engine.derive(&debts, Local::now().date_naive()))
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

/// GET /api/summary
async fn get_summary(State(state): State<AppState>) -> Response {
    let conn = lock_db(&state);
    match get_all_debts(&conn) {
        Ok(debts) => ApiResponse::ok(DebtSummary::from_debts(&debts)),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

/// POST /api/credit-entries/:id/link - body {"debt_id": "..."}
async fn post_link(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
    Json(request): Json<LinkRequest>,
) -> Response {
    let conn = lock_db(&state);

    match get_credit_entry(&conn, &entry_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &anyhow::anyhow!("Credit entry not found: {}", entry_id),
            )
        }
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
    match get_debt(&conn, &request.debt_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &anyhow::anyhow!("Debt not found: {}", request.debt_id),
            )
        }
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }

    match link_debt(&conn, &entry_id, &request.debt_id)
        .and_then(|()| get_credit_entry(&conn, &entry_id))
    {
        Ok(entry) => ApiResponse::ok(entry),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

/// POST /api/credit-entries/:id/add-to-debts
async fn post_add_to_debts(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
) -> Response {
    let conn = lock_db(&state);
    match get_credit_entry(&conn, &entry_id) {
        Ok(Some(_)) => match add_to_debts(&conn, &entry_id) {
            Ok(debt) => ApiResponse::ok(debt),
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
        },
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &anyhow::anyhow!("Credit entry not found: {}", entry_id),
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

// ============================================================================
// Router
// ============================================================================

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/debts", get(get_debts))
        .route("/credit-entries", get(get_credit_entries))
        .route("/credit-entries/:id/link", post(post_link))
        .route("/credit-entries/:id/add-to-debts", post(post_add_to_debts))
        .route("/reconciliation", get(get_reconciliation))
        .route("/alerts", get(get_alerts))
        .route("/summary", get(get_summary))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(db) = args.db {
        config.db_path = db;
    }
    if let Some(addr) = args.addr {
        config.server_addr = addr;
    }

    let conn = Connection::open(&config.db_path)?;
    setup_database(&conn)?;
    log::info!("Database opened: {:?}", config.db_path);

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        alerts: config.alerts.clone(),
    };

    let listener = tokio::net::TcpListener::bind(config.server_addr.as_str()).await?;
    log::info!("Server running on http://{}", config.server_addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use debt_ledger::{insert_credit_entries, insert_debt, CreditEntry, Debt, DebtType};
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        AppState {
            db: Arc::new(Mutex::new(conn)),
            alerts: AlertSettings::default(),
        }
    }

    fn seed_debt(state: &AppState, name: &str, balance: f64) -> Debt {
        let debt = Debt::new(name.to_string(), None, balance, DebtType::CreditCard);
        insert_debt(&lock_db(state), &debt).unwrap();
        debt
    }

    fn seed_entry(state: &AppState, id: &str, name: &str, balance: f64) {
        let entry = CreditEntry {
            id: id.to_string(),
            name: name.to_string(),
            lender: None,
            balance,
            matched_debt_id: None,
            reported_at: None,
        };
        insert_credit_entries(&lock_db(state), &[entry]).unwrap();
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Option<Value>) {
        let response = app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            None
        } else {
            Some(serde_json::from_slice(&bytes).unwrap())
        };
        (status, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_request(uri: &str, json: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_envelope() {
        let state = test_state();

        let (status, body) = send(&state, get_request("/api/health")).await;
        let body = body.unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], "OK");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_reconciliation_without_entries_is_no_content() {
        let state = test_state();
        seed_debt(&state, "Barclaycard", 500.0);

        let (status, body) = send(&state, get_request("/api/reconciliation")).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_reconciliation_report() {
        let state = test_state();
        seed_debt(&state, "Barclaycard", 480.0);
        seed_entry(&state, "c1", "Barclaycard Platinum", 500.0);
        seed_entry(&state, "c2", "Unknown Finance", 300.0);

        let (status, body) = send(&state, get_request("/api/reconciliation")).await;
        let body = body.unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["discrepancies"][0]["credit_entry"]["id"], "c1");
        assert_eq!(body["data"]["unmatched"][0]["credit_entry"]["id"], "c2");
        assert_eq!(body["data"]["matched"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_link_and_unknown_ids() {
        let state = test_state();
        let debt = seed_debt(&state, "Overdraft", 100.0);
        seed_entry(&state, "c1", "Account 7781", 100.0);

        let body = format!(r#"{{"debt_id": "{}"}}"#, debt.id);
        let (status, response) =
            send(&state, post_request("/api/credit-entries/missing/link", &body)).await;
        let response = response.unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(response["success"], false);
        assert!(response["data"].is_null());
        assert!(response["error"].as_str().unwrap().contains("Credit entry not found"));

        let (status, response) = send(
            &state,
            post_request("/api/credit-entries/c1/link", r#"{"debt_id": "nope"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(response.unwrap()["error"]
            .as_str()
            .unwrap()
            .contains("Debt not found"));

        let (status, response) =
            send(&state, post_request("/api/credit-entries/c1/link", &body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.unwrap()["data"]["matched_debt_id"], debt.id.as_str());
    }

    #[tokio::test]
    async fn test_add_to_debts() {
        let state = test_state();
        seed_entry(&state, "c3", "Unknown Finance Co", 300.0);

        let (status, response) =
            send(&state, post_request("/api/credit-entries/missing/add-to-debts", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(response.unwrap()["success"], false);

        let (status, response) =
            send(&state, post_request("/api/credit-entries/c3/add-to-debts", "")).await;
        let response = response.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["data"]["name"], "Unknown Finance Co");

        let (_, debts) = send(&state, get_request("/api/debts")).await;
        assert_eq!(debts.unwrap()["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_alerts_for_high_apr_debt() {
        let state = test_state();
        let mut debt = Debt::new("Store card".to_string(), None, 250.0, DebtType::StoreCard);
        debt.apr = Some(29.9);
        insert_debt(&lock_db(&state), &debt).unwrap();

        let (status, body) = send(&state, get_request("/api/alerts")).await;
        let body = body.unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["type"], "high_apr");
        assert_eq!(body["data"][0]["debt_id"], debt.id.as_str());
    }

    #[test]
    fn test_args() {
        let args = Args::try_parse_from([
            "debt-ledger-server",
            "--config",
            "ledger.json",
            "--addr",
            "0.0.0.0:8080",
        ])
        .unwrap();

        assert_eq!(args.config, Some(PathBuf::from("ledger.json")));
        assert_eq!(args.addr.as_deref(), Some("0.0.0.0:8080"));
        assert!(Args::try_parse_from(["debt-ledger-server", "ledger.json"]).is_err());
    }
}
