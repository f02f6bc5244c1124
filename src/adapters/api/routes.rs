//! HTTP routes.
//!
//! Handlers are plain async functions over axum extractors so they can
//! be called directly in tests.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::adapters::metrics::{HealthState, MetricsRegistry};
use crate::domain::{
    BetPlaced, MarketClosed, MarketCreated, MarketId, MarketResolved, MarketSnapshot,
    PayoutClaimed, Project, ProjectId, ProjectRegistered, UserId,
};
use crate::ports::identity::Caller;
use crate::ports::repository::JournalEntry;
use crate::usecases::{MarketService, SettlementReport};

use super::auth::bearer_token;
use super::error::ApiError;
use super::types::{
    CreateMarketRequest, ExistsResponse, OddsResponse, PayoutResponse, PlaceBetRequest,
    ProjectMarketsResponse, RegisterProjectRequest, ResolveRequest,
};

type ApiResult<T> = Result<T, ApiError>;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MarketService>,
    pub health: HealthState,
    pub metrics: Arc<MetricsRegistry>,
}

/// Build the API router. `/metrics` is only mounted when enabled.
pub fn router(state: AppState, metrics_enabled: bool) -> Router {
    let mut app = Router::new()
        .route("/markets", post(create_market).get(list_markets))
        .route("/markets/:id", get(get_market))
        .route("/markets/:id/exists", get(market_exists))
        .route("/markets/:id/odds", get(odds))
        .route("/markets/:id/bets", post(place_bet))
        .route("/markets/:id/close", post(close_market))
        .route("/markets/:id/resolve", post(resolve_market))
        .route("/markets/:id/payout/:user", get(compute_payout))
        .route("/markets/:id/claim", post(claim_payout))
        .route("/markets/:id/settlement", get(settlement_report))
        .route("/markets/:id/events", get(market_history))
        .route("/projects", post(register_project).get(list_projects))
        .route("/projects/:id", get(get_project))
        .route("/projects/:id/exists", get(project_exists))
        .route("/projects/:id/markets", get(project_markets))
        .route("/live", get(liveness))
        .route("/ready", get(readiness));
    if metrics_enabled {
        app = app.route("/metrics", get(metrics));
    }
    app.with_state(state)
}

/// Serve the API until the shutdown signal fires.
#[instrument(skip(state, shutdown_rx))]
pub async fn serve(
    state: AppState,
    bind_address: String,
    metrics_enabled: bool,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = router(state, metrics_enabled);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "Settlement API started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    Ok(())
}

async fn caller(state: &AppState, headers: &HeaderMap) -> Caller {
    state.service.authenticate(bearer_token(headers)).await
}

// ── Markets ─────────────────────────────────────

pub async fn create_market(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateMarketRequest>,
) -> ApiResult<(StatusCode, Json<MarketCreated>)> {
    let caller = caller(&state, &headers).await;
    let (question, metadata) = body.into_parts();
    let event = state
        .service
        .create_market(&caller, &question, metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn list_markets(State(state): State<AppState>) -> Json<Vec<MarketSnapshot>> {
    Json(state.service.list_markets())
}

pub async fn get_market(
    State(state): State<AppState>,
    Path(id): Path<MarketId>,
) -> ApiResult<Json<MarketSnapshot>> {
    Ok(Json(state.service.get_market(id)?))
}

pub async fn market_exists(
    State(state): State<AppState>,
    Path(id): Path<MarketId>,
) -> Json<ExistsResponse> {
    Json(ExistsResponse {
        exists: state.service.market_exists(id),
    })
}

pub async fn odds(
    State(state): State<AppState>,
    Path(id): Path<MarketId>,
) -> ApiResult<Json<OddsResponse>> {
    let odds = state.service.odds(id)?;
    Ok(Json(OddsResponse { market_id: id, odds }))
}

pub async fn place_bet(
    State(state): State<AppState>,
    Path(id): Path<MarketId>,
    headers: HeaderMap,
    Json(body): Json<PlaceBetRequest>,
) -> ApiResult<Json<BetPlaced>> {
    let caller = caller(&state, &headers).await;
    let event = state
        .service
        .place_bet(&caller, id, &body.side, body.amount)
        .await?;
    Ok(Json(event))
}

pub async fn close_market(
    State(state): State<AppState>,
    Path(id): Path<MarketId>,
    headers: HeaderMap,
) -> ApiResult<Json<MarketClosed>> {
    let caller = caller(&state, &headers).await;
    Ok(Json(state.service.close(&caller, id).await?))
}

pub async fn resolve_market(
    State(state): State<AppState>,
    Path(id): Path<MarketId>,
    headers: HeaderMap,
    Json(body): Json<ResolveRequest>,
) -> ApiResult<Json<MarketResolved>> {
    let caller = caller(&state, &headers).await;
    Ok(Json(state.service.resolve(&caller, id, &body.outcome).await?))
}

pub async fn compute_payout(
    State(state): State<AppState>,
    Path((id, user)): Path<(MarketId, UserId)>,
) -> ApiResult<Json<PayoutResponse>> {
    let payout = state.service.compute_payout(id, &user)?;
    Ok(Json(PayoutResponse {
        market_id: id,
        user,
        payout,
    }))
}

pub async fn claim_payout(
    State(state): State<AppState>,
    Path(id): Path<MarketId>,
    headers: HeaderMap,
) -> ApiResult<Json<PayoutClaimed>> {
    let caller = caller(&state, &headers).await;
    Ok(Json(state.service.claim_payout(&caller, id).await?))
}

pub async fn settlement_report(
    State(state): State<AppState>,
    Path(id): Path<MarketId>,
) -> ApiResult<Json<SettlementReport>> {
    Ok(Json(state.service.settlement_report(id)?))
}

pub async fn market_history(
    State(state): State<AppState>,
    Path(id): Path<MarketId>,
) -> ApiResult<Json<Vec<JournalEntry>>> {
    let history = state
        .service
        .market_history(id)
        .await?
        .ok_or_else(|| crate::domain::EngineError::market_not_found(id))?;
    Ok(Json(history))
}

// ── Projects ────────────────────────────────────

pub async fn register_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectRegistered>)> {
    let caller = caller(&state, &headers).await;
    let event = state
        .service
        .register_project(&caller, &body.name, &body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn list_projects(State(state): State<AppState>) -> Json<Vec<Project>> {
    Json(state.service.list_projects())
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.service.get_project(id)?))
}

pub async fn project_exists(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> Json<ExistsResponse> {
    Json(ExistsResponse {
        exists: state.service.project_exists(id),
    })
}

pub async fn project_markets(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> Json<ProjectMarketsResponse> {
    Json(ProjectMarketsResponse {
        project_id: id,
        markets: state.service.markets_for_project(id),
    })
}

// ── Operations ──────────────────────────────────

pub async fn liveness() -> impl IntoResponse {
    HealthState::liveness()
}

pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    state.health.readiness()
}

pub async fn metrics(State(state): State<AppState>) -> ApiResult<String> {
    Ok(state.metrics.render()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum::http::header::AUTHORIZATION;

    use crate::adapters::api::auth::StaticTokenIdentity;
    use crate::adapters::persistence::InMemoryRepository;
    use crate::domain::{MarketState, Side};
    use crate::usecases::{AccessPolicy, ServiceError};

    fn state() -> AppState {
        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let service = MarketService::new(
            Arc::new(InMemoryRepository::new()),
            Arc::new(StaticTokenIdentity::from_pairs([("ta", "alice"), ("tb", "bob")])),
            AccessPolicy::default(),
            Arc::clone(&metrics),
        );
        AppState {
            service: Arc::new(service),
            health: HealthState::new(),
            metrics,
        }
    }

    fn auth(token: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    fn question(q: &str) -> Json<CreateMarketRequest> {
        Json(CreateMarketRequest {
            question: q.to_string(),
            title: String::new(),
            project_id: None,
            livestream_id: None,
        })
    }

    fn bet(side: &str, amount: i64) -> Json<PlaceBetRequest> {
        Json(PlaceBetRequest {
            side: side.to_string(),
            amount,
        })
    }

    #[tokio::test]
    async fn test_market_lifecycle_over_handlers() {
        let s = state();
        let (status, Json(created)) =
            create_market(State(s.clone()), auth("ta"), question("Rain?"))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        let id = created.market.id;

        place_bet(State(s.clone()), Path(id), auth("ta"), bet("YES", 100))
            .await
            .unwrap();
        place_bet(State(s.clone()), Path(id), auth("tb"), bet("no", 200))
            .await
            .unwrap();

        let Json(quote) = odds(State(s.clone()), Path(id)).await.unwrap();
        let quote = quote.odds.unwrap();
        assert_eq!(quote.yes_bps + quote.no_bps, 10_000);

        close_market(State(s.clone()), Path(id), auth("ta")).await.unwrap();
        let Json(resolved) = resolve_market(
            State(s.clone()),
            Path(id),
            auth("ta"),
            Json(ResolveRequest { outcome: "yes".into() }),
        )
        .await
        .unwrap();
        assert_eq!(resolved.outcome, Side::Yes);

        let Json(payout) = compute_payout(State(s.clone()), Path((id, "alice".to_string())))
            .await
            .unwrap();
        assert_eq!(payout.payout, 300);

        let Json(claimed) = claim_payout(State(s.clone()), Path(id), auth("ta")).await.unwrap();
        assert_eq!(claimed.payout, 300);

        let Json(snap) = get_market(State(s.clone()), Path(id)).await.unwrap();
        assert_eq!(snap.state, MarketState::Resolved);

        let Json(report) = settlement_report(State(s.clone()), Path(id)).await.unwrap();
        assert_eq!(report.total_claimed, 300);

        let Json(history) = market_history(State(s), Path(id)).await.unwrap();
        assert_eq!(history.len(), 6);
    }

    #[tokio::test]
    async fn test_rejections_map_to_status() {
        let s = state();
        create_market(State(s.clone()), auth("ta"), question("Q"))
            .await
            .unwrap();

        let err = place_bet(State(s.clone()), Path(1), HeaderMap::new(), bet("yes", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Service(ServiceError::Unauthenticated)));
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);

        let err = place_bet(State(s.clone()), Path(999), auth("ta"), bet("yes", 1))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

        let err = place_bet(State(s.clone()), Path(1), auth("ta"), bet("maybe", 1))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = close_market(State(s.clone()), Path(1), auth("tb"))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

        let err = market_history(State(s), Path(42)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_projects_and_grouping() {
        let s = state();
        let (_, Json(project)) = register_project(
            State(s.clone()),
            auth("tb"),
            Json(RegisterProjectRequest {
                name: "Derby".into(),
                description: String::new(),
            }),
        )
        .await
        .unwrap();
        let pid = project.project.id;
        assert_eq!(project.project.owner, "bob");

        let body = Json(CreateMarketRequest {
            question: "Winner?".into(),
            title: "Race 1".into(),
            project_id: Some(pid),
            livestream_id: Some("ls-9".into()),
        });
        create_market(State(s.clone()), auth("ta"), body).await.unwrap();

        let Json(grouped) = project_markets(State(s.clone()), Path(pid)).await;
        assert_eq!(grouped.markets, vec![1]);
        let Json(exists) = project_exists(State(s.clone()), Path(pid)).await;
        assert!(exists.exists);
        let Json(exists) = market_exists(State(s), Path(2)).await;
        assert!(!exists.exists);
    }

    #[tokio::test]
    async fn test_readiness_and_metrics() {
        let s = state();
        assert_eq!(readiness(State(s.clone())).await.into_response().status(), StatusCode::OK);
        s.health.begin_shutdown();
        assert_eq!(
            readiness(State(s.clone())).await.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        let text = metrics(State(s)).await.unwrap();
        assert!(text.contains("settlement_markets"));
    }

    #[tokio::test]
    async fn test_serve_returns_after_shutdown_signal() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let handle = tokio::spawn(serve(state(), "127.0.0.1:0".to_string(), true, shutdown_rx));
        tokio::task::yield_now().await;

        shutdown_tx.send(()).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("server did not drain")
            .unwrap();
        assert!(result.is_ok());
    }
}
