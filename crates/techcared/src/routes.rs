//! API routes for techcared

use crate::auth::{AuthUser, TokenKind};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use techcare_shared::api::{
    ChatMessageRequest, ChatReply, ChatSessionCreated, ChatSessionView, CleanRequest,
    CleanSummary, CleanupAnalysis, CreateRepairPlanRequest, GuideStatus, GuideSummary,
    HealthResponse, LimitQuery, LoginRequest, MaintenanceRun, Preferences, RefreshRequest,
    RefreshResponse, RegisterRequest, StartGuideRequest, StepUpdate, TokenResponse,
    UpdateUserRequest, UserView,
};
use techcare_shared::guide::catalog;
use techcare_shared::repair::RepairPlan;
use techcare_shared::report::{DiagnosticReport, DiagnosticSummary, SystemInfo};
use techcare_shared::schedule::{MaintenancePlan, PlanDraft};
use techcare_shared::{Permission, Role, TechcareError, VersionInfo};
use tracing::info;

type AppStateArc = Arc<AppState>;

/// Longest chat message accepted, in characters
const MAX_MESSAGE_CHARS: usize = 2000;

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health))
}

async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: VersionInfo::current(),
        uptime_secs: state.uptime_secs(),
        analyzers: state.diagnostics.categories(),
    })
}

// ============================================================================
// Auth Routes
// ============================================================================

pub fn auth_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/refresh", post(refresh))
        .route("/v1/me", get(me))
        .route("/v1/me/preferences", get(get_preferences).put(set_preferences))
}

async fn register(
    State(state): State<AppStateArc>,
    caller: Option<AuthUser>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    // Only user managers may choose a role; everyone else signs up as a viewer
    let role = match (&caller, req.role) {
        (Some(c), Some(role)) if c.role.can(Permission::ManageUsers) => role,
        _ => Role::Viewer,
    };
    let user = state
        .users
        .write()
        .await
        .register(&req.username, &req.email, &req.password, role)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AppStateArc>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<TokenResponse> {
    let user = state.users.write().await.verify(&req.username, &req.password)?;
    info!("  Login: {} ({})", user.username, user.role);

    Ok(Json(TokenResponse {
        access_token: state.tokens.issue(&user.id, user.role, TokenKind::Access)?,
        refresh_token: state.tokens.issue(&user.id, user.role, TokenKind::Refresh)?,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.access_ttl_secs(),
        role: user.role,
        dashboard_path: user.role.dashboard_path().to_string(),
        user,
    }))
}

async fn refresh(
    State(state): State<AppStateArc>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<RefreshResponse> {
    let claims = state.tokens.verify(&req.refresh_token, TokenKind::Refresh)?;
    let user = state
        .users
        .read()
        .await
        .get(&claims.sub)
        .map_err(|_| TechcareError::Unauthenticated)?;
    if !user.active {
        return Err(TechcareError::Forbidden("account is disabled".to_string()).into());
    }

    // Current role, not the one in the refresh token
    Ok(Json(RefreshResponse {
        access_token: state.tokens.issue(&user.id, user.role, TokenKind::Access)?,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.access_ttl_secs(),
    }))
}

async fn me(State(state): State<AppStateArc>, user: AuthUser) -> ApiResult<UserView> {
    Ok(Json(state.users.read().await.get(&user.id)?))
}

async fn get_preferences(
    State(state): State<AppStateArc>,
    user: AuthUser,
) -> ApiResult<Preferences> {
    Ok(Json(state.users.read().await.get(&user.id)?.preferences))
}

async fn set_preferences(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Json(prefs): Json<Preferences>,
) -> ApiResult<Preferences> {
    Ok(Json(
        state.users.write().await.set_preferences(&user.id, prefs)?,
    ))
}

// ============================================================================
// Diagnostic Routes
// ============================================================================

pub fn diagnostic_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/diagnostics/run", post(run_diagnostic))
        .route("/v1/diagnostics", get(diagnostic_history))
        .route("/v1/diagnostics/latest", get(latest_diagnostic))
        .route("/v1/diagnostics/:id", get(get_diagnostic))
        .route("/v1/system/info", get(system_info))
}

async fn run_diagnostic(
    State(state): State<AppStateArc>,
    user: AuthUser,
) -> ApiResult<DiagnosticReport> {
    user.require(Permission::RunDiagnostics)?;
    info!("  Running diagnostic for {}", user.id);
    Ok(Json(state.diagnostics.run(&user.id).await?))
}

async fn diagnostic_history(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<DiagnosticSummary>> {
    user.require(Permission::ViewDashboard)?;
    let limit = state.config.diagnostics.effective_limit(q.limit);
    Ok(Json(state.diagnostics.history(&user.id, limit).await))
}

async fn latest_diagnostic(
    State(state): State<AppStateArc>,
    user: AuthUser,
) -> ApiResult<DiagnosticReport> {
    user.require(Permission::ViewDashboard)?;
    Ok(Json(state.diagnostics.latest(&user.id).await?))
}

async fn get_diagnostic(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<DiagnosticReport> {
    user.require(Permission::ViewDashboard)?;
    let owner = (!user.is_admin()).then_some(user.id.as_str());
    Ok(Json(state.diagnostics.get(&id, owner).await?))
}

async fn system_info(State(state): State<AppStateArc>, user: AuthUser) -> ApiResult<SystemInfo> {
    user.require(Permission::ViewDashboard)?;
    Ok(Json(state.diagnostics.system_info().await?))
}

// ============================================================================
// Cleaner Routes
// ============================================================================

pub fn cleaner_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/cleaner/analyze", get(analyze_cleanup))
        .route("/v1/cleaner/clean", post(clean))
}

async fn analyze_cleanup(
    State(state): State<AppStateArc>,
    user: AuthUser,
) -> ApiResult<CleanupAnalysis> {
    user.require(Permission::RunRepairs)?;
    let cleaner = state.cleaner.clone();
    let analysis = tokio::task::spawn_blocking(move || cleaner.analyze()).await?;
    Ok(Json(analysis))
}

async fn clean(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Json(req): Json<CleanRequest>,
) -> ApiResult<CleanSummary> {
    user.require(Permission::RunRepairs)?;
    if req.kinds.is_empty() {
        return Err(TechcareError::validation("select at least one cleaning kind").into());
    }
    info!("  Cleanup requested by {}: {:?}", user.id, req.kinds);
    let cleaner = state.cleaner.clone();
    let summary = tokio::task::spawn_blocking(move || cleaner.clean(&req)).await?;
    Ok(Json(summary))
}

// ============================================================================
// Repair Routes
// ============================================================================

pub fn repair_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/repair/plans", post(create_repair_plan).get(list_repair_plans))
        .route(
            "/v1/repair/plans/:id",
            get(get_repair_plan).delete(delete_repair_plan),
        )
        .route(
            "/v1/repair/plans/:id/steps/:step/complete",
            post(complete_repair_step),
        )
        .route("/v1/repair/plans/:id/steps/:step/skip", post(skip_repair_step))
}

async fn create_repair_plan(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Json(req): Json<CreateRepairPlanRequest>,
) -> Result<(StatusCode, Json<RepairPlan>), ApiError> {
    user.require(Permission::RunRepairs)?;
    let report = match &req.diagnostic_id {
        Some(id) => {
            let owner = (!user.is_admin()).then_some(user.id.as_str());
            state.diagnostics.get(id, owner).await?
        }
        None => state.diagnostics.latest(&user.id).await?,
    };
    let plan = state.repairs.write().await.create(&user.id, &report)?;
    Ok((StatusCode::CREATED, Json(plan)))
}

async fn list_repair_plans(
    State(state): State<AppStateArc>,
    user: AuthUser,
) -> ApiResult<Vec<RepairPlan>> {
    user.require(Permission::RunRepairs)?;
    Ok(Json(state.repairs.read().await.list(&user.id)))
}

async fn get_repair_plan(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<RepairPlan> {
    user.require(Permission::RunRepairs)?;
    Ok(Json(state.repairs.read().await.get(&id, &user.id)?))
}

async fn delete_repair_plan(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    user.require(Permission::RunRepairs)?;
    state.repairs.write().await.delete(&id, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn complete_repair_step(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path((id, step)): Path<(String, String)>,
) -> ApiResult<StepUpdate> {
    user.require(Permission::RunRepairs)?;
    Ok(Json(
        state.repairs.write().await.complete_step(&id, &user.id, &step)?,
    ))
}

async fn skip_repair_step(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path((id, step)): Path<(String, String)>,
) -> ApiResult<StepUpdate> {
    user.require(Permission::RunRepairs)?;
    Ok(Json(
        state.repairs.write().await.skip_step(&id, &user.id, &step)?,
    ))
}

// ============================================================================
// Maintenance Routes
// ============================================================================

pub fn maintenance_routes() -> Router<AppStateArc> {
    Router::new()
        .route(
            "/v1/maintenance/plans",
            get(list_maintenance_plans).post(create_maintenance_plan),
        )
        .route(
            "/v1/maintenance/plans/:id",
            get(get_maintenance_plan)
                .put(update_maintenance_plan)
                .delete(delete_maintenance_plan),
        )
        .route("/v1/maintenance/runs", get(list_maintenance_runs))
}

async fn list_maintenance_plans(
    State(state): State<AppStateArc>,
    user: AuthUser,
) -> ApiResult<Vec<MaintenancePlan>> {
    user.require(Permission::RunRepairs)?;
    Ok(Json(state.maintenance.read().await.list(&user.id)))
}

async fn create_maintenance_plan(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Json(draft): Json<PlanDraft>,
) -> Result<(StatusCode, Json<MaintenancePlan>), ApiError> {
    user.require(Permission::RunRepairs)?;
    let plan = state
        .maintenance
        .write()
        .await
        .create(&user.id, draft, Utc::now())?;
    Ok((StatusCode::CREATED, Json(plan)))
}

async fn get_maintenance_plan(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<MaintenancePlan> {
    user.require(Permission::RunRepairs)?;
    Ok(Json(state.maintenance.read().await.get(&id, &user.id)?))
}

async fn update_maintenance_plan(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(draft): Json<PlanDraft>,
) -> ApiResult<MaintenancePlan> {
    user.require(Permission::RunRepairs)?;
    Ok(Json(state.maintenance.write().await.update(
        &id,
        &user.id,
        draft,
        Utc::now(),
    )?))
}

/// Scheduler log across all users
async fn list_maintenance_runs(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<MaintenanceRun>> {
    user.require(Permission::ViewLogs)?;
    Ok(Json(state.maintenance.read().await.recent_runs(q.limit)))
}

async fn delete_maintenance_plan(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    user.require(Permission::RunRepairs)?;
    state.maintenance.write().await.delete(&id, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Chat and Guide Routes
// ============================================================================

pub fn chat_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/guides", get(list_guides))
        .route("/v1/chat/sessions", post(create_chat_session))
        .route(
            "/v1/chat/sessions/:id",
            get(get_chat_session).delete(delete_chat_session),
        )
        .route("/v1/chat/sessions/:id/messages", post(send_chat_message))
        .route("/v1/chat/sessions/:id/guide", post(start_guide))
        .route("/v1/chat/sessions/:id/guide/next", post(guide_next))
        .route("/v1/chat/sessions/:id/guide/previous", post(guide_previous))
        .route("/v1/chat/sessions/:id/guide/complete", post(guide_complete))
}

async fn list_guides() -> Json<Vec<GuideSummary>> {
    Json(catalog().iter().map(GuideSummary::from).collect())
}

async fn create_chat_session(
    State(state): State<AppStateArc>,
    user: AuthUser,
) -> Result<(StatusCode, Json<ChatSessionCreated>), ApiError> {
    let mut sessions = state.sessions.lock().await;
    let session = sessions.create(&user.id);
    let greeting = session
        .engine
        .history()
        .last()
        .map(|m| m.text.clone())
        .unwrap_or_default();
    Ok((
        StatusCode::CREATED,
        Json(ChatSessionCreated {
            id: session.id.clone(),
            greeting,
        }),
    ))
}

async fn get_chat_session(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ChatSessionView> {
    let mut sessions = state.sessions.lock().await;
    Ok(Json(sessions.get_mut(&id, &user.id)?.view()))
}

async fn delete_chat_session(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.sessions.lock().await.remove(&id, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn send_chat_message(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<ChatMessageRequest>,
) -> ApiResult<ChatReply> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(TechcareError::validation("message must not be empty").into());
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(TechcareError::validation(format!(
            "message is longer than {} characters",
            MAX_MESSAGE_CHARS
        ))
        .into());
    }
    let mut sessions = state.sessions.lock().await;
    let session = sessions.get_mut(&id, &user.id)?;
    Ok(Json(ChatReply {
        reply: session.engine.reply(text),
    }))
}

async fn start_guide(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<StartGuideRequest>,
) -> ApiResult<GuideStatus> {
    let mut sessions = state.sessions.lock().await;
    Ok(Json(sessions.get_mut(&id, &user.id)?.start_guide(req.kind)))
}

async fn guide_next(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<GuideStatus> {
    let mut sessions = state.sessions.lock().await;
    Ok(Json(sessions.get_mut(&id, &user.id)?.guide_next()?))
}

async fn guide_previous(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<GuideStatus> {
    let mut sessions = state.sessions.lock().await;
    Ok(Json(sessions.get_mut(&id, &user.id)?.guide_previous()?))
}

async fn guide_complete(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<GuideStatus> {
    let mut sessions = state.sessions.lock().await;
    Ok(Json(sessions.get_mut(&id, &user.id)?.guide_complete()?))
}

// ============================================================================
// Admin Routes
// ============================================================================

pub fn admin_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/admin/users", get(list_users))
        .route("/v1/admin/users/:id", put(update_user))
        .route("/v1/admin/diagnostics", get(all_diagnostics))
}

async fn list_users(State(state): State<AppStateArc>, user: AuthUser) -> ApiResult<Vec<UserView>> {
    user.require(Permission::ManageUsers)?;
    Ok(Json(state.users.read().await.list()))
}

async fn update_user(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<UserView> {
    user.require(Permission::ManageUsers)?;
    let view = state
        .users
        .write()
        .await
        .update(&id, req.role, req.active)?;
    info!("  {} updated user {}", user.id, view.username);
    Ok(Json(view))
}

async fn all_diagnostics(
    State(state): State<AppStateArc>,
    user: AuthUser,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<DiagnosticSummary>> {
    user.require(Permission::AdminAccess)?;
    let limit = state.config.diagnostics.effective_limit(q.limit);
    Ok(Json(state.diagnostics.all(limit).await))
}
