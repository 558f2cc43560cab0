//! REST handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use voxgate_call_engine::DashboardEvent;

use crate::error::ApiError;
use crate::state::ConsoleState;

const DEFAULT_CALL_LIMIT: i64 = 50;

/// `GET /agents`
pub async fn list_agents(State(state): State<ConsoleState>) -> Json<Value> {
    let agents: Vec<Value> = state
        .registry
        .list()
        .iter()
        .map(|a| {
            json!({
                "name": a.name,
                "display_name": a.display_name,
                "description": a.description,
                "keywords": a.keywords,
                "preferred_model": a.preferred_model,
            })
        })
        .collect();
    Json(json!({ "agents": agents }))
}

/// `GET /tasks`
pub async fn list_tasks(State(state): State<ConsoleState>) -> Json<Value> {
    Json(json!({ "tasks": state.tasks.list() }))
}

/// `POST /tasks/{id}/cancel`
pub async fn cancel_task(
    State(state): State<ConsoleState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    if state.tasks.cancel(id) {
        Ok(Json(json!({ "cancelled": id })))
    } else {
        Err(ApiError::NotFound)
    }
}

/// `GET /blacklist`
pub async fn list_blacklist(
    State(state): State<ConsoleState>,
) -> Result<Json<Value>, ApiError> {
    let entries = state.store.list_blacklist().await?;
    Ok(Json(json!({ "blacklist": entries })))
}

/// Body of `POST /blacklist`
#[derive(Debug, Deserialize)]
pub struct AddBlacklistBody {
    /// Caller number to block
    pub caller_id: String,
    /// Reason shown in listings
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /blacklist`
pub async fn add_blacklist(
    State(state): State<ConsoleState>,
    Json(body): Json<AddBlacklistBody>,
) -> Result<Json<Value>, ApiError> {
    if body.caller_id.trim().is_empty() {
        return Err(ApiError::BadRequest {
            reason: "caller_id must not be empty".into(),
        });
    }
    let reason = body.reason.as_deref().unwrap_or("manual");
    state.store.add_blacklist(body.caller_id.trim(), reason).await?;
    let _ = state.events.send(DashboardEvent::BlacklistUpdated {});
    Ok(Json(json!({ "ok": true })))
}

/// `DELETE /blacklist/{caller}`
pub async fn remove_blacklist(
    State(state): State<ConsoleState>,
    Path(caller): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.store.remove_blacklist(&caller).await? {
        return Err(ApiError::NotFound);
    }
    let _ = state.events.send(DashboardEvent::BlacklistUpdated {});
    Ok(Json(json!({ "ok": true })))
}

/// `GET /whitelist`
pub async fn list_whitelist(
    State(state): State<ConsoleState>,
) -> Result<Json<Value>, ApiError> {
    let entries = state.store.list_whitelist().await?;
    Ok(Json(json!({ "whitelist": entries })))
}

/// Body of `POST /whitelist`
#[derive(Debug, Deserialize)]
pub struct AddWhitelistBody {
    /// Caller number to admit without the gate
    pub caller_id: String,
    /// Optional operator note
    #[serde(default)]
    pub note: Option<String>,
}

/// `POST /whitelist`
pub async fn add_whitelist(
    State(state): State<ConsoleState>,
    Json(body): Json<AddWhitelistBody>,
) -> Result<Json<Value>, ApiError> {
    if body.caller_id.trim().is_empty() {
        return Err(ApiError::BadRequest {
            reason: "caller_id must not be empty".into(),
        });
    }
    state
        .store
        .add_whitelist(body.caller_id.trim(), body.note.as_deref())
        .await?;
    let _ = state.events.send(DashboardEvent::WhitelistUpdated {});
    Ok(Json(json!({ "ok": true })))
}

/// `DELETE /whitelist/{caller}`
pub async fn remove_whitelist(
    State(state): State<ConsoleState>,
    Path(caller): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.store.remove_whitelist(&caller).await? {
        return Err(ApiError::NotFound);
    }
    let _ = state.events.send(DashboardEvent::WhitelistUpdated {});
    Ok(Json(json!({ "ok": true })))
}

/// Query of `GET /calls`
#[derive(Debug, Deserialize)]
pub struct ListCallsQuery {
    /// Maximum records to return
    pub limit: Option<i64>,
}

/// `GET /calls` - without logs, they can be large
pub async fn list_calls(
    State(state): State<ConsoleState>,
    Query(query): Query<ListCallsQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_CALL_LIMIT).clamp(1, 500);
    let calls: Vec<Value> = state
        .store
        .list_calls(limit)
        .await?
        .into_iter()
        .map(|c| {
            json!({
                "id": c.id,
                "caller_id": c.caller_id,
                "started_at": c.started_at,
                "ended_at": c.ended_at,
                "duration_s": c.duration_s,
                "cost_cents": c.cost_cents,
            })
        })
        .collect();
    Ok(Json(json!({ "calls": calls })))
}

/// `GET /calls/{id}` - full record with transcript and logs
pub async fn get_call(
    State(state): State<ConsoleState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let record = state.store.get_call(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(serde_json::to_value(record).unwrap_or(Value::Null)))
}
