use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ResearchError, Result};
use crate::types::{
    EquipmentCondition, EquipmentType, ExportFormat, MaterialRequestStatus, ReproductionStatus, ReturnCondition,
    SeatType, ValidationAction,
};

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}

/// Wraps a payload in the `{"success": true, ...}` envelope. Objects are
/// merged into the envelope, anything else lands under `data`.
pub fn ok<T: Serialize>(payload: T) -> Result<Json<Value>> {
    let mut value = serde_json::to_value(payload)?;
    match value.as_object_mut() {
        Some(map) => {
            map.insert("success".into(), Value::Bool(true));
        }
        None => value = json!({ "success": true, "data": value }),
    }
    Ok(Json(value))
}

/// Decodes a dispatch payload field set into a typed request.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|err| ResearchError::invalid(err.to_string()))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest<T> {
    pub status: T,
}

#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub assertion_type: Option<crate::types::AssertionType>,
    #[serde(default)]
    pub status: Option<crate::types::AssertionStatus>,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    #[serde(default)]
    pub status: Option<crate::types::ResolutionStatus>,
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PolicyQuery {
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default)]
    pub target_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub target_type: String,
    pub target_id: i64,
    pub action: crate::types::OdrlAction,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub count: Option<f64>,
    #[serde(default)]
    pub spatial: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub action: ValidationAction,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub modified_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct BulkValidateRequest {
    pub ids: Vec<i64>,
    pub action: ValidationAction,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewJobRequest {
    #[serde(default)]
    pub project_id: Option<i64>,
    pub extraction_type: String,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotRequest {
    pub project_id: i64,
    #[serde(flatten)]
    pub snapshot: crate::snapshot::NewSnapshot,
}

#[derive(Debug, Default, Deserialize)]
pub struct FreezeRequest {
    #[serde(default)]
    pub project_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub researcher_id: i64,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "contributor".into()
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoomQuery {
    #[serde(default)]
    pub room_id: Option<i64>,
    #[serde(default)]
    pub active_only: Option<bool>,
}

/// Day and clock time for live room views; both default to now.
#[derive(Debug, Default, Deserialize)]
pub struct MomentQuery {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DayQuery {
    #[serde(default)]
    pub room_id: Option<i64>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    pub room_id: Option<i64>,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct SeatAvailabilityQuery {
    pub room_id: i64,
    pub date: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub seat_type: Option<SeatType>,
}

#[derive(Debug, Deserialize)]
pub struct EquipmentAvailabilityQuery {
    #[serde(default)]
    pub room_id: Option<i64>,
    #[serde(default)]
    pub equipment_type: Option<EquipmentType>,
    pub date: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkSeatRequest {
    pub room_id: i64,
    pub pattern: String,
    #[serde(default)]
    pub seat_type: SeatType,
    #[serde(default)]
    pub zone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignSeatRequest {
    pub seat_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MaterialRequestBody {
    pub object_id: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnRequest {
    #[serde(default)]
    pub condition: Option<ReturnCondition>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceRequest {
    pub condition: EquipmentCondition,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FolderQuery {
    #[serde(default)]
    pub folder_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FolderRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub ids: Vec<i64>,
    #[serde(default)]
    pub folder_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotesRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectFilter {
    #[serde(default)]
    pub project_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<ExportFormat>,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CitationRequest {
    pub citation: String,
}

#[derive(Debug, Deserialize)]
pub struct ObjectRequest {
    pub object_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct StatusNotesRequest<T> {
    pub status: T,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchStatusRequest {
    pub ids: Vec<i64>,
    pub status: MaterialRequestStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReproductionQuery {
    #[serde(default)]
    pub status: Option<ReproductionStatus>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OffsetQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct QueueMoveRequest {
    pub queue_id: i64,
}
