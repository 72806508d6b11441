//! Reading rooms: bookings, seats, equipment and walk-in visitors.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{NaiveDate, NaiveTime, Timelike, Utc};
use serde_json::{json, Value};

use crate::error::{ResearchError, Result};
use crate::reading_room::equipment::{self, EquipmentUpdate, NewEquipment, NewEquipmentBooking};
use crate::reading_room::seats::{self, NewSeat, SeatPreferences, SeatUpdate};
use crate::reading_room::walk_ins::{self, NewWalkIn};
use crate::reading_room::{self, NewBooking, NewRoom};
use crate::rest::extract::{Actor, ApiJson, ApiQuery};
use crate::rest::models::{
    ok, AssignSeatRequest, BulkSeatRequest, DayQuery, EquipmentAvailabilityQuery, MaintenanceRequest,
    MaterialRequestBody, MomentQuery, RangeQuery, ReasonRequest, ReturnRequest, RoomQuery, SeatAvailabilityQuery,
};
use crate::rest::{AppState, StorageBackend};
use crate::types::time::{parse_date, parse_time, today};

fn day_or_today(raw: Option<&str>) -> Result<NaiveDate> {
    raw.map(parse_date).transpose().map(|d| d.unwrap_or_else(today))
}

/// The requested moment, defaulting to the current UTC day and minute.
pub(crate) fn moment(query: &MomentQuery) -> Result<(NaiveDate, NaiveTime)> {
    let date = day_or_today(query.date.as_deref())?;
    let at = match query.time.as_deref() {
        Some(raw) => parse_time(raw)?,
        None => {
            let now = Utc::now().time();
            now.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(now)
        }
    };
    Ok((date, at))
}

fn room_id_required(query: &RoomQuery) -> Result<i64> {
    query
        .room_id
        .ok_or_else(|| ResearchError::invalid("room_id is required"))
}

pub(crate) fn range(query: &RangeQuery) -> Result<(NaiveDate, NaiveDate)> {
    let (from, to) = (parse_date(&query.from)?, parse_date(&query.to)?);
    if from > to {
        return Err(ResearchError::invalid("from must not be after to"));
    }
    Ok((from, to))
}

// Rooms

pub async fn list_rooms<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<RoomQuery>,
) -> Result<Json<Value>> {
    let active_only = query.active_only.unwrap_or(true);
    let rooms = state.storage.read(|conn| reading_room::list_rooms(conn, active_only))?;
    ok(json!({ "rooms": rooms }))
}

pub async fn create_room<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    ApiJson(data): ApiJson<NewRoom>,
) -> Result<Json<Value>> {
    let room = state.storage.write(|conn| reading_room::create_room(conn, &data))?;
    ok(json!({ "room": room }))
}

pub async fn room_bookings<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
    ApiQuery(query): ApiQuery<DayQuery>,
) -> Result<Json<Value>> {
    let date = day_or_today(query.date.as_deref())?;
    let bookings = state
        .storage
        .read(|conn| reading_room::bookings_for_day(conn, id, date))?;
    ok(json!({ "date": date, "bookings": bookings }))
}

pub async fn occupancy<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
    ApiQuery(query): ApiQuery<MomentQuery>,
) -> Result<Json<Value>> {
    let (date, at) = moment(&query)?;
    let current = state.storage.read(|conn| {
        reading_room::load_room(conn, id)?;
        seats::occupancy(conn, id, date, at)
    })?;
    ok(current)
}

pub async fn seat_map<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
    ApiQuery(query): ApiQuery<MomentQuery>,
) -> Result<Json<Value>> {
    let (date, at) = moment(&query)?;
    let map = state.storage.read(|conn| seats::seat_map(conn, id, date, at))?;
    ok(json!({ "room_id": id, "seats": map }))
}

// Bookings

pub async fn my_bookings<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
) -> Result<Json<Value>> {
    let bookings = state
        .storage
        .read(|conn| reading_room::bookings_for_researcher(conn, actor))?;
    ok(json!({ "bookings": bookings }))
}

pub async fn create_booking<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(data): ApiJson<NewBooking>,
) -> Result<Json<Value>> {
    let booking = state
        .storage
        .write(|conn| reading_room::create_booking(conn, actor, &data))?;
    ok(json!({ "id": booking.id, "booking": booking }))
}

pub async fn get_booking<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let (booking, seat, materials) = state.storage.read(|conn| {
        Ok((
            reading_room::load_booking(conn, id)?,
            seats::current_assignment(conn, id)?,
            reading_room::material_requests(conn, id)?,
        ))
    })?;
    ok(json!({ "booking": booking, "seat_assignment": seat, "materials": materials }))
}

pub async fn confirm<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let booking = state.storage.write(|conn| reading_room::confirm_booking(conn, id))?;
    ok(json!({ "booking": booking }))
}

pub async fn cancel<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<ReasonRequest>,
) -> Result<Json<Value>> {
    let booking = state
        .storage
        .write(|conn| reading_room::cancel_booking(conn, id, req.reason.as_deref()))?;
    ok(json!({ "booking": booking }))
}

pub async fn check_in<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let booking = state.storage.write(|conn| reading_room::check_in(conn, id))?;
    ok(json!({ "booking": booking }))
}

pub async fn check_out<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let booking = state.storage.write(|conn| reading_room::check_out(conn, id))?;
    ok(json!({ "booking": booking }))
}

pub async fn materials<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let requests = state.storage.read(|conn| reading_room::material_requests(conn, id))?;
    ok(json!({ "requests": requests }))
}

pub async fn request_material<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<MaterialRequestBody>,
) -> Result<Json<Value>> {
    let request = state.storage.write(|conn| {
        reading_room::add_material_request(conn, id, req.object_id, req.notes.as_deref())
    })?;
    ok(json!({ "request": request }))
}

pub async fn assign_seat<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<AssignSeatRequest>,
) -> Result<Json<Value>> {
    let assignment = state
        .storage
        .write(|conn| seats::assign(conn, id, req.seat_id, Some(actor)))?;
    ok(json!({ "assignment": assignment }))
}

pub async fn auto_assign_seat<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(prefs): ApiJson<SeatPreferences>,
) -> Result<Json<Value>> {
    let assignment = state
        .storage
        .write(|conn| seats::auto_assign(conn, id, &prefs, Some(actor)))?
        .ok_or_else(|| ResearchError::conflict(format!("no free seat for booking {id}")))?;
    ok(json!({ "assignment": assignment }))
}

pub async fn release_seat<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let released = state.storage.write(|conn| {
        reading_room::load_booking(conn, id)?;
        seats::release(conn, id)
    })?;
    ok(json!({ "released": released }))
}

// Seats

pub async fn list_seats<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<RoomQuery>,
) -> Result<Json<Value>> {
    let room_id = room_id_required(&query)?;
    let active_only = query.active_only.unwrap_or(true);
    let found = state
        .storage
        .read(|conn| seats::list_for_room(conn, room_id, active_only))?;
    ok(json!({ "seats": found }))
}

pub async fn create_seat<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    ApiJson(data): ApiJson<NewSeat>,
) -> Result<Json<Value>> {
    let seat = state.storage.write(|conn| seats::create(conn, &data))?;
    ok(json!({ "seat": seat }))
}

pub async fn bulk_seats<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    ApiJson(req): ApiJson<BulkSeatRequest>,
) -> Result<Json<Value>> {
    let created = state.storage.write(|conn| {
        seats::bulk_create(conn, req.room_id, &req.pattern, req.seat_type, req.zone.as_deref())
    })?;
    ok(json!({ "created": created }))
}

pub async fn available_seats<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<SeatAvailabilityQuery>,
) -> Result<Json<Value>> {
    let date = parse_date(&query.date)?;
    let (start, end) = (parse_time(&query.start)?, parse_time(&query.end)?);
    let free = state
        .storage
        .read(|conn| seats::available(conn, query.room_id, date, start, end, query.seat_type))?;
    ok(json!({ "count": free.len(), "seats": free }))
}

pub async fn seat_statistics<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<Value>> {
    let (from, to) = range(&query)?;
    let stats = state
        .storage
        .read(|conn| seats::statistics(conn, query.room_id, from, to))?;
    ok(stats)
}

pub async fn update_seat<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
    ApiJson(changes): ApiJson<SeatUpdate>,
) -> Result<Json<Value>> {
    let seat = state.storage.write(|conn| seats::update(conn, id, &changes))?;
    ok(json!({ "seat": seat }))
}

pub async fn deactivate_seat<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let seat = state.storage.write(|conn| seats::deactivate(conn, id))?;
    ok(json!({ "seat": seat }))
}

// Equipment

pub async fn list_equipment<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<RoomQuery>,
) -> Result<Json<Value>> {
    let items = state.storage.read(|conn| equipment::list(conn, query.room_id))?;
    ok(json!({ "equipment": items }))
}

pub async fn create_equipment<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    ApiJson(data): ApiJson<NewEquipment>,
) -> Result<Json<Value>> {
    let item = state.storage.write(|conn| equipment::create(conn, &data))?;
    ok(json!({ "equipment": item }))
}

pub async fn available_equipment<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<EquipmentAvailabilityQuery>,
) -> Result<Json<Value>> {
    let date = parse_date(&query.date)?;
    let (start, end) = (parse_time(&query.start)?, parse_time(&query.end)?);
    let free = state.storage.read(|conn| {
        equipment::available(conn, query.room_id, query.equipment_type, date, start, end)
    })?;
    ok(json!({ "count": free.len(), "equipment": free }))
}

pub async fn equipment_types<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<RoomQuery>,
) -> Result<Json<Value>> {
    let counts = state.storage.read(|conn| equipment::type_counts(conn, query.room_id))?;
    ok(json!({ "types": counts }))
}

pub async fn equipment_schedule<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<DayQuery>,
) -> Result<Json<Value>> {
    let date = day_or_today(query.date.as_deref())?;
    let entries = state
        .storage
        .read(|conn| equipment::daily_schedule(conn, query.room_id, date))?;
    ok(json!({ "date": date, "schedule": entries }))
}

pub async fn equipment_usage<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<Value>> {
    let (from, to) = range(&query)?;
    let stats = state
        .storage
        .read(|conn| equipment::usage_stats(conn, query.room_id, from, to))?;
    ok(stats)
}

pub async fn book_equipment<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(data): ApiJson<NewEquipmentBooking>,
) -> Result<Json<Value>> {
    let booking = state.storage.write(|conn| equipment::book(conn, actor, &data))?;
    ok(json!({ "id": booking.id, "booking": booking }))
}

pub async fn equipment_checkout<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let booking = state.storage.write(|conn| equipment::checkout(conn, id))?;
    ok(json!({ "booking": booking }))
}

pub async fn equipment_return<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<ReturnRequest>,
) -> Result<Json<Value>> {
    let booking = state
        .storage
        .write(|conn| equipment::return_equipment(conn, id, req.condition, req.notes.as_deref()))?;
    ok(json!({ "booking": booking }))
}

pub async fn equipment_cancel<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let booking = state.storage.write(|conn| equipment::cancel(conn, id))?;
    ok(json!({ "booking": booking }))
}

pub async fn equipment_no_show<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let booking = state.storage.write(|conn| equipment::no_show(conn, id))?;
    ok(json!({ "booking": booking }))
}

pub async fn update_equipment<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
    ApiJson(changes): ApiJson<EquipmentUpdate>,
) -> Result<Json<Value>> {
    let item = state.storage.write(|conn| equipment::update(conn, id, &changes))?;
    ok(json!({ "equipment": item }))
}

pub async fn maintenance_history<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let entries = state.storage.read(|conn| {
        equipment::get(conn, id)?;
        equipment::maintenance_history(conn, id)
    })?;
    ok(json!({ "history": entries }))
}

pub async fn log_maintenance<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<MaintenanceRequest>,
) -> Result<Json<Value>> {
    let entry = state.storage.write(|conn| {
        equipment::log_maintenance(conn, id, req.condition, req.notes.as_deref(), Some(actor))
    })?;
    ok(json!({ "entry": entry }))
}

// Walk-ins

pub async fn current_walk_ins<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<RoomQuery>,
) -> Result<Json<Value>> {
    let room_id = room_id_required(&query)?;
    let visitors = state.storage.read(|conn| walk_ins::current(conn, room_id))?;
    ok(json!({ "count": visitors.len(), "visitors": visitors }))
}

pub async fn register_walk_in<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiJson(data): ApiJson<NewWalkIn>,
) -> Result<Json<Value>> {
    let visitor = state.storage.write(|conn| walk_ins::register(conn, &data))?;
    ok(json!({ "id": visitor.id, "visitor": visitor }))
}

pub async fn walk_in_checkout<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let visitor = state.storage.write(|conn| walk_ins::checkout(conn, id))?;
    ok(json!({ "visitor": visitor }))
}

pub async fn convert_walk_in<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let researcher = state
        .storage
        .write(|conn| walk_ins::convert_to_researcher(conn, id))?;
    ok(json!({ "researcher": researcher }))
}

#[cfg(test)]
mod tests {
    use crate::rest::handlers::test_support::TestApi;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    async fn room_with_seats(api: &TestApi) -> i64 {
        let (status, body) = api
            .post("/research/rooms", Some(1), json!({"name": "Salle Labrouste", "capacity": 4}))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let room = body["room"]["id"].as_i64().unwrap();
        let (_, body) = api
            .post(
                "/research/seats/bulk",
                Some(1),
                json!({"room_id": room, "pattern": "A1-A3", "zone": "north"}),
            )
            .await;
        assert_eq!(body["created"], 3);
        room
    }

    #[tokio::test]
    async fn booking_flow_assigns_and_frees_a_seat() {
        let api = TestApi::new();
        let room = room_with_seats(&api).await;

        let (status, body) = api
            .post(
                "/research/bookings",
                Some(7),
                json!({"room_id": room, "booking_date": "2030-05-02", "start_time": "09:00", "end_time": "12:00"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let booking = body["id"].as_i64().unwrap();

        let (status, body) = api
            .post(&format!("/research/bookings/{booking}/auto-seat"), Some(1), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let uri = format!(
            "/research/seats/available?room_id={room}&date=2030-05-02&start=10:00&end=11:00"
        );
        let (_, free) = api.get(&uri, None).await;
        assert_eq!(free["count"], 2);

        let (_, occupancy) = api
            .get(
                &format!("/research/rooms/{room}/occupancy?date=2030-05-02&time=10:30"),
                None,
            )
            .await;
        assert_eq!(occupancy["total_seats"], 3);

        api.post(&format!("/research/bookings/{booking}/confirm"), Some(1), json!({}))
            .await;
        let (status, body) = api
            .post(
                &format!("/research/bookings/{booking}/cancel"),
                Some(7),
                json!({"reason": "train strike"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["booking"]["status"], "cancelled");

        let (_, free) = api.get(&uri, None).await;
        assert_eq!(free["count"], 3);
    }

    #[tokio::test]
    async fn damaged_return_withdraws_equipment() {
        let api = TestApi::new();
        let room = room_with_seats(&api).await;
        let (status, body) = api
            .post(
                "/research/equipment",
                Some(1),
                json!({"room_id": room, "name": "Microfilm reader", "equipment_type": "microfilm_reader"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let item = body["equipment"]["id"].as_i64().unwrap();

        let (status, body) = api
            .post(
                "/research/equipment/bookings",
                Some(7),
                json!({"equipment_id": item, "booking_date": "2030-05-02", "start_time": "09:00", "end_time": "10:00"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let booking = body["id"].as_i64().unwrap();

        api.post(&format!("/research/equipment/bookings/{booking}/checkout"), Some(1), json!({}))
            .await;
        let (status, body) = api
            .post(
                &format!("/research/equipment/bookings/{booking}/return"),
                Some(1),
                json!({"condition": "damaged", "notes": "cracked lens"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (_, history) = api
            .get(&format!("/research/equipment/{item}/maintenance"), None)
            .await;
        assert_eq!(history["history"].as_array().unwrap().len(), 1);

        let (_, listed) = api.get(&format!("/research/equipment?room_id={room}"), None).await;
        let first: &Value = &listed["equipment"][0];
        assert_eq!(first["condition_status"], "needs_repair");
        assert_eq!(first["is_available"], false);
    }

    #[tokio::test]
    async fn walk_in_visit_and_conversion() {
        let api = TestApi::new();
        let room = room_with_seats(&api).await;
        let (status, body) = api
            .post(
                "/research/walk-ins",
                None,
                json!({"room_id": room, "first_name": "Jules", "last_name": "Michelet",
                       "email": "jules@history.test", "rules_acknowledged": true}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let visitor = body["id"].as_i64().unwrap();

        let (_, current) = api
            .get(&format!("/research/walk-ins?room_id={room}"), None)
            .await;
        assert_eq!(current["count"], 1);

        let (status, body) = api
            .post(&format!("/research/walk-ins/{visitor}/convert"), Some(1), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["researcher"]["status"], "pending");

        let (status, _) = api
            .post(&format!("/research/walk-ins/{visitor}/checkout"), None, json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (_, current) = api
            .get(&format!("/research/walk-ins?room_id={room}"), None)
            .await;
        assert_eq!(current["count"], 0);
    }
}
