//! Retrieval of requested material from storage: staff work queues,
//! scheduled retrieval runs, status tracking and call slips.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{load_material_request, load_room, map_request_row, MaterialRequest, REQUEST_COLUMNS};
use crate::catalogue::INFORMATION_OBJECT;
use crate::error::{ResearchError, Result};
use crate::status_history::{self, MATERIAL};
use crate::types::time::{date_column, format_date, format_time, hhmm, now_timestamp, time_column, TIMESTAMP_FORMAT};
use crate::types::{MaterialRequestStatus, QueueSortField, RequestPriority, SortDirection};

/// SQL ordering weight of `mr.priority`, matching `RequestPriority::rank`.
const PRIORITY_RANK: &str =
    "CASE mr.priority WHEN 'urgent' THEN 3 WHEN 'high' THEN 2 WHEN 'normal' THEN 1 ELSE 0 END";

// Queues

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Queue {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub filter_status: Vec<MaterialRequestStatus>,
    pub filter_room_id: Option<i64>,
    pub filter_priority: Option<RequestPriority>,
    pub sort_field: QueueSortField,
    pub sort_direction: SortDirection,
    pub is_active: bool,
    pub sort_order: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewQueue {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub filter_status: Vec<MaterialRequestStatus>,
    #[serde(default)]
    pub filter_room_id: Option<i64>,
    #[serde(default)]
    pub filter_priority: Option<RequestPriority>,
    #[serde(default)]
    pub sort_field: QueueSortField,
    #[serde(default)]
    pub sort_direction: SortDirection,
    #[serde(default)]
    pub sort_order: i64,
}

/// A material request with the booking, room, reader and item it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedRequest {
    #[serde(flatten)]
    pub request: MaterialRequest,
    pub booking_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub room_id: i64,
    pub room_name: String,
    pub researcher_id: i64,
    pub researcher_name: Option<String>,
    pub item_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueCount {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub count: i64,
}

const QUEUE_COLUMNS: &str = "id, name, code, filter_status, filter_room_id, filter_priority, sort_field,
    sort_direction, is_active, sort_order, created_at";

fn map_queue_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Queue> {
    let statuses: Option<String> = row.get(3)?;
    let filter_status = statuses
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<MaterialRequestStatus>>>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(err)))?;
    Ok(Queue {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        filter_status,
        filter_room_id: row.get(4)?,
        filter_priority: row.get(5)?,
        sort_field: row.get(6)?,
        sort_direction: row.get(7)?,
        is_active: row.get(8)?,
        sort_order: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn queued_select() -> String {
    format!(
        "SELECT {REQUEST_COLUMNS}, b.booking_date, b.start_time, b.end_time, b.room_id, rm.name, b.researcher_id,
                r.first_name || ' ' || r.last_name, c.label
         FROM material_request mr
         JOIN booking b ON b.id = mr.booking_id
         JOIN reading_room rm ON rm.id = b.room_id
         LEFT JOIN researcher r ON r.id = b.researcher_id
         LEFT JOIN catalogue_entity c ON c.entity_type = '{INFORMATION_OBJECT}' AND c.entity_id = mr.object_id"
    )
}

fn map_queued_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueuedRequest> {
    Ok(QueuedRequest {
        request: map_request_row(row)?,
        booking_date: date_column(row, 18)?,
        start_time: time_column(row, 19)?,
        end_time: time_column(row, 20)?,
        room_id: row.get(21)?,
        room_name: row.get(22)?,
        researcher_id: row.get(23)?,
        researcher_name: row.get(24)?,
        item_title: row.get(25)?,
    })
}

pub fn create_queue(conn: &Connection, data: &NewQueue) -> Result<Queue> {
    let code = data.code.trim();
    if data.name.trim().is_empty() || code.is_empty() {
        return Err(ResearchError::invalid("queue name and code are required"));
    }
    if get_queue_by_code(conn, code)?.is_some() {
        return Err(ResearchError::conflict(format!("queue code '{code}' is taken")));
    }
    if let Some(room_id) = data.filter_room_id {
        load_room(conn, room_id)?;
    }
    let statuses = (!data.filter_status.is_empty()).then(|| {
        data.filter_status
            .iter()
            .map(MaterialRequestStatus::as_str)
            .collect::<Vec<_>>()
            .join(",")
    });
    conn.execute(
        "INSERT INTO request_queue (name, code, filter_status, filter_room_id, filter_priority, sort_field,
            sort_direction, is_active, sort_order, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9)",
        params![
            data.name.trim(),
            code,
            statuses,
            data.filter_room_id,
            data.filter_priority,
            data.sort_field,
            data.sort_direction,
            data.sort_order,
            now_timestamp()
        ],
    )?;
    get_queue(conn, conn.last_insert_rowid())
}

pub fn get_queue(conn: &Connection, id: i64) -> Result<Queue> {
    let sql = format!("SELECT {QUEUE_COLUMNS} FROM request_queue WHERE id = ?1");
    conn.query_row(&sql, params![id], map_queue_row)
        .optional()?
        .ok_or_else(|| ResearchError::not_found(format!("queue {id}")))
}

pub fn get_queue_by_code(conn: &Connection, code: &str) -> Result<Option<Queue>> {
    let sql = format!("SELECT {QUEUE_COLUMNS} FROM request_queue WHERE code = ?1");
    Ok(conn.query_row(&sql, params![code], map_queue_row).optional()?)
}

pub fn list_queues(conn: &Connection, active_only: bool) -> Result<Vec<Queue>> {
    let sql = format!(
        "SELECT {QUEUE_COLUMNS} FROM request_queue WHERE (?1 = 0 OR is_active = 1) ORDER BY sort_order, name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![active_only], map_queue_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// WHERE clause for a queue's filters; room and priority bind to ?1 and ?2.
fn queue_filter(queue: &Queue) -> String {
    let mut clause = String::from("(?1 IS NULL OR b.room_id = ?1) AND (?2 IS NULL OR mr.priority = ?2)");
    if !queue.filter_status.is_empty() {
        let statuses: Vec<String> = queue.filter_status.iter().map(|s| format!("'{}'", s.as_str())).collect();
        clause.push_str(&format!(" AND mr.status IN ({})", statuses.join(", ")));
    }
    clause
}

fn sort_column(field: QueueSortField) -> &'static str {
    match field {
        QueueSortField::CreatedAt => "mr.created_at",
        QueueSortField::Priority => PRIORITY_RANK,
        QueueSortField::BookingDate => "b.booking_date",
        QueueSortField::RetrievedAt => "mr.retrieved_at",
        QueueSortField::UpdatedAt => "mr.updated_at",
    }
}

/// Requests matching the queue's filters in the queue's order.
pub fn queue_requests(conn: &Connection, queue_id: i64, limit: i64, offset: i64) -> Result<Vec<QueuedRequest>> {
    let queue = get_queue(conn, queue_id)?;
    let direction = match queue.sort_direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    let sql = format!(
        "{} WHERE {} ORDER BY {} {direction}, mr.id LIMIT ?3 OFFSET ?4",
        queued_select(),
        queue_filter(&queue),
        sort_column(queue.sort_field)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![queue.filter_room_id, queue.filter_priority, limit, offset],
            map_queued_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// How many requests each active queue currently matches.
pub fn queue_counts(conn: &Connection) -> Result<Vec<QueueCount>> {
    let mut counts = Vec::new();
    for queue in list_queues(conn, true)? {
        let sql = format!(
            "SELECT COUNT(*) FROM material_request mr JOIN booking b ON b.id = mr.booking_id WHERE {}",
            queue_filter(&queue)
        );
        let count = conn.query_row(&sql, params![queue.filter_room_id, queue.filter_priority], |row| row.get(0))?;
        counts.push(QueueCount {
            id: queue.id,
            name: queue.name,
            code: queue.code,
            count,
        });
    }
    Ok(counts)
}

pub fn move_to_queue(conn: &Connection, request_id: i64, queue_id: i64) -> Result<MaterialRequest> {
    load_material_request(conn, request_id)?;
    get_queue(conn, queue_id)?;
    conn.execute(
        "UPDATE material_request SET queue_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![queue_id, now_timestamp(), request_id],
    )?;
    load_material_request(conn, request_id)
}

// Schedules

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schedule {
    pub id: i64,
    pub room_id: i64,
    pub name: String,
    /// 0 is Sunday; `None` runs every day.
    pub day_of_week: Option<u32>,
    #[serde(with = "hhmm")]
    pub retrieval_time: NaiveTime,
    pub cutoff_minutes_before: i64,
    pub max_items_per_run: i64,
    pub storage_location: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSchedule {
    pub room_id: i64,
    pub name: String,
    #[serde(default)]
    pub day_of_week: Option<u32>,
    #[serde(with = "hhmm")]
    pub retrieval_time: NaiveTime,
    #[serde(default = "default_cutoff")]
    pub cutoff_minutes_before: i64,
    #[serde(default = "default_max_items")]
    pub max_items_per_run: i64,
    #[serde(default)]
    pub storage_location: Option<String>,
}

fn default_cutoff() -> i64 {
    30
}

fn default_max_items() -> i64 {
    50
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextRun {
    pub schedule: Schedule,
    pub run_at: NaiveDateTime,
}

const SCHEDULE_COLUMNS: &str = "id, room_id, name, day_of_week, retrieval_time, cutoff_minutes_before,
    max_items_per_run, storage_location, is_active, created_at";

fn map_schedule_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Schedule> {
    Ok(Schedule {
        id: row.get(0)?,
        room_id: row.get(1)?,
        name: row.get(2)?,
        day_of_week: row.get(3)?,
        retrieval_time: time_column(row, 4)?,
        cutoff_minutes_before: row.get(5)?,
        max_items_per_run: row.get(6)?,
        storage_location: row.get(7)?,
        is_active: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub fn create_schedule(conn: &Connection, data: &NewSchedule) -> Result<Schedule> {
    load_room(conn, data.room_id)?;
    if data.name.trim().is_empty() {
        return Err(ResearchError::invalid("schedule name is required"));
    }
    if data.day_of_week.is_some_and(|d| d > 6) {
        return Err(ResearchError::invalid("day_of_week runs from 0 (Sunday) to 6"));
    }
    if data.cutoff_minutes_before < 0 || data.max_items_per_run < 1 {
        return Err(ResearchError::invalid(
            "cutoff cannot be negative and a run takes at least one item",
        ));
    }
    conn.execute(
        "INSERT INTO retrieval_schedule (room_id, name, day_of_week, retrieval_time, cutoff_minutes_before,
            max_items_per_run, storage_location, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)",
        params![
            data.room_id,
            data.name.trim(),
            data.day_of_week,
            format_time(data.retrieval_time),
            data.cutoff_minutes_before,
            data.max_items_per_run,
            data.storage_location,
            now_timestamp()
        ],
    )?;
    get_schedule(conn, conn.last_insert_rowid())
}

pub fn get_schedule(conn: &Connection, id: i64) -> Result<Schedule> {
    let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM retrieval_schedule WHERE id = ?1");
    conn.query_row(&sql, params![id], map_schedule_row)
        .optional()?
        .ok_or_else(|| ResearchError::not_found(format!("retrieval schedule {id}")))
}

pub fn schedules(conn: &Connection, room_id: i64, active_only: bool) -> Result<Vec<Schedule>> {
    let sql = format!(
        "SELECT {SCHEDULE_COLUMNS} FROM retrieval_schedule
         WHERE room_id = ?1 AND (?2 = 0 OR is_active = 1)
         ORDER BY day_of_week, retrieval_time"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![room_id, active_only], map_schedule_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// First moment strictly after `now` at which the schedule runs.
fn next_occurrence(schedule: &Schedule, now: NaiveDateTime) -> Option<NaiveDateTime> {
    (0..=7)
        .filter_map(|offset| now.date().checked_add_signed(Duration::days(offset)))
        .filter(|day| {
            schedule
                .day_of_week
                .map_or(true, |dow| day.weekday().num_days_from_sunday() == dow)
        })
        .map(|day| day.and_time(schedule.retrieval_time))
        .find(|at| *at > now)
}

/// The room's soonest upcoming retrieval run after `now`.
pub fn next_run(conn: &Connection, room_id: i64, now: NaiveDateTime) -> Result<Option<NextRun>> {
    Ok(schedules(conn, room_id, true)?
        .into_iter()
        .filter_map(|schedule| next_occurrence(&schedule, now).map(|run_at| NextRun { schedule, run_at }))
        .min_by_key(|next| next.run_at))
}

/// Requested items for bookings in the schedule's room on `date`, placed
/// before the run's cutoff. Most urgent first, then by booking start,
/// capped at the run's item limit.
pub fn requests_for_retrieval(conn: &Connection, schedule_id: i64, date: NaiveDate) -> Result<Vec<QueuedRequest>> {
    let schedule = get_schedule(conn, schedule_id)?;
    let cutoff = date.and_time(schedule.retrieval_time) - Duration::minutes(schedule.cutoff_minutes_before);
    let sql = format!(
        "{} WHERE b.room_id = ?1 AND b.booking_date = ?2 AND mr.status = 'requested' AND mr.created_at <= ?3
         ORDER BY {PRIORITY_RANK} DESC, b.start_time, mr.id
         LIMIT ?4",
        queued_select()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![
                schedule.room_id,
                format_date(date),
                cutoff.format(TIMESTAMP_FORMAT).to_string(),
                schedule.max_items_per_run
            ],
            map_queued_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// Status and details

/// Moves a request to `status`, stamping the first retrieval and return,
/// and records the change in the status trail.
pub fn update_request_status(
    conn: &Connection,
    request_id: i64,
    status: MaterialRequestStatus,
    changed_by: Option<i64>,
    notes: Option<&str>,
) -> Result<MaterialRequest> {
    let request = load_material_request(conn, request_id)?;
    if request.status == status {
        return Ok(request);
    }
    let now = now_timestamp();
    conn.execute(
        "UPDATE material_request SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status, now, request_id],
    )?;
    match status {
        MaterialRequestStatus::Retrieved if request.retrieved_at.is_none() => {
            conn.execute(
                "UPDATE material_request SET retrieved_at = ?1, retrieved_by = ?2 WHERE id = ?3",
                params![now, changed_by, request_id],
            )?;
        }
        MaterialRequestStatus::Returned if request.returned_at.is_none() => {
            conn.execute(
                "UPDATE material_request SET returned_at = ?1 WHERE id = ?2",
                params![now, request_id],
            )?;
        }
        _ => {}
    }
    status_history::record(
        conn,
        MATERIAL,
        request_id,
        Some(request.status.as_str()),
        status.as_str(),
        changed_by,
        notes,
    )?;
    log::debug!("material request {}: {} -> {}", request_id, request.status, status);
    load_material_request(conn, request_id)
}

/// Applies one status to many requests; unknown ids are skipped. Returns
/// how many requests changed.
pub fn batch_update_status(
    conn: &Connection,
    request_ids: &[i64],
    status: MaterialRequestStatus,
    changed_by: Option<i64>,
    notes: Option<&str>,
) -> Result<usize> {
    let mut updated = 0;
    for &id in request_ids {
        let before = match load_material_request(conn, id) {
            Ok(request) => request.status,
            Err(ResearchError::NotFound(_)) => continue,
            Err(err) => return Err(err),
        };
        update_request_status(conn, id, status, changed_by, notes)?;
        if before != status {
            updated += 1;
        }
    }
    Ok(updated)
}

/// Staff-entered priority and storage location; absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestDetails {
    #[serde(default)]
    pub priority: Option<RequestPriority>,
    #[serde(default)]
    pub location_code: Option<String>,
    #[serde(default)]
    pub shelf_location: Option<String>,
    #[serde(default)]
    pub box_number: Option<String>,
    #[serde(default)]
    pub folder_number: Option<String>,
    #[serde(default)]
    pub handling_instructions: Option<String>,
}

pub fn set_details(conn: &Connection, request_id: i64, details: &RequestDetails) -> Result<MaterialRequest> {
    load_material_request(conn, request_id)?;
    conn.execute(
        "UPDATE material_request SET
            priority = COALESCE(?1, priority),
            location_code = COALESCE(?2, location_code),
            shelf_location = COALESCE(?3, shelf_location),
            box_number = COALESCE(?4, box_number),
            folder_number = COALESCE(?5, folder_number),
            handling_instructions = COALESCE(?6, handling_instructions),
            updated_at = ?7
         WHERE id = ?8",
        params![
            details.priority,
            details.location_code,
            details.shelf_location,
            details.box_number,
            details.folder_number,
            details.handling_instructions,
            now_timestamp(),
            request_id
        ],
    )?;
    load_material_request(conn, request_id)
}

// Call slips

/// Everything a retrieval slip carries for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallSlip {
    pub request_id: i64,
    pub request_barcode: String,
    pub object_id: i64,
    pub item_title: String,
    pub repository_name: String,
    pub priority: String,
    pub researcher_name: Option<String>,
    pub researcher_email: Option<String>,
    pub booking_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub room_name: String,
    pub seat_number: Option<String>,
    pub location_code: Option<String>,
    pub shelf_location: Option<String>,
    pub box_number: Option<String>,
    pub folder_number: Option<String>,
    pub handling_instructions: Option<String>,
    pub notes: Option<String>,
    pub requested_at: String,
    pub printed_at: Option<String>,
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn call_slip(conn: &Connection, request_id: i64) -> Result<CallSlip> {
    let request = load_material_request(conn, request_id)?;
    let (booking_date, start_time, end_time, room_name, seat_number, researcher_name, researcher_email) = conn
        .query_row(
            "SELECT b.booking_date, b.start_time, b.end_time, rm.name, s.seat_number,
                    r.first_name || ' ' || r.last_name, r.email
             FROM booking b
             JOIN reading_room rm ON rm.id = b.room_id
             LEFT JOIN seat s ON s.id = b.seat_id
             LEFT JOIN researcher r ON r.id = b.researcher_id
             WHERE b.id = ?1",
            params![request.booking_id],
            |row| {
                Ok((
                    date_column(row, 0)?,
                    time_column(row, 1)?,
                    time_column(row, 2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        )?;
    let (item_title, repository_name) = conn
        .query_row(
            "SELECT item.label, repo.label
             FROM catalogue_entity item
             LEFT JOIN catalogue_entity repo ON repo.entity_type = 'repository' AND repo.entity_id = item.repository_id
             WHERE item.entity_type = ?1 AND item.entity_id = ?2",
            params![INFORMATION_OBJECT, request.object_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()?
        .map_or((None, None), |(title, repo)| (Some(title), repo));
    Ok(CallSlip {
        request_id,
        request_barcode: format!("REQ-{request_id:08}"),
        object_id: request.object_id,
        item_title: item_title.unwrap_or_else(|| "Untitled".into()),
        repository_name: repository_name.unwrap_or_else(|| "Archive".into()),
        priority: capitalized(request.priority.as_str()),
        researcher_name,
        researcher_email,
        booking_date,
        start_time,
        end_time,
        room_name,
        seat_number,
        location_code: request.location_code,
        shelf_location: request.shelf_location,
        box_number: request.box_number,
        folder_number: request.folder_number,
        handling_instructions: request.handling_instructions,
        notes: request.notes,
        requested_at: request.created_at,
        printed_at: request.call_slip_printed_at,
    })
}

pub fn mark_call_slip_printed(conn: &Connection, request_id: i64, printed_by: Option<i64>) -> Result<MaterialRequest> {
    load_material_request(conn, request_id)?;
    conn.execute(
        "UPDATE material_request SET call_slip_printed_at = ?1, call_slip_printed_by = ?2 WHERE id = ?3",
        params![now_timestamp(), printed_by, request_id],
    )?;
    load_material_request(conn, request_id)
}

// Statistics

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalStatistics {
    pub total_requests: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_priority: BTreeMap<String, i64>,
    pub avg_retrieval_minutes: f64,
    pub walk_in_visitors: i64,
}

fn grouped(conn: &Connection, column: &str, from: &str, to: &str) -> Result<BTreeMap<String, i64>> {
    let sql = format!(
        "SELECT mr.{column}, COUNT(*) FROM material_request mr JOIN booking b ON b.id = mr.booking_id
         WHERE b.booking_date BETWEEN ?1 AND ?2 GROUP BY mr.{column}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut counts = BTreeMap::new();
    for row in stmt.query_map(params![from, to], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))? {
        let (key, count) = row?;
        counts.insert(key, count);
    }
    Ok(counts)
}

/// Requests for bookings between `from` and `to` inclusive.
pub fn statistics(conn: &Connection, from: NaiveDate, to: NaiveDate) -> Result<RetrievalStatistics> {
    let (from, to) = (format_date(from), format_date(to));
    let by_status = grouped(conn, "status", &from, &to)?;
    let by_priority = grouped(conn, "priority", &from, &to)?;
    let avg: Option<f64> = conn.query_row(
        "SELECT AVG((julianday(mr.retrieved_at) - julianday(mr.created_at)) * 1440.0)
         FROM material_request mr JOIN booking b ON b.id = mr.booking_id
         WHERE mr.retrieved_at IS NOT NULL AND b.booking_date BETWEEN ?1 AND ?2",
        params![from, to],
        |row| row.get(0),
    )?;
    let walk_in_visitors = conn.query_row(
        "SELECT COUNT(*) FROM walk_in_visitor WHERE visit_date BETWEEN ?1 AND ?2",
        params![from, to],
        |row| row.get(0),
    )?;
    Ok(RetrievalStatistics {
        total_requests: by_status.values().sum(),
        by_status,
        by_priority,
        avg_retrieval_minutes: (avg.unwrap_or(0.0) * 10.0).round() / 10.0,
        walk_in_visitors,
    })
}
