//! Reproduction requests: researchers order copies of catalogue items,
//! staff quote, take payment and produce them.
//!
//! Costs are quotes for manual invoicing; no payment is processed here.

use std::collections::BTreeMap;

use chrono::{Datelike, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::catalogue::{self, INFORMATION_OBJECT};
use crate::error::{ResearchError, Result};
use crate::notifications;
use crate::status_history::{self, StatusChange, REPRODUCTION};
use crate::types::time::{format_date, now_timestamp, today};
use crate::types::{ColorMode, ReproductionItemStatus, ReproductionStatus, ReproductionType};

pub const DEFAULT_CURRENCY: &str = "ZAR";
pub const STATUS_NOTIFICATION: &str = "reproduction_status";

/// Dots per inch from which the high-resolution premium applies.
const HIGH_RESOLUTION_DPI: u32 = 600;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReproductionRequest {
    pub id: i64,
    pub researcher_id: i64,
    pub reference_number: String,
    pub purpose: Option<String>,
    pub intended_use: String,
    pub publication_details: Option<String>,
    pub status: ReproductionStatus,
    pub estimated_cost: Option<f64>,
    pub final_cost: Option<f64>,
    pub currency: String,
    pub payment_reference: Option<String>,
    pub payment_date: Option<String>,
    pub payment_method: Option<String>,
    pub invoice_number: Option<String>,
    pub delivery_method: String,
    pub delivery_address: Option<String>,
    pub delivery_email: Option<String>,
    pub notes: Option<String>,
    pub processed_by: Option<i64>,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReproductionItem {
    pub id: i64,
    pub request_id: i64,
    pub object_id: i64,
    pub object_title: Option<String>,
    pub reproduction_type: ReproductionType,
    pub format: String,
    pub resolution: Option<String>,
    pub color_mode: ColorMode,
    pub quantity: i64,
    pub page_range: Option<String>,
    pub special_instructions: Option<String>,
    pub status: ReproductionItemStatus,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    pub completed_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub request: ReproductionRequest,
    pub items: Vec<ReproductionItem>,
    pub status_history: Vec<StatusChange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestInput {
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub intended_use: Option<String>,
    #[serde(default)]
    pub publication_details: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub delivery_method: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub delivery_email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemInput {
    pub object_id: i64,
    #[serde(default)]
    pub reproduction_type: Option<ReproductionType>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub color_mode: Option<ColorMode>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub page_range: Option<String>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemUpdate {
    #[serde(default)]
    pub reproduction_type: Option<ReproductionType>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub color_mode: Option<ColorMode>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub page_range: Option<String>,
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub status: Option<ReproductionItemStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Payment {
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestFilter {
    #[serde(default)]
    pub status: Option<ReproductionStatus>,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_requests: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, i64>,
    pub total_revenue: f64,
    pub pending_count: i64,
}

/// Flat fee and per-unit price for one reproduction type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pricing {
    pub base: f64,
    pub per_unit: f64,
}

pub fn pricing(kind: ReproductionType) -> Pricing {
    let (base, per_unit) = match kind {
        ReproductionType::Photocopy => (2.0, 0.5),
        ReproductionType::Scan => (5.0, 1.0),
        ReproductionType::Photograph => (15.0, 5.0),
        ReproductionType::DigitalCopy => (10.0, 2.0),
        ReproductionType::Transcription => (50.0, 25.0),
        ReproductionType::Certification => (25.0, 10.0),
    };
    Pricing { base, per_unit }
}

fn dpi(resolution: &str) -> Option<u32> {
    let digits: String = resolution
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Base plus per-unit price, raised by half for colour and a quarter at
/// 600 dpi and above. Returns `(unit_price, total_price)`.
pub fn item_cost(kind: ReproductionType, color_mode: ColorMode, resolution: Option<&str>, quantity: i64) -> (f64, f64) {
    let price = pricing(kind);
    let mut total = price.base + price.per_unit * quantity as f64;
    if color_mode == ColorMode::Color {
        total *= 1.5;
    }
    if resolution.and_then(dpi).is_some_and(|d| d >= HIGH_RESOLUTION_DPI) {
        total *= 1.25;
    }
    (price.per_unit, round_cents(total))
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

const REQUEST_COLUMNS: &str = "id, researcher_id, reference_number, purpose, intended_use, publication_details, status,
    estimated_cost, final_cost, currency, payment_reference, payment_date, payment_method, invoice_number,
    delivery_method, delivery_address, delivery_email, notes, processed_by, completed_at, created_at, updated_at";

fn map_request_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReproductionRequest> {
    Ok(ReproductionRequest {
        id: row.get(0)?,
        researcher_id: row.get(1)?,
        reference_number: row.get(2)?,
        purpose: row.get(3)?,
        intended_use: row.get(4)?,
        publication_details: row.get(5)?,
        status: row.get(6)?,
        estimated_cost: row.get(7)?,
        final_cost: row.get(8)?,
        currency: row.get(9)?,
        payment_reference: row.get(10)?,
        payment_date: row.get(11)?,
        payment_method: row.get(12)?,
        invoice_number: row.get(13)?,
        delivery_method: row.get(14)?,
        delivery_address: row.get(15)?,
        delivery_email: row.get(16)?,
        notes: row.get(17)?,
        processed_by: row.get(18)?,
        completed_at: row.get(19)?,
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

fn map_item_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReproductionItem> {
    Ok(ReproductionItem {
        id: row.get(0)?,
        request_id: row.get(1)?,
        object_id: row.get(2)?,
        object_title: row.get(3)?,
        reproduction_type: row.get(4)?,
        format: row.get(5)?,
        resolution: row.get(6)?,
        color_mode: row.get(7)?,
        quantity: row.get(8)?,
        page_range: row.get(9)?,
        special_instructions: row.get(10)?,
        status: row.get(11)?,
        unit_price: row.get(12)?,
        total_price: row.get(13)?,
        completed_at: row.get(14)?,
        created_at: row.get(15)?,
    })
}

/// `REP-<year>-<5 digit sequence>`, the sequence restarting each year.
fn next_reference(conn: &Connection) -> Result<String> {
    let prefix = format!("REP-{}-", Utc::now().year());
    let last: Option<i64> = conn.query_row(
        "SELECT MAX(CAST(SUBSTR(reference_number, ?2) AS INTEGER))
         FROM reproduction_request WHERE reference_number LIKE ?1 || '%'",
        params![prefix, prefix.len() as i64 + 1],
        |row| row.get(0),
    )?;
    Ok(format!("{prefix}{:05}", last.unwrap_or(0) + 1))
}

pub fn create(conn: &Connection, researcher_id: i64, input: &RequestInput) -> Result<ReproductionRequest> {
    let reference = next_reference(conn)?;
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO reproduction_request (researcher_id, reference_number, purpose, intended_use, publication_details,
            status, currency, delivery_method, delivery_address, delivery_email, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'draft', ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            researcher_id,
            reference,
            input.purpose,
            input.intended_use.as_deref().unwrap_or("personal"),
            input.publication_details,
            input.currency.as_deref().unwrap_or(DEFAULT_CURRENCY),
            input.delivery_method.as_deref().unwrap_or("email"),
            input.delivery_address,
            input.delivery_email,
            input.notes,
            now
        ],
    )?;
    let created = get(conn, conn.last_insert_rowid())?;
    log::info!("🖨️ Reproduction request {} opened by researcher {}", created.reference_number, researcher_id);
    Ok(created)
}

pub fn get(conn: &Connection, id: i64) -> Result<ReproductionRequest> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM reproduction_request WHERE id = ?1");
    conn.query_row(&sql, params![id], map_request_row)
        .optional()?
        .ok_or_else(|| ResearchError::not_found(format!("reproduction request {id}")))
}

pub fn detail(conn: &Connection, id: i64) -> Result<RequestDetail> {
    Ok(RequestDetail {
        request: get(conn, id)?,
        items: items(conn, id)?,
        status_history: status_history::list(conn, REPRODUCTION, id)?,
    })
}

fn owned(conn: &Connection, id: i64, researcher_id: i64) -> Result<ReproductionRequest> {
    let request = get(conn, id)?;
    if request.researcher_id != researcher_id {
        return Err(ResearchError::Forbidden(format!(
            "reproduction request {id} belongs to another researcher"
        )));
    }
    Ok(request)
}

fn owned_draft(conn: &Connection, id: i64, researcher_id: i64) -> Result<ReproductionRequest> {
    let request = owned(conn, id, researcher_id)?;
    if request.status != ReproductionStatus::Draft {
        return Err(ResearchError::conflict(format!(
            "reproduction request {} is {} and can no longer be edited",
            request.reference_number, request.status
        )));
    }
    Ok(request)
}

/// A researcher's requests, newest first.
pub fn list_for_researcher(
    conn: &Connection,
    researcher_id: i64,
    status: Option<ReproductionStatus>,
) -> Result<Vec<ReproductionRequest>> {
    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM reproduction_request
         WHERE researcher_id = ?1 AND (?2 IS NULL OR status = ?2)
         ORDER BY created_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![researcher_id, status], map_request_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Staff listing; `search` matches the reference or the researcher's name or email.
pub fn list_all(conn: &Connection, filter: &RequestFilter, limit: i64, offset: i64) -> Result<Vec<ReproductionRequest>> {
    let columns = REQUEST_COLUMNS
        .split(',')
        .map(|c| format!("r.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));
    let sql = format!(
        "SELECT {columns} FROM reproduction_request r
         LEFT JOIN researcher res ON res.id = r.researcher_id
         WHERE (?1 IS NULL OR r.status = ?1)
           AND (?2 IS NULL OR r.reference_number LIKE ?2 OR res.first_name LIKE ?2
                OR res.last_name LIKE ?2 OR res.email LIKE ?2)
         ORDER BY r.created_at DESC, r.id DESC
         LIMIT ?3 OFFSET ?4"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![filter.status, search, limit, offset], map_request_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Edits a draft; absent fields are kept.
pub fn update(conn: &Connection, id: i64, researcher_id: i64, input: &RequestInput) -> Result<ReproductionRequest> {
    owned_draft(conn, id, researcher_id)?;
    conn.execute(
        "UPDATE reproduction_request SET
            purpose = COALESCE(?1, purpose),
            intended_use = COALESCE(?2, intended_use),
            publication_details = COALESCE(?3, publication_details),
            currency = COALESCE(?4, currency),
            delivery_method = COALESCE(?5, delivery_method),
            delivery_address = COALESCE(?6, delivery_address),
            delivery_email = COALESCE(?7, delivery_email),
            notes = COALESCE(?8, notes),
            updated_at = ?9
         WHERE id = ?10",
        params![
            input.purpose,
            input.intended_use,
            input.publication_details,
            input.currency,
            input.delivery_method,
            input.delivery_address,
            input.delivery_email,
            input.notes,
            now_timestamp(),
            id
        ],
    )?;
    get(conn, id)
}

// Items

pub fn items(conn: &Connection, request_id: i64) -> Result<Vec<ReproductionItem>> {
    let mut stmt = conn.prepare(
        "SELECT i.id, i.request_id, i.object_id, c.label, i.reproduction_type, i.format, i.resolution, i.color_mode,
                i.quantity, i.page_range, i.special_instructions, i.status, i.unit_price, i.total_price,
                i.completed_at, i.created_at
         FROM reproduction_item i
         LEFT JOIN catalogue_entity c ON c.entity_type = ?2 AND c.entity_id = i.object_id
         WHERE i.request_id = ?1 ORDER BY i.id",
    )?;
    let rows = stmt
        .query_map(params![request_id, INFORMATION_OBJECT], map_item_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn get_item(conn: &Connection, item_id: i64) -> Result<ReproductionItem> {
    conn.query_row(
        "SELECT i.id, i.request_id, i.object_id, c.label, i.reproduction_type, i.format, i.resolution, i.color_mode,
                i.quantity, i.page_range, i.special_instructions, i.status, i.unit_price, i.total_price,
                i.completed_at, i.created_at
         FROM reproduction_item i
         LEFT JOIN catalogue_entity c ON c.entity_type = ?2 AND c.entity_id = i.object_id
         WHERE i.id = ?1",
        params![item_id, INFORMATION_OBJECT],
        map_item_row,
    )
    .optional()?
    .ok_or_else(|| ResearchError::not_found(format!("reproduction item {item_id}")))
}

fn check_quantity(quantity: i64) -> Result<()> {
    if quantity < 1 {
        return Err(ResearchError::invalid("quantity must be at least 1"));
    }
    Ok(())
}

pub fn add_item(conn: &Connection, request_id: i64, researcher_id: i64, input: &ItemInput) -> Result<ReproductionItem> {
    owned_draft(conn, request_id, researcher_id)?;
    if catalogue::find(conn, INFORMATION_OBJECT, input.object_id)?.is_none() {
        return Err(ResearchError::not_found(format!("object {}", input.object_id)));
    }
    let quantity = input.quantity.unwrap_or(1);
    check_quantity(quantity)?;
    conn.execute(
        "INSERT INTO reproduction_item (request_id, object_id, reproduction_type, format, resolution, color_mode,
            quantity, page_range, special_instructions, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending', ?10)",
        params![
            request_id,
            input.object_id,
            input.reproduction_type.unwrap_or_default(),
            input.format.as_deref().unwrap_or("PDF"),
            input.resolution,
            input.color_mode.unwrap_or_default(),
            quantity,
            input.page_range,
            input.special_instructions,
            now_timestamp()
        ],
    )?;
    get_item(conn, conn.last_insert_rowid())
}

pub fn remove_item(conn: &Connection, item_id: i64, researcher_id: i64) -> Result<()> {
    let item = get_item(conn, item_id)?;
    owned_draft(conn, item.request_id, researcher_id)?;
    conn.execute("DELETE FROM reproduction_item WHERE id = ?1", params![item_id])?;
    Ok(())
}

/// Staff adjustment of an item's specification or progress.
pub fn update_item(conn: &Connection, item_id: i64, changes: &ItemUpdate) -> Result<ReproductionItem> {
    get_item(conn, item_id)?;
    if let Some(quantity) = changes.quantity {
        check_quantity(quantity)?;
    }
    conn.execute(
        "UPDATE reproduction_item SET
            reproduction_type = COALESCE(?1, reproduction_type),
            format = COALESCE(?2, format),
            resolution = COALESCE(?3, resolution),
            color_mode = COALESCE(?4, color_mode),
            quantity = COALESCE(?5, quantity),
            page_range = COALESCE(?6, page_range),
            special_instructions = COALESCE(?7, special_instructions),
            status = COALESCE(?8, status)
         WHERE id = ?9",
        params![
            changes.reproduction_type,
            changes.format,
            changes.resolution,
            changes.color_mode,
            changes.quantity,
            changes.page_range,
            changes.special_instructions,
            changes.status,
            item_id
        ],
    )?;
    get_item(conn, item_id)
}

pub fn complete_item(conn: &Connection, item_id: i64) -> Result<ReproductionItem> {
    get_item(conn, item_id)?;
    conn.execute(
        "UPDATE reproduction_item SET status = 'completed', completed_at = ?1 WHERE id = ?2",
        params![now_timestamp(), item_id],
    )?;
    get_item(conn, item_id)
}

/// Prices every item and stores the per-item figures. Returns the total.
pub fn calculate_costs(conn: &Connection, request_id: i64) -> Result<f64> {
    let mut total = 0.0;
    for item in items(conn, request_id)? {
        let (unit, item_total) = item_cost(
            item.reproduction_type,
            item.color_mode,
            item.resolution.as_deref(),
            item.quantity,
        );
        conn.execute(
            "UPDATE reproduction_item SET unit_price = ?1, total_price = ?2 WHERE id = ?3",
            params![unit, item_total, item.id],
        )?;
        total += item_total;
    }
    Ok(round_cents(total))
}

// Workflow

/// Moves a draft with at least one item to `submitted` and stores its quote.
pub fn submit(conn: &Connection, id: i64, researcher_id: i64) -> Result<ReproductionRequest> {
    let request = owned(conn, id, researcher_id)?;
    if request.status != ReproductionStatus::Draft {
        return Err(ResearchError::conflict(format!(
            "reproduction request {} has already been submitted",
            request.reference_number
        )));
    }
    if items(conn, id)?.is_empty() {
        return Err(ResearchError::invalid("cannot submit a reproduction request with no items"));
    }
    let estimated = calculate_costs(conn, id)?;
    conn.execute(
        "UPDATE reproduction_request SET estimated_cost = ?1 WHERE id = ?2",
        params![estimated, id],
    )?;
    update_status(conn, id, ReproductionStatus::Submitted, None, Some("Request submitted by researcher"))
}

/// Records the change in the status trail and tells the researcher.
/// Completed and cancelled requests do not move again.
pub fn update_status(
    conn: &Connection,
    id: i64,
    status: ReproductionStatus,
    changed_by: Option<i64>,
    notes: Option<&str>,
) -> Result<ReproductionRequest> {
    let request = get(conn, id)?;
    if request.status.is_final() {
        return Err(ResearchError::conflict(format!(
            "reproduction request {} is already {}",
            request.reference_number, request.status
        )));
    }
    if request.status == status {
        return Ok(request);
    }
    status_history::record(
        conn,
        REPRODUCTION,
        id,
        Some(request.status.as_str()),
        status.as_str(),
        changed_by,
        notes,
    )?;
    let now = now_timestamp();
    let completed_at = (status == ReproductionStatus::Completed).then_some(now.as_str());
    let processed_by = changed_by.filter(|_| {
        matches!(
            status,
            ReproductionStatus::Processing | ReproductionStatus::InProduction | ReproductionStatus::Completed
        )
    });
    conn.execute(
        "UPDATE reproduction_request SET status = ?1, updated_at = ?2,
            completed_at = COALESCE(?3, completed_at),
            processed_by = COALESCE(?4, processed_by)
         WHERE id = ?5",
        params![status, now, completed_at, processed_by, id],
    )?;
    notifications::notify(
        conn,
        request.researcher_id,
        STATUS_NOTIFICATION,
        &format!("Reproduction request {} is now {}", request.reference_number, status),
        notes,
        Some(&format!("/research/reproductions/{id}")),
    )?;
    log::info!(
        "🖨️ Reproduction request {}: {} -> {}",
        request.reference_number,
        request.status,
        status
    );
    get(conn, id)
}

/// `INV-<yyyymm>-<5 digit request id>`.
pub fn invoice_number(request_id: i64) -> String {
    format!("INV-{}-{:05}", Utc::now().format("%Y%m"), request_id)
}

/// Stores the payment and moves the request into production.
pub fn record_payment(
    conn: &Connection,
    id: i64,
    payment: &Payment,
    recorded_by: Option<i64>,
) -> Result<ReproductionRequest> {
    let request = get(conn, id)?;
    if request.status.is_final() || request.status == ReproductionStatus::Draft {
        return Err(ResearchError::conflict(format!(
            "reproduction request {} is {} and cannot take a payment",
            request.reference_number, request.status
        )));
    }
    if payment.amount.is_some_and(|a| a < 0.0) {
        return Err(ResearchError::invalid("payment amount cannot be negative"));
    }
    let date = payment.date.clone().unwrap_or_else(|| format_date(today()));
    conn.execute(
        "UPDATE reproduction_request SET payment_reference = ?1, payment_date = ?2, payment_method = ?3,
            final_cost = ?4, invoice_number = COALESCE(invoice_number, ?5), updated_at = ?6
         WHERE id = ?7",
        params![
            payment.reference,
            date,
            payment.method,
            payment.amount,
            invoice_number(id),
            now_timestamp(),
            id
        ],
    )?;
    update_status(conn, id, ReproductionStatus::InProduction, recorded_by, Some("Payment recorded"))
}

pub fn statistics(conn: &Connection) -> Result<Statistics> {
    let mut by_status = BTreeMap::new();
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM reproduction_request GROUP BY status")?;
    for row in stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))? {
        let (status, count) = row?;
        by_status.insert(status, count);
    }
    let mut by_type = BTreeMap::new();
    let mut stmt = conn.prepare("SELECT reproduction_type, COUNT(*) FROM reproduction_item GROUP BY reproduction_type")?;
    for row in stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))? {
        let (kind, count) = row?;
        by_type.insert(kind, count);
    }
    let total_revenue: f64 = conn.query_row(
        "SELECT COALESCE(SUM(final_cost), 0) FROM reproduction_request WHERE status = 'completed'",
        [],
        |row| row.get(0),
    )?;
    let count = |status: ReproductionStatus| by_status.get(status.as_str()).copied().unwrap_or(0);
    let pending_count = count(ReproductionStatus::Submitted) + count(ReproductionStatus::Processing);
    Ok(Statistics {
        total_requests: by_status.values().sum(),
        by_status,
        by_type,
        total_revenue: round_cents(total_revenue),
        pending_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::seed;
    use crate::storage::sqlite::test_conn;

    fn draft(conn: &Connection, researcher_id: i64) -> ReproductionRequest {
        create(
            conn,
            researcher_id,
            &RequestInput {
                purpose: Some("Thesis illustrations".into()),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn scan(conn: &Connection, request_id: i64, quantity: i64) -> ReproductionItem {
        add_item(
            conn,
            request_id,
            1,
            &ItemInput {
                object_id: 10,
                quantity: Some(quantity),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn references_count_up_within_the_year() {
        let conn = test_conn();
        let first = draft(&conn, 1);
        let second = draft(&conn, 2);
        let year = Utc::now().year();
        assert_eq!(first.reference_number, format!("REP-{year}-00001"));
        assert_eq!(second.reference_number, format!("REP-{year}-00002"));
        assert_eq!(first.status, ReproductionStatus::Draft);
        assert_eq!(first.currency, DEFAULT_CURRENCY);
        assert_eq!(first.intended_use, "personal");
    }

    #[test]
    fn prices_carry_colour_and_resolution_premiums() {
        assert_eq!(item_cost(ReproductionType::Scan, ColorMode::Grayscale, None, 10), (1.0, 15.0));
        assert_eq!(item_cost(ReproductionType::Scan, ColorMode::Color, None, 10), (1.0, 22.5));
        assert_eq!(
            item_cost(ReproductionType::Photograph, ColorMode::Color, Some("600 dpi"), 2),
            (5.0, 46.88)
        );
        assert_eq!(
            item_cost(ReproductionType::Photocopy, ColorMode::Grayscale, Some("300dpi"), 4),
            (0.5, 4.0)
        );
    }

    #[test]
    fn submit_needs_items_and_stores_the_quote() {
        let conn = test_conn();
        seed(&conn, INFORMATION_OBJECT, 10, "Survey map, 1820");
        let request = draft(&conn, 1);
        assert!(matches!(submit(&conn, request.id, 1), Err(ResearchError::InvalidInput(_))));

        let item = scan(&conn, request.id, 10);
        assert_eq!(item.object_title.as_deref(), Some("Survey map, 1820"));
        assert_eq!(item.reproduction_type, ReproductionType::Scan);
        assert_eq!(item.format, "PDF");
        add_item(
            &conn,
            request.id,
            1,
            &ItemInput {
                object_id: 10,
                reproduction_type: Some(ReproductionType::Certification),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(matches!(submit(&conn, request.id, 2), Err(ResearchError::Forbidden(_))));

        let submitted = submit(&conn, request.id, 1).unwrap();
        assert_eq!(submitted.status, ReproductionStatus::Submitted);
        assert_eq!(submitted.estimated_cost, Some(50.0));
        let priced = items(&conn, request.id).unwrap();
        assert_eq!(priced[0].total_price, Some(15.0));
        assert_eq!(priced[1].unit_price, Some(10.0));

        assert!(matches!(submit(&conn, request.id, 1), Err(ResearchError::Conflict(_))));
        assert!(matches!(remove_item(&conn, item.id, 1), Err(ResearchError::Conflict(_))));
        assert!(matches!(
            update(&conn, request.id, 1, &RequestInput::default()),
            Err(ResearchError::Conflict(_))
        ));
    }

    #[test]
    fn items_need_a_catalogued_object_and_a_positive_quantity() {
        let conn = test_conn();
        let request = draft(&conn, 1);
        let missing = ItemInput {
            object_id: 99,
            ..Default::default()
        };
        assert!(matches!(add_item(&conn, request.id, 1, &missing), Err(ResearchError::NotFound(_))));
        seed(&conn, INFORMATION_OBJECT, 10, "Survey map, 1820");
        let none = ItemInput {
            object_id: 10,
            quantity: Some(0),
            ..Default::default()
        };
        assert!(matches!(add_item(&conn, request.id, 1, &none), Err(ResearchError::InvalidInput(_))));
    }

    #[test]
    fn status_changes_are_recorded_and_final_states_stick() {
        let conn = test_conn();
        seed(&conn, INFORMATION_OBJECT, 10, "Survey map, 1820");
        let request = draft(&conn, 1);
        scan(&conn, request.id, 1);
        submit(&conn, request.id, 1).unwrap();

        let processing = update_status(&conn, request.id, ReproductionStatus::Processing, Some(7), None).unwrap();
        assert_eq!(processing.processed_by, Some(7));
        let done = update_status(&conn, request.id, ReproductionStatus::Completed, Some(8), Some("Sent")).unwrap();
        assert!(done.completed_at.is_some());
        assert_eq!(done.processed_by, Some(8));
        assert!(matches!(
            update_status(&conn, request.id, ReproductionStatus::Processing, None, None),
            Err(ResearchError::Conflict(_))
        ));

        let detail = detail(&conn, request.id).unwrap();
        let trail: Vec<_> = detail.status_history.iter().map(|c| c.new_status.as_str()).collect();
        assert_eq!(trail, vec!["completed", "processing", "submitted"]);
        assert_eq!(detail.status_history[2].old_status.as_deref(), Some("draft"));
        assert_eq!(detail.items.len(), 1);

        let notified: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM notification WHERE researcher_id = 1 AND notification_type = ?1",
                params![STATUS_NOTIFICATION],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(notified, 3);
    }

    #[test]
    fn payment_issues_an_invoice_and_starts_production() {
        let conn = test_conn();
        seed(&conn, INFORMATION_OBJECT, 10, "Survey map, 1820");
        let request = draft(&conn, 1);
        let payment = Payment {
            reference: Some("EFT-1".into()),
            amount: Some(15.0),
            ..Default::default()
        };
        assert!(matches!(
            record_payment(&conn, request.id, &payment, None),
            Err(ResearchError::Conflict(_))
        ));
        scan(&conn, request.id, 10);
        submit(&conn, request.id, 1).unwrap();

        let paid = record_payment(&conn, request.id, &payment, Some(7)).unwrap();
        assert_eq!(paid.status, ReproductionStatus::InProduction);
        assert_eq!(paid.final_cost, Some(15.0));
        assert_eq!(paid.payment_date, Some(format_date(today())));
        assert_eq!(paid.invoice_number, Some(invoice_number(request.id)));
        assert!(paid.invoice_number.unwrap().ends_with(&format!("-{:05}", request.id)));
    }

    #[test]
    fn statistics_count_pending_work_and_revenue() {
        let conn = test_conn();
        seed(&conn, INFORMATION_OBJECT, 10, "Survey map, 1820");
        let paid = draft(&conn, 1);
        scan(&conn, paid.id, 10);
        submit(&conn, paid.id, 1).unwrap();
        record_payment(
            &conn,
            paid.id,
            &Payment {
                amount: Some(15.0),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        update_status(&conn, paid.id, ReproductionStatus::Completed, None, None).unwrap();

        let waiting = draft(&conn, 1);
        scan(&conn, waiting.id, 1);
        submit(&conn, waiting.id, 1).unwrap();
        draft(&conn, 1);

        let stats = statistics(&conn).unwrap();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.pending_count, 1);
        assert_eq!(stats.total_revenue, 15.0);
        assert_eq!(stats.by_type.get("scan"), Some(&2));
        assert_eq!(stats.by_status.get("draft"), Some(&1));
    }

    #[test]
    fn staff_search_matches_reference_and_researcher() {
        let conn = test_conn();
        let ada = crate::people::fixtures::researcher(&conn, "Ada", "Lovelace");
        let other = crate::people::fixtures::researcher(&conn, "Charles", "Babbage");
        let first = draft(&conn, ada.id);
        draft(&conn, other.id);
        let by_name = RequestFilter {
            search: Some("lovelace".into()),
            ..Default::default()
        };
        let found = list_all(&conn, &by_name, 50, 0).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, first.id);
        let by_reference = RequestFilter {
            search: Some(first.reference_number.clone()),
            ..Default::default()
        };
        assert_eq!(list_all(&conn, &by_reference, 50, 0).unwrap().len(), 1);
        assert_eq!(list_all(&conn, &RequestFilter::default(), 50, 0).unwrap().len(), 2);
        assert_eq!(list_for_researcher(&conn, ada.id, Some(ReproductionStatus::Draft)).unwrap().len(), 1);
        assert!(list_for_researcher(&conn, ada.id, Some(ReproductionStatus::Submitted)).unwrap().is_empty());
    }
}
