use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use url::Url;

use crate::configuration::Configuration;
use crate::storage::Storage;

mod extract;
mod handlers;
mod models;

pub use extract::{is_authorized, Actor, API_KEY_HEADER, RESEARCHER_HEADER};

use handlers::{
    annotations, assertions, bibliographies, favorites, health, not_found, reading_room, reproductions, resolution,
    retrieval, rights, snapshots, validation, workspace,
};

/// Storage usable behind the HTTP router.
pub trait StorageBackend: Storage + Clone + Send + Sync + 'static {}

impl<T: Storage + Clone + Send + Sync + 'static> StorageBackend for T {}

/// The part of the configuration request handlers need.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_token: Option<String>,
    pub base_uri: Url,
    pub snapshot_key: String,
}

impl ApiConfig {
    pub fn from_configuration(cfg: &Configuration) -> Self {
        Self {
            api_token: cfg.api_token.clone(),
            base_uri: cfg.base_uri.clone(),
            snapshot_key: cfg.snapshot_key.clone(),
        }
    }

    /// Base URI without a trailing slash, for minting identifiers.
    pub fn base(&self) -> &str {
        self.base_uri.as_str().trim_end_matches('/')
    }
}

#[derive(Clone)]
pub struct AppState<S: Storage> {
    pub storage: S,
    pub started_at: std::time::SystemTime,
    pub config: Arc<ApiConfig>,
}

pub fn router<S: StorageBackend>(storage: S, config: ApiConfig) -> Router {
    let state = AppState {
        storage,
        started_at: std::time::SystemTime::now(),
        config: Arc::new(config),
    };

    Router::new()
        .route("/health", get(health::<S>))
        // workspace
        .route("/research/dashboard", get(workspace::dashboard::<S>))
        .route("/research/researchers", post(workspace::create_researcher::<S>))
        .route("/research/researchers/:id", get(workspace::get_researcher::<S>))
        .route("/research/projects", post(workspace::create_project::<S>))
        .route("/research/projects/:id", get(workspace::get_project::<S>))
        .route("/research/projects/:id/collaborators", post(workspace::invite::<S>))
        .route("/research/projects/:id/accept", post(workspace::accept::<S>))
        .route("/research/projects/:id/activity", get(workspace::project_activity::<S>))
        .route("/research/projects/:id/annotations", get(annotations::for_project::<S>))
        .route("/research/projects/:id/snapshots", get(snapshots::for_project::<S>))
        .route("/research/catalogue", post(workspace::upsert_entity::<S>))
        .route("/research/catalogue/search", get(workspace::search_entities::<S>))
        // annotations
        .route("/research/annotation-v2/create", post(annotations::dispatch::<S>))
        .route("/research/annotations/:id", get(annotations::get_w3c::<S>))
        .route("/research/annotations/object/:id", get(annotations::iiif_page::<S>))
        .route("/research/annotations/import/:id", post(annotations::import::<S>))
        .route("/research/annotations/target/:id/delete", post(annotations::delete_target::<S>))
        // assertions and graph
        .route("/research/assertion/create", post(assertions::create::<S>))
        .route("/research/assertions/search", get(assertions::search::<S>))
        .route("/research/assertions/:id", get(assertions::get_one::<S>))
        .route("/research/assertions/:id/update", post(assertions::update::<S>))
        .route("/research/assertions/:id/status", post(assertions::update_status::<S>))
        .route("/research/assertions/:id/evidence", post(assertions::add_evidence::<S>))
        .route("/research/assertions/:id/conflicts", get(assertions::conflicts::<S>))
        .route("/research/evidence/:id/delete", post(assertions::remove_evidence::<S>))
        .route("/research/subjects/:type/:id/assertions", get(assertions::for_subject::<S>))
        .route("/research/network-graph-data", get(assertions::graph_data::<S>))
        // entity resolution
        .route("/research/entity-resolution", get(resolution::list::<S>))
        .route("/research/entity-resolution/propose", post(resolution::propose::<S>))
        .route("/research/entity-resolution/:id", get(resolution::get_one::<S>))
        .route("/research/entity-resolution/:id/resolve", post(resolution::resolve::<S>))
        .route("/research/entity-resolution/:id/delete", post(resolution::delete::<S>))
        .route(
            "/research/entity-resolution/candidates/:type/:id",
            get(resolution::candidates::<S>),
        )
        .route("/research/entity-links/:type/:id", get(resolution::links::<S>))
        // rights and trust
        .route("/index.php/research/odrl/create", post(rights::create_policy::<S>))
        .route("/index.php/research/odrl/delete/:id", post(rights::delete_policy::<S>))
        .route("/research/odrl", get(rights::list_policies::<S>))
        .route("/research/odrl/evaluate", post(rights::evaluate::<S>))
        .route(
            "/research/source-assessment/:id",
            get(rights::assessment_report::<S>).post(rights::assess::<S>),
        )
        // validation queue
        .route("/research/validate/:id", post(validation::validate::<S>))
        .route("/research/bulk-validate", post(validation::bulk_validate::<S>))
        .route("/research/validation-queue", get(validation::queue::<S>))
        .route("/research/validation-queue/stats", get(validation::stats::<S>))
        .route("/research/extraction-jobs", post(validation::create_job::<S>))
        .route("/research/extraction-jobs/:id/results", post(validation::add_result::<S>))
        .route(
            "/research/extraction-jobs/:id/disagreements",
            get(validation::disagreements::<S>),
        )
        // collections, snapshots, saved searches
        .route("/research/collections", post(snapshots::create_collection::<S>))
        .route("/research/collections/:id", get(snapshots::get_collection::<S>))
        .route("/research/collections/:id/items", post(snapshots::add_item::<S>))
        .route("/research/collections/:id/freeze", post(snapshots::freeze::<S>))
        .route("/research/snapshots", post(snapshots::create::<S>))
        .route("/research/snapshots/compare/:a/:b", get(snapshots::compare::<S>))
        .route("/research/snapshots/:id", get(snapshots::get_one::<S>))
        .route("/research/snapshots/:id/verify", get(snapshots::verify::<S>))
        .route("/research/snapshots/:id/citation", get(snapshots::citation::<S>))
        .route("/research/snapshots/:id/archive", post(snapshots::archive::<S>))
        .route("/research/snapshots/:id/delete", post(snapshots::delete::<S>))
        .route(
            "/research/saved-searches",
            get(snapshots::list_searches::<S>).post(snapshots::save_search::<S>),
        )
        .route("/research/saved-searches/:id/delete", post(snapshots::delete_search::<S>))
        .route("/research/search-snapshot/:id", post(snapshots::search_snapshot::<S>))
        .route("/research/search-diff/:id", post(snapshots::search_diff::<S>))
        // reading room
        .route(
            "/research/rooms",
            get(reading_room::list_rooms::<S>).post(reading_room::create_room::<S>),
        )
        .route("/research/rooms/:id/bookings", get(reading_room::room_bookings::<S>))
        .route("/research/rooms/:id/occupancy", get(reading_room::occupancy::<S>))
        .route("/research/rooms/:id/seat-map", get(reading_room::seat_map::<S>))
        .route(
            "/research/bookings",
            get(reading_room::my_bookings::<S>).post(reading_room::create_booking::<S>),
        )
        .route("/research/bookings/:id", get(reading_room::get_booking::<S>))
        .route("/research/bookings/:id/confirm", post(reading_room::confirm::<S>))
        .route("/research/bookings/:id/cancel", post(reading_room::cancel::<S>))
        .route("/research/bookings/:id/check-in", post(reading_room::check_in::<S>))
        .route("/research/bookings/:id/check-out", post(reading_room::check_out::<S>))
        .route(
            "/research/bookings/:id/materials",
            get(reading_room::materials::<S>).post(reading_room::request_material::<S>),
        )
        .route("/research/bookings/:id/seat", post(reading_room::assign_seat::<S>))
        .route("/research/bookings/:id/auto-seat", post(reading_room::auto_assign_seat::<S>))
        .route("/research/bookings/:id/release-seat", post(reading_room::release_seat::<S>))
        .route(
            "/research/seats",
            get(reading_room::list_seats::<S>).post(reading_room::create_seat::<S>),
        )
        .route("/research/seats/bulk", post(reading_room::bulk_seats::<S>))
        .route("/research/seats/available", get(reading_room::available_seats::<S>))
        .route("/research/seats/statistics", get(reading_room::seat_statistics::<S>))
        .route("/research/seats/:id/update", post(reading_room::update_seat::<S>))
        .route("/research/seats/:id/deactivate", post(reading_room::deactivate_seat::<S>))
        .route(
            "/research/equipment",
            get(reading_room::list_equipment::<S>).post(reading_room::create_equipment::<S>),
        )
        .route("/research/equipment/available", get(reading_room::available_equipment::<S>))
        .route("/research/equipment/types", get(reading_room::equipment_types::<S>))
        .route("/research/equipment/schedule", get(reading_room::equipment_schedule::<S>))
        .route("/research/equipment/usage", get(reading_room::equipment_usage::<S>))
        .route("/research/equipment/bookings", post(reading_room::book_equipment::<S>))
        .route(
            "/research/equipment/bookings/:id/checkout",
            post(reading_room::equipment_checkout::<S>),
        )
        .route(
            "/research/equipment/bookings/:id/return",
            post(reading_room::equipment_return::<S>),
        )
        .route(
            "/research/equipment/bookings/:id/cancel",
            post(reading_room::equipment_cancel::<S>),
        )
        .route(
            "/research/equipment/bookings/:id/no-show",
            post(reading_room::equipment_no_show::<S>),
        )
        .route("/research/equipment/:id/update", post(reading_room::update_equipment::<S>))
        .route(
            "/research/equipment/:id/maintenance",
            get(reading_room::maintenance_history::<S>).post(reading_room::log_maintenance::<S>),
        )
        .route(
            "/research/walk-ins",
            get(reading_room::current_walk_ins::<S>).post(reading_room::register_walk_in::<S>),
        )
        .route("/research/walk-ins/:id/checkout", post(reading_room::walk_in_checkout::<S>))
        .route("/research/walk-ins/:id/convert", post(reading_room::convert_walk_in::<S>))
        // retrieval
        .route(
            "/research/retrieval/queues",
            get(retrieval::list_queues::<S>).post(retrieval::create_queue::<S>),
        )
        .route("/research/retrieval/queues/counts", get(retrieval::queue_counts::<S>))
        .route("/research/retrieval/queues/:id/requests", get(retrieval::queue_requests::<S>))
        .route("/research/retrieval/schedules", post(retrieval::create_schedule::<S>))
        .route(
            "/research/retrieval/schedules/:id/requests",
            get(retrieval::schedule_requests::<S>),
        )
        .route("/research/retrieval/statistics", get(retrieval::statistics::<S>))
        .route("/research/rooms/:id/retrieval-schedules", get(retrieval::room_schedules::<S>))
        .route("/research/rooms/:id/next-retrieval", get(retrieval::next_retrieval::<S>))
        .route("/research/material-requests/batch-status", post(retrieval::batch_status::<S>))
        .route("/research/material-requests/:id/queue", post(retrieval::move_to_queue::<S>))
        .route("/research/material-requests/:id/status", post(retrieval::update_status::<S>))
        .route("/research/material-requests/:id/details", post(retrieval::set_details::<S>))
        .route("/research/material-requests/:id/call-slip", get(retrieval::call_slip::<S>))
        .route(
            "/research/material-requests/:id/call-slip/printed",
            post(retrieval::call_slip_printed::<S>),
        )
        // bibliographies
        .route(
            "/research/bibliographies",
            get(bibliographies::list::<S>).post(bibliographies::create::<S>),
        )
        .route("/research/bibliographies/shared/:token", get(bibliographies::shared::<S>))
        .route("/research/bibliographies/:id", get(bibliographies::get_one::<S>))
        .route("/research/bibliographies/:id/update", post(bibliographies::update::<S>))
        .route("/research/bibliographies/:id/delete", post(bibliographies::delete::<S>))
        .route("/research/bibliographies/:id/entries", post(bibliographies::add_entry::<S>))
        .route(
            "/research/bibliographies/:id/entries/object",
            post(bibliographies::add_object::<S>),
        )
        .route(
            "/research/bibliographies/entries/:id/update",
            post(bibliographies::update_entry::<S>),
        )
        .route(
            "/research/bibliographies/entries/:id/delete",
            post(bibliographies::remove_entry::<S>),
        )
        .route("/research/bibliographies/:id/export", get(bibliographies::export::<S>))
        .route(
            "/research/bibliographies/:id/import/bibtex",
            post(bibliographies::import_bibtex::<S>),
        )
        .route("/research/bibliographies/:id/import/ris", post(bibliographies::import_ris::<S>))
        .route(
            "/research/bibliographies/:id/import/citation",
            post(bibliographies::import_citation::<S>),
        )
        // reproductions
        .route(
            "/research/reproductions",
            get(reproductions::mine::<S>).post(reproductions::create::<S>),
        )
        .route("/research/reproductions/pricing", get(reproductions::pricing))
        .route("/research/reproductions/statistics", get(reproductions::statistics::<S>))
        .route("/research/reproductions/:id", get(reproductions::get_one::<S>))
        .route("/research/reproductions/:id/update", post(reproductions::update::<S>))
        .route("/research/reproductions/:id/items", post(reproductions::add_item::<S>))
        .route("/research/reproductions/:id/submit", post(reproductions::submit::<S>))
        .route("/research/reproductions/:id/status", post(reproductions::update_status::<S>))
        .route("/research/reproductions/:id/payment", post(reproductions::record_payment::<S>))
        .route(
            "/research/reproductions/items/:id/update",
            post(reproductions::update_item::<S>),
        )
        .route(
            "/research/reproductions/items/:id/delete",
            post(reproductions::remove_item::<S>),
        )
        .route(
            "/research/reproductions/items/:id/complete",
            post(reproductions::complete_item::<S>),
        )
        .route("/research/admin/reproductions", get(reproductions::all::<S>))
        // notifications
        .route("/research/notifications", get(workspace::notifications::<S>))
        .route("/research/notifications/count", get(workspace::unread_count::<S>))
        .route("/research/notifications/read-all", post(workspace::mark_all_read::<S>))
        .route(
            "/research/notifications/preferences",
            get(workspace::preferences::<S>).post(workspace::update_preference::<S>),
        )
        .route("/research/notifications/:id/read", post(workspace::mark_read::<S>))
        // favorites
        .route("/favorites", get(favorites::list::<S>))
        .route(
            "/favorites/ajax/folders",
            get(favorites::folders::<S>).post(favorites::create_folder::<S>),
        )
        .route("/favorites/ajax/toggle-custom", post(favorites::toggle_custom::<S>))
        .route("/favorites/ajax/move", post(favorites::move_to_folder::<S>))
        .route("/favorites/ajax/remove", post(favorites::remove::<S>))
        .route("/favorites/ajax/notes/:id", post(favorites::notes::<S>))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            extract::require_api_token::<S>,
        ))
        .with_state(state)
}

pub async fn serve<S: StorageBackend>(
    addr: SocketAddr,
    storage: S,
    config: ApiConfig,
    shutdown: tokio_util::sync::CancellationToken,
) -> anyhow::Result<()> {
    log::info!("🌐 REST service on http://{}", addr);
    if config.api_token.is_some() {
        log::info!("🔐 API token required");
    }

    let app = router(storage, config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            log::info!("🛑 REST shutdown requested");
        })
        .await?;
    log::info!("👋 REST server exited");
    Ok(())
}
