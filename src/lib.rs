pub mod activity;
pub mod annotation;
pub mod app;
pub mod assertion;
pub mod bibliography;
pub mod catalogue;
pub mod cli;
pub mod commands;
pub mod configuration;
pub mod context;
pub mod dashboard;
pub mod entity_resolution;
pub mod error;
pub mod favorites;
pub mod graph;
pub mod notifications;
pub mod odrl;
pub mod people;
pub mod reading_room;
pub mod reproduction;
pub mod rest;
pub mod saved_search;
pub mod snapshot;
pub mod status_history;
pub mod storage;
pub mod tracing;
pub mod trust;
pub mod types;
pub mod validation;
