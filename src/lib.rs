pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::database::store::SharedStore;
use crate::services::{
    assignment_service::AssignmentService, attempt_service::AttemptService,
    catalog_service::CatalogService, directory_service::DirectoryService,
    notification_service::{OutboxNotifier, SharedNotifier},
    question_source_service::QuestionSourceService, report_service::ReportService,
};
use crate::utils::time::SharedClock;
use reqwest::Client;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub clock: SharedClock,
    pub catalog_service: CatalogService,
    pub assignment_service: AssignmentService,
    pub attempt_service: AttemptService,
    pub report_service: ReportService,
    pub directory_service: DirectoryService,
    pub question_source: QuestionSourceService,
}

impl AppState {
    /// Wires services over the outbox notifier.
    pub fn new(store: SharedStore, clock: SharedClock, config: &Config) -> error::Result<Self> {
        let notifier: SharedNotifier = Arc::new(OutboxNotifier::new(store.clone(), clock.clone()));
        Self::with_notifier(store, clock, notifier, config)
    }

    pub fn with_notifier(
        store: SharedStore,
        clock: SharedClock,
        notifier: SharedNotifier,
        config: &Config,
    ) -> error::Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            catalog_service: CatalogService::new(store.clone(), clock.clone()),
            assignment_service: AssignmentService::new(store.clone(), clock.clone(), notifier.clone()),
            attempt_service: AttemptService::new(
                store.clone(),
                clock.clone(),
                notifier,
                config.submission_grace_seconds,
            ),
            report_service: ReportService::new(store.clone()),
            directory_service: DirectoryService::new(store.clone()),
            question_source: QuestionSourceService::new(
                config.openai_api_key.clone(),
                config.ai_model.clone(),
                config.max_generated_questions,
                http_client,
            ),
            store,
            clock,
        })
    }
}
