//! Visitor flow services

pub mod directory;
pub mod flow;
pub mod formatting;
pub mod images;
pub mod preview;
pub mod visitors;

use std::sync::Arc;

use crate::{config::AppConfig, repository::VisitorApi};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub directory: directory::DirectoryService,
    pub images: images::ImageResolver,
    pub preview: preview::PreviewService,
    pub flows: flow::FlowService,
    pub visitors: visitors::VisitorsService,
}

impl Services {
    /// Wire all services onto one visitor API client
    pub fn new(config: &AppConfig, api: Arc<dyn VisitorApi>) -> Self {
        let directory = directory::DirectoryService::new(api.clone());
        let images = images::ImageResolver::new(api.clone(), &config.server.public_url);
        let preview =
            preview::PreviewService::new(api.clone(), directory.clone(), images.clone());

        Self {
            flows: flow::FlowService::new(&config.flow, api.clone(), preview.clone()),
            visitors: visitors::VisitorsService::new(api, directory.clone()),
            directory,
            images,
            preview,
        }
    }
}
