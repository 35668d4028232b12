use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::interfaces::store::StorageGateway;
use crate::providers::postgrest::PostgrestGateway;
use crate::services::aggregation::AggregationService;
use crate::services::family::FamilyService;
use crate::services::ids::IdService;
use crate::services::ingest::IngestService;
use crate::services::notify::EmailNotifier;

/// Top-level handle wiring the storage gateway into the services. Constructed
/// once at process start and passed by reference to every consumer; there is
/// no implicit global.
pub struct Nestwatch {
    ids: IdService,
    aggregation: AggregationService,
    ingest: IngestService,
    family: FamilyService,
    notifier: Option<EmailNotifier>,
}

impl Nestwatch {
    pub fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn StorageGateway> = Arc::new(PostgrestGateway::from_config(&config.store)?);
        let notifier = config
            .smtp
            .as_ref()
            .map(EmailNotifier::from_config)
            .transpose()?;
        Ok(Self::from_parts(store, notifier))
    }

    pub fn from_config_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::from_file(path)?;
        Self::from_config(&config)
    }

    pub fn from_parts(store: Arc<dyn StorageGateway>, notifier: Option<EmailNotifier>) -> Self {
        Self {
            ids: IdService::new(store.clone()),
            aggregation: AggregationService::new(store.clone()),
            ingest: IngestService::new(store.clone()),
            family: FamilyService::new(store),
            notifier,
        }
    }

    pub fn ids(&self) -> &IdService {
        &self.ids
    }

    pub fn aggregation(&self) -> &AggregationService {
        &self.aggregation
    }

    pub fn ingest(&self) -> &IngestService {
        &self.ingest
    }

    pub fn family(&self) -> &FamilyService {
        &self.family
    }

    pub fn notifier(&self) -> Option<&EmailNotifier> {
        self.notifier.as_ref()
    }
}
