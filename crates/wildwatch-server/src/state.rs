//! Shared application state

use crate::artifacts::Artifacts;
use crate::camera::{Camera, CommandCamera, UnavailableCamera};
use crate::config::{ServerConfig, StoreConfig};
use crate::geo::{Geocoder, NominatimGeocoder, NoopGeocoder};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use wildwatch_classifiers::{load_config, ClassifierConfig, ClassifierRegistry};
use wildwatch_policy::{AlertDispatcher, SmsTransport, TwilioTransport};
use wildwatch_store::{JsonlStore, MemoryStore, StoreHandle};
use wildwatch_telemetry::{AuditLog, AuditSink, MetricsCollector};

/// Everything a request handler needs, cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub classifiers: ClassifierRegistry,
    pub store: StoreHandle,
    pub dispatcher: AlertDispatcher,
    pub geocoder: Arc<dyn Geocoder>,
    pub camera: Arc<dyn Camera>,
    pub artifacts: Artifacts,
    pub metrics: MetricsCollector,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Build the full service from configuration
    pub fn new(config: ServerConfig, metrics_handle: PrometheusHandle) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.geocoder.user_agent.clone())
            .build()?;

        let classifier_config = if Path::new(&config.classifiers_config).exists() {
            info!("Loading classifiers from {}", config.classifiers_config);
            load_config(&config.classifiers_config)?
        } else {
            info!(
                "Classifier config {} not found, using defaults",
                config.classifiers_config
            );
            ClassifierConfig::default()
        };
        let classifiers = ClassifierRegistry::from_config(&classifier_config, client.clone());

        let store = open_store(&config);
        let dispatcher = build_dispatcher(&config, client.clone());

        let geocoder: Arc<dyn Geocoder> = if config.geocoder.enabled {
            Arc::new(NominatimGeocoder::new(
                &config.geocoder,
                client,
                config.timeouts.geocode(),
            )?)
        } else {
            info!("Reverse geocoding disabled");
            Arc::new(NoopGeocoder)
        };

        let camera: Arc<dyn Camera> =
            match CommandCamera::from_command(&config.camera.command, config.timeouts.capture()) {
                Some(camera) => {
                    info!("Camera capture via {}", camera.name());
                    Arc::new(camera)
                }
                None => {
                    warn!("No camera command configured; capture endpoints will fail");
                    Arc::new(UnavailableCamera)
                }
            };

        let state = Self::from_parts(config, classifiers, store, dispatcher)?
            .with_geocoder(geocoder)
            .with_camera(camera)
            .with_metrics_handle(metrics_handle);
        Ok(state)
    }

    /// Assemble state around pre-built collaborators. Geocoding is off and
    /// no camera is attached until set with the builder methods.
    pub fn from_parts(
        config: ServerConfig,
        classifiers: ClassifierRegistry,
        store: StoreHandle,
        dispatcher: AlertDispatcher,
    ) -> wildwatch_core::Result<Self> {
        let artifacts = Artifacts::new(&config.paths.temp_dir, &config.paths.evidence_dir)?;
        artifacts.ensure_dirs()?;

        Ok(Self {
            config: Arc::new(config),
            classifiers,
            store,
            dispatcher,
            geocoder: Arc::new(NoopGeocoder),
            camera: Arc::new(UnavailableCamera),
            artifacts,
            metrics: MetricsCollector::new(),
            metrics_handle: None,
        })
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = geocoder;
        self
    }

    pub fn with_camera(mut self, camera: Arc<dyn Camera>) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_metrics_handle(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Phone number alerts go to
    pub fn recipient(&self) -> Option<&str> {
        self.config.sms.recipient.as_deref()
    }
}

/// Connect the configured store, degrading instead of failing startup
pub fn open_store(config: &ServerConfig) -> StoreHandle {
    let handle = match &config.store {
        StoreConfig::Memory => {
            info!("Using in-memory detection store");
            StoreHandle::connected(Arc::new(MemoryStore::new()))
        }
        StoreConfig::Jsonl { path } => match JsonlStore::open(path) {
            Ok(store) => StoreHandle::connected(Arc::new(store)),
            Err(e) => StoreHandle::degraded(format!("cannot open {}: {}", path.display(), e)),
        },
        StoreConfig::Disabled => StoreHandle::degraded("store disabled by configuration"),
    };
    handle.with_timeout(config.timeouts.store())
}

/// Twilio when configured with plausible credentials, otherwise simulated
pub fn build_dispatcher(config: &ServerConfig, client: reqwest::Client) -> AlertDispatcher {
    let mut audit = AuditLog::new(config.audit.max_events);
    if let Some(path) = &config.audit.path {
        match AuditSink::open(path) {
            Ok(sink) => {
                info!("Mirroring alert audit trail to {:?}", path);
                audit = audit.with_sink(sink);
            }
            Err(e) => warn!("Cannot open audit log {:?}: {}", path, e),
        }
    }

    let credentials = config.sms_credentials();
    let dispatcher = match (&config.sms.api_base, credentials) {
        (Some(api_base), Some(credentials)) if credentials.is_plausible() => {
            info!("Twilio transport enabled against {}", api_base);
            let transport: Arc<dyn SmsTransport> =
                Arc::new(TwilioTransport::new(credentials, client).with_api_base(api_base.clone()));
            AlertDispatcher::new(Some(transport), audit)
        }
        (_, credentials) => AlertDispatcher::from_credentials(credentials, client, audit),
    };

    if config.sms.recipient.is_none() && !dispatcher.is_simulated() {
        warn!("No ranger phone number configured; alerts will not be sent");
    }
    dispatcher.with_send_timeout(config.timeouts.send())
}
