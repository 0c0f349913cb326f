use super::engine::Engine;
use super::handle::BackendHandle;
use super::Backend;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, error};

/// Entry point for creating backends on top of one engine.
///
/// Engine setup runs at most once per `Bootstrap`, on first open; its outcome
/// is remembered so a failed setup is reported again on every later attempt.
pub struct Bootstrap {
    engine: Arc<dyn Engine>,
    setup: OnceCell<Result<(), String>>,
}

impl Bootstrap {
    pub fn new<E: Engine + 'static>(engine: E) -> Self {
        Self::from_arc(Arc::new(engine))
    }

    pub fn from_arc(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            setup: OnceCell::new(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Run engine setup if it has not run yet
    pub fn ensure_setup(&self) -> BridgeResult<()> {
        self.setup
            .get_or_init(|| {
                debug!("Running engine setup");
                let result = self.engine.setup();
                if let Err(e) = &result {
                    error!("Engine setup failed: {}", e);
                }
                result
            })
            .clone()
            .map_err(BridgeError::Bootstrap)
    }

    /// Open a new backend with the given preferred languages
    pub fn open(&self, languages: &[String]) -> BridgeResult<Backend> {
        self.ensure_setup()?;
        let handle = BackendHandle::open(Arc::clone(&self.engine), languages)?;
        Ok(Backend::from_handle(Arc::new(handle)))
    }

    /// Open a backend and apply the configured page size
    pub fn open_with_config(&self, config: &BridgeConfig) -> BridgeResult<Backend> {
        config.validate()?;
        let backend = self.open(&config.languages)?.with_recent_pages(config.recent_pages);
        if let Some(bytes) = config.page_size_bytes {
            backend.set_page_size(bytes)?;
        }
        Ok(backend)
    }
}
