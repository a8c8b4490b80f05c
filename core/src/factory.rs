//! Lazily built, shared `ApiClient`.
//!
//! # Design
//! The cached client sits behind a mutex that is held for the whole build,
//! so concurrent first calls to `get_client` produce exactly one instance.
//! After that the mutex only guards an `Arc` clone. `reset_client` is the
//! only way to replace the cached client.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::ApiClient;
use crate::config::{Config, ConfigProvider};
use crate::error::ApiError;
use crate::session::SessionStore;
use crate::transport::{Transport, UreqTransport};

type TransportBuilder = Box<dyn Fn(&Config) -> Box<dyn Transport> + Send + Sync>;

pub struct ClientFactory {
    config: Arc<dyn ConfigProvider>,
    session: Arc<SessionStore>,
    transport: TransportBuilder,
    cached: Mutex<Option<Arc<ApiClient>>>,
}

impl ClientFactory {
    /// Clients talk to the network through `UreqTransport`.
    pub fn new(config: Arc<dyn ConfigProvider>, session: Arc<SessionStore>) -> Self {
        Self::with_transport(config, session, |config| {
            Box::new(UreqTransport::new(config)) as Box<dyn Transport>
        })
    }

    /// Clients talk to whatever `build` returns for the current config.
    pub fn with_transport<F>(
        config: Arc<dyn ConfigProvider>,
        session: Arc<SessionStore>,
        build: F,
    ) -> Self
    where
        F: Fn(&Config) -> Box<dyn Transport> + Send + Sync + 'static,
    {
        Self {
            config,
            session,
            transport: Box::new(build),
            cached: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// The cached client, building it on first use.
    pub fn get_client(&self) -> Result<Arc<ApiClient>, ApiError> {
        let mut cached = self.cached.lock();
        if let Some(client) = cached.as_ref() {
            return Ok(Arc::clone(client));
        }
        let client = Arc::new(self.build()?);
        *cached = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Drop the cached client; the next `get_client` builds a new one.
    pub fn reset_client(&self) {
        if self.cached.lock().take().is_some() {
            tracing::info!("api client reset");
        }
    }

    pub fn reset_and_rebuild(&self) -> Result<Arc<ApiClient>, ApiError> {
        self.reset_client();
        self.get_client()
    }

    fn build(&self) -> Result<ApiClient, ApiError> {
        let config = self.config.config();
        let parsed = url::Url::parse(&config.base_url)
            .map_err(|e| ApiError::Configuration(format!("base URL {:?}: {e}", config.base_url)))?;
        if parsed.cannot_be_a_base() {
            return Err(ApiError::Configuration(format!(
                "base URL {:?} cannot be a base",
                config.base_url
            )));
        }

        tracing::info!(
            base_url = %config.base_url,
            connect_timeout_secs = config.connect_timeout_secs,
            read_timeout_secs = config.read_timeout_secs,
            write_timeout_secs = config.write_timeout_secs,
            "building api client"
        );
        Ok(ApiClient::new(
            &config.base_url,
            Arc::clone(&self.session),
            (self.transport)(&config),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;
    use crate::interceptor::tests::RecordingTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn counting_factory(config: Arc<dyn ConfigProvider>) -> (Arc<ClientFactory>, Arc<AtomicUsize>) {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let factory = ClientFactory::with_transport(
            config,
            Arc::new(SessionStore::in_memory()),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::new(RecordingTransport::answering(200, "[]")) as Box<dyn Transport>
            },
        );
        (Arc::new(factory), builds)
    }

    fn local() -> Arc<dyn ConfigProvider> {
        Arc::new(Config::new("http://localhost:8000"))
    }

    #[test]
    fn get_client_returns_cached_instance() {
        let (factory, builds) = counting_factory(local());
        let a = factory.get_client().unwrap();
        let b = factory.get_client().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_first_calls_build_once() {
        let (factory, builds) = counting_factory(local());
        let clients: Vec<Arc<ApiClient>> = (0..16)
            .map(|_| {
                let factory = Arc::clone(&factory);
                thread::spawn(move || factory.get_client().unwrap())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        for client in &clients[1..] {
            assert!(Arc::ptr_eq(&clients[0], client));
        }
    }

    #[test]
    fn reset_forces_new_instance() {
        let (factory, builds) = counting_factory(local());
        let first = factory.get_client().unwrap();
        factory.reset_client();
        let second = factory.get_client().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 2);

        let third = factory.reset_and_rebuild().unwrap();
        assert!(!Arc::ptr_eq(&second, &third));
    }

    #[test]
    fn reset_picks_up_new_configuration() {
        let base = Arc::new(Mutex::new("http://first.local:8000".to_string()));
        let source = Arc::clone(&base);
        let config = Arc::new(EnvConfig::with_lookup(move |key| {
            (key == "BACKEND_BASE_URL").then(|| source.lock().clone())
        }));
        let (factory, _) = counting_factory(config);

        assert_eq!(factory.get_client().unwrap().api().base_url(), "http://first.local:8000/");
        *base.lock() = "http://second.local:9000".to_string();
        assert_eq!(factory.get_client().unwrap().api().base_url(), "http://first.local:8000/");
        factory.reset_client();
        assert_eq!(factory.get_client().unwrap().api().base_url(), "http://second.local:9000/");
    }

    #[test]
    fn invalid_base_url_is_a_configuration_error() {
        let (factory, builds) = counting_factory(Arc::new(Config::new("not a url")));
        assert!(matches!(factory.get_client(), Err(ApiError::Configuration(_))));
        assert_eq!(builds.load(Ordering::SeqCst), 0);
        assert!(factory.cached.lock().is_none());
    }

    #[test]
    fn clients_share_the_factory_session() {
        let (factory, _) = counting_factory(local());
        let client = factory.get_client().unwrap();
        assert!(Arc::ptr_eq(client.session(), factory.session()));
    }
}
