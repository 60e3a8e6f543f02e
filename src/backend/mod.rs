//! # Backend Dispatcher
//!
//! The plugin-side entry point. A [`Backend`] owns the route table and the
//! shared handler context; requests come in through [`Backend::handle`]
//! (directly, or via the [`serve`] loop fed by a transport adapter) and always
//! leave as a [`Response`](crate::domain::Response), never as a panic or an
//! escaped error.

pub mod dispatcher;
pub mod routes;
pub mod serve;
pub mod sweep;

use std::sync::Arc;

pub use routes::{Endpoint, ROUTES};
pub use serve::{channel, serve, BackendClient, Envelope};
pub use sweep::SweepReport;

use crate::config::Config;
use crate::domain::Operation;
use crate::errors::BackendResult;
use crate::handlers::{HandlerContext, HandlerSettings};
use crate::lease::{Clock, LeaseStore, SystemClock};
use crate::observability::MetricsRecorder;
use crate::router::Router;
use crate::storage::{MemoryStorage, RoleRepository, Storage};
use crate::upstream::{CredentialUpstream, InMemoryUpstream};

/// Request dispatcher over a fixed route table
#[derive(Debug)]
pub struct Backend {
    ctx: HandlerContext,
    router: Router<Endpoint>,
}

impl Backend {
    /// Register the default routes. A route conflict is fatal.
    pub fn new(ctx: HandlerContext) -> BackendResult<Self> {
        Self::with_routes(ctx, ROUTES)
    }

    pub fn with_routes(ctx: HandlerContext, routes: &[(&str, Operation, Endpoint)]) -> BackendResult<Self> {
        let router = routes::build_router(routes)?;
        tracing::debug!(routes = router.len(), "Backend routes registered");
        Ok(Self { ctx, router })
    }

    pub fn builder() -> BackendBuilder {
        BackendBuilder::default()
    }

    /// Build a backend with limits taken from configuration
    pub fn from_config(config: &Config, upstream: Arc<dyn CredentialUpstream>) -> BackendResult<Self> {
        Self::builder()
            .upstream(upstream)
            .settings(HandlerSettings {
                upstream_timeout: config.upstream.timeout(),
                default_ttl: config.lease.default_ttl(),
                max_ttl: config.lease.max_ttl(),
            })
            .build()
    }

    pub fn context(&self) -> &HandlerContext {
        &self.ctx
    }

    pub fn leases(&self) -> &Arc<LeaseStore> {
        &self.ctx.leases
    }

    pub fn router(&self) -> &Router<Endpoint> {
        &self.router
    }
}

/// Assembles a [`Backend`], defaulting every collaborator to its in-memory
/// implementation.
#[derive(Debug, Default)]
pub struct BackendBuilder {
    clock: Option<Arc<dyn Clock>>,
    storage: Option<Arc<dyn Storage>>,
    upstream: Option<Arc<dyn CredentialUpstream>>,
    settings: HandlerSettings,
}

impl BackendBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn upstream(mut self, upstream: Arc<dyn CredentialUpstream>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn settings(mut self, settings: HandlerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> BackendResult<Backend> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let storage = self.storage.unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let upstream = self.upstream.unwrap_or_else(|| Arc::new(InMemoryUpstream::new()));

        let ctx = HandlerContext {
            leases: Arc::new(LeaseStore::new(clock)),
            roles: RoleRepository::new(Arc::clone(&storage)),
            storage,
            upstream,
            settings: self.settings,
            metrics: MetricsRecorder::new(),
        };
        Backend::new(ctx)
    }
}
