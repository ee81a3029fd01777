//! HTTP server component.
//!
//! # Responsibilities
//! - Bind the listener when the lifecycle starts (traffic only when ready)
//! - Serve the aggregated router as a supervised background task
//! - Graceful shutdown on stop: stop accepting, drain, then return
//!
//! # Design Decisions
//! - The start hook returns as soon as the socket is bound; a bind failure
//!   fails startup, a later serve failure is reported through the supervisor
//! - Stop waits for in-flight requests until the shared deadline

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::container::{BoxError, ProvideContext, ProviderRegistry};
use crate::http::router::AppRouter;
use crate::lifecycle::{Hook, HookContext, Shutdown};

/// HTTP server bound to the configured address.
///
/// Cloning is cheap; every clone controls the same listener.
#[derive(Clone)]
pub struct HttpServer {
    router: AppRouter,
    bind_address: String,
    shutdown: Arc<Shutdown>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
    local_addr: Arc<OnceLock<SocketAddr>>,
}

impl HttpServer {
    pub fn new(router: AppRouter, bind_address: impl Into<String>) -> Self {
        Self {
            router,
            bind_address: bind_address.into(),
            shutdown: Arc::new(Shutdown::new()),
            task: Arc::new(Mutex::new(None)),
            local_addr: Arc::new(OnceLock::new()),
        }
    }

    /// Address the listener actually bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Bind and launch the serve loop under the lifecycle's supervisor.
    pub async fn start(&self, ctx: &HookContext) -> Result<(), BoxError> {
        let listener = TcpListener::bind(&self.bind_address).await?;
        let addr = listener.local_addr()?;
        let _ = self.local_addr.set(addr);

        let app = self
            .router
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let shutdown = self.shutdown.wait();

        let handle = ctx.supervisor().spawn("http-server", async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
                .map_err(BoxError::from)
        });
        *self.task.lock().await = Some(handle);

        tracing::info!(address = %addr, "HTTP server started");
        Ok(())
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn stop(&self) -> Result<(), BoxError> {
        tracing::info!("Shutting down HTTP server");
        self.shutdown.trigger();

        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            handle.await?;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Start/stop hook driving this server.
    pub fn hook(&self) -> Hook {
        let (starting, stopping) = (self.clone(), self.clone());
        Hook::new("http-server")
            .on_start(move |ctx| async move { starting.start(&ctx).await })
            .on_stop(move |_| async move { stopping.stop().await })
    }
}

/// Register the server and the step that attaches its hook.
///
/// The hook is attached by an invoke step, so the listener starts after every
/// component's start hook.
pub fn module(registry: &mut ProviderRegistry) {
    registry.provide(|(config, router): (Arc<AppConfig>, Arc<AppRouter>), _| {
        Ok(HttpServer::new(
            router.as_ref().clone(),
            config.http.bind_address.clone(),
        ))
    });
    registry.invoke(|server: Arc<HttpServer>, ctx: &mut ProvideContext<'_>| {
        ctx.append(server.hook());
        Ok(())
    });
}
