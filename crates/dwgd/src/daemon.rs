//! Daemon lifecycle: wiring, start, and orderly stop.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use dwgd_wireguard::KernelWg;

use crate::commander::ExecCommander;
use crate::config::Config;
use crate::driver::Driver;
use crate::rootless::RootlessSymlinker;
use crate::{listener, server};

/// One running dwgd instance: the driver behind its unix socket plus the
/// optional rootless symlinker.
pub struct Dwgd {
    driver: Arc<Driver<ExecCommander, KernelWg>>,
    commander: ExecCommander,
    symlinker: Option<RootlessSymlinker<ExecCommander>>,
    shutdown_tx: watch::Sender<bool>,
    server: Option<JoinHandle<()>>,
}

impl Dwgd {
    /// Wires up the daemon from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the state database cannot be opened or, with
    /// rootless compatibility on, `nsenter` is missing.
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let commander = ExecCommander::new();
        let driver = Arc::new(Driver::new(&config.db, commander, KernelWg::new()).await?);

        let symlinker = if config.rootless {
            Some(RootlessSymlinker::new(commander).await?)
        } else {
            None
        };

        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            driver,
            commander,
            symlinker,
            shutdown_tx,
            server: None,
        })
    }

    /// Binds the plugin socket, starts serving, and starts the symlinker.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        let unix_listener = listener::bind(&self.commander).await?;
        let router = server::router(self.driver.clone());
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        self.server = Some(tokio::spawn(async move {
            info!("serving on unix socket");
            let serve = axum::serve(unix_listener, router.into_make_service())
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.wait_for(|&stop| stop).await;
                });
            if let Err(err) = serve.await {
                error!(error = %err, "couldn't serve on unix socket");
            }
        }));

        if let Some(symlinker) = &mut self.symlinker {
            symlinker.start()?;
        }

        Ok(())
    }

    /// Stops serving and tears everything down.
    ///
    /// Each step logs its own failure and the teardown keeps going; a
    /// half-broken environment still gets as clean as it can.
    pub async fn stop(&mut self) {
        info!("closing driver");
        self.driver.close().await;

        info!("closing listener");
        let _ = self.shutdown_tx.send(true);
        if let Some(server) = self.server.take() {
            let _ = server.await;
        }
        listener::cleanup(&self.commander).await;

        match &mut self.symlinker {
            Some(symlinker) => {
                info!("closing symlinker");
                symlinker.stop().await;
            }
            None => info!("symlinker not set, skipping close"),
        }
    }
}
