use crate::router::Router;
use crate::session::Session;
use flightvars_core::{Connection, Result, Shutdown};
use futures::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time::{self, Duration};
use tracing::{error, info};

const MAX_CONNECTIONS: usize = 250;

struct Listener {
    listener: TcpListener,
    router: Arc<Router>,
    limit_connections: Arc<Semaphore>,
    notify_shutdown: broadcast::Sender<()>,
    shutdown_complete_rx: mpsc::UnboundedReceiver<()>,
    shutdown_complete_tx: mpsc::UnboundedSender<()>,
}

/// Serve the FlightVars protocol on the given listener until the shutdown
/// future completes, then drain the live sessions.
pub async fn run(listener: TcpListener, router: Arc<Router>, shutdown: impl Future) -> Result<()> {
    let (notify_shutdown, _) = broadcast::channel(1);
    let (shutdown_complete_tx, shutdown_complete_rx) = mpsc::unbounded_channel();

    let mut server = Listener {
        listener,
        router,
        limit_connections: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
        notify_shutdown,
        shutdown_complete_tx,
        shutdown_complete_rx,
    };

    tokio::select! {
        res = server.run() => {
            if let Err(err) = res {
                error!(cause = %err, "failed to accept");
            }
        }
        _ = shutdown => {
            info!("shutting down");
        }
    }

    let Listener {
        mut shutdown_complete_rx,
        shutdown_complete_tx,
        notify_shutdown,
        ..
    } = server;

    drop(notify_shutdown);
    drop(shutdown_complete_tx);
    let _ = shutdown_complete_rx.recv().await;
    Ok(())
}

impl Listener {
    async fn run(&mut self) -> Result<()> {
        info!("accepting connections");

        loop {
            self.limit_connections.acquire().await.forget();
            let (socket, addr) = self.accept().await?;
            let mut session = Session::new(
                Connection::new(socket),
                addr,
                self.router.clone(),
                Shutdown::new(self.notify_shutdown.subscribe()),
                self.shutdown_complete_tx.clone(),
                self.limit_connections.clone(),
            );

            tokio::spawn(async move {
                if let Err(err) = session.run().await {
                    error!(cause = ?err, "session error, peer is {}:{}", addr.ip(), addr.port());
                }
            });
        }
    }

    async fn accept(&mut self) -> Result<(TcpStream, SocketAddr)> {
        let mut backoff = 1;
        loop {
            match self.listener.accept().await {
                Ok((socket, addr)) => return Ok((socket, addr)),
                Err(err) => {
                    if backoff > 64 {
                        return Err(err.into());
                    }
                }
            }

            time::delay_for(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }
}
