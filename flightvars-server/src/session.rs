use crate::registry::SubscriptionRegistry;
use crate::router::Router;
use flightvars_core::api::{ApiError, FlightVars, VarUpdateHandler, NO_SUBSCRIPTION};
use flightvars_core::codec::{
    BeginSession, Message, SubscriptionReply, SubscriptionRequest, SubscriptionStatus,
    UnsubscriptionReply, UnsubscriptionRequest, VarUpdate, VariableId,
};
use flightvars_core::{
    protocol_compatible, Connection, Result, Shutdown, PROTOCOL_VERSION, SERVER_PEER_NAME,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, instrument, warn};

/// One connected peer: the handshake, the request loop and the teardown
/// that unsubscribes everything the peer left behind.
pub(crate) struct Session {
    connection: Connection,
    peer: SocketAddr,
    peer_name: Option<String>,
    proto_ver: u16,
    router: Arc<Router>,
    registry: Arc<Mutex<SubscriptionRegistry>>,
    outbound_tx: mpsc::UnboundedSender<Message>,
    outbound_rx: mpsc::UnboundedReceiver<Message>,
    shutdown: Shutdown,
    _shutdown_complete: mpsc::UnboundedSender<()>,
    limit_connections: Arc<Semaphore>,
}

impl Session {
    pub(crate) fn new(
        connection: Connection,
        peer: SocketAddr,
        router: Arc<Router>,
        shutdown: Shutdown,
        shutdown_complete: mpsc::UnboundedSender<()>,
        limit_connections: Arc<Semaphore>,
    ) -> Session {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Session {
            connection,
            peer,
            peer_name: None,
            proto_ver: 0,
            router,
            registry: Arc::new(Mutex::new(SubscriptionRegistry::new())),
            outbound_tx,
            outbound_rx,
            shutdown,
            _shutdown_complete: shutdown_complete,
            limit_connections,
        }
    }

    #[instrument(skip(self), fields(peer = %self.peer))]
    pub(crate) async fn run(&mut self) -> Result<()> {
        if !self.handshake().await? {
            return Ok(());
        }
        let result = self.request_loop().await;
        self.unsubscribe_all();
        info!(
            "session with {} (protocol {}.{}) terminated",
            self.peer_name.as_deref().unwrap_or("unknown peer"),
            self.proto_ver >> 8,
            self.proto_ver & 0x00ff
        );
        result
    }

    /// Expect exactly one begin session message, negotiate the protocol
    /// version and reply. Returns false when the session must not proceed;
    /// no response is written in that case.
    async fn handshake(&mut self) -> Result<bool> {
        let message = tokio::select! {
            res = self.connection.read_message() => res?,
            _ = self.shutdown.recv() => return Ok(false),
        };
        match message {
            Some(Message::BeginSession(msg)) => {
                info!(
                    "new client {} with protocol {}.{}",
                    msg.pname,
                    msg.proto_ver >> 8,
                    msg.proto_ver & 0x00ff
                );
                if !protocol_compatible(msg.proto_ver) {
                    error!(
                        "rejecting session: client protocol version 0x{:04x} \
                         is incompatible with 0x{:04x}",
                        msg.proto_ver, PROTOCOL_VERSION
                    );
                    return Ok(false);
                }
                self.peer_name = Some(msg.pname);
                self.proto_ver = msg.proto_ver;
                let reply = BeginSession::new(SERVER_PEER_NAME, PROTOCOL_VERSION);
                self.connection
                    .write_message(&Message::BeginSession(reply))
                    .await?;
                Ok(true)
            }
            Some(other) => {
                error!(
                    "protocol error: unexpected message {:?} while expecting begin session",
                    other.message_type()
                );
                Ok(false)
            }
            None => {
                warn!("EOF while expecting begin session message");
                Ok(false)
            }
        }
    }

    async fn request_loop(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                res = self.connection.read_message() => {
                    let message = match res? {
                        Some(message) => message,
                        None => return Ok(()),
                    };
                    if !self.dispatch(message).await? {
                        return Ok(());
                    }
                }
                Some(update) = self.outbound_rx.recv() => {
                    self.connection.write_message(&update).await?;
                }
                _ = self.shutdown.recv() => return Ok(()),
            }
        }
    }

    /// Process one request. Returns false when the session is over.
    async fn dispatch(&mut self, message: Message) -> Result<bool> {
        debug!("received message {:?}", message);
        match message {
            Message::EndSession(msg) => {
                info!("session closed by peer ({})", msg.cause);
                Ok(false)
            }
            Message::SubscriptionRequest(req) => {
                self.handle_subscription_request(req).await?;
                Ok(true)
            }
            Message::UnsubscriptionRequest(req) => {
                self.handle_unsubscription_request(req).await?;
                Ok(true)
            }
            Message::VarUpdate(update) => {
                self.handle_var_update(update);
                Ok(true)
            }
            other => {
                warn!(
                    "protocol error: unexpected message {:?} while expecting \
                     an end session, subscription or variable update message",
                    other.message_type()
                );
                Ok(true)
            }
        }
    }

    async fn handle_subscription_request(&mut self, req: SubscriptionRequest) -> Result<()> {
        let var_id = VariableId {
            group: req.var_grp.clone(),
            name: req.var_name.clone(),
        };
        info!("processing subscription request for variable {}", var_id);
        let handler = fanout_handler(self.registry.clone(), self.outbound_tx.clone());
        let reply = match self.router.subscribe(&var_id, handler) {
            Ok(subs_id) => {
                let registered = self.registry.lock().unwrap().register(var_id.clone(), subs_id);
                match registered {
                    Ok(()) => {
                        info!("subscription {} for {} registered by master", subs_id, var_id);
                        SubscriptionReply {
                            status: SubscriptionStatus::Subscribed,
                            var_grp: req.var_grp,
                            var_name: req.var_name,
                            subs_id,
                            cause: String::new(),
                        }
                    }
                    Err(e) => {
                        // The peer subscribed to this variable twice; undo
                        // the master subscription we just created.
                        error!("cannot register subscription for {}: {}", var_id, e);
                        if let Err(e) = self.router.unsubscribe(subs_id) {
                            warn!("cannot roll back subscription {}: {}", subs_id, e);
                        }
                        SubscriptionReply {
                            status: SubscriptionStatus::ServerError,
                            var_grp: req.var_grp,
                            var_name: req.var_name,
                            subs_id: NO_SUBSCRIPTION,
                            cause: e.to_string(),
                        }
                    }
                }
            }
            Err(ApiError::NoSuchVariable(_)) => SubscriptionReply {
                status: SubscriptionStatus::NoSuchVar,
                var_grp: req.var_grp,
                var_name: req.var_name,
                subs_id: NO_SUBSCRIPTION,
                cause: format!("no such variable {} defined in this server", var_id),
            },
            Err(e) => SubscriptionReply {
                status: SubscriptionStatus::ServerError,
                var_grp: req.var_grp,
                var_name: req.var_name,
                subs_id: NO_SUBSCRIPTION,
                cause: e.to_string(),
            },
        };
        self.connection
            .write_message(&Message::SubscriptionReply(reply))
            .await?;
        Ok(())
    }

    async fn handle_unsubscription_request(&mut self, req: UnsubscriptionRequest) -> Result<()> {
        info!("processing unsubscription request for {}", req.subs_id);
        let owned = self
            .registry
            .lock()
            .unwrap()
            .contains_subscription(req.subs_id);
        let reply = if owned {
            match self.router.unsubscribe(req.subs_id) {
                Ok(()) => {
                    if let Err(e) = self.registry.lock().unwrap().unregister_by_subs(req.subs_id) {
                        warn!("cannot unregister subscription {}: {}", req.subs_id, e);
                    }
                    UnsubscriptionReply {
                        status: SubscriptionStatus::Unsubscribed,
                        subs_id: req.subs_id,
                        cause: String::new(),
                    }
                }
                Err(e) => UnsubscriptionReply {
                    status: SubscriptionStatus::ServerError,
                    subs_id: NO_SUBSCRIPTION,
                    cause: e.to_string(),
                },
            }
        } else {
            UnsubscriptionReply {
                status: SubscriptionStatus::NoSuchSubscription,
                subs_id: NO_SUBSCRIPTION,
                cause: format!("subscription {} does not belong to this session", req.subs_id),
            }
        };
        self.connection
            .write_message(&Message::UnsubscriptionReply(reply))
            .await?;
        Ok(())
    }

    fn handle_var_update(&mut self, update: VarUpdate) {
        let owned = self
            .registry
            .lock()
            .unwrap()
            .contains_subscription(update.subs_id);
        if !owned {
            warn!(
                "ignoring var update for subscription {} not owned by this session",
                update.subs_id
            );
            return;
        }
        if let Err(e) = self.router.update(update.subs_id, &update.value) {
            warn!("cannot update subscription {}: {}", update.subs_id, e);
        }
    }

    fn unsubscribe_all(&mut self) {
        let mut registry = self.registry.lock().unwrap();
        registry.for_each(|var_id, subs_id| {
            if let Err(e) = self.router.unsubscribe(subs_id) {
                warn!("cannot unsubscribe {} for {}: {}", subs_id, var_id, e);
            }
        });
        registry.clear();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.limit_connections.add_permits(1);
    }
}

/// The callback a master invokes when a subscribed variable changes. It
/// resolves the session subscription for the variable and posts the update
/// onto the session reactor; a session that is gone simply drops it.
fn fanout_handler(
    registry: Arc<Mutex<SubscriptionRegistry>>,
    outbound: mpsc::UnboundedSender<Message>,
) -> VarUpdateHandler {
    Arc::new(move |var_id, value| {
        let subs_id = match registry.lock().unwrap().subscription_for(var_id) {
            Ok(subs_id) => subs_id,
            Err(_) => {
                warn!(
                    "internal state error: a var update was notified for variable {}, \
                     but there is no subscription ID associated with it",
                    var_id
                );
                return;
            }
        };
        let message = Message::VarUpdate(VarUpdate::new(subs_id, *value));
        if outbound.send(message).is_err() {
            debug!("session is gone, dropping update for {}", var_id);
        }
    })
}
