use crate::db::SubscriptionDb;
use crate::error::ClientError;
use crate::requests::{
    completion_slot, CompletionSlot, PendingSubscription, PendingUnsubscription, RequestPool,
};
use flightvars_core::api::{SubscriptionId, VarUpdateHandler};
use flightvars_core::codec::{
    BeginSession, EndSession, Message, SubscriptionReply, SubscriptionRequest, SubscriptionStatus,
    UnsubscriptionReply, UnsubscriptionRequest, VarUpdate, VariableId, VariableValue,
};
use flightvars_core::{protocol_compatible, Connection, PROTOCOL_VERSION};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::runtime;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default deadline for every public API call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Invoked on the reactor thread for failures of asynchronous operations
/// that have no caller to report to (lost writes, unknown inbound ids).
pub type ErrorHandler = Arc<dyn Fn(&ClientError) + Send + Sync>;

enum Command {
    Subscribe {
        var_id: VariableId,
        handler: VarUpdateHandler,
        slot: CompletionSlot<SubscriptionId>,
    },
    Unsubscribe {
        virtual_subs_id: SubscriptionId,
        slot: CompletionSlot<()>,
    },
    Update {
        virtual_subs_id: SubscriptionId,
        value: VariableValue,
        slot: CompletionSlot<()>,
    },
    Close {
        slot: CompletionSlot<()>,
    },
}

/// A FlightVars client.
///
/// It owns one TCP connection to the server and a reactor thread where all
/// socket IO and subscription bookkeeping happen; the public methods post a
/// command there and block until it completes or the request timeout
/// expires. Any number of subscriptions per variable are served over a
/// single server-side subscription. Update handlers run on the reactor
/// thread and must not block it.
pub struct FlightVarsClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    reactor: Option<thread::JoinHandle<()>>,
    request_timeout: Duration,
}

impl FlightVarsClient {
    /// Connect and handshake with the server at `addr`.
    pub fn connect(client_name: &str, addr: &str) -> Result<FlightVarsClient, ClientError> {
        FlightVarsClient::connect_with(client_name, addr, DEFAULT_REQUEST_TIMEOUT, None)
    }

    pub fn connect_with(
        client_name: &str,
        addr: &str,
        request_timeout: Duration,
        error_handler: Option<ErrorHandler>,
    ) -> Result<FlightVarsClient, ClientError> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let client_name = client_name.to_string();
        let addr = addr.to_string();

        info!("starting FlightVars client initialization");
        let reactor = thread::Builder::new()
            .name("flightvars-client".to_string())
            .spawn(move || {
                let mut rt = match runtime::Builder::new()
                    .basic_scheduler()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(ClientError::communication(format!(
                            "cannot start client reactor: {}",
                            e
                        ))));
                        return;
                    }
                };
                rt.block_on(async move {
                    let connection = match handshake(&client_name, &addr).await {
                        Ok(connection) => connection,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));
                    let mut reactor = Reactor {
                        connection,
                        cmd_rx,
                        db: SubscriptionDb::new(),
                        pool: RequestPool::new(),
                        error_handler,
                    };
                    reactor.run().await;
                });
            })
            .map_err(|e| ClientError::communication(format!("cannot spawn reactor: {}", e)))?;

        match ready_rx.recv_timeout(request_timeout) {
            Ok(Ok(())) => {
                info!("FlightVars client initialization completed");
                Ok(FlightVarsClient {
                    cmd_tx,
                    reactor: Some(reactor),
                    request_timeout,
                })
            }
            Ok(Err(e)) => {
                let _ = reactor.join();
                Err(e)
            }
            Err(_) => Err(ClientError::RequestTimeout),
        }
    }

    /// Subscribe to a variable. Several subscriptions to the same variable
    /// share one server-side subscription; each returns its own identifier
    /// and its handler is invoked on every update, in subscription order.
    pub fn subscribe(
        &self,
        var_id: &VariableId,
        handler: VarUpdateHandler,
    ) -> Result<SubscriptionId, ClientError> {
        let (slot, wait) = completion_slot();
        self.post(Command::Subscribe {
            var_id: var_id.clone(),
            handler,
            slot,
        })?;
        wait.wait(self.request_timeout)
    }

    /// Drop the subscription with the given identifier. The server-side
    /// subscription is released when the last one for its variable goes.
    pub fn unsubscribe(&self, virtual_subs_id: SubscriptionId) -> Result<(), ClientError> {
        let (slot, wait) = completion_slot();
        self.post(Command::Unsubscribe {
            virtual_subs_id,
            slot,
        })?;
        wait.wait(self.request_timeout)
    }

    /// Write a new value for the variable behind the given subscription.
    /// Delivery is best effort: the server sends no acknowledgement.
    pub fn update(
        &self,
        virtual_subs_id: SubscriptionId,
        value: VariableValue,
    ) -> Result<(), ClientError> {
        let (slot, wait) = completion_slot();
        self.post(Command::Update {
            virtual_subs_id,
            value,
            slot,
        })?;
        wait.wait(self.request_timeout)
    }

    /// End the session and stop the reactor. Pending requests complete
    /// with a communication error.
    pub fn close(mut self) -> Result<(), ClientError> {
        self.shutdown()
    }

    fn post(&self, command: Command) -> Result<(), ClientError> {
        self.cmd_tx
            .send(command)
            .map_err(|_| ClientError::communication("the client reactor is gone"))
    }

    fn shutdown(&mut self) -> Result<(), ClientError> {
        let reactor = match self.reactor.take() {
            Some(reactor) => reactor,
            None => return Ok(()),
        };
        info!("starting FlightVars client shutdown");
        let (slot, wait) = completion_slot();
        if self.cmd_tx.send(Command::Close { slot }).is_ok() {
            let _ = wait.wait(self.request_timeout);
        }
        let result = reactor
            .join()
            .map_err(|_| ClientError::communication("the client reactor panicked"));
        info!("FlightVars client shutdown completed");
        result
    }
}

impl Drop for FlightVarsClient {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

async fn handshake(client_name: &str, addr: &str) -> Result<Connection, ClientError> {
    let socket = TcpStream::connect(addr)
        .await
        .map_err(ClientError::communication)?;
    let mut connection = Connection::new(socket);
    connection
        .write_message(&Message::BeginSession(BeginSession::new(
            client_name,
            PROTOCOL_VERSION,
        )))
        .await
        .map_err(ClientError::communication)?;
    match connection
        .read_message()
        .await
        .map_err(ClientError::communication)?
    {
        Some(Message::BeginSession(reply)) => {
            if !protocol_compatible(reply.proto_ver) {
                return Err(ClientError::Communication(format!(
                    "server protocol version 0x{:04x} is incompatible with 0x{:04x}",
                    reply.proto_ver, PROTOCOL_VERSION
                )));
            }
            info!(
                "connected to {} with protocol {}.{}",
                reply.pname,
                reply.proto_ver >> 8,
                reply.proto_ver & 0x00ff
            );
            Ok(connection)
        }
        Some(other) => Err(ClientError::Communication(format!(
            "unexpected message {:?} while expecting begin session",
            other.message_type()
        ))),
        None => Err(ClientError::communication(
            "server closed the connection during handshake",
        )),
    }
}

struct Reactor {
    connection: Connection,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    db: SubscriptionDb,
    pool: RequestPool,
    error_handler: Option<ErrorHandler>,
}

impl Reactor {
    async fn run(&mut self) {
        loop {
            tokio::select! {
                res = self.connection.read_message() => match res {
                    Ok(Some(message)) => {
                        if self.on_message(message) {
                            return;
                        }
                    }
                    Ok(None) => {
                        self.fail_all("the server closed the connection");
                        return;
                    }
                    Err(e) => {
                        self.fail_all(&format!("read failure: {}", e));
                        return;
                    }
                },
                Some(command) = self.cmd_rx.recv() => {
                    if self.on_command(command).await {
                        return;
                    }
                }
            }
        }
    }

    /// Handle one inbound message. Returns true when the session is over.
    fn on_message(&mut self, message: Message) -> bool {
        debug!("received message {:?}", message);
        match message {
            Message::SubscriptionReply(reply) => {
                self.on_subscription_reply(reply);
                false
            }
            Message::UnsubscriptionReply(reply) => {
                self.on_unsubscription_reply(reply);
                false
            }
            Message::VarUpdate(update) => {
                self.on_var_update(update);
                false
            }
            Message::EndSession(msg) => {
                info!("session ended by server ({})", msg.cause);
                self.fail_all("the server ended the session");
                true
            }
            other => {
                self.report_error(&ClientError::Communication(format!(
                    "unexpected message {:?} received",
                    other.message_type()
                )));
                false
            }
        }
    }

    /// Handle one command from the public API. Returns true on close.
    async fn on_command(&mut self, command: Command) -> bool {
        match command {
            Command::Subscribe {
                var_id,
                handler,
                slot,
            } => {
                self.on_subscribe(var_id, handler, slot).await;
                false
            }
            Command::Unsubscribe {
                virtual_subs_id,
                slot,
            } => {
                self.on_unsubscribe(virtual_subs_id, slot).await;
                false
            }
            Command::Update {
                virtual_subs_id,
                value,
                slot,
            } => {
                self.on_update(virtual_subs_id, value, slot).await;
                false
            }
            Command::Close { slot } => {
                let _ = self
                    .connection
                    .write_message(&Message::EndSession(EndSession::new("Client disconnected")))
                    .await;
                self.fail_all("client disconnected");
                slot.complete(Ok(()));
                true
            }
        }
    }

    async fn on_subscribe(
        &mut self,
        var_id: VariableId,
        handler: VarUpdateHandler,
        slot: CompletionSlot<SubscriptionId>,
    ) {
        // A known variable is served locally, with no wire traffic.
        if self.db.entry_defined(&var_id) {
            let result = self
                .db
                .add_virtual_subscription(&var_id, handler)
                .map_err(|e| ClientError::communication(e));
            slot.complete(result);
            return;
        }
        let first = self.pool.insert_subscription(PendingSubscription {
            var_id: var_id.clone(),
            handler,
            slot,
        });
        if first {
            let request =
                SubscriptionRequest::new(var_id.group.clone(), var_id.name.clone());
            if !self.send(Message::SubscriptionRequest(request)).await {
                let error = ClientError::communication("cannot send subscription request");
                for request in self.pool.pop_subscriptions(&var_id) {
                    request.slot.complete(Err(error.clone()));
                }
            }
        }
    }

    async fn on_unsubscribe(&mut self, virtual_subs_id: SubscriptionId, slot: CompletionSlot<()>) {
        let master_subs_id = match self.db.master_by_virtual(virtual_subs_id) {
            Ok(master_subs_id) => master_subs_id,
            Err(_) => {
                slot.complete(Err(ClientError::NoSuchSubscription(virtual_subs_id)));
                return;
            }
        };
        match self.db.remove_virtual_subscription(virtual_subs_id) {
            // The last virtual subscription is gone; release the master.
            Ok(true) => {
                let first = self.pool.insert_unsubscription(PendingUnsubscription {
                    master_subs_id,
                    slot,
                });
                if first {
                    let request = UnsubscriptionRequest::new(master_subs_id);
                    if !self.send(Message::UnsubscriptionRequest(request)).await {
                        let error =
                            ClientError::communication("cannot send unsubscription request");
                        for request in self.pool.pop_unsubscriptions(master_subs_id) {
                            request.slot.complete(Err(error.clone()));
                        }
                    }
                }
            }
            Ok(false) => slot.complete(Ok(())),
            Err(e) => slot.complete(Err(ClientError::communication(e))),
        }
    }

    async fn on_update(
        &mut self,
        virtual_subs_id: SubscriptionId,
        value: VariableValue,
        slot: CompletionSlot<()>,
    ) {
        let master_subs_id = match self.db.master_by_virtual(virtual_subs_id) {
            Ok(master_subs_id) => master_subs_id,
            Err(_) => {
                slot.complete(Err(ClientError::NoSuchSubscription(virtual_subs_id)));
                return;
            }
        };
        // Best effort: complete right away, IO failures go to the error
        // handler.
        self.send(Message::VarUpdate(VarUpdate::new(master_subs_id, value)))
            .await;
        slot.complete(Ok(()));
    }

    fn on_subscription_reply(&mut self, reply: SubscriptionReply) {
        let var_id = VariableId {
            group: reply.var_grp.clone(),
            name: reply.var_name.clone(),
        };
        let pending = self.pool.pop_subscriptions(&var_id);
        if pending.is_empty() {
            self.report_error(&ClientError::Communication(format!(
                "unexpected subscription reply for {}",
                var_id
            )));
            return;
        }
        match reply.status {
            SubscriptionStatus::Subscribed => {
                let mut created = false;
                for request in pending {
                    let result = if !created {
                        self.db
                            .create_entry(var_id.clone(), reply.subs_id, request.handler)
                            .map(|virtual_id| {
                                created = true;
                                virtual_id
                            })
                            .map_err(|e| ClientError::communication(e))
                    } else {
                        self.db
                            .add_virtual_subscription(&var_id, request.handler)
                            .map_err(|e| ClientError::communication(e))
                    };
                    request.slot.complete(result);
                }
            }
            SubscriptionStatus::NoSuchVar => {
                for request in pending {
                    request
                        .slot
                        .complete(Err(ClientError::NoSuchVariable(var_id.clone())));
                }
            }
            _ => {
                for request in pending {
                    request
                        .slot
                        .complete(Err(ClientError::Communication(reply.cause.clone())));
                }
            }
        }
    }

    fn on_unsubscription_reply(&mut self, reply: UnsubscriptionReply) {
        let pending = self.pool.pop_unsubscriptions(reply.subs_id);
        if pending.is_empty() {
            self.report_error(&ClientError::Communication(format!(
                "unexpected unsubscription reply for {}",
                reply.subs_id
            )));
            return;
        }
        for request in pending {
            let result = match reply.status {
                SubscriptionStatus::Unsubscribed => Ok(()),
                SubscriptionStatus::NoSuchSubscription => {
                    Err(ClientError::NoSuchSubscription(reply.subs_id))
                }
                _ => Err(ClientError::Communication(reply.cause.clone())),
            };
            request.slot.complete(result);
        }
    }

    fn on_var_update(&mut self, update: VarUpdate) {
        if self.db.invoke_handlers(update.subs_id, &update.value).is_err() {
            self.report_error(&ClientError::Communication(format!(
                "received update for unknown subscription {}",
                update.subs_id
            )));
        }
    }

    /// Write a message on the wire, reporting failures to the error
    /// handler. Returns whether the write succeeded.
    async fn send(&mut self, message: Message) -> bool {
        match self.connection.write_message(&message).await {
            Ok(()) => true,
            Err(e) => {
                self.report_error(&ClientError::communication(format!("write failure: {}", e)));
                false
            }
        }
    }

    fn fail_all(&mut self, cause: &str) {
        self.pool
            .propagate_error(&ClientError::communication(cause));
    }

    fn report_error(&self, error: &ClientError) {
        warn!("{}", error);
        if let Some(handler) = &self.error_handler {
            handler(error);
        }
    }
}
