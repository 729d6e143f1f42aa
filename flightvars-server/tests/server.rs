use flightvars_bus::LocalBus;
use flightvars_core::api::{ApiError, FlightVars};
use flightvars_codec::{
    BeginSession, EndSession, Message, SubscriptionReply, SubscriptionRequest, SubscriptionStatus,
    UnsubscriptionReply, UnsubscriptionRequest, VarUpdate, VariableGroup, VariableId,
    VariableName, VariableValue,
};
use flightvars_core::{Connection, PROTOCOL_VERSION, SERVER_PEER_NAME};
use flightvars_fsuipc::{
    DomainSettings, DummyOffsetAdapter, Offset, OffsetDomain, OFFSETS_GROUP,
};
use flightvars_server::{server, Router};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, oneshot};
use tokio::time::{delay_for, timeout};

struct TestServer {
    addr: String,
    router: Arc<Router>,
    adapter: Arc<Mutex<DummyOffsetAdapter>>,
    _notify_shutdown: broadcast::Sender<()>,
    _stop: oneshot::Sender<()>,
}

async fn start_server() -> TestServer {
    let bus = Arc::new(LocalBus::new());
    let adapter = Arc::new(Mutex::new(DummyOffsetAdapter::new()));
    let domain = OffsetDomain::new(
        DomainSettings {
            exports: Vec::new(),
            poll_interval: Duration::from_millis(10),
        },
        bus,
        Box::new(adapter.clone()),
    )
    .unwrap();
    let router = Arc::new(Router::new());
    router
        .register_group_master(
            VariableGroup::new(OFFSETS_GROUP),
            domain.clone() as Arc<dyn FlightVars>,
        )
        .unwrap();
    let (notify_shutdown, _) = broadcast::channel(1);
    domain.start(notify_shutdown.subscribe());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server_router = router.clone();
    tokio::spawn(async move {
        let _ = server::run(listener, server_router, async move {
            let _ = stop_rx.await;
        })
        .await;
    });

    TestServer {
        addr,
        router,
        adapter,
        _notify_shutdown: notify_shutdown,
        _stop: stop_tx,
    }
}

async fn read(connection: &mut Connection) -> Option<Message> {
    timeout(Duration::from_secs(5), connection.read_message())
        .await
        .expect("timed out waiting for a message")
        .unwrap()
}

async fn handshake(server: &TestServer, peer_name: &str) -> Connection {
    let socket = TcpStream::connect(&server.addr).await.unwrap();
    let mut connection = Connection::new(socket);
    connection
        .write_message(&Message::BeginSession(BeginSession::new(
            peer_name,
            PROTOCOL_VERSION,
        )))
        .await
        .unwrap();
    match read(&mut connection).await {
        Some(Message::BeginSession(reply)) => {
            assert_eq!(reply.pname, SERVER_PEER_NAME);
            assert_eq!(reply.proto_ver, PROTOCOL_VERSION);
        }
        other => panic!("expected begin session reply, got {:?}", other),
    }
    connection
}

async fn subscribe(connection: &mut Connection, group: &str, name: &str) -> SubscriptionReply {
    connection
        .write_message(&Message::SubscriptionRequest(SubscriptionRequest::new(
            VariableGroup::new(group),
            VariableName::new(name),
        )))
        .await
        .unwrap();
    match read(connection).await {
        Some(Message::SubscriptionReply(reply)) => reply,
        other => panic!("expected subscription reply, got {:?}", other),
    }
}

#[tokio::test]
async fn handshake_then_close() {
    let server = start_server().await;
    let mut connection = handshake(&server, "Client A").await;
    connection
        .write_message(&Message::EndSession(EndSession::new("Client disconnected")))
        .await
        .unwrap();
    assert_eq!(read(&mut connection).await, None);
}

#[tokio::test]
async fn incompatible_protocol_version_is_rejected() {
    let server = start_server().await;
    let socket = TcpStream::connect(&server.addr).await.unwrap();
    let mut connection = Connection::new(socket);
    connection
        .write_message(&Message::BeginSession(BeginSession::new("Client A", 0x0200)))
        .await
        .unwrap();
    assert_eq!(read(&mut connection).await, None);
}

#[tokio::test]
async fn first_message_must_be_begin_session() {
    let server = start_server().await;
    let socket = TcpStream::connect(&server.addr).await.unwrap();
    let mut connection = Connection::new(socket);
    connection
        .write_message(&Message::SubscriptionRequest(SubscriptionRequest::new(
            VariableGroup::new(OFFSETS_GROUP),
            VariableName::new("0x1000:1"),
        )))
        .await
        .unwrap();
    assert_eq!(read(&mut connection).await, None);
}

#[tokio::test]
async fn subscription_to_a_known_variable_succeeds() {
    let server = start_server().await;
    let mut connection = handshake(&server, "Client A").await;
    let reply = subscribe(&mut connection, OFFSETS_GROUP, "0x1000:1").await;
    assert_eq!(reply.status, SubscriptionStatus::Subscribed);
    assert_eq!(reply.var_grp, VariableGroup::new(OFFSETS_GROUP));
    assert_eq!(reply.var_name, VariableName::new("0x1000:1"));
    assert_ne!(reply.subs_id, 0);
    assert_eq!(reply.cause, "");
}

#[tokio::test]
async fn subscription_to_an_unknown_group_fails() {
    let server = start_server().await;
    let mut connection = handshake(&server, "Client A").await;
    let reply = subscribe(&mut connection, "unknown", "foo").await;
    assert_eq!(reply.status, SubscriptionStatus::NoSuchVar);
    assert_eq!(reply.var_grp, VariableGroup::new("unknown"));
    assert_eq!(reply.var_name, VariableName::new("foo"));
    assert_eq!(reply.subs_id, 0);
    assert!(!reply.cause.is_empty());
}

#[tokio::test]
async fn updates_fan_out_to_every_subscribed_session() {
    let server = start_server().await;
    let mut first = handshake(&server, "Client A").await;
    let mut second = handshake(&server, "Client B").await;

    let first_reply = subscribe(&mut first, OFFSETS_GROUP, "0x1000:1").await;
    let second_reply = subscribe(&mut second, OFFSETS_GROUP, "0x1000:1").await;
    assert_ne!(first_reply.subs_id, second_reply.subs_id);

    // The sampling task observes the offset asynchronously; let it prime
    // the cell before mutating the backing memory.
    delay_for(Duration::from_millis(50)).await;
    let offset: Offset = "0x1000:1".parse().unwrap();
    server.adapter.lock().unwrap().write_value(offset, 0x42);

    for (connection, reply) in &mut [
        (&mut first, &first_reply),
        (&mut second, &second_reply),
    ] {
        match read(connection).await {
            Some(Message::VarUpdate(update)) => {
                assert_eq!(update.subs_id, reply.subs_id);
                assert_eq!(update.value, VariableValue::Byte(0x42));
            }
            other => panic!("expected var update, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn var_update_writes_through_to_the_offset_region() {
    let server = start_server().await;
    let mut connection = handshake(&server, "Client A").await;
    let reply = subscribe(&mut connection, OFFSETS_GROUP, "0x66c0:2").await;

    connection
        .write_message(&Message::VarUpdate(VarUpdate::new(
            reply.subs_id,
            VariableValue::Word(0x0102),
        )))
        .await
        .unwrap();

    let offset: Offset = "0x66c0:2".parse().unwrap();
    let mut value = 0;
    for _ in 0..100 {
        value = server.adapter.lock().unwrap().read_value(offset);
        if value == 0x0102 {
            break;
        }
        delay_for(Duration::from_millis(10)).await;
    }
    assert_eq!(value, 0x0102);

    // The write raises an edge, so the writing session gets the fan-out.
    match read(&mut connection).await {
        Some(Message::VarUpdate(update)) => {
            assert_eq!(update.subs_id, reply.subs_id);
            assert_eq!(update.value, VariableValue::Word(0x0102));
        }
        other => panic!("expected var update, got {:?}", other),
    }
}

#[tokio::test]
async fn unsubscription_releases_the_subscription() {
    let server = start_server().await;
    let mut connection = handshake(&server, "Client A").await;
    let reply = subscribe(&mut connection, OFFSETS_GROUP, "0x1000:1").await;

    connection
        .write_message(&Message::UnsubscriptionRequest(UnsubscriptionRequest::new(
            reply.subs_id,
        )))
        .await
        .unwrap();
    match read(&mut connection).await {
        Some(Message::UnsubscriptionReply(UnsubscriptionReply {
            status: SubscriptionStatus::Unsubscribed,
            subs_id,
            ..
        })) => assert_eq!(subs_id, reply.subs_id),
        other => panic!("expected unsubscription reply, got {:?}", other),
    }

    // A second attempt does not belong to the session anymore.
    connection
        .write_message(&Message::UnsubscriptionRequest(UnsubscriptionRequest::new(
            reply.subs_id,
        )))
        .await
        .unwrap();
    match read(&mut connection).await {
        Some(Message::UnsubscriptionReply(reply)) => {
            assert_eq!(reply.status, SubscriptionStatus::NoSuchSubscription);
            assert_eq!(reply.subs_id, 0);
            assert!(!reply.cause.is_empty());
        }
        other => panic!("expected unsubscription reply, got {:?}", other),
    }
}

#[tokio::test]
async fn session_end_unsubscribes_everything_at_the_master() {
    let server = start_server().await;
    let mut connection = handshake(&server, "Client A").await;
    let reply = subscribe(&mut connection, OFFSETS_GROUP, "0x1000:1").await;

    connection
        .write_message(&Message::EndSession(EndSession::new("Client disconnected")))
        .await
        .unwrap();

    let var_id = VariableId::new(OFFSETS_GROUP, "0x1000:1");
    let mut released = false;
    for _ in 0..100 {
        match server
            .router
            .update(reply.subs_id, &VariableValue::Byte(1))
        {
            Err(ApiError::NoSuchSubscription(_)) => {
                released = true;
                break;
            }
            _ => delay_for(Duration::from_millis(10)).await,
        }
    }
    assert!(released, "subscription for {} was not released", var_id);
}
