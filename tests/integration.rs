//! End-to-end tests: relay TCP server, worker client, and HTTP gateway
//! wired together over loopback.

use std::sync::Arc;
use std::time::Duration;

use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use labwire::framing::{read_frame, write_frame, DEFAULT_MAX_FRAME_LEN};
use labwire::gateway::{self, GatewayState};
use labwire::worker::handlers::register_builtin;
use labwire::{
    ClientRegistry, Dispatcher, HandlerRegistry, Message, Params, RelayServer, Response, Worker,
    WorkerConfig,
};

struct Relay {
    registry: Arc<ClientRegistry>,
    dispatcher: Arc<Dispatcher>,
    tcp_addr: std::net::SocketAddr,
}

/// Start a relay TCP server on an ephemeral port.
async fn start_relay() -> Relay {
    let registry = Arc::new(ClientRegistry::new());
    let dispatcher = Arc::new(Dispatcher::new(registry.clone()));
    let server = RelayServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        registry.clone(),
        dispatcher.clone(),
        DEFAULT_MAX_FRAME_LEN,
    )
    .await
    .unwrap();
    let tcp_addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    Relay {
        registry,
        dispatcher,
        tcp_addr,
    }
}

/// Spawn a worker with the built-in handlers connected to the relay.
fn start_worker(relay: &Relay, client_id: &str) {
    let mut config = WorkerConfig::new(client_id);
    config.relay_addr = relay.tcp_addr.to_string();
    let mut handlers = HandlerRegistry::new();
    register_builtin(&mut handlers);
    tokio::spawn(Worker::new(config, handlers).run());
}

async fn wait_for_registration(relay: &Relay, client_id: &str) {
    for _ in 0..400 {
        if relay.registry.lookup(client_id).is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("worker {} never registered", client_id);
}

/// One gateway request against an in-process router; returns status and
/// parsed JSON body.
async fn gateway_get(relay: &Relay, timeout: Duration, uri: &str) -> (u16, Value) {
    let router = gateway::router(GatewayState {
        dispatcher: relay.dispatcher.clone(),
        request_timeout: timeout,
    });
    let response = router
        .oneshot(
            axum::http::Request::builder()
                .uri(uri)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status().as_u16();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_echo_end_to_end() {
    let relay = start_relay().await;
    start_worker(&relay, "c1");
    wait_for_registration(&relay, "c1").await;

    let (status, body) = gateway_get(
        &relay,
        Duration::from_secs(5),
        "/data?client_id=c1&experiment=echo&n=5",
    )
    .await;

    assert_eq!(status, 200);
    // Query parameters travel as strings.
    assert_eq!(body, json!({"n": "5"}));
}

#[tokio::test]
async fn test_ghost_client_is_404_and_nothing_is_written() {
    let relay = start_relay().await;
    start_worker(&relay, "c1");
    wait_for_registration(&relay, "c1").await;

    let (status, body) = gateway_get(
        &relay,
        Duration::from_secs(1),
        "/data?client_id=ghost&experiment=echo",
    )
    .await;

    assert_eq!(status, 404);
    assert!(body["error"].as_str().unwrap().contains("ghost"));
    assert_eq!(relay.dispatcher.pending_count(), 0);
}

#[tokio::test]
async fn test_missing_parameters_are_400() {
    let relay = start_relay().await;

    let (status, _) = gateway_get(&relay, Duration::from_secs(1), "/data?experiment=echo").await;
    assert_eq!(status, 400);

    let (status, _) = gateway_get(&relay, Duration::from_secs(1), "/data?client_id=c1").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_silent_client_times_out_and_pending_drains() {
    let relay = start_relay().await;

    // A bare TCP peer that says hello and then never answers anything.
    let mut stream = tokio::net::TcpStream::connect(relay.tcp_addr).await.unwrap();
    write_frame(
        &mut stream,
        &Message::Hello {
            client_id: "mute".to_string(),
        },
    )
    .await
    .unwrap();
    wait_for_registration(&relay, "mute").await;

    let (status, body) = gateway_get(
        &relay,
        Duration::from_millis(200),
        "/data?client_id=mute&experiment=echo",
    )
    .await;

    assert_eq!(status, 504);
    assert!(body["error"].as_str().unwrap().contains("timed out"));
    assert_eq!(relay.dispatcher.pending_count(), 0);

    // The command did reach the peer; a late answer must be discarded.
    let msg = read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN)
        .await
        .unwrap()
        .unwrap();
    if let Message::Command { id, .. } = msg {
        write_frame(
            &mut stream,
            &Message::Response(Response::success(id, json!({"late": true}))),
        )
        .await
        .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(relay.dispatcher.pending_count(), 0);
}

#[tokio::test]
async fn test_same_client_out_of_order_answers_cross_nothing() {
    let relay = start_relay().await;

    let mut stream = tokio::net::TcpStream::connect(relay.tcp_addr).await.unwrap();
    write_frame(
        &mut stream,
        &Message::Hello {
            client_id: "c1".to_string(),
        },
    )
    .await
    .unwrap();
    wait_for_registration(&relay, "c1").await;

    // Two concurrent dispatches to the same client.
    let call = |tag: &'static str| {
        let dispatcher = relay.dispatcher.clone();
        tokio::spawn(async move {
            let mut params = Params::new();
            params.insert("tag".to_string(), json!(tag));
            dispatcher
                .send_and_wait("c1", "echo", params, Duration::from_secs(5))
                .await
        })
    };
    let call_a = call("a");
    let call_b = call("b");

    let mut commands = Vec::new();
    for _ in 0..2 {
        let msg = read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN)
            .await
            .unwrap()
            .unwrap();
        match msg {
            Message::Command { id, params, .. } => commands.push((id, params["tag"].clone())),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    // Answer B first, A second; each waiter must still get its own.
    for (id, tag) in commands.iter().rev() {
        write_frame(
            &mut stream,
            &Message::Response(Response::success(*id, json!({ "tag": tag }))),
        )
        .await
        .unwrap();
    }

    let resp_a = call_a.await.unwrap().unwrap();
    let resp_b = call_b.await.unwrap().unwrap();
    assert_eq!(resp_a.payload["tag"], "a");
    assert_eq!(resp_b.payload["tag"], "b");
}

#[tokio::test]
async fn test_disconnect_unregisters_and_later_calls_are_404() {
    let relay = start_relay().await;

    let mut stream = tokio::net::TcpStream::connect(relay.tcp_addr).await.unwrap();
    write_frame(
        &mut stream,
        &Message::Hello {
            client_id: "ephemeral".to_string(),
        },
    )
    .await
    .unwrap();
    wait_for_registration(&relay, "ephemeral").await;

    drop(stream);
    for _ in 0..400 {
        if relay.registry.lookup("ephemeral").is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (status, _) = gateway_get(
        &relay,
        Duration::from_secs(1),
        "/data?client_id=ephemeral&experiment=echo",
    )
    .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_handler_failure_travels_as_payload() {
    let relay = start_relay().await;
    start_worker(&relay, "c1");
    wait_for_registration(&relay, "c1").await;

    let (status, body) = gateway_get(
        &relay,
        Duration::from_secs(5),
        "/data?client_id=c1&experiment=no_such_handler",
    )
    .await;

    // The worker's own failure is an ordinary payload, not a gateway error.
    assert_eq!(status, 200);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("no_such_handler"));
}

#[tokio::test]
async fn test_heatmap_through_the_full_stack() {
    let relay = start_relay().await;
    start_worker(&relay, "bench");
    wait_for_registration(&relay, "bench").await;

    let (status, body) = gateway_get(
        &relay,
        Duration::from_secs(5),
        "/data?client_id=bench&experiment=gaussian_heatmap&size=6",
    )
    .await;

    assert_eq!(status, 200);
    let rows = body["heatmap_data"].as_array().unwrap();
    assert_eq!(rows.len(), 6);
    assert!(rows.iter().all(|r| r.as_array().unwrap().len() == 6));
}

#[tokio::test]
async fn test_clients_endpoint_reflects_live_workers() {
    let relay = start_relay().await;
    start_worker(&relay, "w-a");
    start_worker(&relay, "w-b");
    wait_for_registration(&relay, "w-a").await;
    wait_for_registration(&relay, "w-b").await;

    let (status, body) = gateway_get(&relay, Duration::from_secs(1), "/clients").await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"clients": ["w-a", "w-b"]}));
}

#[tokio::test]
async fn test_reconnecting_worker_takes_over_its_id() {
    let relay = start_relay().await;

    let mut first = tokio::net::TcpStream::connect(relay.tcp_addr).await.unwrap();
    write_frame(
        &mut first,
        &Message::Hello {
            client_id: "c1".to_string(),
        },
    )
    .await
    .unwrap();
    wait_for_registration(&relay, "c1").await;
    let first_conn = relay.registry.lookup("c1").unwrap();

    // Second hello under the same id: the new connection wins and the
    // superseded one is shut down rather than left dangling.
    start_worker(&relay, "c1");
    for _ in 0..400 {
        let current = relay.registry.lookup("c1");
        if let Ok(current) = current {
            if !Arc::ptr_eq(&current, &first_conn) {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (status, body) = gateway_get(
        &relay,
        Duration::from_secs(5),
        "/data?client_id=c1&experiment=echo&via=replacement",
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"via": "replacement"}));
}
