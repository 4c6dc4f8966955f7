#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};

use {
    devctl_agents::{BatteryAgent, DeviceAgents, Hypervisor, VmConfig},
    devctl_gateway::{GatewayBuilder, GatewayError, ServerCredentials, ServiceHandle},
    devctl_protocol::{RequestFrame, ResponseFrame, error_codes, methods},
    futures::{SinkExt, StreamExt},
    serde_json::{Value, json},
    tokio_tungstenite::tungstenite::Message,
};

fn agents() -> DeviceAgents {
    DeviceAgents::in_memory(VmConfig {
        hypervisor: Hypervisor::Kvm,
        cpu_cores: 8,
        ram_bytes: 4 << 30,
    })
}

fn loopback() -> GatewayBuilder {
    GatewayBuilder::new()
        .with_bind(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .with_port(0)
        .with_shutdown_grace(Duration::from_millis(200))
}

async fn start() -> ServiceHandle {
    loopback().with_agents(agents()).build().await.unwrap()
}

async fn rpc(handle: &ServiceHandle, method: &str, params: Value) -> ResponseFrame {
    reqwest::Client::new()
        .post(format!("http://{}/rpc", handle.local_addr()))
        .json(&RequestFrame::new("1", method, params))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn build_without_agents_fails() {
    let err = loopback().build().await.unwrap_err();
    assert!(matches!(err, GatewayError::MissingAgents));
}

#[tokio::test]
async fn set_battery_over_http() {
    let handle = start().await;

    let frame = rpc(
        &handle,
        methods::SET_BATTERY,
        json!({"hasBattery": true, "isPresent": true, "status": "CHARGING", "chargeLevel": 42}),
    )
    .await;
    assert!(frame.ok);
    let payload = frame.payload.unwrap();
    assert_eq!(payload["chargeLevel"], 42);
    assert_eq!(payload["status"], "CHARGING");
    assert_eq!(payload["hasBattery"], true);
    assert_eq!(payload["isPresent"], true);

    let frame = rpc(&handle, methods::GET_BATTERY, json!({})).await;
    assert_eq!(frame.payload.unwrap()["chargeLevel"], 42);

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn out_of_range_level_reads_back_clamped() {
    let handle = start().await;
    let frame = rpc(&handle, methods::SET_BATTERY, json!({"chargeLevel": 150})).await;
    assert_eq!(frame.payload.unwrap()["chargeLevel"], 100);
    handle.stop().await.unwrap();
}

#[tokio::test]
async fn vm_configuration_is_stable_across_calls() {
    let handle = start().await;
    let first = rpc(&handle, methods::GET_VM_CONFIGURATION, Value::Null).await;
    let second = rpc(&handle, methods::GET_VM_CONFIGURATION, Value::Null).await;
    assert_eq!(
        first.payload,
        Some(json!({"hypervisorType": "KVM", "numberOfCpuCores": 8, "ramSizeBytes": 4_i64 << 30}))
    );
    assert_eq!(first.payload, second.payload);
    handle.stop().await.unwrap();
}

#[tokio::test]
async fn malformed_http_body_is_rejected() {
    let handle = start().await;
    let resp = reqwest::Client::new()
        .post(format!("http://{}/rpc", handle.local_addr()))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let frame: ResponseFrame = resp.json().await.unwrap();
    assert_eq!(frame.error.unwrap().code, error_codes::INVALID_REQUEST);

    // Not even UTF-8.
    let resp = reqwest::Client::new()
        .post(format!("http://{}/rpc", handle.local_addr()))
        .body(vec![0xff, 0xfe, 0x7b])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let frame: ResponseFrame = resp.json().await.unwrap();
    assert_eq!(frame.id, "");
    assert_eq!(frame.error.unwrap().code, error_codes::INVALID_REQUEST);

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn set_gps_over_http() {
    let handle = start().await;
    let fix = json!({
        "passiveUpdate": true,
        "latitude": 48.8584,
        "longitude": 2.2945,
        "elevation": 35.0,
        "speed": 0.5,
        "heading": 90.0,
        "satellites": 11,
    });

    let frame = rpc(&handle, methods::SET_GPS, fix.clone()).await;
    assert!(frame.ok);
    assert_eq!(frame.payload, Some(fix.clone()));

    let frame = rpc(&handle, methods::GET_GPS, Value::Null).await;
    assert_eq!(frame.payload, Some(fix));

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn health_reports_methods() {
    let handle = start().await;
    let body: Value = reqwest::get(format!("http://{}/health", handle.local_addr()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["methods"], methods::ALL.len());
    assert!(body["uptime_secs"].is_u64());
    handle.stop().await.unwrap();
}

async fn open_connections(handle: &ServiceHandle) -> u64 {
    let body: Value = reqwest::get(format!("http://{}/health", handle.local_addr()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["connections"].as_u64().unwrap()
}

async fn wait_for_connections(handle: &ServiceHandle, expected: u64) {
    for _ in 0..50 {
        if open_connections(handle).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("connection count never reached {expected}");
}

#[tokio::test]
async fn health_tracks_open_websockets() {
    let handle = start().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(handle.ws_url())
        .await
        .unwrap();
    wait_for_connections(&handle, 1).await;

    ws.send(Message::Close(None)).await.unwrap();
    drop(ws);
    wait_for_connections(&handle, 0).await;

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn websocket_replies_are_correlated_by_id() {
    let handle = start().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(handle.ws_url())
        .await
        .unwrap();

    let requests = [
        RequestFrame::new("rot", methods::SET_ROTATION, json!({"rotation": "LANDSCAPE"})),
        RequestFrame::new("key", methods::SEND_KEY, json!({"key": 66})),
        RequestFrame::new("vm", methods::GET_VM_CONFIGURATION, json!({})),
        RequestFrame::new("bad", "Reboot", json!({})),
    ];
    for request in &requests {
        let text = serde_json::to_string(request).unwrap();
        ws.send(Message::Text(text.into())).await.unwrap();
    }

    let mut replies = HashMap::new();
    while replies.len() < requests.len() {
        let Some(Ok(Message::Text(text))) = ws.next().await else {
            panic!("connection ended early");
        };
        let frame: ResponseFrame = serde_json::from_str(&text).unwrap();
        replies.insert(frame.id.clone(), frame);
    }

    assert_eq!(replies["rot"].payload, Some(json!({"rotation": "LANDSCAPE"})));
    assert_eq!(replies["key"].payload, Some(json!({})));
    assert!(replies["vm"].ok);
    assert!(!replies["bad"].ok);

    ws.send(Message::Close(None)).await.unwrap();
    handle.stop().await.unwrap();
}

#[tokio::test]
async fn malformed_websocket_frame_gets_error_reply() {
    let handle = start().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(handle.ws_url())
        .await
        .unwrap();
    ws.send(Message::Text("{\"nope\":".into())).await.unwrap();
    let Some(Ok(Message::Text(text))) = ws.next().await else {
        panic!("no reply");
    };
    let frame: ResponseFrame = serde_json::from_str(&text).unwrap();
    assert_eq!(frame.id, "");
    assert_eq!(frame.error.unwrap().code, error_codes::INVALID_REQUEST);
    ws.send(Message::Close(None)).await.unwrap();
    handle.stop().await.unwrap();
}

#[tokio::test]
async fn port_conflict_is_a_bind_error() {
    let first = start().await;
    let err = loopback()
        .with_port(first.local_addr().port())
        .with_agents(agents())
        .build()
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Bind { .. }));
    first.stop().await.unwrap();
}

#[tokio::test]
async fn self_signed_tls_serves_and_stops() {
    let handle = loopback()
        .with_agents(agents())
        .with_credentials(ServerCredentials::self_signed(["localhost", "127.0.0.1"]))
        .build()
        .await
        .unwrap();
    assert!(handle.is_secure());
    assert!(handle.ws_url().starts_with("wss://"));

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .unwrap();
    let status = client
        .get(format!("https://{}/health", handle.local_addr()))
        .send()
        .await
        .unwrap()
        .status();
    assert!(status.is_success());

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn bad_pem_fails_before_binding() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let err = loopback()
        .with_port(port)
        .with_agents(agents())
        .with_credentials(ServerCredentials::tls_from_pem("not a cert", "not a key"))
        .build()
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Credentials(_)));

    // Nothing is left listening on the requested port.
    std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();
}

#[tokio::test]
async fn stop_ends_open_websocket_sessions() {
    let agents = agents();
    let handle = loopback()
        .with_agents(agents.clone())
        .build()
        .await
        .unwrap();
    let (mut ws, _) = tokio_tungstenite::connect_async(handle.ws_url())
        .await
        .unwrap();
    wait_for_connections(&handle, 1).await;

    handle.stop().await.unwrap();

    let request = RequestFrame::new("late", methods::SET_BATTERY, json!({"chargeLevel": 7}));
    let text = serde_json::to_string(&request).unwrap();
    let _ = ws.send(Message::Text(text.into())).await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => panic!("reply after stop: {text}"),
            Ok(Some(Ok(Message::Close(_)) | Err(_)) | None) | Err(_) => break,
            Ok(Some(Ok(_))) => continue,
        }
    }
    assert_eq!(agents.battery.charge_level(), 100);
}

#[tokio::test]
async fn stopped_gateway_refuses_connections() {
    let handle = start().await;
    let addr = handle.local_addr();
    handle.stop().await.unwrap();

    let result = reqwest::Client::new()
        .get(format!("http://{addr}/health"))
        .timeout(Duration::from_secs(2))
        .send()
        .await;
    assert!(result.is_err());
}
