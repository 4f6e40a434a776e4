//! Relay client against a mock n8n webhook.

use leadforge_relay::{signing, Dispatch, RelayClient, RelayConfig, RelayError, RelayRequest};
use uuid::Uuid;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn client_for(server: &MockServer) -> RelayClient {
    let config = RelayConfig {
        base_url: Some(server.uri()),
        api_key: Some("n8n-key".into()),
        timeout_secs: 2,
        public_base_url: "https://api.example.com".into(),
    };
    RelayClient::new(config).expect("Failed to create relay client")
}

fn relay_request(client: &RelayClient) -> RelayRequest {
    let run_id = Uuid::now_v7();
    RelayRequest {
        run_id,
        company_id: Uuid::now_v7(),
        trigger: "lead.created".into(),
        payload: serde_json::json!({"lead_id": Uuid::nil()}),
        callback_url: client.callback_url(run_id),
    }
}

#[tokio::test]
async fn test_send_signs_body_and_sets_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook/enrich"))
        .and(header("X-Leadforge-Event", "lead.created"))
        .and(header("X-N8N-API-KEY", "n8n-key"))
        .and(header_exists("X-Leadforge-Run"))
        .and(header_exists("X-Leadforge-Signature"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"accepted": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let req = relay_request(&client);
    let delivery = client
        .send(Dispatch {
            url: "/webhook/enrich",
            secret: Some("wf-secret"),
            request: &req,
        })
        .await
        .expect("delivery should succeed");
    assert_eq!(delivery.status, 200);
    assert_eq!(delivery.body, Some(serde_json::json!({"accepted": true})));

    // The signature must verify against the exact bytes that were sent.
    let received: Vec<Request> = server.received_requests().await.unwrap_or_default();
    assert_eq!(received.len(), 1);
    let sent = &received[0];
    let sig = sent
        .headers
        .get("X-Leadforge-Signature")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(signing::verify("wf-secret", &sent.body, sig));

    let body: RelayRequest = serde_json::from_slice(&sent.body).unwrap();
    assert_eq!(body, req);
    assert!(body.callback_url.ends_with("/callback"));
}

#[tokio::test]
async fn test_send_without_secret_is_unsigned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let req = relay_request(&client);
    let delivery = client
        .send(Dispatch {
            url: &format!("{}/hook", server.uri()),
            secret: None,
            request: &req,
        })
        .await
        .unwrap();
    assert_eq!(delivery.status, 202);
    assert!(delivery.body.is_none());

    let received = server.received_requests().await.unwrap_or_default();
    assert!(received[0].headers.get("X-Leadforge-Signature").is_none());
}

#[tokio::test]
async fn test_non_2xx_is_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("workflow crashed"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let req = relay_request(&client);
    let err = client
        .send(Dispatch {
            url: "/webhook/x",
            secret: None,
            request: &req,
        })
        .await
        .unwrap_err();
    match err {
        RelayError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "workflow crashed");
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_webhook_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let req = relay_request(&client);
    let err = client
        .send(Dispatch {
            url: "/webhook/slow",
            secret: None,
            request: &req,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Timeout(2)), "got {err:?}");
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error() {
    let config = RelayConfig {
        timeout_secs: 2,
        ..Default::default()
    };
    let client = RelayClient::new(config).unwrap();
    let req = relay_request(&client);
    let err = client
        .send(Dispatch {
            url: "http://127.0.0.1:9/nothing-listens-here",
            secret: None,
            request: &req,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Transport(_)), "got {err:?}");
}
