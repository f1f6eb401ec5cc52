use std::io::Read;
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use linkseek::api::{Client, ClientConfig, QueueConfig, SearchCriteria};
use linkseek::error::ActionError;
use tiny_http::{Header, Response, Server};

struct Recorded {
    method: String,
    url: String,
    body: String,
}

struct FakeServer {
    base_url: String,
    requests: mpsc::Receiver<Recorded>,
}

impl FakeServer {
    fn next_request(&self) -> Recorded {
        self.requests
            .recv_timeout(Duration::from_secs(5))
            .expect("server saw a request")
    }
}

/// Answers one request per scripted reply, in order, then stops.
fn serve(replies: Vec<(u16, &'static str)>) -> FakeServer {
    serve_after(Duration::ZERO, replies)
}

/// Like [`serve`], but holds every reply back for `delay`.
fn serve_after(delay: Duration, replies: Vec<(u16, &'static str)>) -> FakeServer {
    let server = Server::http("127.0.0.1:0").expect("bind fake server");
    let port = server
        .server_addr()
        .to_ip()
        .expect("ip listener")
        .port();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for (status, body) in replies {
            let Ok(mut request) = server.recv() else {
                return;
            };
            let mut received = String::new();
            let _ = request.as_reader().read_to_string(&mut received);
            let _ = tx.send(Recorded {
                method: request.method().to_string(),
                url: request.url().to_string(),
                body: received,
            });
            thread::sleep(delay);
            let header = Header::from_bytes("Content-Type", "application/json").expect("header");
            let response = Response::from_string(body)
                .with_status_code(status)
                .with_header(header);
            let _ = request.respond(response);
        }
    });
    FakeServer {
        base_url: format!("http://127.0.0.1:{port}"),
        requests: rx,
    }
}

fn client_for(base_url: &str) -> Client {
    client_with_timeout(base_url, Some(Duration::from_secs(5)))
}

fn client_with_timeout(base_url: &str, timeout: Option<Duration>) -> Client {
    Client::new(ClientConfig {
        base_url: base_url.to_string(),
        user_agent: "linkseek-tests".into(),
        timeout,
        http_client: None,
    })
    .expect("client")
}

#[test]
fn search_sends_only_filled_criteria() {
    let server = serve(vec![(
        200,
        r#"{"results":[{"thread_id":42,"thread_title":"One Piece","forum_category":"Manga","volume":3,"filename":"op-03.cbz","filesize":"1048576","link":"ed2k://|file|op-03.cbz|1048576|abc|/"}]}"#,
    )]);
    let client = client_for(&server.base_url);
    let criteria = SearchCriteria {
        query: "one piece".into(),
        volume: String::new(),
        category: "Manga".into(),
    };

    let rows = client.search(&criteria).expect("search");

    let request = server.next_request();
    assert_eq!(request.method, "GET");
    assert!(request.url.starts_with("/api/search?"), "url was {}", request.url);
    assert!(request.url.contains("query=one+piece"));
    assert!(request.url.contains("category=Manga"));
    assert!(!request.url.contains("volume="));

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].thread_id, "42");
    assert_eq!(rows[0].volume.as_deref(), Some("3"));
    assert_eq!(rows[0].filesize, Some(1_048_576));
}

#[test]
fn search_without_criteria_sends_nothing() {
    let client = client_for("http://127.0.0.1:9");
    let err = client.search(&SearchCriteria::default()).unwrap_err();
    assert!(matches!(err, ActionError::Validation(_)));
}

#[test]
fn queue_config_round_trips_through_the_server() {
    let server = serve(vec![
        (
            200,
            r#"{"enabled":true,"type":"amule","host":"10.0.0.2","ec_port":4712,"password":"****"}"#,
        ),
        (200, r#"{"success":true}"#),
    ]);
    let client = client_for(&server.base_url);

    let config = client.queue_config().expect("fetch config");
    assert!(config.enabled);
    assert_eq!(config.host, "10.0.0.2");
    assert_eq!(config.password, "****");
    let request = server.next_request();
    assert_eq!(request.method, "GET");
    assert_eq!(request.url, "/api/emule/config");

    let updated = QueueConfig {
        ec_port: 4713,
        ..config
    };
    let outcome = client.save_queue_config(&updated).expect("save config");
    assert!(outcome.success);
    let request = server.next_request();
    assert_eq!(request.method, "POST");
    assert_eq!(request.url, "/api/emule/config");
    let sent: serde_json::Value = serde_json::from_str(&request.body).expect("json body");
    assert_eq!(sent["type"], "amule");
    assert_eq!(sent["ec_port"], 4713);
    assert_eq!(sent["password"], "****");
}

#[test]
fn test_endpoint_reports_server_message() {
    let server = serve(vec![(200, r#"{"success":true,"message":"Connected"}"#)]);
    let client = client_for(&server.base_url);

    let outcome = client.test_queue().expect("test connection");

    assert_eq!(outcome.into_result(), Ok(Some("Connected".to_string())));
    assert_eq!(server.next_request().url, "/api/emule/test");
}

#[test]
fn enqueue_posts_the_link() {
    let server = serve(vec![(200, r#"{"success":true}"#)]);
    let client = client_for(&server.base_url);

    client.enqueue("ed2k://|file|a.bin|1|x|/").expect("enqueue");

    let request = server.next_request();
    assert_eq!(request.method, "POST");
    assert_eq!(request.url, "/api/emule/add");
    let sent: serde_json::Value = serde_json::from_str(&request.body).expect("json body");
    assert_eq!(sent["link"], "ed2k://|file|a.bin|1|x|/");
}

#[test]
fn enqueue_many_reports_counts() {
    let server = serve(vec![(200, r#"{"success":true,"sent":2,"failed":1}"#)]);
    let client = client_for(&server.base_url);
    let links = vec!["l1".to_string(), "l2".to_string(), "l3".to_string()];

    let outcome = client.enqueue_many(&links).expect("enqueue many");

    assert_eq!(outcome.into_result(), Ok((2, 1)));
    let request = server.next_request();
    assert_eq!(request.url, "/api/emule/add-multiple");
    let sent: serde_json::Value = serde_json::from_str(&request.body).expect("json body");
    assert_eq!(sent["links"], serde_json::json!(["l1", "l2", "l3"]));
}

#[test]
fn rejection_with_error_status_is_a_domain_error() {
    let server = serve(vec![(400, r#"{"success":false,"error":"Queue is disabled"}"#)]);
    let client = client_for(&server.base_url);

    let outcome = client.enqueue("l1").expect("decoded rejection");

    assert_eq!(
        outcome.into_result(),
        Err(ActionError::Domain(Some("Queue is disabled".into())))
    );
}

#[test]
fn rejection_without_reason_uses_generic_text() {
    let server = serve(vec![(500, r#"{"success":false}"#)]);
    let client = client_for(&server.base_url);

    let err = client.test_queue().expect("decoded").into_result().unwrap_err();

    assert_eq!(err.user_message(), linkseek::error::GENERIC_FAILURE);
}

#[test]
fn malformed_body_is_a_decode_error() {
    let server = serve(vec![(502, "<html>Bad gateway</html>")]);
    let client = client_for(&server.base_url);

    let err = client.queue_config().unwrap_err();

    match err {
        ActionError::Decode(message) => assert!(message.contains("502"), "{message}"),
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[test]
fn unreachable_server_is_a_network_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("probe port");
        listener.local_addr().expect("addr").port()
    };
    let client = client_for(&format!("http://127.0.0.1:{port}"));

    let err = client.queue_config().unwrap_err();

    assert!(matches!(err, ActionError::Network(_)), "{err:?}");
}

#[test]
fn base_url_path_is_kept_as_prefix() {
    let server = serve(vec![(200, r#"{"results":[]}"#)]);
    let client = client_for(&format!("{}/links", server.base_url));
    let criteria = SearchCriteria {
        volume: "7".into(),
        ..SearchCriteria::default()
    };

    let rows = client.search(&criteria).expect("search");

    assert!(rows.is_empty());
    assert_eq!(server.next_request().url, "/links/api/search?volume=7");
}

#[test]
fn slow_batch_reply_still_decodes_without_a_timeout() {
    let server = serve_after(
        Duration::from_secs(2),
        vec![(200, r#"{"success":true,"sent":3,"failed":0}"#)],
    );
    let timeout = linkseek::config::Config::default().server.timeout;
    assert_eq!(timeout, None);
    let client = client_with_timeout(&server.base_url, timeout);
    let links = vec!["l1".to_string(), "l2".to_string(), "l3".to_string()];

    let outcome = client.enqueue_many(&links).expect("slow reply decoded");

    assert_eq!(outcome.into_result(), Ok((3, 0)));
}

#[test]
fn configured_timeout_still_applies() {
    let server = serve_after(Duration::from_secs(2), vec![(200, r#"{"success":true}"#)]);
    let client = client_with_timeout(&server.base_url, Some(Duration::from_millis(200)));

    let err = client.test_queue().unwrap_err();

    assert!(matches!(err, ActionError::Network(_)), "{err:?}");
}
