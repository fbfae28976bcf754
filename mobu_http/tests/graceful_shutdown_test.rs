//! Runs the real server on a random port and checks that shutting it down
//! stops every monkey and deletes their labs.

use mobu_core::{MobuConfig, MonkeyFactory, MonkeyManager, StaticTokenSource};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn hub() -> MockServer {
    let server = MockServer::start().await;
    for (at, response) in [
        ("/nb/hub/login", ResponseTemplate::new(302).insert_header("Location", "/nb/hub/home")),
        ("/nb/hub/home", ResponseTemplate::new(200)),
        ("/nb/hub", ResponseTemplate::new(302).insert_header("Location", "/nb/user/someuser/lab")),
        ("/nb/user/someuser/lab", ResponseTemplate::new(200)),
    ] {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(response)
            .mount(&server)
            .await;
    }
    Mock::given(method("DELETE"))
        .and(path("/nb/hub/api/users/someuser/server"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn shutdown_stops_monkeys_and_deletes_labs() {
    let hub = hub().await;
    let mut config = MobuConfig::new(Url::parse(&hub.uri()).unwrap());
    config.lab_idle = Duration::from_secs(3600);
    let manager = Arc::new(MonkeyManager::new(MonkeyFactory::new(
        Arc::new(config),
        Arc::new(StaticTokenSource::new("token-abc")),
    )));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(mobu_http::serve(
        listener,
        manager.clone(),
        "mobu",
        async move {
            let _ = stopped.await;
        },
    ));

    let http = reqwest::Client::new();
    let response = http
        .post(format!("http://{addr}/mobu/user"))
        .json(&json!({
            "username": "someuser",
            "uidnumber": 1000,
            "business": "JupyterLoginLoop"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["business"], "JupyterLoginLoop");

    // Wait until the monkey is sitting in its lab.
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let seen = hub
                .received_requests()
                .await
                .unwrap_or_default()
                .iter()
                .any(|r| r.url.path() == "/nb/user/someuser/lab");
            if seen {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("monkey reached its lab");

    let listed: Value = http
        .get(format!("http://{addr}/mobu/user"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed[0]["state"], "running");
    drop(http);

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("server shuts down promptly")
        .unwrap()
        .unwrap();

    assert!(manager.is_empty().await);
    let deletes = hub
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "DELETE")
        .count();
    assert_eq!(deletes, 1);
}
