//! Default transport stack against a mock collector.

use mockito::Matcher;
use pagepulse_agent::simulated::{PageLoadFixture, SimulatedHost};
use pagepulse_agent::Agent;
use pagepulse_core::config::{AgentConfig, AppConfig, TransportConfig};
use pagepulse_core::config_manager::ConfigManager;
use serde_json::json;
use url::Url;

const FIXTURE: &str = include_str!("../fixtures/page_load.json");

#[tokio::test]
async fn recorded_page_load_is_posted_when_beacons_are_refused() {
    let mut server = mockito::Server::new_async().await;
    let base = server
        .mock("POST", "/rum/base")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "data": {
                "dns-time": "0.030",
                "tcp-time": "0.020",
                "tls-time": "0.015",
                "http-time": "0.060",
                "dom-content-loaded-time": "0.160",
                "full-load-time": "0.310",
                "address": "https://shop.example.com/cart",
                "first-paint-time": "0.098",
                "effectiveType": "4g",
                "ip": "1.2.3.4",
                "city": "Beijing",
                "browserType": 6,
                "language": "en-us"
            }
        })))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let slow = server
        .mock("POST", "/rum/slow")
        .match_body(Matcher::PartialJson(json!({
            "data": [{ "name": "https://cdn.example.com/app.js", "initiatorType": "script" }]
        })))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let geo = server
        .mock("GET", "/cityjson")
        .with_status(200)
        .with_body(r#"var returnCitySN = {"cip": "1.2.3.4", "cid": "110000", "cname": "Beijing"};"#)
        .create_async()
        .await;

    let config = AppConfig {
        agent: AgentConfig {
            slower_time: 100.0,
            port: format!("{}/rum/base", server.url()),
            slower_port: format!("{}/rum/slow", server.url()),
            ..Default::default()
        },
        transport: TransportConfig {
            request_timeout_ms: 5_000,
            geo_endpoint: Some(format!("{}/cityjson", server.url())),
        },
        join_timeout_ms: None,
    };

    let fixture: PageLoadFixture = serde_json::from_str(FIXTURE).unwrap();
    let host = SimulatedHost::from_fixture(&fixture);
    let agent = Agent::builder(config, host.capabilities())
        .beacon(host.clone())
        .build();

    let tasks = agent.start().unwrap();
    host.play_page_load().await;
    let record = tasks.pipeline.await.unwrap().unwrap();

    assert_eq!(record.network().city.as_deref(), Some("Beijing"));
    // both reports were offered to the beacon first
    assert_eq!(host.beacons().len(), 2);
    base.assert_async().await;
    slow.assert_async().await;
    geo.assert_async().await;
}

#[tokio::test]
async fn accepted_beacons_never_reach_http() {
    let mut server = mockito::Server::new_async().await;
    let base = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let fixture: PageLoadFixture = serde_json::from_str(FIXTURE).unwrap();
    let host = SimulatedHost::from_fixture(&fixture);
    host.set_accept_beacons(true);

    let config = AppConfig {
        agent: AgentConfig {
            port: "/rum/base".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    let agent = Agent::builder(config, host.capabilities())
        .beacon(host.clone())
        .base_url(Url::parse("https://shop.example.com/cart").unwrap())
        .build();

    let tasks = agent.start().unwrap();
    host.play_page_load().await;
    tasks.pipeline.await.unwrap().unwrap();

    let beacons = host.beacons();
    assert_eq!(beacons.len(), 1);
    assert_eq!(beacons[0].0, "https://shop.example.com/rum/base");
    assert!(beacons[0].1.starts_with(r#"{"data":{"#));
    base.assert_async().await;
}

#[test]
fn config_file_drives_the_agent() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "agent": { "observe": true, "slowerPort": "/slow", "slowerTime": 250, "log": "loud" } }"#,
    )
    .unwrap();

    let manager = ConfigManager::with_path(path).unwrap();
    let agent = Agent::init(manager.get(), SimulatedHost::new().capabilities());

    let config = &agent.config().agent;
    assert!(config.continuous_enabled());
    assert_eq!(config.slower_time, 250.0);
    assert!(!config.log);
}
