use std::time::Duration;

use launchpad_common::{EntityKind, LaunchpadError, PageParams};
use launchpad_sync::{EntityFeed, SpaceDevsFeed};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn feed(server: &MockServer) -> SpaceDevsFeed {
    SpaceDevsFeed::new(server.uri(), Duration::from_millis(500)).unwrap()
}

#[tokio::test]
async fn fetches_people_page_with_offset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2.2.0/astronaut/"))
        .and(query_param("limit", "100"))
        .and(query_param("offset", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "results": [
                { "id": 1, "name": "Ada Pilot", "bio": "Test pilot." },
                { "name": "No id" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let people = feed(&server)
        .fetch_page(EntityKind::Person, PageParams { limit: 100, offset: 200 })
        .await
        .unwrap();

    assert_eq!(people.len(), 1);
    assert_eq!(people[0].external_id, "1");
    assert_eq!(people[0].description.as_deref(), Some("Test pilot."));
}

#[tokio::test]
async fn upcoming_events_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2.0.0/event/upcoming/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "id": 9, "name": "Launch X", "description": "d", "date": "2026-12-01T10:00:00Z" }]
        })))
        .mount(&server)
        .await;

    let events = feed(&server)
        .fetch_page(EntityKind::Event, PageParams { limit: 50, offset: 0 })
        .await
        .unwrap();
    assert_eq!(events[0].name, "Launch X");
    assert!(events[0].occurs_at.is_some());
}

#[tokio::test]
async fn non_success_status_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = feed(&server)
        .fetch_page(EntityKind::Vehicle, PageParams { limit: 100, offset: 0 })
        .await
        .unwrap_err();
    match err {
        LaunchpadError::Fetch { kind, reason } => {
            assert_eq!(kind, EntityKind::Vehicle);
            assert!(reason.contains("503"), "{reason}");
        }
        other => panic!("expected fetch error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_feed_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "results": [] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = feed(&server)
        .fetch_page(EntityKind::Event, PageParams { limit: 50, offset: 0 })
        .await
        .unwrap_err();
    assert!(matches!(err, LaunchpadError::Fetch { ref reason, .. } if reason.contains("timed out")));
}
