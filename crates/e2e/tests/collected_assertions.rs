//! Several independent facts about one notification, reported together

mod common;

use common::{client, fast_polling, Reply, ScriptedTransport};
use converge_e2e::assertions::{
    check_iso_date, check_json_path_bool, check_json_path_value, check_status_code,
    check_text_contains,
};
use converge_e2e::{E2eError, JsonPath, PlatformClient, TestContext};
use reqwest::Method;
use serde_json::json;

fn notification_feed() -> Reply {
    Reply::json(
        200,
        json!({
            "count": 1,
            "data": [{
                "id": "n1",
                "eventType": "autopilot.complete",
                "title": "Autopilot has finished",
                "isRead": 0,
                "createdAt": "2024-05-01T12:00:00Z",
                "relatedProject": {"id": "p1", "name": "churn"}
            }]
        }),
    )
}

#[tokio::test(start_paused = true)]
async fn every_mismatch_is_reported_in_call_order() {
    let t = ScriptedTransport::new();
    t.on(Method::GET, "/api/v2/userNotifications/", vec![notification_feed()]);
    let platform = PlatformClient::new(client(&t), fast_polling());
    let ctx = TestContext::new("autopilot_notification_fields");

    let feed = platform.notifications().await.unwrap();
    let first = |field: &str| JsonPath::parse(&format!("data.[0].{field}")).unwrap();

    let mut errors = ctx.errors();
    check_status_code(&feed, 200, &mut errors, "feed");
    check_json_path_value(&feed, &first("eventType"), &json!("autopilot.complete"), &mut errors, "event").unwrap();
    check_json_path_value(&feed, &first("relatedProject.name"), &json!("attrition"), &mut errors, "project").unwrap();
    check_json_path_bool(&feed, &first("isRead"), false, &mut errors, "read flag").unwrap();
    check_iso_date("2024-05-01T12:00:00Z", &mut errors, "created");
    check_text_contains("Autopilot has finished", "Autopilot has failed", &mut errors, "title");

    assert_eq!(errors.len(), 3);
    assert!(errors.entries()[0].starts_with("[project]"));
    assert!(errors.entries()[1].starts_with("[read flag]"));
    assert!(errors.entries()[2].starts_with("[title]"));

    match errors.into_result().unwrap_err() {
        E2eError::AssertionsFailed { count, report } => {
            assert_eq!(count, 3);
            assert_eq!(report.lines().count(), 3);
            assert!(report.contains("\"attrition\""));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn missing_path_carries_the_searched_document() {
    let t = ScriptedTransport::new();
    t.on(Method::GET, "/api/v2/userNotifications/", vec![notification_feed()]);
    let platform = PlatformClient::new(client(&t), fast_polling());

    let feed = platform.notifications().await.unwrap();
    let mut errors = TestContext::new("missing_field").errors();
    let err = check_json_path_value(
        &feed,
        &JsonPath::parse("data.[0].relatedDeployment.id").unwrap(),
        &json!("d1"),
        &mut errors,
        "deployment",
    )
    .unwrap_err();

    match err {
        E2eError::PathNotFound { path, document } => {
            assert_eq!(path, "data.[0].relatedDeployment.id");
            assert_eq!(document["data"][0]["id"], json!("n1"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(errors.is_empty());
}
