//! 202 → poll → 303 → GET resolution against a scripted transport

mod common;

use common::{client, secs, Reply, ScriptedTransport};
use converge_e2e::{E2eError, OnTimeout, PollPolicy, RedirectResolver, Request};
use reqwest::Method;
use serde_json::json;

fn policy() -> PollPolicy {
    PollPolicy::new(secs(30), secs(2))
}

#[tokio::test(start_paused = true)]
async fn resolves_accepted_operation_after_three_status_polls() {
    let t = ScriptedTransport::new();
    t.on(
        Method::POST,
        "/api/v2/projects/",
        vec![Reply::status(202).location("/status/1")],
    )
    .on(
        Method::GET,
        "/status/1",
        vec![
            Reply::json(200, json!({"status": "RUNNING"})),
            Reply::json(200, json!({"status": "RUNNING"})),
            Reply::status(303).location("/result/1"),
        ],
    )
    .on(
        Method::GET,
        "/result/1",
        vec![Reply::json(200, json!({"id": "abc"}))],
    );

    let api = client(&t);
    let result = RedirectResolver::new(&api, policy())
        .start(Request::post("projects/").json(json!({"projectName": "p"})))
        .await
        .unwrap();

    assert_eq!(result.status_code(), 200);
    assert_eq!(result.json().unwrap(), &json!({"id": "abc"}));
    assert_eq!(t.count(Method::GET, "/status/1"), 3);
    assert_eq!(t.count(Method::GET, "/result/1"), 1);
}

#[tokio::test(start_paused = true)]
async fn status_polls_do_not_follow_redirects() {
    let t = ScriptedTransport::new();
    t.on(Method::POST, "/api/v2/jobs/", vec![Reply::status(202).location("status/7")])
        .on(
            Method::GET,
            "/api/v2/jobs/status/7",
            vec![Reply::status(200), Reply::status(303).location("../../done/7")],
        )
        .on(Method::GET, "/api/v2/done/7", vec![Reply::status(200).body("ok")]);

    let api = client(&t);
    let result = RedirectResolver::new(&api, policy())
        .start(Request::post("jobs/"))
        .await
        .unwrap();
    assert_eq!(result.text(), "ok");

    let seen = t.seen();
    let polls: Vec<_> = seen.iter().filter(|s| s.path == "/api/v2/jobs/status/7").collect();
    assert_eq!(polls.len(), 2);
    assert!(polls.iter().all(|s| !s.follow_redirects));
    let fetch = seen.iter().find(|s| s.path == "/api/v2/done/7").unwrap();
    assert!(fetch.follow_redirects);
}

#[tokio::test(start_paused = true)]
async fn non_accepted_trigger_fails_without_polling() {
    let t = ScriptedTransport::new();
    t.on(
        Method::POST,
        "/api/v2/projects/",
        vec![Reply::json(422, json!({"message": "projectName is required"}))],
    );

    let api = client(&t);
    let err = RedirectResolver::new(&api, policy())
        .start(Request::post("projects/").json(json!({})))
        .await
        .unwrap_err();

    match err {
        E2eError::UnexpectedStatus { expected, actual, body, .. } => {
            assert_eq!(expected, 202);
            assert_eq!(actual, 422);
            assert!(body.contains("projectName is required"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(t.seen().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn accepted_without_location_is_reported() {
    let t = ScriptedTransport::new();
    t.on(Method::POST, "/api/v2/projects/", vec![Reply::status(202)]);

    let api = client(&t);
    let err = RedirectResolver::new(&api, policy())
        .start(Request::post("projects/"))
        .await
        .unwrap_err();

    assert!(
        matches!(&err, E2eError::MissingHeader { name, .. } if name.eq_ignore_ascii_case("location")),
        "{err:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn stuck_status_times_out_naming_the_status_url() {
    let t = ScriptedTransport::new();
    t.on(Method::POST, "/api/v2/projects/", vec![Reply::status(202).location("/status/9")])
        .on(Method::GET, "/status/9", vec![Reply::json(200, json!({"status": "RUNNING"}))]);

    let api = client(&t);
    // a tolerant policy is overridden: an unresolved chain has nothing to return
    let tolerant = policy().with_on_timeout(OnTimeout::ReturnLast);
    let err = RedirectResolver::new(&api, tolerant)
        .start(Request::post("projects/"))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    match err {
        E2eError::PollTimeout { expected, .. } => {
            assert!(expected.contains("http://scripted.test/status/9"), "{expected}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(t.count(Method::GET, "/status/9") >= 15);
}

#[tokio::test(start_paused = true)]
async fn server_errors_on_the_status_resource_are_retried() {
    let t = ScriptedTransport::new();
    t.on(
        Method::GET,
        "/status/3",
        vec![
            Reply::status(502),
            Reply::status(200),
            Reply::status(303).location("/result/3"),
        ],
    )
    .on(Method::GET, "/result/3", vec![Reply::json(200, json!({"ok": true}))]);

    let api = client(&t);
    let result = RedirectResolver::new(&api, policy())
        .follow_status("http://scripted.test/status/3")
        .await
        .unwrap();

    assert_eq!(result.json().unwrap()["ok"], json!(true));
    assert_eq!(t.count(Method::GET, "/status/3"), 3);
}
