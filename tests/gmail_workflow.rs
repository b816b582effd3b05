//! End-to-end Gmail runs against mocked provider, backend and storage

mod common;

use acquisition::{Event, Stage, UploadPolicy};
use common::{
    WaitResult, batch_response, drain, gmail_workflow, mock_config, mount_allow_list,
    mount_message_list, mount_notify, mount_profile, mount_signing, wait_for_outcome,
};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn gmail_run_uploads_and_notifies() {
    let server = MockServer::start().await;
    mount_allow_list(&server, &["me@x.com"]).await;
    mount_profile(&server, "Me@x.com").await;
    mount_message_list(&server, &["m1", "m2", "m3"]).await;
    Mock::given(method("POST"))
        .and(path("/batch/gmail/v1"))
        .respond_with(batch_response(&["m1", "m2", "m3"]))
        .expect(1)
        .mount(&server)
        .await;
    mount_signing(&server, "pkg-9").await;
    Mock::given(method("PUT"))
        .and(path("/storage/pkg-9"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    mount_notify(&server, "pkg-9", 1).await;

    let workflow = gmail_workflow(&server, mock_config(&server), "me@x.com");
    let mut events = workflow.subscribe();
    workflow.start().unwrap();

    assert_eq!(
        wait_for_outcome(&mut events, TIMEOUT).await,
        WaitResult::Done("pkg-9".to_string())
    );

    let state = workflow.state();
    assert_eq!(state.stage, Stage::Done);
    assert_eq!(state.progress.messages, 3);
    assert_eq!(state.progress.pages, 1);

    let requests = server.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .unwrap();
    let package: Vec<serde_json::Value> = serde_json::from_slice(&put.body).unwrap();
    assert_eq!(package.len(), 3);
    assert_eq!(package[0]["kind"], "message");
    assert_eq!(package[0]["id"], "m1");
    assert_eq!(package[0]["from"][0]["address"], "m1@senders.com");

    let sign = requests
        .iter()
        .find(|r| r.url.path() == "/private/signGmailPackage")
        .unwrap();
    let query: Vec<(String, String)> = sign.url.query_pairs().into_owned().collect();
    assert!(query.contains(&("size".to_string(), put.body.len().to_string())));
    assert!(query.contains(&("email".to_string(), "me@x.com".to_string())));
}

#[tokio::test]
async fn signing_failure_never_uploads_or_notifies() {
    let server = MockServer::start().await;
    mount_allow_list(&server, &["me@x.com"]).await;
    mount_profile(&server, "me@x.com").await;
    mount_message_list(&server, &["m1"]).await;
    Mock::given(method("POST"))
        .and(path("/batch/gmail/v1"))
        .respond_with(batch_response(&["m1"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/signGmailPackage"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    mount_notify(&server, "pkg-9", 0).await;

    let workflow = gmail_workflow(&server, mock_config(&server), "me@x.com");
    let mut events = workflow.subscribe();
    workflow.start().unwrap();

    match wait_for_outcome(&mut events, TIMEOUT).await {
        WaitResult::Failed(error) => assert!(error.contains("signing data.json failed"), "{}", error),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(workflow.state().stage, Stage::Error);
}

#[tokio::test]
async fn wrong_account_stops_before_listing() {
    let server = MockServer::start().await;
    mount_allow_list(&server, &["a@x.com"]).await;
    mount_profile(&server, "b@x.com").await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let workflow = gmail_workflow(&server, mock_config(&server), "a@x.com");
    let mut events = workflow.subscribe();
    workflow.start().unwrap();

    assert_eq!(
        wait_for_outcome(&mut events, TIMEOUT).await,
        WaitResult::WrongAccount("b@x.com".to_string())
    );
    let wrong = workflow.state().wrong_account.unwrap();
    assert_eq!(wrong.allowed, vec!["a@x.com".to_string()]);
}

#[tokio::test]
async fn cancel_stops_further_chunk_requests() {
    let server = MockServer::start().await;
    mount_allow_list(&server, &["me@x.com"]).await;
    mount_profile(&server, "me@x.com").await;
    mount_message_list(&server, &["m1", "m2", "m3"]).await;
    Mock::given(method("POST"))
        .and(path("/batch/gmail/v1"))
        .respond_with(batch_response(&["m1", "m2", "m3"]).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let mut config = mock_config(&server);
    config.fetch.chunk_size = 1;
    let workflow = gmail_workflow(&server, config, "me@x.com");
    let mut events = workflow.subscribe();
    workflow.start().unwrap();

    let mut state = workflow.watch();
    tokio::time::timeout(
        TIMEOUT,
        state.wait_for(|s| s.stage == Stage::FetchingRecords),
    )
    .await
    .unwrap()
    .unwrap();
    drop(state);

    assert!(workflow.cancel());
    assert_eq!(
        wait_for_outcome(&mut events, TIMEOUT).await,
        WaitResult::Cancelled
    );
    assert_eq!(workflow.state().stage, Stage::NotStarted);

    let batches = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "POST")
        .count();
    assert!(batches <= 1, "no chunk request starts after cancel, saw {}", batches);
}

#[tokio::test]
async fn confirm_before_upload_holds_at_records_fetched() {
    let server = MockServer::start().await;
    mount_allow_list(&server, &["me@x.com"]).await;
    mount_profile(&server, "me@x.com").await;
    mount_message_list(&server, &["m1", "m2"]).await;
    Mock::given(method("POST"))
        .and(path("/batch/gmail/v1"))
        .respond_with(batch_response(&["m1", "m2"]))
        .mount(&server)
        .await;
    mount_signing(&server, "pkg-2").await;
    Mock::given(method("PUT"))
        .and(path("/storage/pkg-2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    mount_notify(&server, "pkg-2", 1).await;

    let mut config = mock_config(&server);
    config.upload_policy = UploadPolicy::ConfirmBeforeUpload;
    let workflow = gmail_workflow(&server, config, "me@x.com");
    let mut events = workflow.subscribe();
    let run = workflow.start().unwrap();

    let mut state = workflow.watch();
    tokio::time::timeout(TIMEOUT, state.wait_for(|s| s.stage == Stage::RecordsFetched))
        .await
        .unwrap()
        .unwrap();
    drop(state);
    assert!(
        !drain(&mut events)
            .iter()
            .any(|e| matches!(e, Event::Signing { .. })),
        "signing waits for confirmation"
    );

    tokio_test::assert_ok!(workflow.confirm_upload());
    run.await.unwrap();
    assert_eq!(workflow.state().stage, Stage::Done);
    tokio_test::assert_err!(workflow.confirm_upload());
}

#[tokio::test]
async fn upload_honors_request_timeout() {
    let server = MockServer::start().await;
    mount_allow_list(&server, &["me@x.com"]).await;
    mount_profile(&server, "me@x.com").await;
    mount_message_list(&server, &["m1"]).await;
    Mock::given(method("POST"))
        .and(path("/batch/gmail/v1"))
        .respond_with(batch_response(&["m1"]))
        .mount(&server)
        .await;
    mount_signing(&server, "pkg-slow").await;
    Mock::given(method("PUT"))
        .and(path("/storage/pkg-slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;
    mount_notify(&server, "pkg-slow", 0).await;

    let mut config = mock_config(&server);
    config.request_timeout = Some(Duration::from_millis(500));
    let workflow = gmail_workflow(&server, config, "me@x.com");
    let mut events = workflow.subscribe();
    workflow.start().unwrap();

    match wait_for_outcome(&mut events, TIMEOUT).await {
        WaitResult::Failed(error) => {
            assert!(error.contains("upload of package pkg-slow failed"), "{}", error)
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}
