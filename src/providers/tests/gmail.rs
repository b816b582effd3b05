use super::*;
use crate::multipart::encode_batch_response;
use crate::records::Record;

fn message_page(prefix: &str, count: usize, next: Option<&str>) -> Value {
    let messages: Vec<Value> = (0..count)
        .map(|i| json!({"id": format!("{}{}", prefix, i), "threadId": "t"}))
        .collect();
    let mut body = json!({"messages": messages, "resultSizeEstimate": 10_500});
    if let Some(next) = next {
        body["nextPageToken"] = json!(next);
    }
    body
}

fn metadata(id: &str, from: &str) -> Value {
    json!({
        "id": id,
        "threadId": format!("thread-{}", id),
        "payload": {"headers": [
            {"name": "From", "value": from},
            {"name": "To", "value": "me@x.com"}
        ]}
    })
}

fn batch_response(parts: &[(String, u16, Value)]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        encode_batch_response("batch_resp", parts),
        "multipart/mixed; boundary=batch_resp",
    )
}

#[tokio::test]
async fn listing_follows_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .and(query_param("pageToken", "p2"))
        .respond_with(ok_json(message_page("b", 5000, Some("p3"))))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .and(query_param("pageToken", "p3"))
        .respond_with(ok_json(message_page("c", 120, None)))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .and(query_param("maxResults", "5000"))
        .respond_with(ok_json(message_page("a", 5000, Some("p2"))))
        .with_priority(10)
        .mount(&server)
        .await;

    let recorder = Recorder::default();
    let ctx = context(test_config(&server.uri()), &recorder);
    let ids = GmailSource.list_message_ids(&ctx).await.unwrap();

    assert_eq!(ids.len(), 10_120);
    assert_eq!(ids[0], "a0");
    assert_eq!(ids[10_119], "c119");
    assert_eq!(recorder.pages(), 3, "one progress event per page");
    assert!(recorder.events().iter().all(|e| match e {
        Event::PageLoaded {
            estimated_total, ..
        } => *estimated_total == Some(10_500),
        _ => true,
    }));
}

#[tokio::test]
async fn empty_mailbox_lists_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .respond_with(ok_json(json!({"resultSizeEstimate": 0})))
        .mount(&server)
        .await;

    let recorder = Recorder::default();
    let ctx = context(test_config(&server.uri()), &recorder);
    let records = GmailSource.collect(&ctx).await.unwrap();

    assert!(records.is_empty());
    assert_eq!(recorder.pages(), 0);
    assert!(recorder.events().contains(&Event::TotalRecords {
        kind: RecordKind::Message,
        total: 0
    }));
}

#[tokio::test]
async fn collect_batches_headers_and_skips_failed_parts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .respond_with(ok_json(json!({"messages": [{"id": "m1"}, {"id": "m2"}, {"id": "m3"}]})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/batch/gmail/v1"))
        .respond_with(batch_response(&[
            ("m3".into(), 200, metadata("m3", "Carol <carol@x.com>")),
            ("m2".into(), 404, json!({"error": {"code": 404}})),
            ("m1".into(), 200, metadata("m1", "alice@x.com")),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let recorder = Recorder::default();
    let ctx = context(test_config(&server.uri()), &recorder);
    let records = GmailSource.collect(&ctx).await.unwrap();

    let ids: Vec<&str> = records
        .iter()
        .map(|r| match r {
            Record::Message(m) => m.id.as_str(),
            other => panic!("unexpected record {:?}", other),
        })
        .collect();
    assert_eq!(ids, vec!["m1", "m3"], "input order kept, failed part skipped");

    if let Record::Message(m) = &records[1] {
        assert_eq!(m.from[0].name.as_deref(), Some("Carol"));
        assert_eq!(m.thread_id.as_deref(), Some("thread-m3"));
    }

    let requests = server.received_requests().await.unwrap();
    let batch = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();
    let content_type = batch
        .headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("multipart/mixed; boundary=batch_"));
    assert_eq!(
        batch.headers.get("authorization").unwrap().to_str().unwrap(),
        "Bearer tok"
    );
    let body = String::from_utf8(batch.body.clone()).unwrap();
    for id in ["m1", "m2", "m3"] {
        assert!(body.contains(&format!("Content-ID: <item:{}>", id)));
    }
    assert!(body.contains("/gmail/v1/users/me/messages/m2?format=metadata"));

    let events = recorder.events();
    let fetching = events
        .iter()
        .position(|e| *e == Event::FetchingStarted)
        .unwrap();
    let total = events
        .iter()
        .position(|e| {
            *e == Event::TotalRecords {
                kind: RecordKind::Message,
                total: 3,
            }
        })
        .unwrap();
    assert!(total < fetching);
    assert_eq!(records_loaded(&recorder, RecordKind::Message), 2);
}

#[tokio::test]
async fn ids_are_fetched_in_configured_chunks() {
    let server = MockServer::start().await;
    let ids: Vec<Value> = (0..5).map(|i| json!({"id": format!("m{}", i)})).collect();
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .respond_with(ok_json(json!({"messages": ids})))
        .mount(&server)
        .await;
    let parts: Vec<(String, u16, Value)> = (0..5)
        .map(|i| {
            let id = format!("m{}", i);
            let body = metadata(&id, "x@x.com");
            (id, 200, body)
        })
        .collect();
    Mock::given(method("POST"))
        .and(path("/batch/gmail/v1"))
        .respond_with(batch_response(&parts))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.fetch.chunk_size = 2;
    let recorder = Recorder::default();
    let records = GmailSource
        .collect(&context(config, &recorder))
        .await
        .unwrap();

    assert_eq!(records.len(), 5);
    assert_eq!(records_loaded(&recorder, RecordKind::Message), 5);
}

#[tokio::test]
async fn batch_failure_fails_the_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .respond_with(ok_json(json!({"messages": [{"id": "m1"}]})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let recorder = Recorder::default();
    let err = GmailSource
        .collect(&context(test_config(&server.uri()), &recorder))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        crate::error::Error::Api(crate::error::ApiError::Status { status: 429, .. })
    ));
}

#[tokio::test]
async fn whoami_reads_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/profile"))
        .respond_with(ok_json(json!({"emailAddress": "A@x.com", "messagesTotal": 3})))
        .mount(&server)
        .await;

    let recorder = Recorder::default();
    let email = GmailSource
        .whoami(&context(test_config(&server.uri()), &recorder))
        .await
        .unwrap();
    assert_eq!(email, "A@x.com");
}
