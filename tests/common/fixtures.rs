//! Mock provider, backend and storage fixtures

use acquisition::auth::{AuthRegistry, StaticAuthorizer};
use acquisition::backend::{BackendClient, Session};
use acquisition::multipart::encode_batch_response;
use acquisition::workflow::Collaborators;
use acquisition::{Config, Credential, Provider, Workflow};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config with every endpoint on the mock server and no throttling
pub fn mock_config(server: &MockServer) -> Config {
    let uri = server.uri();
    let mut config = Config::default();
    config.endpoints.gmail_api = uri.clone();
    config.endpoints.gmail_batch = format!("{}/batch/gmail/v1", uri);
    config.endpoints.graph_api = uri.clone();
    config.endpoints.zoom_api = uri.clone();
    config.endpoints.backend_api = uri;
    config.fetch.chunk_delay = Duration::ZERO;
    config
}

/// A credential for `email`, valid for an hour
pub fn credential(email: &str) -> Credential {
    Credential::new(
        "provider-token",
        email,
        chrono::Utc::now() + chrono::Duration::hours(1),
    )
}

/// Gmail workflow wired to the mock backend, signed in as `email`
pub fn gmail_workflow(server: &MockServer, config: Config, email: &str) -> Workflow {
    let auth = Arc::new(AuthRegistry::single(Arc::new(StaticAuthorizer::new(
        credential(email),
    ))));
    let backend = Arc::new(BackendClient::new(
        reqwest::Client::new(),
        server.uri(),
        Session {
            access_token: "session-jwt".to_string(),
            refresh_token: None,
        },
    ));
    let collaborators = Collaborators::from_backend(auth, backend, &config).expect("collaborators");
    Workflow::new(Provider::Gmail, config, collaborators).expect("workflow")
}

/// Backend allow-list response
pub async fn mount_allow_list(server: &MockServer, emails: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/private/getMyEmails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "emails": emails
        })))
        .mount(server)
        .await;
}

/// Gmail profile for the signed-in account
pub async fn mount_profile(server: &MockServer, email: &str) {
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"emailAddress": email})))
        .mount(server)
        .await;
}

/// A single Gmail list page holding `ids`
pub async fn mount_message_list(server: &MockServer, ids: &[&str]) {
    let messages: Vec<Value> = ids.iter().map(|id| json!({"id": id})).collect();
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": messages,
            "resultSizeEstimate": ids.len()
        })))
        .mount(server)
        .await;
}

/// Metadata payload for one Gmail message
pub fn gmail_metadata(id: &str, from: &str) -> Value {
    json!({
        "id": id,
        "threadId": format!("t-{}", id),
        "payload": {"headers": [
            {"name": "From", "value": from},
            {"name": "To", "value": "me@x.com"},
            {"name": "Date", "value": "Tue, 2 Jun 2020 08:00:00 +0000"}
        ]}
    })
}

/// Multipart batch response answering every id in `ids`
pub fn batch_response(ids: &[&str]) -> ResponseTemplate {
    let parts: Vec<(String, u16, Value)> = ids
        .iter()
        .map(|id| {
            (
                id.to_string(),
                200,
                gmail_metadata(id, &format!("Sender {} <{}@senders.com>", id, id)),
            )
        })
        .collect();
    ResponseTemplate::new(200).set_body_raw(
        encode_batch_response("batch_mock", &parts),
        "multipart/mixed; boundary=batch_mock",
    )
}

/// Signing endpoint issuing `package_id` with an upload URL on the mock server
pub async fn mount_signing(server: &MockServer, package_id: &str) {
    Mock::given(method("GET"))
        .and(path("/private/signGmailPackage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "id": package_id,
            "s3Url": format!("{}/storage/{}", server.uri(), package_id)
        })))
        .mount(server)
        .await;
}

/// Notify endpoint acknowledging `package_id`
pub async fn mount_notify(server: &MockServer, package_id: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/private/gmailPackageUploaded"))
        .and(query_param("id", package_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(expected_calls)
        .mount(server)
        .await;
}
