use super::test_helpers::{Recorder, context, test_config};
use super::*;
use crate::records::RecordKind;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod gmail;

fn ok_json(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn records_loaded(recorder: &Recorder, kind: RecordKind) -> u64 {
    recorder
        .events()
        .iter()
        .filter_map(|e| match e {
            Event::RecordsLoaded { kind: k, count } if *k == kind => Some(*count),
            _ => None,
        })
        .sum()
}

#[test]
fn source_for_matches_provider() {
    for provider in [
        Provider::Gmail,
        Provider::Outlook,
        Provider::Teams,
        Provider::Zoom,
    ] {
        assert_eq!(source_for(provider).provider(), provider);
    }
}

#[test]
fn build_url_encodes_query() {
    let url = build_url(
        "https://graph.example/",
        "/v1.0/me",
        &[("$select", "a,b".to_string())],
    )
    .unwrap();
    assert!(url.starts_with("https://graph.example/v1.0/me?"));
    assert!(url.contains("select=a%2Cb"));
}
