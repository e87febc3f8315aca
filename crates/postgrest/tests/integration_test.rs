use castgate_postgrest::{PostgrestClient, PostgrestError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Row {
    id: String,
    role: Option<String>,
}

fn client(server: &MockServer) -> PostgrestClient {
    PostgrestClient::new(&server.uri(), "anon", "profiles", Client::new())
        .with_auth("user_token")
        .unwrap()
}

#[tokio::test]
async fn test_maybe_single_zero_rows_is_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", "eq.u-1"))
        .and(query_param("limit", "2"))
        .and(header("authorization", "Bearer user_token"))
        .and(header("apikey", "anon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let row = client(&mock_server)
        .select("*")
        .eq("id", "u-1")
        .maybe_single::<Row>()
        .await
        .unwrap();

    assert!(row.is_none());
}

#[tokio::test]
async fn test_maybe_single_one_and_many() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", "eq.u-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": "u-1", "role": "talent" }])),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("role", "eq.admin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "a-1", "role": "admin" },
            { "id": "a-2", "role": "admin" }
        ])))
        .mount(&mock_server)
        .await;

    let one = client(&mock_server)
        .eq("id", "u-1")
        .maybe_single::<Row>()
        .await
        .unwrap();
    assert_eq!(
        one,
        Some(Row {
            id: "u-1".into(),
            role: Some("talent".into())
        })
    );

    let many = client(&mock_server)
        .eq("role", "admin")
        .maybe_single::<Row>()
        .await;
    assert!(matches!(many, Err(PostgrestError::MultipleRows(2))));
}

#[tokio::test]
async fn test_api_error_details_are_parsed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "PGRST301",
            "message": "JWT expired",
            "details": null,
            "hint": null
        })))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .eq("id", "u-1")
        .execute::<Row>()
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(reqwest::StatusCode::UNAUTHORIZED));
    match err {
        PostgrestError::ApiError { details, .. } => {
            assert_eq!(details.code.as_deref(), Some("PGRST301"));
            assert_eq!(details.message.as_deref(), Some("JWT expired"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_update_returns_representation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", "eq.u-1"))
        .and(header("prefer", "return=representation"))
        .and(body_json(json!({ "location": "Lagos" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "id": "u-1", "location": "Lagos" }])),
        )
        .mount(&mock_server)
        .await;

    let updated = client(&mock_server)
        .eq("id", "u-1")
        .update(json!({ "location": "Lagos" }))
        .await
        .unwrap();

    assert_eq!(updated[0]["location"], "Lagos");
}

#[tokio::test]
async fn test_update_no_content_is_null() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let updated = client(&mock_server)
        .eq("id", "u-1")
        .update(json!({ "location": "Lagos" }))
        .await
        .unwrap();

    assert!(updated.is_null());
}

#[tokio::test]
async fn test_update_with_unserializable_body_is_not_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    // JSON object keys have to be strings.
    let mut values = std::collections::HashMap::new();
    values.insert((1, 2), "location");

    let result = client(&mock_server).eq("id", "u-1").update(values).await;
    assert!(matches!(result, Err(PostgrestError::SerializationError(_))));
}
