//! batch 调用的端到端测试（模拟 CRM）

use std::time::Duration;

use pycode_worker::error::{ApiError, AppError, ValidationError};
use pycode_worker::{BatchExecutor, BatchOptions, CallSpec, CrmClient, ExecutionContext};
use serde_json::{json, Value as JsonValue};
use tokio_test::assert_err;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn executor_for(server: &MockServer) -> BatchExecutor {
    BatchExecutor::new(CrmClient::new(
        reqwest::Client::new(),
        ExecutionContext::new("secret", server.uri(), "token-1"),
        Duration::from_secs(5),
    ))
}

fn options(chunk_size: usize) -> BatchOptions {
    BatchOptions {
        chunk_size,
        ..BatchOptions::default()
    }
}

fn chunk_body(names: &[&str]) -> JsonValue {
    let result: serde_json::Map<String, JsonValue> = names
        .iter()
        .map(|n| (n.to_string(), json!({ "ID": n })))
        .collect();
    json!({
        "result": {
            "result": result,
            "result_error": [],
            "result_time": {},
            "result_total": [],
            "result_next": []
        },
        "time": {}
    })
}

#[tokio::test]
async fn test_five_calls_in_chunks_of_two() {
    let server = MockServer::start().await;

    for names in [&["data_0", "data_1"][..], &["data_2", "data_3"], &["data_4"]] {
        let cmd: serde_json::Map<String, JsonValue> = names
            .iter()
            .map(|n| (n.to_string(), json!("user.get?")))
            .collect();
        Mock::given(method("POST"))
            .and(path("/method/batch/"))
            .and(query_param("auth", "token-1"))
            .and(body_partial_json(json!({ "cmd": cmd, "halt": 0 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(chunk_body(names)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let methods: Vec<CallSpec> = (0..5).map(|_| CallSpec::unnamed("user.get", None)).collect();
    let result = executor_for(&server)
        .execute(&methods, &options(2))
        .await
        .unwrap();

    let names: Vec<&str> = result.names().collect();
    assert_eq!(names, vec!["data_0", "data_1", "data_2", "data_3", "data_4"]);
    assert_eq!(result.get("data_3").unwrap().result, json!({"ID": "data_3"}));
    assert!(result.all_ok());
}

#[tokio::test]
async fn test_invalid_input_sends_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let executor = executor_for(&server);
    let methods = vec![CallSpec::unnamed("user.get", None)];

    let err = assert_err!(executor.execute(&methods, &options(0)).await);
    assert!(matches!(
        err,
        AppError::Validation(ValidationError::InvalidChunkSize(_))
    ));
    assert_err!(executor.execute(&[], &options(51)).await);

    let duplicated = vec![
        CallSpec::named("x", "user.get", None),
        CallSpec::named("x", "user.current", None),
    ];
    let err = assert_err!(executor.execute(&duplicated, &options(50)).await);
    assert_eq!(err.kind(), "ValueError");

    let empty = executor.execute(&[], &options(50)).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_per_call_errors_are_kept() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/method/batch/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "result": {"lead": {"ID": "1"}},
                "result_error": {"deal": {"error": "NOT_FOUND", "error_description": "Not found"}},
                "result_time": {"lead": {"duration": 0.01}},
                "result_total": {"lead": 1},
                "result_next": []
            }
        })))
        .mount(&server)
        .await;

    let methods = vec![
        CallSpec::named("lead", "crm.lead.get", json!({"ID": 1}).as_object().cloned()),
        CallSpec::named("deal", "crm.deal.get", json!({"ID": 2}).as_object().cloned()),
    ];
    let result = executor_for(&server)
        .execute(&methods, &options(50))
        .await
        .unwrap();

    assert!(!result.all_ok());
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()["deal"]["error"], "NOT_FOUND");
    let successes = result.successes();
    assert_eq!(successes.len(), 1);
    assert_eq!(successes["lead"].next, json!(1));
    assert!(result.get("deal").unwrap().result.is_null());
}

#[tokio::test]
async fn test_later_chunk_failure_fails_whole_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/method/batch/"))
        .and(body_partial_json(json!({"cmd": {"data_0": "user.get?"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chunk_body(&["data_0"])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/method/batch/"))
        .and(body_partial_json(json!({"cmd": {"data_1": "user.get?"}})))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let methods: Vec<CallSpec> = (0..2).map(|_| CallSpec::unnamed("user.get", None)).collect();
    let err = executor_for(&server)
        .execute(&methods, &options(1))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "BatchFailed");
    assert!(matches!(
        err,
        AppError::Api(ApiError::BatchFailed { status: 502, .. })
    ));
}

#[tokio::test]
async fn test_top_level_error_is_batch_api_call_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/method/batch/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "expired_token",
            "error_description": "The access token provided has expired."
        })))
        .mount(&server)
        .await;

    let methods = vec![CallSpec::unnamed("user.get", None)];
    let err = executor_for(&server)
        .execute(&methods, &options(50))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "BatchApiCallError");
    assert!(err.to_string().contains("expired_token"));
}

#[tokio::test]
async fn test_response_without_result_fails_instead_of_empty_entries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/method/batch/"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "maintenance": true })))
        .expect(1)
        .mount(&server)
        .await;

    let methods = vec![CallSpec::unnamed("user.get", None)];
    let err = executor_for(&server)
        .execute(&methods, &options(50))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "BatchFailed");
    assert!(err.to_string().contains("maintenance"));
}
