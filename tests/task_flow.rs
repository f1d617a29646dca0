//! 任务执行与任务循环的端到端测试（模拟控制器和 CRM）

use pycode_worker::clients::ControllerClient;
use pycode_worker::models::{TaskId, Task};
use pycode_worker::workflow::task_runner::NOT_SERIALIZABLE;
use pycode_worker::{Config, TaskLoop, TaskRunner};
use serde_json::{json, Value as JsonValue};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(controller: &MockServer) -> Config {
    Config {
        controller_url: controller.uri(),
        ..Config::default()
    }
}

fn runner_for(controller: &MockServer) -> TaskRunner {
    let config = config_for(controller);
    let http = reqwest::Client::new();
    TaskRunner::new(http.clone(), ControllerClient::new(http, &config), config)
}

fn task(id: i64, code: &str, domain: &str) -> Task {
    Task {
        id: TaskId::Int(id),
        code: code.to_string(),
        domain: domain.to_string(),
        auth_token: "token-1".to_string(),
        args: json!([]),
        request_data: JsonValue::Null,
    }
}

async fn expect_report(controller: &MockServer, report: JsonValue, ok: bool) {
    Mock::given(method("POST"))
        .and(path("/method/set_pycode_task_result/"))
        .and(query_param("secret", "s3cret"))
        .and(body_partial_json(report))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": ok })))
        .expect(1)
        .mount(controller)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_successful_task_is_reported() {
    let controller = MockServer::start().await;
    expect_report(
        &controller,
        json!({
            "secret": "s3cret",
            "task_id": 1,
            "is_success": true,
            "result": {"answer": 42},
            "error": null
        }),
        true,
    )
    .await;

    let task = task(1, "function main() { return {answer: 42}; }", "portal.example");
    let ok = runner_for(&controller)
        .process_task(&task, "s3cret")
        .await
        .unwrap();
    assert!(ok);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_and_unserializable_tasks_are_reported() {
    let controller = MockServer::start().await;
    expect_report(
        &controller,
        json!({"task_id": 2, "is_success": false, "result": null, "error": "Error: nope"}),
        true,
    )
    .await;
    expect_report(
        &controller,
        json!({"task_id": 3, "is_success": false, "result": null, "error": NOT_SERIALIZABLE}),
        true,
    )
    .await;

    let runner = runner_for(&controller);

    let thrown = task(2, "function main() { throw new Error('nope'); }", "portal.example");
    assert!(!runner.process_task(&thrown, "s3cret").await.unwrap());

    let opaque = task(3, "function main() { return () => 1; }", "portal.example");
    assert!(!runner.process_task(&opaque, "s3cret").await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unacknowledged_report_counts_as_failure() {
    let controller = MockServer::start().await;
    expect_report(&controller, json!({"task_id": 4, "is_success": true}), false).await;

    let task = task(4, "function main() { return 'done'; }", "portal.example");
    let ok = runner_for(&controller)
        .process_task(&task, "s3cret")
        .await
        .unwrap();
    assert!(!ok);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_task_code_calls_batch_api() {
    let controller = MockServer::start().await;
    let crm = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/method/batch/"))
        .and(query_param("auth", "token-1"))
        .and(body_partial_json(json!({
            "cmd": {
                "me": "user.current?",
                "data_1": "crm.lead.list?filter[STATUS_ID]=NEW"
            },
            "halt": 1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "result": {"me": {"ID": "1"}, "data_1": [{"ID": "10"}]},
                "result_error": [],
                "result_total": {"data_1": 1}
            }
        })))
        .expect(1)
        .mount(&crm)
        .await;

    expect_report(
        &controller,
        json!({
            "task_id": 5,
            "is_success": true,
            "result": {"names": ["me", "data_1"], "ok": true, "me": "1", "total": 1}
        }),
        true,
    )
    .await;

    let code = r#"
        function main() {
            const res = pycode.batch_api_call(
                [["me", "user.current", null], ["crm.lead.list", {filter: {STATUS_ID: "NEW"}}]],
                true
            );
            return {
                names: res.keys(),
                ok: res.all_ok,
                me: res.get("me").result.ID,
                total: res.get("data_1").total
            };
        }
    "#;
    let task = task(5, code, &crm.uri());
    assert!(runner_for(&controller)
        .process_task(&task, "s3cret")
        .await
        .unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_host_errors_surface_with_kind() {
    let controller = MockServer::start().await;
    expect_report(
        &controller,
        json!({
            "task_id": 6,
            "is_success": false,
            "error": "ValueError: chunk_size must be within the range [1, 50], got 0"
        }),
        true,
    )
    .await;

    let code = r#"function main() { return pycode.batch_api_call([["user.get", null]], false, 0); }"#;
    let task = task(6, code, "portal.example");
    assert!(!runner_for(&controller)
        .process_task(&task, "s3cret")
        .await
        .unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_loop_stops_on_empty_queue() {
    let controller = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/method/get_pycode_task/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "task": null })))
        .expect(1)
        .mount(&controller)
        .await;

    let stats = TaskLoop::new(&config_for(&controller)).run("s3cret").await;
    assert_eq!(stats.processed, 0);
    assert_eq!(stats.errors, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_loop_counts_processed_and_errors() {
    let controller = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/method/get_pycode_task/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task": {
                "id": 10,
                "code": "function main(n) { if (n > 1) throw new RangeError('big'); return n; }",
                "domain": "portal.example",
                "auth_token": "t",
                "args": [1],
                "request_data": null
            }
        })))
        .up_to_n_times(2)
        .mount(&controller)
        .await;
    Mock::given(method("POST"))
        .and(path("/method/get_pycode_task/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task": {
                "id": 11,
                "code": "function main(n) { if (n > 1) throw new RangeError('big'); return n; }",
                "domain": "portal.example",
                "auth_token": "t",
                "args": [2]
            }
        })))
        .up_to_n_times(1)
        .mount(&controller)
        .await;
    Mock::given(method("POST"))
        .and(path("/method/get_pycode_task/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "task": null })))
        .mount(&controller)
        .await;
    Mock::given(method("POST"))
        .and(path("/method/set_pycode_task_result/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(3)
        .mount(&controller)
        .await;

    let stats = TaskLoop::new(&config_for(&controller)).run("s3cret").await;
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.errors, 1);
}

#[tokio::test]
async fn test_loop_stops_when_controller_unreachable() {
    let config = Config {
        controller_url: "http://127.0.0.1:9".to_string(),
        request_timeout_secs: 1,
        ..Config::default()
    };
    let stats = TaskLoop::new(&config).run("s3cret").await;
    assert_eq!(stats.processed, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_loop_runs_null_credentials_and_reports_malformed_tasks() {
    let controller = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/method/get_pycode_task/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task": {
                "id": 20,
                "code": "function main() { return 'ran'; }",
                "domain": null,
                "auth_token": null
            }
        })))
        .up_to_n_times(1)
        .mount(&controller)
        .await;
    Mock::given(method("POST"))
        .and(path("/method/get_pycode_task/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task": {"id": 21, "code": 42, "domain": "portal.example", "auth_token": "t"}
        })))
        .up_to_n_times(1)
        .mount(&controller)
        .await;
    Mock::given(method("POST"))
        .and(path("/method/get_pycode_task/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "task": null })))
        .mount(&controller)
        .await;

    expect_report(
        &controller,
        json!({"task_id": 20, "is_success": true, "result": "ran", "error": null}),
        true,
    )
    .await;
    expect_report(
        &controller,
        json!({"task_id": 21, "is_success": false, "result": null}),
        true,
    )
    .await;

    let stats = TaskLoop::new(&config_for(&controller)).run("s3cret").await;
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.errors, 1);
}
