use std::sync::Arc;

use actix_web::{App, test, web};
use pi_gpio::backend::{HelperCall, MockGpioBackend};
use pi_gpio::config::AppConfig;
use pi_gpio::gpio::GpioManager;
use pi_gpio::pins::Pull;
use pi_gpio::routes::AppState;
use serde_json::Value;

fn sample_config() -> AppConfig {
    serde_json::from_str(
        r#"
        {
            "http": {
                "host": "localhost:8080",
                "path": "/api/v1"
            },
            "gpio": {
                "helper": "gpio-admin",
                "gpio_root": "/sys/devices/virtual/gpio"
            }
        }
        "#,
    )
    .expect("valid sample config")
}

fn sample_state() -> (AppState<MockGpioBackend>, Arc<MockGpioBackend>, String) {
    let cfg = sample_config();
    let backend = Arc::new(MockGpioBackend::new(cfg.gpio.gpio_root.clone()));
    let manager = Arc::new(GpioManager::new(cfg.gpio.clone(), backend.clone()));

    (AppState { manager }, backend, cfg.http.path)
}

#[actix_rt::test]
async fn list_pins_returns_table() {
    let (state, _backend, scope_path) = sample_state();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&scope_path)),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/v1/pins").to_request();
    let response: Value = test::call_and_read_body_json(&app, req).await;

    let pins = response["pins"].as_object().unwrap();
    assert_eq!(pins.len(), 17);
    assert_eq!(pins["11"], 17);
    assert_eq!(response["used"], serde_json::json!([]));
}

#[actix_rt::test]
async fn unknown_pin_returns_404() {
    let (state, backend, scope_path) = sample_state();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&scope_path)),
    )
    .await;
    let req = test::TestRequest::post()
        .uri("/api/v1/pin/99/open")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    let req = test::TestRequest::get()
        .uri("/api/v1/pin/seven/value")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    assert!(backend.calls().is_empty());
}

#[actix_rt::test]
async fn wrong_method_returns_405() {
    let (state, _backend, scope_path) = sample_state();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&scope_path)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/pin/11/open")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 405);

    let req = test::TestRequest::delete()
        .uri("/api/v1/pin/11/value")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 405);
}

#[actix_rt::test]
async fn open_write_read_close_happy_path() {
    let (state, backend, scope_path) = sample_state();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&scope_path)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/pin/11/open")
        .set_payload(r#"{"direction":"output"}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::post()
        .uri("/api/v1/pin/11/value")
        .set_payload("1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::get()
        .uri("/api/v1/pin/11/value")
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "1");

    let req = test::TestRequest::post()
        .uri("/api/v1/pin/11/close")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    assert!(state.manager.used_pins().is_empty());
    assert_eq!(backend.unexport_count(), 1);
}

#[actix_rt::test]
async fn export_alias_accepts_legacy_options_string() {
    let (state, backend, scope_path) = sample_state();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&scope_path)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/pin/7/export")
        .set_payload("in pullup")
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["direction"], "in");
    assert_eq!(resp["pull"], "pullup");

    let req = test::TestRequest::get()
        .uri("/api/v1/pin/7/direction")
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "\"in\"");

    assert_eq!(
        backend.calls(),
        vec![HelperCall::Export {
            line: 4,
            pull: Pull::PullUp
        }]
    );
}

#[actix_rt::test]
async fn set_direction_defaults_unknown_tokens_to_out() {
    let (state, _backend, scope_path) = sample_state();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&scope_path)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/pin/13/open")
        .set_payload("input")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::post()
        .uri("/api/v1/pin/13/direction")
        .set_payload("sideways")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::get()
        .uri("/api/v1/pin/13/direction")
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "\"out\"");
}

#[actix_rt::test]
async fn export_failure_returns_502_with_stderr() {
    let (state, backend, scope_path) = sample_state();
    backend.fail_export(17, "gpio-admin: permission denied");

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&scope_path)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/pin/11/open")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 502);

    let body: Value = test::read_body_json(resp).await;
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("gpio-admin: permission denied")
    );
}

#[actix_rt::test]
async fn invalid_value_payload_returns_400() {
    let (state, _backend, scope_path) = sample_state();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&scope_path)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/pin/11/value")
        .set_payload("maybe")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
async fn cleanup_releases_all_pins() {
    let (state, backend, scope_path) = sample_state();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&scope_path)),
    )
    .await;

    for pin in ["3", "5", "8"] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/pin/{pin}/open"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    let req = test::TestRequest::get().uri("/api/v1/pins").to_request();
    let response: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(response["used"], serde_json::json!([3, 5, 8]));

    let req = test::TestRequest::post().uri("/api/v1/cleanup").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    assert!(state.manager.used_pins().is_empty());
    assert_eq!(backend.unexport_count(), 3);
}
