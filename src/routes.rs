use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, Responder, Route, guard, http::Method, web};
use serde::Serialize;

use crate::error::GpioError;
use crate::gpio::{GpioBackend, GpioManager};
use crate::pins::{Direction, PinOptions, parse_pin};

pub struct AppState<B: GpioBackend> {
    pub manager: Arc<GpioManager<B>>,
}

impl<B: GpioBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

#[derive(Serialize)]
struct PinsResponse {
    pins: BTreeMap<u32, u32>,
    used: Vec<u32>,
}

impl<B: GpioBackend + 'static> AppState<B> {
    pub fn api_scope(&self, base_path: &str) -> actix_web::Scope {
        web::scope(base_path)
            .service(
                web::resource("/pins")
                    .route(web::get().to(list_pins::<B>))
                    .route(not_allowed(&[Method::GET])),
            )
            .service(
                web::resource(["/pin/{pin}/open", "/pin/{pin}/export"])
                    .route(web::post().to(open_pin::<B>))
                    .route(not_allowed(&[Method::POST])),
            )
            .service(
                web::resource(["/pin/{pin}/close", "/pin/{pin}/unexport"])
                    .route(web::post().to(close_pin::<B>))
                    .route(not_allowed(&[Method::POST])),
            )
            .service(
                web::resource("/pin/{pin}/direction")
                    .route(web::get().to(get_direction::<B>))
                    .route(web::post().to(set_direction::<B>))
                    .route(not_allowed(&[Method::GET, Method::POST])),
            )
            .service(
                web::resource("/pin/{pin}/value")
                    .route(web::get().to(get_value::<B>))
                    .route(web::post().to(set_value::<B>))
                    .route(not_allowed(&[Method::GET, Method::POST])),
            )
            .service(
                web::resource("/cleanup")
                    .route(web::post().to(cleanup::<B>))
                    .route(not_allowed(&[Method::POST])),
            )
    }
}

async fn list_pins<B: GpioBackend + 'static>(
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, GpioError> {
    let pins = state.manager.table().entries().into_iter().collect();
    let used = state.manager.used_pins();

    Ok(web::Json(PinsResponse { pins, used }))
}

async fn open_pin<B: GpioBackend + 'static>(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, GpioError> {
    let pin = parse_pin_param(&req)?;
    let options = parse_options_payload(&body)?;

    state.manager.open(pin, options).await?;

    Ok(web::Json(options))
}

async fn close_pin<B: GpioBackend + 'static>(
    req: HttpRequest,
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, GpioError> {
    let pin = parse_pin_param(&req)?;

    state.manager.close(pin).await?;

    Ok(HttpResponse::Ok())
}

async fn get_direction<B: GpioBackend + 'static>(
    req: HttpRequest,
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, GpioError> {
    let pin = parse_pin_param(&req)?;
    let direction = state.manager.get_direction(pin).await?;

    Ok(web::Json(direction))
}

async fn set_direction<B: GpioBackend + 'static>(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, GpioError> {
    let pin = parse_pin_param(&req)?;
    let direction = Direction::normalize(&payload_text(&body)?);

    state.manager.set_direction(pin, direction).await?;

    Ok(web::Json(direction))
}

async fn get_value<B: GpioBackend + 'static>(
    req: HttpRequest,
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, GpioError> {
    let pin = parse_pin_param(&req)?;
    let reading = state.manager.read(pin).await?;

    Ok(web::Json(reading))
}

async fn set_value<B: GpioBackend + 'static>(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, GpioError> {
    let pin = parse_pin_param(&req)?;
    let value = parse_value_payload(&body)?;

    state.manager.write(pin, value).await?;

    Ok(HttpResponse::Ok())
}

async fn cleanup<B: GpioBackend + 'static>(
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, GpioError> {
    state.manager.cleanup().await?;

    Ok(HttpResponse::Ok())
}

fn parse_pin_param(req: &HttpRequest) -> Result<u32, GpioError> {
    let pin = req
        .match_info()
        .get("pin")
        .ok_or_else(|| GpioError::InvalidPin("missing pin".into()))?;

    parse_pin(pin)
}

/// Body as text, with a surrounding JSON string unwrapped.
fn payload_text(body: &[u8]) -> Result<String, GpioError> {
    let text = std::str::from_utf8(body)
        .map_err(|_| GpioError::InvalidValue("Payload must be valid UTF-8".into()))?
        .trim();

    match serde_json::from_str::<String>(text) {
        Ok(unquoted) => Ok(unquoted),
        Err(_) => Ok(text.to_string()),
    }
}

fn parse_options_payload(body: &[u8]) -> Result<PinOptions, GpioError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PinOptions::default());
    }

    if body.trim_ascii_start().starts_with(b"{") {
        return serde_json::from_slice(body)
            .map_err(|e| GpioError::InvalidValue(format!("Invalid options payload: {e}")));
    }

    Ok(PinOptions::from(payload_text(body)?.as_str()))
}

fn parse_value_payload(body: &[u8]) -> Result<bool, GpioError> {
    let text = payload_text(body)?;
    if text.is_empty() {
        return Err(GpioError::InvalidValue("Empty value payload".into()));
    }

    match text.to_ascii_lowercase().as_str() {
        "true" | "high" => Ok(true),
        "false" | "low" => Ok(false),
        other => other
            .parse::<i64>()
            .map(|v| v != 0)
            .map_err(|_| GpioError::InvalidValue("Value must be 0, 1, true or false".into())),
    }
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().finish()
}

fn not_allowed(methods: &[Method]) -> Route {
    let allowed: Vec<Method> = methods.to_vec();
    web::route()
        .guard(guard::fn_guard(move |ctx| {
            !allowed.iter().any(|m| *m == ctx.head().method)
        }))
        .to(method_not_allowed)
}
