//! # Integration Tests for flota-api
//!
//! Drives the full router with `oneshot`: caller headers, role gating,
//! error mapping, optimistic concurrency, idempotent retries and the
//! incident → work order → billing flow.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use flota_api::state::AppState;

fn test_app() -> (axum::Router, AppState) {
    let state = AppState::with_defaults().unwrap();
    (flota_api::app(state.clone()), state)
}

/// Caller headers for one request.
#[derive(Clone, Copy)]
struct Caller {
    tenant: &'static str,
    actor: &'static str,
    role: &'static str,
}

const JEFE: Caller = Caller {
    tenant: "emt",
    actor: "jefe-01",
    role: "jefe_mantenimiento",
};
const TECNICO: Caller = Caller {
    tenant: "emt",
    actor: "tec-07",
    role: "tecnico",
};
const OPERADOR: Caller = Caller {
    tenant: "emt",
    actor: "op-3",
    role: "operador",
};
const AUDITOR: Caller = Caller {
    tenant: "emt",
    actor: "aud-1",
    role: "auditor",
};

fn request(method: &str, uri: &str, caller: Caller, body: Option<Value>) -> Request<Body> {
    call(method, uri, caller, body, &[])
}

fn call(
    method: &str,
    uri: &str,
    caller: Caller,
    body: Option<Value>,
    extra: &[(&str, &str)],
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-tenant-id", caller.tenant)
        .header("x-actor-id", caller.actor)
        .header("x-actor-role", caller.role);
    for (name, value) in extra {
        builder = builder.header(*name, *value);
    }
    match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&value).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

fn intake(critical: bool) -> Value {
    json!({
        "category": "validadora",
        "description": "no lee tarjetas sin contacto",
        "criticality": { "operator": critical, "maintenance": false },
        "asset_ref": "bus-2041"
    })
}

async fn create_incident(app: &axum::Router) -> Value {
    let (status, body) = send(
        app,
        request("POST", "/v1/incidents", OPERADOR, Some(intake(false))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

// -- Health and documents -----------------------------------------------------

#[tokio::test]
async fn test_health_probes_need_no_headers() {
    let (app, _) = test_app();
    for (uri, expected) in [("/health/liveness", "ok"), ("/health/readiness", "ready")] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], expected.as_bytes());
    }
}

#[tokio::test]
async fn test_openapi_document_served() {
    let (app, _) = test_app();
    let response = app
        .oneshot(Request::builder().uri("/openapi.json").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let doc: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(doc["paths"]["/v1/incidents"].is_object());
}

// -- Caller context and roles -------------------------------------------------

#[tokio::test]
async fn test_missing_caller_headers_is_401() {
    let (app, _) = test_app();
    let req = Request::builder()
        .uri("/v1/incidents")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_role_not_permitted_is_403() {
    let (app, _) = test_app();
    let incident = create_incident(&app).await;
    let order = json!({
        "origin": { "kind": "incidencia", "incident_id": incident["id"] },
        "order_type": "correctivo_programado"
    });
    let (status, body) = send(&app, request("POST", "/v1/work-orders", TECNICO, Some(order))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let uri = format!("/v1/audit/entities/{}", incident["id"].as_str().unwrap());
    let (status, _) = send(&app, request("GET", &uri, OPERADOR, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, entries) = send(&app, request("GET", &uri, AUDITOR, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entries.as_array().unwrap().len(), 1);
    assert_eq!(entries[0]["action"], "create");
}

// -- Error mapping ------------------------------------------------------------

#[tokio::test]
async fn test_malformed_json_is_400() {
    let (app, _) = test_app();
    let req = Request::builder()
        .method("POST")
        .uri("/v1/incidents")
        .header("x-tenant-id", "emt")
        .header("x-actor-id", "op-3")
        .header("x-actor-role", "operador")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_blank_description_is_422() {
    let (app, _) = test_app();
    let mut body = intake(false);
    body["description"] = json!("   ");
    let (status, err) = send(&app, request("POST", "/v1/incidents", OPERADOR, Some(body))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_incident_is_404() {
    let (app, _) = test_app();
    let uri = format!("/v1/incidents/{}", uuid::Uuid::new_v4());
    let (status, body) = send(&app, request("GET", &uri, OPERADOR, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_illegal_transition_is_409() {
    let (app, _) = test_app();
    let incident = create_incident(&app).await;
    let uri = format!("/v1/incidents/{}/transitions", incident["id"].as_str().unwrap());
    let (status, body) = send(
        &app,
        request("POST", &uri, JEFE, Some(json!({ "to": "cerrada" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE");
}

#[tokio::test]
async fn test_other_tenant_cannot_see_incident() {
    let (app, _) = test_app();
    let incident = create_incident(&app).await;
    let stranger = Caller {
        tenant: "tussam",
        ..OPERADOR
    };
    let uri = format!("/v1/incidents/{}", incident["id"].as_str().unwrap());
    let (status, _) = send(&app, request("GET", &uri, stranger, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -- Concurrency and retries --------------------------------------------------

#[tokio::test]
async fn test_stale_if_match_is_concurrency_conflict() {
    let (app, _) = test_app();
    let incident = create_incident(&app).await;
    let id = incident["id"].as_str().unwrap();
    let uri = format!("/v1/incidents/{id}");

    let edit = json!({ "field": "diagnosis", "value": "antena suelta" });
    let if_match = [("if-match", "\"1\"")];
    let (status, updated) = send(&app, call("PATCH", &uri, JEFE, Some(edit), &if_match)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["version"], 2);

    let edit = json!({ "field": "root_cause", "value": "conector" });
    let if_match = [("if-match", "1")];
    let (status, body) = send(&app, call("PATCH", &uri, JEFE, Some(edit), &if_match)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONCURRENCY_CONFLICT");
    assert_eq!(body["error"]["details"]["actual_version"], 2);
}

#[tokio::test]
async fn test_retried_create_returns_same_incident() {
    let (app, state) = test_app();
    let retry = [("x-operation-id", "intake-42")];
    let (s1, first) = send(
        &app,
        call("POST", "/v1/incidents", OPERADOR, Some(intake(false)), &retry),
    )
    .await;
    let (s2, second) = send(
        &app,
        call("POST", "/v1/incidents", OPERADOR, Some(intake(false)), &retry),
    )
    .await;
    assert_eq!((s1, s2), (StatusCode::CREATED, StatusCode::CREATED));
    assert_eq!(first["id"], second["id"]);
    assert_eq!(first["code"], "INC-000001");

    let tenant = flota_core::TenantId::new("emt").unwrap();
    assert_eq!(state.engine.incidents(&tenant, None).len(), 1);
}

// -- End-to-end flow ----------------------------------------------------------

#[tokio::test]
async fn test_incident_to_billed_work_order() {
    let (app, _) = test_app();
    let incident = create_incident(&app).await;
    let incident_id = incident["id"].as_str().unwrap().to_string();

    let uri = format!("/v1/incidents/{incident_id}/allowed-transitions");
    let (_, allowed) = send(&app, request("GET", &uri, OPERADOR, None)).await;
    assert_eq!(allowed["state"], "nueva");
    assert_eq!(allowed["allowed"], json!(["en_analisis"]));

    let order = json!({
        "origin": { "kind": "incidencia", "incident_id": incident_id },
        "order_type": "correctivo_urgente",
        "billable": true
    });
    let (status, order) = send(&app, request("POST", "/v1/work-orders", JEFE, Some(order))).await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["code"], "OT-000001");
    let base = format!("/v1/work-orders/{}", order["id"].as_str().unwrap());

    let steps = [
        ("assign", JEFE, Some(json!({ "technician": "tec-07" }))),
        ("execution", TECNICO, Some(json!({ "intervention_minutes": 90, "travel_minutes": 30 }))),
        ("complete", TECNICO, Some(json!({ "work_performed": "cambio de lector" }))),
        ("validate", JEFE, None),
    ];
    for (step, caller, body) in steps {
        let uri = format!("{base}/{step}");
        let (status, body) = send(&app, request("POST", &uri, caller, body)).await;
        assert_eq!(status, StatusCode::OK, "{step}: {body}");
    }

    let (status, unbilled) = send(&app, request("GET", "/v1/billing/unbilled", JEFE, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unbilled.as_array().unwrap().len(), 1);

    let billed_uri = format!(
        "/v1/billing/work-orders/{}/billed",
        order["id"].as_str().unwrap()
    );
    let (status, billed) = send(&app, request("POST", &billed_uri, JEFE, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(billed["billed_at"].is_string());
    let (status, _) = send(&app, request("POST", &billed_uri, JEFE, None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, chain) = send(&app, request("GET", "/v1/audit/chain/verify", AUDITOR, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chain["chain_valid"], true);
}

#[tokio::test]
async fn test_equipment_registration_and_relocation() {
    let (app, _) = test_app();
    let equipment_type = json!({ "id": "validadora", "name": "Validadora" });
    let (status, _) = send(
        &app,
        request("POST", "/v1/equipment-types", JEFE, Some(equipment_type)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let unit = json!({
        "serial_number": "VAL-0001",
        "code": "V-1",
        "equipment_type_id": "validadora",
        "location": { "kind": "warehouse", "id": "alm-1", "name": "Almacén central" }
    });
    let (status, unit) = send(&app, request("POST", "/v1/equipment", JEFE, Some(unit))).await;
    assert_eq!(status, StatusCode::CREATED, "{unit}");
    assert_eq!(unit["state"], "en_almacen");
    let base = format!("/v1/equipment/{}", unit["id"].as_str().unwrap());

    let movement = json!({
        "kind": "instalacion",
        "destination": { "kind": "bus", "id": "bus-2041", "name": "2041" }
    });
    let movements_uri = format!("{base}/movements");
    let (status, moved) =
        send(&app, request("POST", &movements_uri, TECNICO, Some(movement))).await;
    assert_eq!(status, StatusCode::CREATED, "{moved}");
    assert_eq!(moved["state"], "en_servicio");

    let (_, movements) = send(&app, request("GET", &movements_uri, OPERADOR, None)).await;
    assert_eq!(movements.as_array().unwrap().len(), 2);
    let verify_uri = format!("{base}/movements/verify");
    let (_, report) = send(&app, request("GET", &verify_uri, OPERADOR, None)).await;
    assert_eq!(report["consistent"], true);
    let (_, stats) = send(&app, request("GET", &format!("{base}/stats"), OPERADOR, None)).await;
    assert_eq!(stats["movement_count"], 2);
}
