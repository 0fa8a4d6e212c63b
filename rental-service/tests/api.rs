use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use bigdecimal::BigDecimal;
use rental_service::api::{create_router, AppState};
use rental_service::{DocStore, MemoryStore, MethodHandler, RentalWorkflow, Settings};
use rental_shared::{RentalBooking, Vehicle};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    memory: Arc<MemoryStore>,
    store: DocStore,
    router: Router,
}

async fn app() -> TestApp {
    let memory = Arc::new(MemoryStore::new());
    let store = DocStore::new(memory.clone());
    store
        .insert(&Vehicle {
            name: "MH-12-9876".into(),
            make: "Honda".into(),
            model: "City".into(),
            license_plate: "MH-12-9876".into(),
            rate_per_day: BigDecimal::from(80),
            ..Default::default()
        })
        .await
        .unwrap();
    let workflow = RentalWorkflow::new(store.clone(), Settings::default());
    let router = create_router(AppState {
        handler: MethodHandler::new(workflow),
    });
    TestApp { memory, store, router }
}

impl TestApp {
    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    async fn call(&self, method: &str, args: Value) -> Value {
        let (status, body) = self.post(&format!("/api/method/{method}"), args).await;
        assert_eq!(status, StatusCode::OK, "{method}: {body}");
        body
    }

    async fn confirmed_booking(&self) -> String {
        let saved = self
            .call(
                "save_booking",
                json!({
                    "customer": "Sam Lee",
                    "vehicle": "MH-12-9876",
                    "rental_start": "2025-08-01",
                    "rental_end": "2025-08-04"
                }),
            )
            .await;
        let name = saved["booking_name"].as_str().unwrap().to_string();
        let submitted = self.call("submit_booking", json!({ "booking": name })).await;
        assert_eq!(submitted["new_status"], "Confirmed");
        name
    }
}

#[tokio::test]
async fn health_check_answers_ok() {
    let app = app().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".into()));
}

#[tokio::test]
async fn unknown_methods_and_bad_bodies_are_bad_requests() {
    let app = app().await;
    let (status, body) = app.post("/api/method/drop_everything", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("drop_everything"));

    let request = Request::builder()
        .method("POST")
        .uri("/api/method/get_booking_summary")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_flow_needs_no_body() {
    let app = app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/method/get_status_flow")
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert!(!body["flow"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn rule_violations_come_back_as_error_replies() {
    let app = app().await;
    let name = app.confirmed_booking().await;

    let body = app
        .call("complete_post_inspection", json!({ "booking": name }))
        .await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "pre_inspection_missing");

    let body = app.call("get_booking_summary", json!({ "booking": "RB-1999-01-0001" })).await;
    assert_eq!(body["code"], "unknown_document");
}

#[tokio::test]
async fn pre_inspection_moves_booking_out() {
    let app = app().await;
    let name = app.confirmed_booking().await;

    let body = app
        .call("complete_pre_inspection", json!({ "booking": name, "notes": "No scratches" }))
        .await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["new_status"], "Out");
    assert!(body["inspection_name"].as_str().unwrap().starts_with("PI-"));

    let body = app.call("get_booking_summary", json!({ "booking": name })).await;
    assert_eq!(body["summary"]["status"], "Out");
    assert_eq!(body["summary"]["vehicle_status"], "Rented");
}

#[tokio::test]
async fn availability_lists_conflicts() {
    let app = app().await;
    let name = app.confirmed_booking().await;

    let body = app
        .call(
            "get_vehicle_availability",
            json!({ "vehicle": "MH-12-9876", "start_date": "2025-08-03", "end_date": "2025-08-06" }),
        )
        .await;
    assert_eq!(body["available"], false);
    assert_eq!(body["conflicts"][0]["booking"], Value::String(name));
    assert_eq!(body["conflicts"][0]["overlap_type"], "partial");
}

#[tokio::test]
async fn payment_webhook_completes_a_paid_rental() {
    let app = app().await;
    let name = app.confirmed_booking().await;
    app.call("complete_pre_inspection", json!({ "booking": name })).await;
    app.call("complete_post_inspection", json!({ "booking": name, "fuel_level": "Half" }))
        .await;

    let body = app
        .call("create_sales_invoice_from_booking", json!({ "booking": name }))
        .await;
    assert_eq!(body["status"], "success");
    let invoice = body["sales_invoice"].as_str().unwrap().to_string();

    let again = app
        .call("create_sales_invoice_from_booking", json!({ "booking": name }))
        .await;
    assert_eq!(again["code"], "invoice_exists");

    let mut paid: rental_shared::SalesInvoice = app.store.load(&invoice).await.unwrap();
    app.store.submit(&mut paid).await.unwrap();
    paid.outstanding_amount = BigDecimal::from(0);
    app.store
        .save(&paid, rental_service::WriteMode::AfterSubmit)
        .await
        .unwrap();

    let (status, body) = app
        .post(
            "/webhooks/payment-entry",
            json!({
                "name": "PE-2025-08-0001",
                "references": [{ "reference_doctype": "Sales Invoice", "reference_name": invoice }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bookings"][0]["booking"], Value::String(name.clone()));
    assert_eq!(body["bookings"][0]["result"], "completed");

    let booking: RentalBooking = app.store.load(&name).await.unwrap();
    assert_eq!(booking.status, rental_shared::BookingStatus::Completed);

    let body = app.call("check_and_complete_if_paid", json!({ "booking": name })).await;
    assert_eq!(body["status"], "already_completed");

    let (status, body) = app
        .post("/webhooks/sales-invoice", json!({ "name": invoice }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bookings"], json!([]));
}

#[tokio::test]
async fn store_outage_is_a_server_error() {
    let app = app().await;
    app.memory.fail_writes::<RentalBooking>().await;
    let (status, body) = app
        .post(
            "/api/method/save_booking",
            json!({ "customer": "Sam Lee", "vehicle": "MH-12-9876" }),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().is_some());
}
