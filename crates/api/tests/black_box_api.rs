use std::str::FromStr;

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

use gestao_api::config::ApiConfig;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod (in-memory store), bound to an ephemeral port.
        let app = gestao_api::app::build_app(&ApiConfig::default())
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let res = self.client.post(self.url(path)).json(&body).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(serde_json::Value::Null))
    }

    async fn get(&self, path: &str) -> (StatusCode, serde_json::Value) {
        let res = self.client.get(self.url(path)).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(serde_json::Value::Null))
    }

    async fn delete(&self, path: &str) -> (StatusCode, serde_json::Value) {
        let res = self.client.delete(self.url(path)).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(serde_json::Value::Null))
    }

    async fn create_payment_method(&self, name: &str) -> i64 {
        let (status, body) = self.post("/payment-methods", json!({ "name": name })).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    async fn open_receivable(&self, body: serde_json::Value) -> serde_json::Value {
        let (status, body) = self.post("/receivables", body).await;
        assert_eq!(status, StatusCode::CREATED, "open failed: {body}");
        body
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn dec(value: &serde_json::Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("decimal fields are strings")).unwrap()
}

fn receivable(original: &str, due_date: &str) -> serde_json::Value {
    json!({
        "customer_id": 42,
        "document_number": "FAT-0001",
        "document_kind": "FATURA",
        "issue_date": "2020-01-10",
        "due_date": due_date,
        "original_amount": original,
    })
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn open_then_settle_with_adjustments() {
    let srv = TestServer::spawn().await;
    let method = srv.create_payment_method("PIX").await;

    let created = srv.open_receivable(receivable("1000.00", "2099-12-31")).await;
    assert_eq!(created["status"], "ABERTO");
    assert_eq!(dec(&created["balance"]), Decimal::from(1000));
    let id = created["id"].as_i64().unwrap();

    let (status, preview) = srv
        .get(&format!(
            "/receivables/{id}/settlement-preview?discount=100&interest=50&penalty=20"
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["can_settle"], true);
    assert_eq!(dec(&preview["total"]), Decimal::from(970));

    let (status, settled) = srv
        .post(
            &format!("/receivables/{id}/settle"),
            json!({
                "receipt_date": "2020-02-01",
                "payment_method_id": method,
                "discount": "100",
                "interest": "50",
                "penalty": "20",
                "settled_by": 7,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{settled}");
    assert_eq!(settled["status"], "RECEBIDO");
    assert_eq!(dec(&settled["received_amount"]), Decimal::from(970));
    assert_eq!(dec(&settled["balance"]), Decimal::ZERO);
    assert_eq!(settled["receipt_date"], "2020-02-01");
    assert_eq!(settled["payment_method_id"], method);
    assert_eq!(settled["settled_by"], 7);

    // Terminal.
    let (status, body) = srv
        .post(
            &format!("/receivables/{id}/settle"),
            json!({ "receipt_date": "2020-02-02", "payment_method_id": method }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn overdue_receivable_settles_with_stored_interest() {
    let srv = TestServer::spawn().await;
    let method = srv.create_payment_method("Boleto").await;

    let mut body = receivable("500", "2020-01-31");
    body["interest"] = json!("25");
    let created = srv.open_receivable(body).await;
    let id = created["id"].as_i64().unwrap();

    let (status, refreshed) = srv.post("/receivables/overdue/refresh", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["marked_overdue"], 1);

    let (_, overdue) = srv.get("/receivables?status=VENCIDO").await;
    assert_eq!(overdue["items"].as_array().unwrap().len(), 1);

    let (status, settled) = srv
        .post(
            &format!("/receivables/{id}/settle"),
            json!({ "receipt_date": "2020-03-01", "payment_method_id": method }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{settled}");
    assert_eq!(dec(&settled["received_amount"]), Decimal::from(525));
    assert_eq!(settled["status"], "RECEBIDO");
    assert_eq!(dec(&settled["balance"]), Decimal::ZERO);
}

#[tokio::test]
async fn partial_receipt_is_rejected() {
    let srv = TestServer::spawn().await;
    let method = srv.create_payment_method("PIX").await;
    let id = srv.open_receivable(receivable("1000", "2099-12-31")).await["id"]
        .as_i64()
        .unwrap();

    let (status, body) = srv
        .post(
            &format!("/receivables/{id}/settle"),
            json!({
                "received_amount": "400",
                "receipt_date": "2020-02-01",
                "payment_method_id": method,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");

    let (_, current) = srv.get(&format!("/receivables/{id}")).await;
    assert_eq!(current["status"], "ABERTO");
}

#[tokio::test]
async fn missing_fields_and_unknown_ids() {
    let srv = TestServer::spawn().await;
    let method = srv.create_payment_method("PIX").await;

    let (status, body) = srv
        .post(
            "/receivables/999/settle",
            json!({ "receipt_date": "2020-02-01", "payment_method_id": method }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let id = srv.open_receivable(receivable("10", "2099-12-31")).await["id"]
        .as_i64()
        .unwrap();

    let (status, _) = srv
        .post(&format!("/receivables/{id}/settle"), json!({ "receipt_date": "2020-02-01" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = srv
        .post(
            &format!("/receivables/{id}/settle"),
            json!({ "receipt_date": "2020-02-01", "payment_method_id": 12345 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = srv.get("/receivables/not-a-number").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn open_rejects_invalid_input() {
    let srv = TestServer::spawn().await;

    let mut body = receivable("100", "2019-01-01");
    let (status, _) = srv.post("/receivables", body.clone()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    body["due_date"] = json!("2099-01-01");
    body["document_kind"] = json!("RECIBO");
    let (status, _) = srv.post("/receivables", body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = srv.post("/receivables", json!({ "customer_id": 1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_body");
}

#[tokio::test]
async fn cancelled_receivable_cannot_be_settled() {
    let srv = TestServer::spawn().await;
    let method = srv.create_payment_method("PIX").await;
    let id = srv.open_receivable(receivable("80", "2099-12-31")).await["id"]
        .as_i64()
        .unwrap();

    let (status, cancelled) = srv
        .post(&format!("/receivables/{id}/cancel"), json!({ "reason": "issued twice" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELADO");
    assert!(cancelled["notes"].as_str().unwrap().contains("issued twice"));

    let (status, _) = srv
        .post(
            &format!("/receivables/{id}/settle"),
            json!({ "receipt_date": "2020-02-01", "payment_method_id": method }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, preview) = srv.get(&format!("/receivables/{id}/settlement-preview")).await;
    assert_eq!(preview["can_settle"], false);
}

#[tokio::test]
async fn payment_method_removal_is_soft_when_referenced() {
    let srv = TestServer::spawn().await;
    let used = srv.create_payment_method("Cartão").await;
    let unused = srv.create_payment_method("Cheque").await;

    let mut body = receivable("50", "2099-12-31");
    body["payment_method_id"] = json!(used);
    srv.open_receivable(body).await;

    let (status, removed) = srv.delete(&format!("/payment-methods/{used}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["outcome"], "deactivated");

    let (status, removed) = srv.delete(&format!("/payment-methods/{unused}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["outcome"], "deleted");

    let (status, _) = srv.get(&format!("/payment-methods/{unused}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, active) = srv.get("/payment-methods").await;
    assert!(active["items"].as_array().unwrap().is_empty());
    let (_, all) = srv.get("/payment-methods?include_inactive=true").await;
    assert_eq!(all["items"][0]["active"], false);
}

#[tokio::test]
async fn delete_removes_receivable() {
    let srv = TestServer::spawn().await;
    let id = srv.open_receivable(receivable("10", "2099-12-31")).await["id"]
        .as_i64()
        .unwrap();

    let res = srv
        .client
        .delete(srv.url(&format!("/receivables/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let (status, _) = srv.get(&format!("/receivables/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn amounts_outside_the_money_range_are_unprocessable() {
    let srv = TestServer::spawn().await;
    let method = srv.create_payment_method("PIX").await;

    let mut body = receivable("79228162514264337593543950335", "2099-12-31");
    body["interest"] = json!("1");
    let (status, body) = srv.post("/receivables", body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = srv.post("/receivables", receivable("10000000000000", "2099-12-31")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let id = srv.open_receivable(receivable("100", "2099-12-31")).await["id"]
        .as_i64()
        .unwrap();

    let (status, _) = srv
        .get(&format!(
            "/receivables/{id}/settlement-preview?interest=79228162514264337593543950335"
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = srv
        .post(
            &format!("/receivables/{id}/settle"),
            json!({ "receipt_date": "2020-02-01", "payment_method_id": method, "discount": "0.005" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, current) = srv.get(&format!("/receivables/{id}")).await;
    assert_eq!(current["status"], "ABERTO");
}

#[tokio::test]
async fn fully_discounted_receivable_is_rejected() {
    let srv = TestServer::spawn().await;
    let mut body = receivable("100", "2099-12-31");
    body["discount"] = json!("100");
    let (status, _) = srv.post("/receivables", body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
