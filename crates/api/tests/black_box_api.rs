use chrono::{Datelike, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use pretty_assertions::assert_eq;
use procura_auth::{JwtClaims, PrincipalId, Role};
use procura_core::TenantId;
use reqwest::StatusCode;
use serde_json::{json, Value};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = procura_api::app::build_app(jwt_secret.to_string());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, tenant_id: TenantId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        tenant_id,
        roles,
        issued_at: now - ChronoDuration::seconds(5),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn token(tenant_id: TenantId, role: &'static str) -> String {
    mint_jwt(SECRET, tenant_id, vec![Role::new(role)])
}

async fn post(client: &reqwest::Client, url: String, token: &str, body: Value) -> (StatusCode, Value) {
    let res = client.post(url).bearer_auth(token).json(&body).send().await.unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn get(client: &reqwest::Client, url: String, token: &str) -> (StatusCode, Value) {
    let res = client.get(url).bearer_auth(token).send().await.unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

fn id_of(body: &Value) -> String {
    body["id"].as_str().expect("record id").to_string()
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn(SECRET).await;
    let res = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let server = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/requests")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");

    let res = client
        .get(server.url("/requests"))
        .bearer_auth(mint_jwt("some-other-secret", TenantId::new(), vec![Role::new("admin")]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_reflects_the_token() {
    let server = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();

    let (status, body) = get(&client, server.url("/whoami"), &token(tenant_id, "finance")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant_id"], json!(tenant_id.to_string()));
    assert_eq!(body["roles"], json!(["finance"]));
}

#[tokio::test]
async fn viewer_cannot_create_requests() {
    let server = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let viewer = token(TenantId::new(), "viewer");

    let (status, body) = post(
        &client,
        server.url("/requests"),
        &viewer,
        json!({ "title": "Laptops", "department": "IT", "items": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = get(&client, server.url("/requests"), &viewer).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn request_lifecycle_feeds_a_numbered_purchase_order() {
    let server = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();
    let requester = token(tenant_id, "requester");
    let officer = token(tenant_id, "procurement_officer");

    let (status, created) = post(
        &client,
        server.url("/requests"),
        &requester,
        json!({
            "title": "Laptops",
            "department": "IT",
            "items": [
                { "description": "Laptop", "quantity": 2.0, "estimated_unit_price": 1000.0 },
                { "description": "Dock", "quantity": 2.0, "estimated_unit_price": 150.0 }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "draft");
    let request_id = id_of(&created);

    let (status, submitted) = post(&client, server.url(&format!("/requests/{request_id}/submit")), &requester, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submitted["status"], "submitted");

    // Requesters cannot approve their own requests.
    let (status, _) = post(&client, server.url(&format!("/requests/{request_id}/approve")), &requester, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Approval needs a review first.
    let (status, _) = post(&client, server.url(&format!("/requests/{request_id}/approve")), &officer, json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, reviewed) = post(&client, server.url(&format!("/requests/{request_id}/review")), &officer, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["status"], "in_review");

    let (status, approved) = post(&client, server.url(&format!("/requests/{request_id}/approve")), &officer, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");

    let year = Utc::now().year();
    let order = json!({
        "vendor_name": "Acme Supplies",
        "request_id": request_id,
        "lines": [{ "description": "Laptop", "quantity": 2.0, "unit_price": 980.0 }]
    });
    let (status, first) = post(&client, server.url("/purchases/orders"), &officer, order.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["po_number"], json!(format!("PO-{year}-0001")));
    assert_eq!(first["status"], "draft");

    let (status, second) = post(&client, server.url("/purchases/orders"), &officer, order).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["po_number"], json!(format!("PO-{year}-0002")));
}

#[tokio::test]
async fn purchase_orders_need_an_approved_request() {
    let server = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();
    let officer = token(tenant_id, "procurement_officer");

    let (_, draft) = post(
        &client,
        server.url("/requests"),
        &officer,
        json!({
            "title": "Chairs",
            "department": "Facilities",
            "items": [{ "description": "Chair", "quantity": 10.0, "estimated_unit_price": 80.0 }]
        }),
    )
    .await;

    let (status, _) = post(
        &client,
        server.url("/purchases/orders"),
        &officer,
        json!({ "vendor_name": "Acme", "request_id": id_of(&draft), "lines": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn tenants_cannot_see_each_others_records() {
    let server = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let tenant_a = token(TenantId::new(), "admin");
    let tenant_b = token(TenantId::new(), "admin");

    let (status, head) = post(
        &client,
        server.url("/budgets/heads"),
        &tenant_a,
        json!({ "name": "Salaries", "code": "EXP-01", "head_type": "expenditure", "display_order": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let head_id = id_of(&head);

    let (status, _) = get(&client, server.url(&format!("/budgets/heads/{head_id}")), &tenant_a).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&client, server.url(&format!("/budgets/heads/{head_id}")), &tenant_b).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, listed) = get(&client, server.url("/budgets/heads"), &tenant_b).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["items"], json!([]));
}

#[tokio::test]
async fn duplicate_display_order_is_a_unique_violation() {
    let server = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let admin = token(TenantId::new(), "admin");

    let (status, _) = post(
        &client,
        server.url("/budgets/heads"),
        &admin,
        json!({ "name": "Salaries", "code": "EXP-01", "head_type": "expenditure", "display_order": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post(
        &client,
        server.url("/budgets/heads"),
        &admin,
        json!({ "name": "Travel", "code": "EXP-02", "head_type": "expenditure", "display_order": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["message"],
        json!("duplicate key value violates unique constraint \"budget_heads_display_order_key\"")
    );

    // Same slot under the other head type is free.
    let (status, _) = post(
        &client,
        server.url("/budgets/heads"),
        &admin,
        json!({ "name": "Grants", "code": "INC-01", "head_type": "income", "display_order": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn qcbs_rfp_is_ranked_and_awarded() {
    let server = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let admin = token(TenantId::new(), "admin");

    let deadline = Utc::now() + ChronoDuration::days(7);
    let (status, rfp) = post(
        &client,
        server.url("/rfps"),
        &admin,
        json!({
            "title": "Network refresh",
            "submission_deadline": deadline,
            "evaluation_criteria": { "type": "qcbs", "technical_weight": 70.0, "commercial_weight": 30.0 }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let rfp_id = id_of(&rfp);

    let (status, published) = post(&client, server.url(&format!("/rfps/{rfp_id}/publish")), &admin, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["status"], "published");

    let mut response_ids = Vec::new();
    for (vendor, price) in [("Alpha Networks", 120_000.0), ("Beta Systems", 100_000.0)] {
        let (status, response) = post(
            &client,
            server.url(&format!("/rfps/{rfp_id}/responses")),
            &admin,
            json!({
                "vendor_id": procura_core::RecordId::new().to_string(),
                "vendor_name": vendor,
                "items": [{ "description": "Switches", "quantity": 1.0, "unit_price": price }]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response["status"], "submitted");
        response_ids.push(id_of(&response));
    }

    let (status, _) = post(&client, server.url(&format!("/rfps/{rfp_id}/close")), &admin, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    for (response_id, technical, commercial) in [
        (&response_ids[0], 85.0, 90.0),
        (&response_ids[1], 78.0, 95.0),
    ] {
        let (status, scored) = post(
            &client,
            server.url(&format!("/rfps/{rfp_id}/responses/{response_id}/score")),
            &admin,
            json!({ "technical_score": technical, "commercial_score": commercial }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(scored["status"], "evaluated");
    }

    let (status, evaluation) = get(&client, server.url(&format!("/rfps/{rfp_id}/evaluation")), &admin).await;
    assert_eq!(status, StatusCode::OK);
    let ranked = evaluation["ranked"].as_array().expect("ranked list");
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0]["response_id"], json!(response_ids[0]));
    assert_eq!(ranked[0]["rank"], 1);
    assert_eq!(ranked[1]["rank"], 2);
    assert!((ranked[0]["final_score"].as_f64().unwrap() - 86.5).abs() < 1e-9);
    assert!((ranked[1]["final_score"].as_f64().unwrap() - 83.1).abs() < 1e-9);

    // Awarding before the evaluation is recorded leaves the response untouched.
    let (status, _) = post(
        &client,
        server.url(&format!("/rfps/{rfp_id}/award")),
        &admin,
        json!({ "response_id": response_ids[0] }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (_, early) = get(&client, server.url(&format!("/rfps/{rfp_id}/responses/{}", response_ids[0])), &admin).await;
    assert_eq!(early["status"], "evaluated");

    let (status, evaluated) = post(&client, server.url(&format!("/rfps/{rfp_id}/evaluation")), &admin, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(evaluated["status"], "evaluated");

    let (status, awarded) = post(
        &client,
        server.url(&format!("/rfps/{rfp_id}/award")),
        &admin,
        json!({ "response_id": response_ids[0] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(awarded["status"], "awarded");
    assert_eq!(awarded["awarded_response_id"], json!(response_ids[0]));

    let (_, winner) = get(&client, server.url(&format!("/rfps/{rfp_id}/responses/{}", response_ids[0])), &admin).await;
    assert_eq!(winner["status"], "awarded");
    let (_, loser) = get(&client, server.url(&format!("/rfps/{rfp_id}/responses/{}", response_ids[1])), &admin).await;
    assert_eq!(loser["status"], "rejected");
}

#[tokio::test]
async fn email_templates_render_with_variables() {
    let server = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let admin = token(TenantId::new(), "admin");

    let (status, template) = post(
        &client,
        server.url("/settings/email/templates"),
        &admin,
        json!({
            "template_key": "po_approved",
            "name": "PO approved",
            "subject": "PO {{po_number}} approved",
            "body_html": "<p>Hello {{vendor_name}}</p>",
            "body_text": "Hello {{vendor_name}}"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let template_id = id_of(&template);

    let (status, rendered) = post(
        &client,
        server.url(&format!("/settings/email/templates/{template_id}/render")),
        &admin,
        json!({ "variables": { "po_number": "PO-2026-0001", "vendor_name": "Acme" } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rendered["subject"], "PO PO-2026-0001 approved");
    assert_eq!(rendered["body_text"], "Hello Acme");
}

#[tokio::test]
async fn head_type_is_fixed_once_allocations_exist() {
    let server = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let admin = token(TenantId::new(), "admin");

    let (_, booked) = post(
        &client,
        server.url("/budgets/heads"),
        &admin,
        json!({ "name": "Salaries", "code": "EXP-01", "head_type": "expenditure", "display_order": 1 }),
    )
    .await;
    let (_, spare) = post(
        &client,
        server.url("/budgets/heads"),
        &admin,
        json!({ "name": "Misc", "code": "EXP-02", "head_type": "expenditure", "display_order": 2 }),
    )
    .await;
    let booked_id = id_of(&booked);

    let (status, _) = post(
        &client,
        server.url("/budgets/allocations"),
        &admin,
        json!({
            "fiscal_year": "2026-27",
            "department": "HR",
            "budget_head_id": booked_id,
            "allocated_amount": 5000.0
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let retype = |code: &str, order: i32| {
        json!({ "name": "Retyped", "code": code, "head_type": "income", "display_order": order })
    };

    let res = client
        .put(server.url(&format!("/budgets/heads/{booked_id}")))
        .bearer_auth(&admin)
        .json(&retype("EXP-01", 1))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = client
        .put(server.url(&format!("/budgets/heads/{}", id_of(&spare))))
        .bearer_auth(&admin)
        .json(&retype("EXP-02", 2))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["head_type"], "income");
}

#[tokio::test]
async fn criterion_marks_are_validated_even_with_an_explicit_score() {
    let server = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let admin = token(TenantId::new(), "admin");

    let (_, rfp) = post(
        &client,
        server.url("/rfps"),
        &admin,
        json!({
            "title": "Cleaning services",
            "submission_deadline": Utc::now() + ChronoDuration::days(3),
            "evaluation_criteria": { "type": "technical_l1", "technical_weight": 100.0, "commercial_weight": 0.0 }
        }),
    )
    .await;
    let rfp_id = id_of(&rfp);

    let (status, criterion) = post(
        &client,
        server.url(&format!("/rfps/{rfp_id}/criteria")),
        &admin,
        json!({ "name": "Experience", "category": "technical", "max_score": 10.0, "weight": 100.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let criterion_id = id_of(&criterion);

    post(&client, server.url(&format!("/rfps/{rfp_id}/publish")), &admin, json!({})).await;
    let (_, response) = post(
        &client,
        server.url(&format!("/rfps/{rfp_id}/responses")),
        &admin,
        json!({
            "vendor_id": procura_core::RecordId::new().to_string(),
            "vendor_name": "Sparkle Ltd",
            "items": [{ "description": "Monthly service", "quantity": 12.0, "unit_price": 900.0 }]
        }),
    )
    .await;
    let score_url = server.url(&format!("/rfps/{rfp_id}/responses/{}/score", id_of(&response)));

    for marks in [
        json!([{ "criterion_id": criterion_id, "mark": 12.0 }]),
        json!([{ "criterion_id": criterion_id, "mark": -1.0 }]),
        json!([{ "criterion_id": procura_core::RecordId::new().to_string(), "mark": 5.0 }]),
    ] {
        let (status, _) = post(
            &client,
            score_url.clone(),
            &admin,
            json!({ "technical_score": 80.0, "criterion_marks": marks }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, scored) = post(
        &client,
        score_url,
        &admin,
        json!({ "technical_score": 80.0, "criterion_marks": [{ "criterion_id": criterion_id, "mark": 8.0 }] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scored["technical_score"], json!(80.0));
}
