//! Order rules that live in SQL: stock debits and restores, address snapshots,
//! checkout and history purges. Runs against the Postgres in `DATABASE_URL`
//! and is skipped when it is unset.

mod common;

use axum::http::{Method, StatusCode};
use common::{send, test_config};
use horizonte_storefront::auth::{issue_token, Role};
use horizonte_storefront::{build_router, AppState, Config, EventPublisher};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::OnceLock;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

// Purges touch every finished order, so these tests take turns.
static DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

struct Store {
    app: axum::Router,
    db: PgPool,
    config: Config,
    _turn: MutexGuard<'static, ()>,
}

impl Store {
    async fn open() -> Option<Self> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping database test");
            return None;
        };
        let turn = DB_LOCK.get_or_init(|| Mutex::new(())).lock().await;
        let db = PgPoolOptions::new().max_connections(5).connect(&url).await.expect("connect to test database");
        sqlx::migrate!("./migrations").run(&db).await.expect("apply migrations");
        let config = test_config(&url);
        let app = build_router(AppState::new(db.clone(), config.clone(), EventPublisher::disabled()));
        Some(Self { app, db, config, _turn: turn })
    }

    async fn call(&self, method: Method, uri: &str, bearer: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(self.app.clone(), method, uri, Some(bearer), body).await
    }

    async fn account(&self, role: Role) -> (Uuid, String) {
        let id = Uuid::now_v7();
        sqlx::query("INSERT INTO users (id, first_name, email, password_hash, role) VALUES ($1, 'Prueba', $2, 'unused', $3)")
            .bind(id).bind(format!("{id}@test.horizonte.cl")).bind(role.as_str())
            .execute(&self.db).await.expect("insert user");
        (id, issue_token(id, role, &self.config).expect("token"))
    }

    async fn product(&self, admin: &str, body: Value) -> Uuid {
        let (status, json) = self.call(Method::POST, "/api/v1/admin/products", admin, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["id"].as_str().unwrap().parse().unwrap()
    }

    async fn address(&self, customer: &str, street: &str) -> Uuid {
        let body = json!({"region": "Maule", "commune": "Talca", "street": street, "street_number": "123"});
        let (status, json) = self.call(Method::POST, "/api/v1/account/addresses", customer, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["id"].as_str().unwrap().parse().unwrap()
    }

    async fn place(&self, customer: &str, address_id: Uuid, lines: &[(Uuid, u32)]) -> (StatusCode, Value) {
        let items: Vec<Value> = lines.iter().map(|(id, q)| json!({"product_id": id, "quantity": q})).collect();
        self.call(Method::POST, "/api/v1/orders", customer, Some(json!({"address_id": address_id, "items": items}))).await
    }

    async fn set_status(&self, admin: &str, order_id: &str, status: &str) -> (StatusCode, Value) {
        self.call(Method::PUT, &format!("/api/v1/admin/orders/{order_id}/status"), admin, Some(json!({"status": status}))).await
    }

    async fn stock(&self, product_id: Uuid) -> i32 {
        let (stock,): (i32,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1").bind(product_id).fetch_one(&self.db).await.unwrap();
        stock
    }

    async fn order_exists(&self, order_id: &str) -> bool {
        let id: Uuid = order_id.parse().unwrap();
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1").bind(id).fetch_optional(&self.db).await.unwrap();
        row.is_some()
    }
}

fn decimal(v: &Value) -> Decimal {
    match v {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}

fn lettuce(stock: i32) -> Value {
    json!({
        "name": "Lechuga Española", "price": "1200", "stock": stock, "category": "Hortalizas",
        "volume_tiers": [{"min_quantity": 5, "kind": "unit_price", "value": "1000"}]
    })
}

#[tokio::test]
async fn placing_debits_stock_and_cancelling_restores_it() {
    let Some(store) = Store::open().await else { return };
    let (_, admin) = store.account(Role::Admin).await;
    let (_, customer) = store.account(Role::Customer).await;
    let a = store.product(&admin, lettuce(10)).await;
    let b = store.product(&admin, json!({"name": "Sustrato de coco", "price": "1200", "stock": 2})).await;
    let address = store.address(&customer, "1 Sur").await;

    let (status, order) = store.place(&customer, address, &[(a, 6), (b, 1)]).await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(decimal(&order["total"]), Decimal::new(7200, 0));
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
    assert_eq!((store.stock(a).await, store.stock(b).await), (4, 1));

    let (status, err) = store.place(&customer, address, &[(b, 1), (a, 5)]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "insufficient_stock");
    assert_eq!(err["product_id"], a.to_string());
    assert_eq!((store.stock(a).await, store.stock(b).await), (4, 1));

    let order_id = order["id"].as_str().unwrap();
    let (status, cancelled) = store.set_status(&admin, order_id, "cancelled").await;
    assert_eq!(status, StatusCode::OK, "{cancelled}");
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!((store.stock(a).await, store.stock(b).await), (10, 2));

    let (status, _) = store.set_status(&admin, order_id, "cancelled").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!((store.stock(a).await, store.stock(b).await), (10, 2));
}

#[tokio::test]
async fn orders_keep_the_address_they_were_placed_with() {
    let Some(store) = Store::open().await else { return };
    let (_, admin) = store.account(Role::Admin).await;
    let (_, customer) = store.account(Role::Customer).await;
    let product = store.product(&admin, lettuce(5)).await;
    let address = store.address(&customer, "1 Sur").await;

    let (status, _) = store.place(&customer, address, &[(product, 1)]).await;
    assert_eq!(status, StatusCode::CREATED);

    let edit = json!({"region": "Ñuble", "commune": "Chillán", "street": "Libertad", "street_number": "900"});
    let (status, _) = store.call(Method::PUT, &format!("/api/v1/account/addresses/{address}"), &customer, Some(edit)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, orders) = store.call(Method::GET, "/api/v1/account/orders", &customer, None).await;
    assert_eq!(status, StatusCode::OK);
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["shipping"]["street"], "1 Sur");
    assert_eq!(orders[0]["shipping_address"], "Maule, Talca, 1 Sur #123");
}

#[tokio::test]
async fn checkout_places_the_cart_and_empties_it() {
    let Some(store) = Store::open().await else { return };
    let (_, admin) = store.account(Role::Admin).await;
    let (_, customer) = store.account(Role::Customer).await;
    let product = store.product(&admin, lettuce(8)).await;
    let address = store.address(&customer, "2 Norte").await;
    let session = format!("sess-{}", Uuid::now_v7());

    let (status, _) = send(store.app.clone(), Method::POST, &format!("/api/v1/cart/{session}/items"), None, Some(json!({"product_id": product, "quantity": 3}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let checkout = json!({"session_id": session, "address_id": address});
    let (status, order) = store.call(Method::POST, "/api/v1/checkout", &customer, Some(checkout.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["items"][0]["quantity"], 3);
    assert_eq!(store.stock(product).await, 5);

    let (status, cart) = send(store.app.clone(), Method::GET, &format!("/api/v1/cart/{session}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cart["items"].as_array().unwrap().is_empty());

    let (status, err) = store.call(Method::POST, "/api/v1/checkout", &customer, Some(checkout)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");
}

#[tokio::test]
async fn purge_removes_only_finished_orders() {
    let Some(store) = Store::open().await else { return };
    let (_, admin) = store.account(Role::Admin).await;
    let (_, customer) = store.account(Role::Customer).await;
    let product = store.product(&admin, lettuce(20)).await;
    let address = store.address(&customer, "3 Oriente").await;

    let mut ids = vec![];
    for _ in 0..3 {
        let (status, order) = store.place(&customer, address, &[(product, 1)]).await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(order["id"].as_str().unwrap().to_string());
    }
    let (open, cancelled, delivered) = (&ids[0], &ids[1], &ids[2]);
    assert_eq!(store.set_status(&admin, cancelled, "cancelled").await.0, StatusCode::OK);
    assert_eq!(store.set_status(&admin, delivered, "delivered").await.0, StatusCode::OK);

    let (status, _) = store.call(Method::DELETE, "/api/v1/admin/orders/history?before=2000-01-01T00:00:00Z", &admin, None).await;
    assert_eq!(status, StatusCode::OK);
    for id in &ids { assert!(store.order_exists(id).await); }

    let (status, purged) = store.call(Method::DELETE, "/api/v1/admin/orders/history", &admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(purged["deleted"].as_u64().unwrap() >= 2);
    assert!(store.order_exists(open).await);
    assert!(!store.order_exists(cancelled).await);
    assert!(!store.order_exists(delivered).await);
}

#[tokio::test]
async fn partial_product_update_keeps_stock_and_image() {
    let Some(store) = Store::open().await else { return };
    let (_, admin) = store.account(Role::Admin).await;
    let mut body = lettuce(12);
    body["image_url"] = json!("/uploads/1_lechuga.jpg");
    let product = store.product(&admin, body).await;

    let uri = format!("/api/v1/admin/products/{product}");
    let (status, updated) = store.call(Method::PUT, &uri, &admin, Some(json!({"name": "Lechuga Costina", "price": "1300"}))).await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["name"], "Lechuga Costina");
    assert_eq!(updated["stock"], 12);
    assert_eq!(updated["image_url"], "/uploads/1_lechuga.jpg");
    assert_eq!(updated["volume_tiers"].as_array().unwrap().len(), 1);
}
