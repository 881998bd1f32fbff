//! Order placement, history and the admin order desk.
//!
//! Placement and status changes each run in one transaction holding row locks
//! on the touched products (and order), so concurrent checkouts cannot both
//! take the last unit.

use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::api::extract::{Json, Path, Query};
use crate::api::cart::check_session;
use crate::api::{ListParams, PaginatedResponse};
use crate::auth::{AdminUser, AuthUser};
use crate::domain::aggregates::{merge_lines, AddressSnapshot, OrderRequestLine, OrderStatus, PlacedOrder, Product};
use crate::domain::events::DomainEvent;
use crate::error::{Result, StoreError};
use crate::models::{AddressRow, OrderItemRow, OrderRow, ProductRow};
use crate::AppState;

#[derive(Debug, Deserialize)] pub struct CreateOrderRequest { pub address_id: Uuid, pub items: Vec<OrderRequestLine> }
#[derive(Debug, Deserialize)] pub struct CheckoutRequest { pub session_id: String, pub address_id: Uuid }
#[derive(Debug, Deserialize)] pub struct StatusUpdate { pub status: String }
#[derive(Debug, Deserialize)] pub struct PurgeParams { pub before: Option<DateTime<Utc>> }
#[derive(Debug, Serialize)] pub struct PurgeResponse { pub deleted: u64 }

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CustomerSummary { pub id: Uuid, pub first_name: String, pub last_name: Option<String>, pub email: String }

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub status: String,
    pub total: Decimal,
    pub currency: String,
    pub shipping: AddressSnapshot,
    pub shipping_address: String,
    pub items: Vec<OrderItemRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderView {
    fn new(order: OrderRow, items: Vec<OrderItemRow>, customer: Option<CustomerSummary>) -> Self {
        let shipping = order.shipping();
        Self {
            id: order.id, user_id: order.user_id, status: order.status, total: order.total, currency: order.currency,
            shipping_address: shipping.one_line(), shipping, items, customer,
            created_at: order.created_at, updated_at: order.updated_at,
        }
    }
}

/// Runs the placement rule inside the caller's transaction and returns the new order id.
async fn place_order(conn: &mut PgConnection, s: &AppState, user_id: Uuid, address_id: Uuid, lines: &[OrderRequestLine]) -> Result<(Uuid, Vec<DomainEvent>)> {
    let currency = s.config.currency.as_str();
    let address = sqlx::query_as::<_, AddressRow>("SELECT * FROM addresses WHERE id = $1 AND user_id = $2")
        .bind(address_id).bind(user_id).fetch_optional(&mut *conn).await?
        .ok_or(StoreError::NotFound("address"))?;

    let lines = merge_lines(lines)?;
    let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    let rows = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE")
        .bind(&ids).fetch_all(&mut *conn).await?;
    let mut products = rows.iter().map(|r| r.to_aggregate(currency).map(|p| (r.id, p))).collect::<Result<BTreeMap<Uuid, Product>>>()?;

    let mut order = PlacedOrder::place(user_id, &mut products, &lines, address.snapshot(), currency)?;
    let ship = order.shipping();
    sqlx::query(
        "INSERT INTO orders (id, user_id, status, total, currency, ship_region, ship_commune, ship_street, ship_street_number, ship_unit, \
         ship_recipient_first_name, ship_recipient_last_name, ship_recipient_phone, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)")
        .bind(order.id()).bind(order.user_id()).bind(order.status().as_str()).bind(order.total().amount()).bind(order.total().currency())
        .bind(&ship.region).bind(&ship.commune).bind(&ship.street).bind(&ship.street_number).bind(&ship.unit)
        .bind(&ship.recipient_first_name).bind(&ship.recipient_last_name).bind(&ship.recipient_phone).bind(order.placed_at())
        .execute(&mut *conn).await?;

    for item in order.items() {
        sqlx::query("INSERT INTO order_items (id, order_id, product_id, product_name, quantity, unit_price, line_total) VALUES ($1, $2, $3, $4, $5, $6, $7)")
            .bind(Uuid::now_v7()).bind(order.id()).bind(item.product_id).bind(&item.name).bind(item.quantity as i32)
            .bind(item.unit_price.amount()).bind(item.total.amount())
            .execute(&mut *conn).await?;
        let stock = products.get(&item.product_id).map(|p| p.stock().value() as i32).unwrap_or_default();
        sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1")
            .bind(item.product_id).bind(stock).execute(&mut *conn).await?;
    }

    tracing::info!(order_id = %order.id(), user_id = %user_id, total = %order.total(), lines = order.items().len(), "order placed");
    Ok((order.id(), order.take_events()))
}

async fn load_items(db: &sqlx::PgPool, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItemRow>>> {
    let rows = sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY product_name, id")
        .bind(order_ids).fetch_all(db).await?;
    let mut grouped: HashMap<Uuid, Vec<OrderItemRow>> = HashMap::new();
    for row in rows { grouped.entry(row.order_id).or_default().push(row); }
    Ok(grouped)
}

async fn load_order(s: &AppState, id: Uuid) -> Result<OrderView> {
    let order = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&s.db).await?
        .ok_or(StoreError::NotFound("order"))?;
    let items = load_items(&s.db, &[id]).await?.remove(&id).unwrap_or_default();
    Ok(OrderView::new(order, items, None))
}

pub async fn create_order(State(s): State<AppState>, user: AuthUser, Json(r): Json<CreateOrderRequest>) -> Result<(StatusCode, Json<OrderView>)> {
    let mut tx = s.db.begin().await?;
    let (order_id, events) = place_order(&mut tx, &s, user.id, r.address_id, &r.items).await?;
    tx.commit().await?;
    s.events.publish_all(events).await;
    Ok((StatusCode::CREATED, Json(load_order(&s, order_id).await?)))
}

/// Places an order from a session cart and empties the cart.
pub async fn checkout(State(s): State<AppState>, user: AuthUser, Json(r): Json<CheckoutRequest>) -> Result<(StatusCode, Json<OrderView>)> {
    check_session(&r.session_id)?;
    let mut tx = s.db.begin().await?;
    let lines: Vec<(Uuid, i32)> = sqlx::query_as("SELECT product_id, quantity FROM cart_items WHERE session_id = $1 ORDER BY created_at FOR UPDATE")
        .bind(&r.session_id).fetch_all(&mut *tx).await?;
    if lines.is_empty() { return Err(StoreError::Validation("cart is empty".into())); }
    let lines: Vec<OrderRequestLine> = lines.into_iter().map(|(product_id, quantity)| OrderRequestLine { product_id, quantity: quantity.max(0) as u32 }).collect();

    let (order_id, events) = place_order(&mut tx, &s, user.id, r.address_id, &lines).await?;
    sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(&r.session_id).execute(&mut *tx).await?;
    tx.commit().await?;
    s.events.publish_all(events).await;
    Ok((StatusCode::CREATED, Json(load_order(&s, order_id).await?)))
}

pub async fn list_own_orders(State(s): State<AppState>, user: AuthUser) -> Result<Json<Vec<OrderView>>> {
    let orders = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user.id).fetch_all(&s.db).await?;
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut items = load_items(&s.db, &ids).await?;
    Ok(Json(orders.into_iter().map(|o| { let i = items.remove(&o.id).unwrap_or_default(); OrderView::new(o, i, None) }).collect()))
}

pub async fn list_all_orders(State(s): State<AppState>, AdminUser(_): AdminUser, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<OrderView>>> {
    let (page, per_page, offset) = p.window();
    let status = crate::api::non_blank(p.status.clone()).map(|raw| raw.parse::<OrderStatus>()).transpose()?.map(|st| st.as_str());

    let orders = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3")
        .bind(status).bind(per_page as i64).bind(offset).fetch_all(&s.db).await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR status = $1)")
        .bind(status).fetch_one(&s.db).await?;

    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let user_ids: Vec<Uuid> = orders.iter().filter_map(|o| o.user_id).collect();
    let mut items = load_items(&s.db, &ids).await?;
    let customers: HashMap<Uuid, CustomerSummary> = sqlx::query_as::<_, CustomerSummary>("SELECT id, first_name, last_name, email FROM users WHERE id = ANY($1)")
        .bind(&user_ids).fetch_all(&s.db).await?
        .into_iter().map(|c| (c.id, c)).collect();

    let data = orders.into_iter().map(|o| {
        let customer = o.user_id.and_then(|id| customers.get(&id).cloned());
        let i = items.remove(&o.id).unwrap_or_default();
        OrderView::new(o, i, customer)
    }).collect();
    Ok(Json(PaginatedResponse { data, total: total.0, page, per_page }))
}

/// Moves an order to a new status; cancelling puts every line back into stock.
pub async fn update_status(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<StatusUpdate>) -> Result<Json<OrderView>> {
    let next: OrderStatus = r.status.parse()?;
    let mut tx = s.db.begin().await?;
    let (current,): (String,) = sqlx::query_as("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
        .bind(id).fetch_optional(&mut *tx).await?.ok_or(StoreError::NotFound("order"))?;
    let current: OrderStatus = current.parse()?;
    let restore = current.transition_to(next)?;

    sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1").bind(id).bind(next.as_str()).execute(&mut *tx).await?;

    let mut events = vec![DomainEvent::OrderStatusChanged { order_id: id, from: current.to_string(), to: next.to_string() }];
    if restore {
        let lines: Vec<(Uuid, i32)> = sqlx::query_as("SELECT product_id, quantity FROM order_items WHERE order_id = $1 AND product_id IS NOT NULL")
            .bind(id).fetch_all(&mut *tx).await?;
        let mut returned: BTreeMap<Uuid, u32> = BTreeMap::new();
        for (product_id, quantity) in lines { *returned.entry(product_id).or_default() += quantity.max(0) as u32; }
        let ids: Vec<Uuid> = returned.keys().copied().collect();
        let rows = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&ids).fetch_all(&mut *tx).await?;
        for row in rows {
            let mut product = row.to_aggregate(&s.config.currency)?;
            product.restock(returned[&row.id]);
            sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1")
                .bind(product.id()).bind(i32::try_from(product.stock().value()).unwrap_or(i32::MAX)).execute(&mut *tx).await?;
            events.extend(product.take_events());
        }
        tracing::info!(order_id = %id, products = ids.len(), "stock restored after cancellation");
    }
    tx.commit().await?;

    tracing::info!(order_id = %id, from = %current, to = %next, admin_id = %admin.id, "order status changed");
    s.events.publish_all(events).await;
    Ok(Json(load_order(&s, id).await?))
}

/// Deletes delivered and cancelled orders, optionally only those created before `before`.
pub async fn purge_history(State(s): State<AppState>, AdminUser(admin): AdminUser, Query(p): Query<PurgeParams>) -> Result<Json<PurgeResponse>> {
    let terminal: Vec<&str> = OrderStatus::ALL.iter().filter(|st| st.is_terminal()).map(|st| st.as_str()).collect();
    let res = sqlx::query("DELETE FROM orders WHERE status = ANY($1) AND ($2::timestamptz IS NULL OR created_at < $2)")
        .bind(&terminal).bind(p.before).execute(&s.db).await?;
    tracing::info!(deleted = res.rows_affected(), before = ?p.before, admin_id = %admin.id, "order history purged");
    Ok(Json(PurgeResponse { deleted: res.rows_affected() }))
}
