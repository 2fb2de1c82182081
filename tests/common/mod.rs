//! Shared fixtures for the integration tests

#![allow(dead_code)]

use workgraph::db::{self, Database};
use workgraph::ent::{Client, ClientConfig, DEFAULT_TYPE_TABLE, QueryContext};
use workgraph::entities::{User, WorkOrder};

/// Fresh in-memory database with every entity table synced
pub async fn setup() -> (Database, Client) {
    let db = Database::connect_in_memory()
        .await
        .expect("in-memory database");
    let result = db::sync_schema(db.pool(), DEFAULT_TYPE_TABLE).await;
    assert!(result.errors.is_empty(), "schema sync: {:?}", result.errors);

    let client = db.client(ClientConfig::default());
    (db, client)
}

pub async fn create_user(client: &Client, email: &str) -> User {
    client
        .users()
        .create()
        .email(email)
        .first_name("Test")
        .last_name("User")
        .save(&QueryContext::new())
        .await
        .expect("create user")
}

/// `count` work orders named `wo-0`, `wo-1`, ... owned by `owner`
pub async fn create_work_orders(client: &Client, owner: &User, count: usize) -> Vec<WorkOrder> {
    let ctx = QueryContext::new();
    let mut orders = Vec::with_capacity(count);
    for i in 0..count {
        let order = client
            .work_orders()
            .create()
            .name(format!("wo-{}", i))
            .owner_id(owner.id)
            .save(&ctx)
            .await
            .expect("create work order");
        orders.push(order);
    }
    orders
}
