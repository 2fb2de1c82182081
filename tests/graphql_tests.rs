//! Integration tests for the GraphQL surface
//!
//! Queries run through the real schema against an in-memory database.

mod common;

use async_graphql::dataloader::DataLoader;
use async_graphql::{Context, EmptyMutation, EmptySubscription, Object, Request, Schema};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use workgraph::ent::{
    Client, Cursor, EntityLoader, EntityQuery, Order, QueryContext, RelationLoader,
};
use workgraph::entities::{ActivityField, User, WorkOrder};
use workgraph::graphql::{build_schema, with_loaders};

async fn execute(client: &workgraph::ent::Client, query: &str) -> (Value, Vec<Value>) {
    let schema = build_schema(client.clone());
    let response = schema.execute(Request::new(query)).await;
    let errors = response
        .errors
        .iter()
        .map(|e| serde_json::to_value(e).unwrap())
        .collect();
    (response.data.into_json().unwrap(), errors)
}

#[tokio::test]
async fn test_work_order_connection() {
    let (_db, client) = common::setup().await;
    let owner = common::create_user(&client, "owner@example.com").await;
    let orders = common::create_work_orders(&client, &owner, 3).await;

    let (data, errors) = execute(
        &client,
        r#"{
            workOrders(first: 2) {
                edges { cursor node { name status owner { email } } }
                pageInfo { hasNextPage hasPreviousPage endCursor }
            }
        }"#,
    )
    .await;
    assert!(errors.is_empty(), "{:?}", errors);

    let end = Cursor::new(orders[1].id).encode();
    assert_eq!(
        data,
        json!({
            "workOrders": {
                "edges": [
                    {
                        "cursor": Cursor::new(orders[0].id).encode(),
                        "node": { "name": "wo-0", "status": "PLANNED", "owner": { "email": "owner@example.com" } }
                    },
                    {
                        "cursor": end,
                        "node": { "name": "wo-1", "status": "PLANNED", "owner": { "email": "owner@example.com" } }
                    }
                ],
                "pageInfo": { "hasNextPage": true, "hasPreviousPage": false, "endCursor": end }
            }
        })
    );

    let query = format!(
        r#"{{ workOrders(first: 2, after: "{}") {{ edges {{ node {{ name }} }} pageInfo {{ hasNextPage }} }} }}"#,
        end
    );
    let (data, errors) = execute(&client, &query).await;
    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(
        data,
        json!({
            "workOrders": {
                "edges": [{ "node": { "name": "wo-2" } }],
                "pageInfo": { "hasNextPage": false }
            }
        })
    );
}

#[tokio::test]
async fn test_node_query() {
    let (_db, client) = common::setup().await;
    let owner = common::create_user(&client, "owner@example.com").await;
    let group = client
        .users_groups()
        .create()
        .name("crew")
        .add_member_ids([owner.id])
        .save(&QueryContext::new())
        .await
        .unwrap();

    let query = format!(
        r#"{{ node(id: "{}") {{ id type fields {{ type name value }} edges {{ type name ids }} }} }}"#,
        group.id
    );
    let (data, errors) = execute(&client, &query).await;
    assert!(errors.is_empty(), "{:?}", errors);

    let node = &data["node"];
    assert_eq!(node["id"], json!(group.id));
    assert_eq!(node["type"], json!("UsersGroup"));
    assert_eq!(
        node["edges"],
        json!([{ "type": "User", "name": "members", "ids": [owner.id] }])
    );
    let name = node["fields"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["name"] == "name")
        .unwrap();
    assert_eq!(name["value"], json!("\"crew\""));
    assert_eq!(name["type"], json!("String"));
}

#[tokio::test]
async fn test_error_codes() {
    let (_db, client) = common::setup().await;

    let (_, errors) = execute(&client, "{ users(first: 1, last: 1) { edges { cursor } } }").await;
    assert_eq!(errors[0]["extensions"]["code"], json!("INVALID_PAGINATION"));

    let (_, errors) = execute(&client, r#"{ node(id: "-5") { id } }"#).await;
    assert_eq!(errors[0]["extensions"]["code"], json!("NOT_FOUND"));

    let (_, errors) = execute(&client, r#"{ node(id: "abc") { id } }"#).await;
    assert_eq!(errors[0]["extensions"]["code"], json!("VALIDATION"));

    let (_, errors) = execute(
        &client,
        r#"{ activities(after: "not a cursor", first: 1) { edges { cursor } } }"#,
    )
    .await;
    assert!(!errors.is_empty());
}

/// Root returning work orders fetched without any edges
struct PlainRoot;

#[Object]
impl PlainRoot {
    async fn orders(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<WorkOrder>> {
        let client = ctx.data::<Client>()?;
        Ok(EntityQuery::<WorkOrder>::new()
            .order(Order::asc("id"))
            .all(client, &QueryContext::new())
            .await?)
    }
}

#[tokio::test]
async fn test_unloaded_edges_resolve_through_loaders() {
    let (_db, client) = common::setup().await;
    let ctx = QueryContext::new();
    let alice = common::create_user(&client, "alice@example.com").await;
    let bob = common::create_user(&client, "bob@example.com").await;
    let orders = common::create_work_orders(&client, &alice, 2).await;
    client
        .work_orders()
        .create()
        .name("tower")
        .owner_id(bob.id)
        .assignee_id(alice.id)
        .save(&ctx)
        .await
        .unwrap();
    client
        .activities()
        .create()
        .changed_field(ActivityField::Status)
        .author_id(bob.id)
        .work_order_id(orders[0].id)
        .save(&ctx)
        .await
        .unwrap();

    let schema = with_loaders(Schema::build(PlainRoot, EmptyMutation, EmptySubscription), &client)
        .data(client.clone())
        .finish();
    let response = schema
        .execute(
            "{ orders { name owner { email workOrders { name } } assignee { email } \
               activities { changedField author { email } workOrder { name } } } }",
        )
        .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);

    let alice_orders = json!([{ "name": "wo-0" }, { "name": "wo-1" }]);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({
            "orders": [
                {
                    "name": "wo-0",
                    "owner": { "email": "alice@example.com", "workOrders": alice_orders },
                    "assignee": null,
                    "activities": [{
                        "changedField": "STATUS",
                        "author": { "email": "bob@example.com" },
                        "workOrder": { "name": "wo-0" }
                    }]
                },
                {
                    "name": "wo-1",
                    "owner": { "email": "alice@example.com", "workOrders": alice_orders },
                    "assignee": null,
                    "activities": []
                },
                {
                    "name": "tower",
                    "owner": { "email": "bob@example.com", "workOrders": [{ "name": "tower" }] },
                    "assignee": { "email": "alice@example.com" },
                    "activities": []
                }
            ]
        })
    );
}

#[tokio::test]
async fn test_loaders_batch_keys() {
    let (_db, client) = common::setup().await;
    let alice = common::create_user(&client, "alice@example.com").await;
    let bob = common::create_user(&client, "bob@example.com").await;
    let orders = common::create_work_orders(&client, &alice, 2).await;

    let users = DataLoader::new(EntityLoader::<User>::new(client.clone()), tokio::spawn);
    let found = users.load_many([alice.id, bob.id, bob.id + 100]).await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[&bob.id].email, "bob@example.com");

    let owned = DataLoader::new(
        RelationLoader::<WorkOrder>::new(client.clone(), WorkOrder::OWNER_COLUMN),
        tokio::spawn,
    );
    let found = owned.load_many([alice.id, bob.id]).await.unwrap();
    let names: Vec<&str> = found[&alice.id].iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, vec!["wo-0", "wo-1"]);
    assert_eq!(found[&alice.id][1].id, orders[1].id);
    assert!(found[&bob.id].is_empty());
}
