//! Integration tests for global node resolution
//!
//! These tests verify that a global id:
//! - Decodes to its table through the type table directory
//! - Loads the typed entity and renders its node view with edge ids
//! - Fails with a not-found error when the table index is out of range

mod common;

use chrono::Utc;
use workgraph::ent::{Client, ClientConfig, EntError, Entity, NodeEdge, QueryContext, TABLE_STRIDE};
use workgraph::entities::{Activity, ActivityField, User, WorkOrder};

/// Client reading its directory from a hand-written type table
async fn client_with_directory(client: &Client, tables: &[&str]) -> Client {
    let pool = client.pool();
    sqlx::query("CREATE TABLE custom_types (id INTEGER PRIMARY KEY AUTOINCREMENT, type TEXT NOT NULL)")
        .execute(pool)
        .await
        .unwrap();
    for table in tables {
        sqlx::query("INSERT INTO custom_types (type) VALUES (?)")
            .bind(*table)
            .execute(pool)
            .await
            .unwrap();
    }

    Client::new(
        pool.clone(),
        ClientConfig {
            type_table: "custom_types".to_string(),
        },
    )
}

// ============================================================================
// Resolution
// ============================================================================

mod resolution {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_activity_behind_composite_id() {
        let (_db, client) = common::setup().await;
        let author = common::create_user(&client, "author@example.com").await;
        let client = client_with_directory(&client, &["users", "activities", "work_orders"]).await;

        let id = TABLE_STRIDE + 1001;
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO activities (id, create_time, update_time, changed_field, is_create, activity_author) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(now)
        .bind(now)
        .bind("STATUS")
        .bind(false)
        .bind(author.id)
        .execute(client.pool())
        .await
        .unwrap();

        let ctx = QueryContext::new();
        let view = client.node(&ctx, id).await.unwrap();

        assert_eq!(view.id, id);
        assert_eq!(view.type_name, "Activity");
        assert_eq!(
            view.edge("author"),
            Some(&NodeEdge::new("User", "author", vec![author.id]))
        );
        assert_eq!(
            view.edge("work_order"),
            Some(&NodeEdge::new("WorkOrder", "work_order", vec![]))
        );
        assert_eq!(view.field("changed_field").unwrap().value, "\"STATUS\"");
        assert_eq!(view.field("is_create").unwrap().value, "false");

        let noder = client.noder(&ctx, id).await.unwrap();
        assert_eq!(noder.node_type(), "Activity");
        let activity = noder.as_any().downcast_ref::<Activity>().unwrap();
        assert_eq!(activity.changed_field, ActivityField::Status);
        assert_eq!(activity.author_id, Some(author.id));
    }

    #[tokio::test]
    async fn test_synced_ids_decode_to_their_table() {
        let (_db, client) = common::setup().await;
        let ctx = QueryContext::new();
        let owner = common::create_user(&client, "owner@example.com").await;
        let assignee = common::create_user(&client, "assignee@example.com").await;
        let order = client
            .work_orders()
            .create()
            .name("Install tower")
            .owner_id(owner.id)
            .assignee_id(assignee.id)
            .save(&ctx)
            .await
            .unwrap();
        let first = client
            .activities()
            .create()
            .changed_field(ActivityField::Name)
            .is_create(true)
            .new_value("Install tower")
            .author_id(owner.id)
            .work_order_id(order.id)
            .save(&ctx)
            .await
            .unwrap();
        let second = client
            .activities()
            .create()
            .changed_field(ActivityField::Assignee)
            .new_value(assignee.id.to_string())
            .author_id(owner.id)
            .work_order_id(order.id)
            .save(&ctx)
            .await
            .unwrap();

        assert_eq!(owner.id / TABLE_STRIDE, 0);
        assert_eq!(order.id / TABLE_STRIDE, 2);
        assert_eq!(first.id / TABLE_STRIDE, 3);

        let view = client.node(&ctx, order.id).await.unwrap();
        assert_eq!(view.type_name, "WorkOrder");
        assert_eq!(view.field("name").unwrap().value, "\"Install tower\"");
        assert_eq!(view.field("priority").unwrap().value, "\"NONE\"");
        assert_eq!(view.edge("owner").unwrap().ids, vec![owner.id]);
        assert_eq!(view.edge("assignee").unwrap().ids, vec![assignee.id]);
        assert_eq!(view.edge("activities").unwrap().ids, vec![first.id, second.id]);

        let view = client.node(&ctx, owner.id).await.unwrap();
        assert_eq!(view.type_name, User::TYPE_NAME);
        assert_eq!(view.field("email").unwrap().value, "\"owner@example.com\"");
        assert_eq!(view.edge("work_orders").unwrap().ids, vec![order.id]);
        assert_eq!(view.edge("groups").unwrap().ids, Vec::<i64>::new());
    }

    #[tokio::test]
    async fn test_group_membership_edges() {
        let (_db, client) = common::setup().await;
        let ctx = QueryContext::new();
        let alice = common::create_user(&client, "alice@example.com").await;
        let bob = common::create_user(&client, "bob@example.com").await;
        let group = client
            .users_groups()
            .create()
            .name("Field crew")
            .add_member_ids([alice.id, bob.id])
            .save(&ctx)
            .await
            .unwrap();

        let view = client.node(&ctx, group.id).await.unwrap();
        assert_eq!(view.type_name, "UsersGroup");
        assert_eq!(view.edge("members").unwrap().ids, vec![alice.id, bob.id]);

        let view = client.node(&ctx, bob.id).await.unwrap();
        assert_eq!(view.edge("groups").unwrap().ids, vec![group.id]);
    }
}

// ============================================================================
// Failures
// ============================================================================

mod failures {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_table_index_out_of_range() {
        let (_db, client) = common::setup().await;
        let ctx = QueryContext::new();

        for id in [-1, -TABLE_STRIDE, 4 * TABLE_STRIDE, 4 * TABLE_STRIDE + 7, i64::MAX] {
            let err = client.node(&ctx, id).await.unwrap_err();
            assert!(err.is_not_found(), "{}: {}", id, err);
            assert_eq!(
                err.to_string(),
                format!("cannot resolve table from id {}: ent: invalid/unknown not found", id)
            );
        }
    }

    #[tokio::test]
    async fn test_unregistered_table() {
        let (_db, client) = common::setup().await;
        let client = client_with_directory(&client, &["users", "inventory"]).await;

        let err = client
            .node(&QueryContext::new(), TABLE_STRIDE + 3)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "cannot resolve noder from table \"inventory\": ent: invalid/unknown not found"
        );
    }

    #[tokio::test]
    async fn test_missing_row() {
        let (_db, client) = common::setup().await;
        let err = client
            .node(&QueryContext::new(), 2 * TABLE_STRIDE + 5)
            .await
            .unwrap_err();
        assert!(matches!(err, EntError::NotFound(ref e) if e.label == WorkOrder::LABEL));
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let (_db, client) = common::setup().await;
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let ctx = QueryContext::new().with_cancellation(token);

        let err = client.node(&ctx, 1).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
