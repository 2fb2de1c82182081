//! Integration tests for eager loading of edges
//!
//! Covers the three edge shapes:
//! - Many-to-one through a foreign key on the parent
//! - One-to-many through a foreign key on the neighbour
//! - Many-to-many through the group membership join table

mod common;

use pretty_assertions::assert_eq;
use workgraph::ent::{EntityQuery, Order, QueryContext};
use workgraph::entities::{Activity, ActivityField, User, UsersGroup, WorkOrder};

fn sorted_ids<'a>(items: impl IntoIterator<Item = &'a i64>) -> Vec<i64> {
    let mut ids: Vec<i64> = items.into_iter().copied().collect();
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn test_edges_not_loaded_by_default() {
    let (_db, client) = common::setup().await;
    let owner = common::create_user(&client, "owner@example.com").await;
    common::create_work_orders(&client, &owner, 1).await;

    let orders = EntityQuery::<WorkOrder>::new()
        .all(&client, &QueryContext::new())
        .await
        .unwrap();
    let err = orders[0].edges.owner_or_err().unwrap_err();
    assert!(err.is_not_loaded());
    assert_eq!(err.to_string(), "ent: owner edge was not loaded");
}

#[tokio::test]
async fn test_many_to_one() {
    let (_db, client) = common::setup().await;
    let ctx = QueryContext::new();
    let alice = common::create_user(&client, "alice@example.com").await;
    let bob = common::create_user(&client, "bob@example.com").await;
    common::create_work_orders(&client, &alice, 2).await;
    let unowned = client
        .work_orders()
        .create()
        .name("unowned")
        .assignee_id(bob.id)
        .save(&ctx)
        .await
        .unwrap();

    let orders = EntityQuery::<WorkOrder>::new()
        .order(Order::asc("id"))
        .with_owner(EntityQuery::new())
        .with_assignee(EntityQuery::new())
        .all(&client, &ctx)
        .await
        .unwrap();
    assert_eq!(orders.len(), 3);

    for order in &orders[..2] {
        assert_eq!(order.edges.owner_or_err().unwrap().email, "alice@example.com");
        assert!(order.edges.assignee_or_err().unwrap_err().is_not_found());
    }

    let last = &orders[2];
    assert_eq!(last.id, unowned.id);
    // Loaded but empty is distinct from not loaded
    let err = last.edges.owner_or_err().unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "ent: user not found");
    assert_eq!(last.edges.assignee_or_err().unwrap().id, bob.id);
}

#[tokio::test]
async fn test_one_to_many() {
    let (_db, client) = common::setup().await;
    let ctx = QueryContext::new();
    let owner = common::create_user(&client, "owner@example.com").await;
    let idle = common::create_user(&client, "idle@example.com").await;
    let orders = common::create_work_orders(&client, &owner, 2).await;

    let mut activity_ids = Vec::new();
    for field in [ActivityField::Status, ActivityField::Priority] {
        let activity = client
            .activities()
            .create()
            .changed_field(field)
            .author_id(owner.id)
            .work_order_id(orders[0].id)
            .save(&ctx)
            .await
            .unwrap();
        activity_ids.push(activity.id);
    }

    let users = EntityQuery::<User>::new()
        .order(Order::asc("id"))
        .with_work_orders(EntityQuery::new())
        .all(&client, &ctx)
        .await
        .unwrap();
    assert_eq!(users[0].id, owner.id);
    let owned: Vec<i64> = users[0]
        .edges
        .work_orders_or_err()
        .unwrap()
        .iter()
        .map(|w| w.id)
        .collect();
    assert_eq!(sorted_ids(&owned), vec![orders[0].id, orders[1].id]);
    assert_eq!(users[1].id, idle.id);
    assert!(users[1].edges.work_orders_or_err().unwrap().is_empty());

    let loaded = EntityQuery::<WorkOrder>::new()
        .order(Order::asc("id"))
        .with_activities(EntityQuery::<Activity>::new().with_author(EntityQuery::new()))
        .all(&client, &ctx)
        .await
        .unwrap();
    let activities = loaded[0].edges.activities_or_err().unwrap();
    let ids: Vec<i64> = activities.iter().map(|a| a.id).collect();
    assert_eq!(sorted_ids(&ids), activity_ids);
    for activity in activities {
        assert_eq!(activity.edges.author_or_err().unwrap().id, owner.id);
    }
    assert!(loaded[1].edges.activities_or_err().unwrap().is_empty());
}

#[tokio::test]
async fn test_many_to_many() {
    let (_db, client) = common::setup().await;
    let ctx = QueryContext::new();
    let alice = common::create_user(&client, "alice@example.com").await;
    let bob = common::create_user(&client, "bob@example.com").await;
    let crew = client
        .users_groups()
        .create()
        .name("crew")
        .add_member_ids([alice.id, bob.id])
        .save(&ctx)
        .await
        .unwrap();
    // Membership added from the user side
    let carol = client
        .users()
        .create()
        .email("carol@example.com")
        .add_group_ids([crew.id])
        .save(&ctx)
        .await
        .unwrap();
    let admins = client
        .users_groups()
        .create()
        .name("admins")
        .add_member_ids([alice.id])
        .save(&ctx)
        .await
        .unwrap();

    let groups = EntityQuery::<UsersGroup>::new()
        .order(Order::asc("id"))
        .with_members(EntityQuery::new())
        .all(&client, &ctx)
        .await
        .unwrap();
    let members: Vec<i64> = groups[0]
        .edges
        .members_or_err()
        .unwrap()
        .iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(sorted_ids(&members), vec![alice.id, bob.id, carol.id]);
    assert_eq!(groups[1].id, admins.id);
    assert_eq!(groups[1].edges.members_or_err().unwrap().len(), 1);

    let users = EntityQuery::<User>::new()
        .order(Order::asc("id"))
        .with_groups(EntityQuery::new())
        .all(&client, &ctx)
        .await
        .unwrap();
    let alice_groups: Vec<i64> = users[0]
        .edges
        .groups_or_err()
        .unwrap()
        .iter()
        .map(|g| g.id)
        .collect();
    assert_eq!(sorted_ids(&alice_groups), vec![crew.id, admins.id]);
    assert_eq!(users[1].edges.groups_or_err().unwrap().len(), 1);
    assert_eq!(users[2].edges.groups_or_err().unwrap()[0].id, crew.id);
}

#[tokio::test]
async fn test_traversal_queries() {
    let (_db, client) = common::setup().await;
    let ctx = QueryContext::new();
    let owner = common::create_user(&client, "owner@example.com").await;
    let orders = common::create_work_orders(&client, &owner, 3).await;

    let count = owner.query_work_orders().count(&client, &ctx).await.unwrap();
    assert_eq!(count, 3);

    let found = orders[1].query_owner().only(&client, &ctx).await.unwrap();
    assert_eq!(found.id, owner.id);

    assert!(!orders[0].query_assignee().exist(&client, &ctx).await.unwrap());
    assert!(owner.query_groups().all(&client, &ctx).await.unwrap().is_empty());

    let err = owner
        .query_work_orders()
        .only(&client, &ctx)
        .await
        .unwrap_err();
    assert!(err.is_not_singular());
    assert!(!err.is_not_found());
}
