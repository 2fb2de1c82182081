//! Integration tests for relay cursor pagination
//!
//! These tests run `EntityQuery::paginate` against a synced in-memory
//! database and check:
//! - Argument validation (first/last exclusivity, zero and negative sizes)
//! - Edge ordering for forward and backward pages
//! - Page info flags and cursors

mod common;

use assert_matches::assert_matches;
use workgraph::ent::{
    Connection, Cursor, EntError, Entity, EntityQuery, FieldSelection, PaginationArgs, Predicate,
    QueryContext,
};
use workgraph::entities::WorkOrder;

fn edge_ids(conn: &Connection<WorkOrder>) -> Vec<i64> {
    conn.edges.iter().map(|e| e.node.id).collect()
}

// ============================================================================
// Argument Validation
// ============================================================================

mod validation {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_first_and_last_rejected_without_query() {
        let (db, client) = common::setup().await;
        // A closed pool fails any query that does get issued
        db.pool().close().await;

        let ctx = QueryContext::new();
        for (first, last) in [(1, 1), (0, 5), (10, 0), (-1, -1)] {
            let args = PaginationArgs {
                first: Some(first),
                last: Some(last),
                ..Default::default()
            };
            let result = EntityQuery::<WorkOrder>::new()
                .paginate(&client, &ctx, args)
                .await;
            assert_matches!(result, Err(EntError::InvalidPagination));
        }
    }

    #[tokio::test]
    async fn test_zero_page_is_empty_without_query() {
        let (db, client) = common::setup().await;
        db.pool().close().await;

        let ctx = QueryContext::new();
        for args in [PaginationArgs::first(0), PaginationArgs::last(0)] {
            let conn = EntityQuery::<WorkOrder>::new()
                .paginate(&client, &ctx, args)
                .await
                .unwrap();
            assert!(conn.edges.is_empty());
            assert!(!conn.page_info.has_next_page);
            assert!(!conn.page_info.has_previous_page);
            assert_eq!(conn.page_info.start_cursor, None);
            assert_eq!(conn.page_info.end_cursor, None);
        }
    }

    #[tokio::test]
    async fn test_negative_sizes_rejected() {
        let (_db, client) = common::setup().await;
        let ctx = QueryContext::new();

        for args in [PaginationArgs::first(-1), PaginationArgs::last(-3)] {
            let result = EntityQuery::<WorkOrder>::new()
                .paginate(&client, &ctx, args)
                .await;
            assert_matches!(result, Err(EntError::InvalidPagination));
        }
    }

    #[tokio::test]
    async fn test_empty_table() {
        let (_db, client) = common::setup().await;
        let conn = EntityQuery::<WorkOrder>::new()
            .paginate(&client, &QueryContext::new(), PaginationArgs::first(5))
            .await
            .unwrap();
        assert!(conn.edges.is_empty());
        assert_eq!(conn.page_info.end_cursor, None);
    }
}

// ============================================================================
// Forward and Backward Pages
// ============================================================================

mod pages {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_forward_pages() {
        let (_db, client) = common::setup().await;
        let owner = common::create_user(&client, "owner@example.com").await;
        let orders = common::create_work_orders(&client, &owner, 7).await;
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let ctx = QueryContext::new();

        let page = EntityQuery::<WorkOrder>::new()
            .paginate(&client, &ctx, PaginationArgs::first(3))
            .await
            .unwrap();
        assert_eq!(edge_ids(&page), ids[..3].to_vec());
        assert!(page.page_info.has_next_page);
        assert!(!page.page_info.has_previous_page);
        assert_eq!(page.page_info.start_cursor, Some(Cursor::new(ids[0])));
        assert_eq!(page.page_info.end_cursor, Some(Cursor::new(ids[2])));

        let end = page.page_info.end_cursor.unwrap();
        let page = EntityQuery::<WorkOrder>::new()
            .paginate(&client, &ctx, PaginationArgs::first(3).after(end))
            .await
            .unwrap();
        assert_eq!(edge_ids(&page), ids[3..6].to_vec());
        assert!(page.page_info.has_next_page);

        let end = page.page_info.end_cursor.unwrap();
        let page = EntityQuery::<WorkOrder>::new()
            .paginate(&client, &ctx, PaginationArgs::first(3).after(end))
            .await
            .unwrap();
        assert_eq!(edge_ids(&page), ids[6..].to_vec());
        assert!(!page.page_info.has_next_page);
    }

    #[tokio::test]
    async fn test_backward_page_is_ascending() {
        let (_db, client) = common::setup().await;
        let owner = common::create_user(&client, "owner@example.com").await;
        let orders = common::create_work_orders(&client, &owner, 5).await;
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let ctx = QueryContext::new();

        let page = EntityQuery::<WorkOrder>::new()
            .paginate(&client, &ctx, PaginationArgs::last(2))
            .await
            .unwrap();
        assert_eq!(edge_ids(&page), ids[3..].to_vec());
        assert!(page.page_info.has_previous_page);
        assert!(!page.page_info.has_next_page);
        assert_eq!(page.page_info.start_cursor, Some(Cursor::new(ids[3])));
        assert_eq!(page.page_info.end_cursor, Some(Cursor::new(ids[4])));

        let start = page.page_info.start_cursor.unwrap();
        let page = EntityQuery::<WorkOrder>::new()
            .paginate(&client, &ctx, PaginationArgs::last(2).before(start))
            .await
            .unwrap();
        assert_eq!(edge_ids(&page), ids[1..3].to_vec());
        assert!(page.page_info.has_previous_page);

        let start = page.page_info.start_cursor.unwrap();
        let page = EntityQuery::<WorkOrder>::new()
            .paginate(&client, &ctx, PaginationArgs::last(2).before(start))
            .await
            .unwrap();
        assert_eq!(edge_ids(&page), vec![ids[0]]);
        assert!(!page.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn test_page_larger_than_table() {
        let (_db, client) = common::setup().await;
        let owner = common::create_user(&client, "owner@example.com").await;
        common::create_work_orders(&client, &owner, 3).await;
        let ctx = QueryContext::new();

        for args in [PaginationArgs::first(3), PaginationArgs::first(10), PaginationArgs::last(10)] {
            let page = EntityQuery::<WorkOrder>::new()
                .paginate(&client, &ctx, args)
                .await
                .unwrap();
            assert_eq!(page.edges.len(), 3);
            assert!(!page.page_info.has_next_page);
            assert!(!page.page_info.has_previous_page);
        }
    }

    #[tokio::test]
    async fn test_edges_always_ascending() {
        let (_db, client) = common::setup().await;
        let owner = common::create_user(&client, "owner@example.com").await;
        let orders = common::create_work_orders(&client, &owner, 8).await;
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let ctx = QueryContext::new();

        let cursors = [None, Some(Cursor::new(ids[1])), Some(Cursor::new(ids[6]))];
        let sizes = [None, Some(1), Some(3), Some(20)];

        for after in cursors {
            for before in cursors {
                for size in sizes {
                    for backward in [false, true] {
                        let args = PaginationArgs {
                            after,
                            before,
                            first: size.filter(|_| !backward),
                            last: size.filter(|_| backward),
                        };
                        let page = EntityQuery::<WorkOrder>::new()
                            .paginate(&client, &ctx, args)
                            .await
                            .unwrap();
                        let got = edge_ids(&page);
                        let mut sorted = got.clone();
                        sorted.sort_unstable();
                        assert_eq!(got, sorted, "args {:?}", args);

                        if let Some(n) = size {
                            assert!(got.len() <= n as usize, "args {:?}", args);
                        }
                        for edge in &page.edges {
                            assert_eq!(edge.cursor, Cursor::new(edge.node.id));
                        }
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_without_size_returns_all_ascending() {
        let (_db, client) = common::setup().await;
        let owner = common::create_user(&client, "owner@example.com").await;
        let orders = common::create_work_orders(&client, &owner, 4).await;
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();

        let page = EntityQuery::<WorkOrder>::new()
            .paginate(
                &client,
                &QueryContext::new(),
                PaginationArgs::default().after(Cursor::new(ids[0])),
            )
            .await
            .unwrap();
        assert_eq!(edge_ids(&page), ids[1..].to_vec());
        assert!(!page.page_info.has_next_page);
    }
}

// ============================================================================
// Filters and Field Collection
// ============================================================================

mod composition {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_predicates_apply_before_paging() {
        let (_db, client) = common::setup().await;
        let alice = common::create_user(&client, "alice@example.com").await;
        let bob = common::create_user(&client, "bob@example.com").await;
        common::create_work_orders(&client, &alice, 3).await;
        let bobs = common::create_work_orders(&client, &bob, 3).await;

        let page = EntityQuery::<WorkOrder>::new()
            .where_(Predicate::eq(WorkOrder::OWNER_COLUMN, bob.id))
            .paginate(&client, &QueryContext::new(), PaginationArgs::first(2))
            .await
            .unwrap();
        assert_eq!(edge_ids(&page), vec![bobs[0].id, bobs[1].id]);
        assert!(page.page_info.has_next_page);
    }

    #[tokio::test]
    async fn test_node_selection_drives_eager_loading() {
        let (_db, client) = common::setup().await;
        let owner = common::create_user(&client, "owner@example.com").await;
        common::create_work_orders(&client, &owner, 2).await;

        let selection = FieldSelection::new("workOrders").with_child(
            FieldSelection::new("edges").with_child(
                FieldSelection::new("node")
                    .with_child(FieldSelection::new("name"))
                    .with_child(FieldSelection::new("owner")),
            ),
        );
        let ctx = QueryContext::new().with_fields(selection);

        let page = EntityQuery::<WorkOrder>::new()
            .paginate(&client, &ctx, PaginationArgs::first(5))
            .await
            .unwrap();
        assert_eq!(page.edges.len(), 2);
        for order in page.nodes() {
            assert_eq!(order.edges.owner_or_err().unwrap().id, owner.id);
            assert!(order.edges.activities_or_err().unwrap_err().is_not_loaded());
        }
    }
}
