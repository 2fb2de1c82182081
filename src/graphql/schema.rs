//! GraphQL schema definition
//!
//! Root queries resolve global node ids and page through each entity table.

use async_graphql::dataloader::DataLoader;
use async_graphql::{
    Context, EmptyMutation, EmptySubscription, ErrorExtensions, ID, Object, ObjectType, Result, Schema,
    SchemaBuilder, SubscriptionType,
};

use crate::define_connection;
use crate::ent::{
    Client, Connection, Cursor, Entity, EntityLoader, EntityQuery, NodeView, PaginationArgs,
    QueryContext, RelationLoader,
};
use crate::entities::{Activity, User, UsersGroup, WorkOrder};

define_connection!(UserConnection, UserEdge, User);
define_connection!(UsersGroupConnection, UsersGroupEdge, UsersGroup);
define_connection!(WorkOrderConnection, WorkOrderEdge, WorkOrder);
define_connection!(ActivityConnection, ActivityEdge, Activity);

/// The GraphQL schema type
pub type WorkgraphSchema = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

/// Build the GraphQL schema over `client`
pub fn build_schema(client: Client) -> WorkgraphSchema {
    with_loaders(Schema::build(QueryRoot, EmptyMutation, EmptySubscription), &client)
        .data(client)
        .finish()
}

/// Register the DataLoaders that entity edge resolvers batch through when
/// their parent was fetched without the edge.
pub fn with_loaders<Q, M, S>(
    builder: SchemaBuilder<Q, M, S>,
    client: &Client,
) -> SchemaBuilder<Q, M, S>
where
    Q: ObjectType + 'static,
    M: ObjectType + 'static,
    S: SubscriptionType + 'static,
{
    let users = DataLoader::new(EntityLoader::<User>::new(client.clone()), tokio::spawn);
    let work_orders = DataLoader::new(EntityLoader::<WorkOrder>::new(client.clone()), tokio::spawn);
    let owned_work_orders = DataLoader::new(
        RelationLoader::<WorkOrder>::new(client.clone(), WorkOrder::OWNER_COLUMN),
        tokio::spawn,
    );
    let work_order_activities = DataLoader::new(
        RelationLoader::<Activity>::new(client.clone(), Activity::WORK_ORDER_COLUMN),
        tokio::spawn,
    );

    builder
        .data(users)
        .data(work_orders)
        .data(owned_work_orders)
        .data(work_order_activities)
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Look up any entity by its global id
    async fn node(&self, ctx: &Context<'_>, id: ID) -> Result<NodeView> {
        let id = parse_node_id(&id)?;
        let client = ctx.data::<Client>()?;
        let qctx = QueryContext::from_graphql(ctx);
        client.node(&qctx, id).await.map_err(|e| e.extend())
    }

    async fn users(
        &self,
        ctx: &Context<'_>,
        after: Option<Cursor>,
        first: Option<i32>,
        before: Option<Cursor>,
        last: Option<i32>,
    ) -> Result<UserConnection> {
        let args = PaginationArgs { after, first, before, last };
        Ok(paginate::<User>(ctx, args).await?.into())
    }

    async fn users_groups(
        &self,
        ctx: &Context<'_>,
        after: Option<Cursor>,
        first: Option<i32>,
        before: Option<Cursor>,
        last: Option<i32>,
    ) -> Result<UsersGroupConnection> {
        let args = PaginationArgs { after, first, before, last };
        Ok(paginate::<UsersGroup>(ctx, args).await?.into())
    }

    async fn work_orders(
        &self,
        ctx: &Context<'_>,
        after: Option<Cursor>,
        first: Option<i32>,
        before: Option<Cursor>,
        last: Option<i32>,
    ) -> Result<WorkOrderConnection> {
        let args = PaginationArgs { after, first, before, last };
        Ok(paginate::<WorkOrder>(ctx, args).await?.into())
    }

    async fn activities(
        &self,
        ctx: &Context<'_>,
        after: Option<Cursor>,
        first: Option<i32>,
        before: Option<Cursor>,
        last: Option<i32>,
    ) -> Result<ActivityConnection> {
        let args = PaginationArgs { after, first, before, last };
        Ok(paginate::<Activity>(ctx, args).await?.into())
    }
}

fn parse_node_id(id: &ID) -> Result<i64> {
    id.parse::<i64>().map_err(|_| {
        async_graphql::Error::new(format!("invalid node id {:?}", id.as_str()))
            .extend_with(|_, e| e.set("code", "VALIDATION"))
    })
}

async fn paginate<E: Entity>(ctx: &Context<'_>, args: PaginationArgs) -> Result<Connection<E>> {
    let client = ctx.data::<Client>()?;
    let qctx = QueryContext::from_graphql(ctx);
    EntityQuery::<E>::new()
        .paginate(client, &qctx, args)
        .await
        .map_err(|e| e.extend())
}
