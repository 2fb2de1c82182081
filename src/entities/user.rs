use std::any::Any;

use async_graphql::dataloader::DataLoader;
use async_graphql::{ComplexObject, Context, ErrorExtensions, SimpleObject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use workgraph_macros::NodeFields;

use super::users_group::{USERS_GROUP_MEMBERS, UsersGroup};
use super::work_order::WorkOrder;
use super::{ent_enum, update_setters};
use crate::ent::eager::{load_many_to_many, load_to_many};
use crate::ent::entity::decode_enum;
use crate::ent::insert::{InsertBuilder, insert_edges};
use crate::ent::{
    Client, ColumnDef, EagerLoad, EdgeSlot, EntError, Entity, EntityClient, EntityQuery,
    FieldSelection, NodeEdge, NodeFields, NodeView, Noder, Order, Predicate, QueryContext,
    RelationLoader, TableSchema, UpdateBuilder,
};

ent_enum! {
    UserStatus {
        Active => "ACTIVE",
        Deactivated => "DEACTIVATED",
    }
}

ent_enum! {
    UserRole {
        User => "USER",
        Admin => "ADMIN",
        Owner => "OWNER",
    }
}

/// A person that owns or is assigned work orders.
#[derive(SimpleObject, NodeFields, Debug, Clone)]
#[graphql(complex)]
pub struct User {
    #[node(skip)]
    pub id: i64,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub status: UserStatus,
    pub role: UserRole,
    #[node(skip)]
    #[graphql(skip)]
    pub edges: UserEdges,
}

#[derive(Debug, Clone, Default)]
pub struct UserEdges {
    pub groups: EdgeSlot<Vec<UsersGroup>>,
    pub work_orders: EdgeSlot<Vec<WorkOrder>>,
}

impl UserEdges {
    pub fn groups_or_err(&self) -> Result<&[UsersGroup], EntError> {
        self.groups.get("groups").map(Vec::as_slice)
    }

    pub fn work_orders_or_err(&self) -> Result<&[WorkOrder], EntError> {
        self.work_orders.get("work_orders").map(Vec::as_slice)
    }
}

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("create_time", "TEXT"),
    ColumnDef::new("update_time", "TEXT"),
    ColumnDef::new("email", "TEXT"),
    ColumnDef::new("first_name", "TEXT").default("''"),
    ColumnDef::new("last_name", "TEXT").default("''"),
    ColumnDef::new("status", "TEXT").default("'ACTIVE'"),
    ColumnDef::new("role", "TEXT").default("'USER'"),
];

impl Entity for User {
    const TABLE: &'static str = "users";
    const LABEL: &'static str = "user";
    const TYPE_NAME: &'static str = "User";
    const SCHEMA: TableSchema = TableSchema {
        name: Self::TABLE,
        columns: COLUMNS,
    };

    type With = UserWith;

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            create_time: row.try_get("create_time")?,
            update_time: row.try_get("update_time")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            status: decode_enum(row, "status")?,
            role: decode_enum(row, "role")?,
            edges: UserEdges::default(),
        })
    }
}

impl User {
    /// Groups this user is a member of.
    pub fn query_groups(&self) -> EntityQuery<UsersGroup> {
        EntityQuery::new().where_(Predicate::InJoin {
            column: "id",
            table: USERS_GROUP_MEMBERS.name,
            select_column: USERS_GROUP_MEMBERS.owner_column,
            where_column: USERS_GROUP_MEMBERS.target_column,
            value: self.id,
        })
    }

    /// Work orders owned by this user.
    pub fn query_work_orders(&self) -> EntityQuery<WorkOrder> {
        EntityQuery::new().where_(Predicate::eq(WorkOrder::OWNER_COLUMN, self.id))
    }

    /// Users that belong to at least one group.
    pub fn has_groups() -> Predicate {
        Predicate::in_select(
            "id",
            USERS_GROUP_MEMBERS.name,
            USERS_GROUP_MEMBERS.target_column,
            [],
        )
    }

    /// Users in at least one group matching every predicate.
    pub fn has_groups_with(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::in_select(
            "id",
            USERS_GROUP_MEMBERS.name,
            USERS_GROUP_MEMBERS.target_column,
            [Predicate::in_select(
                USERS_GROUP_MEMBERS.owner_column,
                UsersGroup::TABLE,
                "id",
                predicates,
            )],
        )
    }

    /// Users owning at least one work order.
    pub fn has_work_orders() -> Predicate {
        Self::has_work_orders_with([])
    }

    pub fn has_work_orders_with(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        let mut conditions = vec![Predicate::not_null(WorkOrder::OWNER_COLUMN)];
        conditions.extend(predicates);
        Predicate::in_select("id", WorkOrder::TABLE, WorkOrder::OWNER_COLUMN, conditions)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserWith {
    groups: Option<Box<EntityQuery<UsersGroup>>>,
    work_orders: Option<Box<EntityQuery<WorkOrder>>>,
}

fn groups_slot(user: &mut User) -> &mut EdgeSlot<Vec<UsersGroup>> {
    &mut user.edges.groups
}

fn work_orders_slot(user: &mut User) -> &mut EdgeSlot<Vec<WorkOrder>> {
    &mut user.edges.work_orders
}

#[async_trait]
impl EagerLoad<User> for UserWith {
    fn collect(&mut self, fields: &FieldSelection) {
        for field in &fields.children {
            match field.name.as_str() {
                "groups" => {
                    self.groups = Some(Box::new(EntityQuery::new().collect_selection(field)));
                }
                "workOrders" => {
                    self.work_orders =
                        Some(Box::new(EntityQuery::new().collect_selection(field)));
                }
                _ => {}
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.groups.is_none() && self.work_orders.is_none()
    }

    async fn load(
        &self,
        client: &Client,
        ctx: &QueryContext,
        nodes: &mut [User],
    ) -> Result<(), EntError> {
        if let Some(query) = &self.groups {
            load_many_to_many(
                client,
                ctx,
                nodes,
                (**query).clone(),
                "groups",
                &USERS_GROUP_MEMBERS,
                USERS_GROUP_MEMBERS.target_column,
                USERS_GROUP_MEMBERS.owner_column,
                groups_slot,
            )
            .await?;
        }
        if let Some(query) = &self.work_orders {
            load_to_many(
                client,
                ctx,
                nodes,
                (**query).clone(),
                "work_orders",
                WorkOrder::OWNER_COLUMN,
                |w| w.owner_id,
                work_orders_slot,
            )
            .await?;
        }
        Ok(())
    }
}

impl EntityQuery<User> {
    /// Groups any of the matching users belong to.
    pub fn query_groups(&self) -> EntityQuery<UsersGroup> {
        EntityQuery::new().where_(Predicate::in_select(
            "id",
            USERS_GROUP_MEMBERS.name,
            USERS_GROUP_MEMBERS.owner_column,
            [self.subquery(USERS_GROUP_MEMBERS.target_column, "id")],
        ))
    }

    /// Work orders owned by the matching users.
    pub fn query_work_orders(&self) -> EntityQuery<WorkOrder> {
        EntityQuery::new().where_(self.subquery(WorkOrder::OWNER_COLUMN, "id"))
    }

    pub fn with_groups(mut self, query: EntityQuery<UsersGroup>) -> Self {
        self.eager.groups = Some(Box::new(query));
        self
    }

    pub fn with_work_orders(mut self, query: EntityQuery<WorkOrder>) -> Self {
        self.eager.work_orders = Some(Box::new(query));
        self
    }
}

#[async_trait]
impl Noder for User {
    fn node_id(&self) -> i64 {
        self.id
    }

    fn node_type(&self) -> &'static str {
        Self::TYPE_NAME
    }

    async fn node(&self, client: &Client, ctx: &QueryContext) -> Result<NodeView, EntError> {
        let ctx = ctx.without_fields();
        let groups = self
            .query_groups()
            .order(Order::asc("id"))
            .ids(client, &ctx)
            .await?;
        let work_orders = self
            .query_work_orders()
            .order(Order::asc("id"))
            .ids(client, &ctx)
            .await?;

        Ok(NodeView {
            id: self.id,
            type_name: Self::TYPE_NAME.to_string(),
            fields: self.node_fields()?,
            edges: vec![
                NodeEdge::new(UsersGroup::TYPE_NAME, "groups", groups),
                NodeEdge::new(WorkOrder::TYPE_NAME, "work_orders", work_orders),
            ],
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[ComplexObject]
impl User {
    /// Groups this user belongs to
    async fn groups(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<UsersGroup>> {
        if let Some(groups) = self.edges.groups.loaded() {
            return Ok(groups.clone());
        }
        let client = ctx.data::<Client>()?;
        let qctx = QueryContext::from_graphql(ctx);
        self.query_groups()
            .order(Order::asc("id"))
            .collect_fields(&qctx)
            .all(client, &qctx)
            .await
            .map_err(|e| e.extend())
    }

    /// Work orders owned by this user
    async fn work_orders(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<WorkOrder>> {
        if let Some(work_orders) = self.edges.work_orders.loaded() {
            return Ok(work_orders.clone());
        }
        let loader = ctx.data::<DataLoader<RelationLoader<WorkOrder>>>()?;
        let work_orders = loader.load_one(self.id).await.map_err(|e| e.extend())?;
        Ok(work_orders.unwrap_or_default())
    }
}

/// Builder returned by `client.users().create()`.
#[derive(Debug)]
pub struct UserCreate<'a> {
    client: &'a Client,
    email: Option<String>,
    first_name: String,
    last_name: String,
    status: UserStatus,
    role: UserRole,
    group_ids: Vec<i64>,
}

impl<'a> EntityClient<'a, User> {
    pub fn create(&self) -> UserCreate<'a> {
        UserCreate {
            client: self.client,
            email: None,
            first_name: String::new(),
            last_name: String::new(),
            status: UserStatus::Active,
            role: UserRole::User,
            group_ids: Vec::new(),
        }
    }
}

impl UserCreate<'_> {
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self
    }

    pub fn last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = last_name.into();
        self
    }

    pub fn status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }

    pub fn role(mut self, role: UserRole) -> Self {
        self.role = role;
        self
    }

    pub fn add_group_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.group_ids.extend(ids);
        self
    }

    pub async fn save(self, ctx: &QueryContext) -> Result<User, EntError> {
        let email = self.email.ok_or(EntError::MissingField("email"))?;
        let now = Utc::now();
        let insert = InsertBuilder::new(User::TABLE)
            .set("create_time", now)
            .set("update_time", now)
            .set("email", email)
            .set("first_name", self.first_name)
            .set("last_name", self.last_name)
            .set("status", self.status)
            .set("role", self.role);
        let pool = self.client.pool();
        let group_ids = self.group_ids;

        let id = ctx
            .run(async {
                let mut tx = pool.begin().await?;
                let id = insert.execute(&mut tx).await?;
                let pairs: Vec<(i64, i64)> = group_ids.iter().map(|g| (*g, id)).collect();
                insert_edges(&mut tx, &USERS_GROUP_MEMBERS, &pairs).await?;
                tx.commit().await?;
                Ok::<_, sqlx::Error>(id)
            })
            .await?;

        self.client.users().get(ctx, id).await
    }
}

/// Builder returned by `client.users().update()`.
#[derive(Debug)]
pub struct UserUpdate<'a> {
    client: &'a Client,
    query: EntityQuery<User>,
    update: UpdateBuilder,
}

#[derive(Debug)]
pub struct UserUpdateOne<'a> {
    client: &'a Client,
    id: i64,
    update: UpdateBuilder,
}

impl<'a> EntityClient<'a, User> {
    pub fn update(&self) -> UserUpdate<'a> {
        UserUpdate {
            client: self.client,
            query: EntityQuery::new(),
            update: UpdateBuilder::new(User::TABLE),
        }
    }

    pub fn update_one(&self, user: &User) -> UserUpdateOne<'a> {
        self.update_one_id(user.id)
    }

    pub fn update_one_id(&self, id: i64) -> UserUpdateOne<'a> {
        UserUpdateOne {
            client: self.client,
            id,
            update: UpdateBuilder::new(User::TABLE),
        }
    }
}

update_setters!(UserUpdate, UserUpdateOne, {
    pub fn set_email(mut self, email: impl Into<String>) -> Self {
        self.update = self.update.set("email", email.into());
        self
    }

    pub fn set_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.update = self.update.set("first_name", first_name.into());
        self
    }

    pub fn set_nillable_first_name(self, first_name: Option<String>) -> Self {
        match first_name {
            Some(first_name) => self.set_first_name(first_name),
            None => self,
        }
    }

    pub fn set_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.update = self.update.set("last_name", last_name.into());
        self
    }

    pub fn set_nillable_last_name(self, last_name: Option<String>) -> Self {
        match last_name {
            Some(last_name) => self.set_last_name(last_name),
            None => self,
        }
    }

    pub fn set_status(mut self, status: UserStatus) -> Self {
        self.update = self.update.set("status", status);
        self
    }

    pub fn set_nillable_status(self, status: Option<UserStatus>) -> Self {
        match status {
            Some(status) => self.set_status(status),
            None => self,
        }
    }

    pub fn set_role(mut self, role: UserRole) -> Self {
        self.update = self.update.set("role", role);
        self
    }

    pub fn set_nillable_role(self, role: Option<UserRole>) -> Self {
        match role {
            Some(role) => self.set_role(role),
            None => self,
        }
    }

    pub fn add_group_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.update = self
            .update
            .link(USERS_GROUP_MEMBERS, true, ids.into_iter().collect());
        self
    }

    pub fn remove_group_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.update = self
            .update
            .unlink(USERS_GROUP_MEMBERS, true, ids.into_iter().collect());
        self
    }

    pub fn add_work_order_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.update = self.update.attach(
            WorkOrder::TABLE,
            WorkOrder::OWNER_COLUMN,
            ids.into_iter().collect(),
        );
        self
    }

    pub fn remove_work_order_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.update = self.update.detach(
            WorkOrder::TABLE,
            WorkOrder::OWNER_COLUMN,
            ids.into_iter().collect(),
        );
        self
    }
});

impl UserUpdate<'_> {
    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.query = self.query.where_(predicate);
        self
    }

    /// Apply the changes, returning the number of updated users.
    pub async fn save(self, ctx: &QueryContext) -> Result<usize, EntError> {
        self.update.save(self.client, ctx, self.query).await
    }
}

impl UserUpdateOne<'_> {
    pub async fn save(self, ctx: &QueryContext) -> Result<User, EntError> {
        self.update.save_one(self.client, ctx, self.id).await
    }
}
