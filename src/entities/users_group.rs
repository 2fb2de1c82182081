use std::any::Any;

use async_graphql::{ComplexObject, Context, ErrorExtensions, SimpleObject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use workgraph_macros::NodeFields;

use super::user::User;
use super::{ent_enum, update_setters};
use crate::ent::eager::load_many_to_many;
use crate::ent::entity::decode_enum;
use crate::ent::insert::{InsertBuilder, insert_edges};
use crate::ent::{
    Client, ColumnDef, EagerLoad, EdgeSlot, EntError, Entity, EntityClient, EntityQuery,
    FieldSelection, JoinTableSchema, NodeEdge, NodeFields, NodeView, Noder, Order, Predicate,
    QueryContext, TableSchema, UpdateBuilder,
};

ent_enum! {
    UsersGroupStatus {
        Active => "ACTIVE",
        Deactivated => "DEACTIVATED",
    }
}

/// Membership of users in groups.
pub const USERS_GROUP_MEMBERS: JoinTableSchema = JoinTableSchema {
    name: "users_group_members",
    owner_column: "users_group_id",
    owner_table: "users_groups",
    target_column: "user_id",
    target_table: "users",
};

#[derive(SimpleObject, NodeFields, Debug, Clone)]
#[graphql(complex)]
pub struct UsersGroup {
    #[node(skip)]
    pub id: i64,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub name: String,
    pub description: Option<String>,
    pub status: UsersGroupStatus,
    #[node(skip)]
    #[graphql(skip)]
    pub edges: UsersGroupEdges,
}

#[derive(Debug, Clone, Default)]
pub struct UsersGroupEdges {
    pub members: EdgeSlot<Vec<User>>,
}

impl UsersGroupEdges {
    pub fn members_or_err(&self) -> Result<&[User], EntError> {
        self.members.get("members").map(Vec::as_slice)
    }
}

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("create_time", "TEXT"),
    ColumnDef::new("update_time", "TEXT"),
    ColumnDef::new("name", "TEXT"),
    ColumnDef::new("description", "TEXT").nullable(),
    ColumnDef::new("status", "TEXT").default("'ACTIVE'"),
];

impl Entity for UsersGroup {
    const TABLE: &'static str = "users_groups";
    const LABEL: &'static str = "users_group";
    const TYPE_NAME: &'static str = "UsersGroup";
    const SCHEMA: TableSchema = TableSchema {
        name: Self::TABLE,
        columns: COLUMNS,
    };

    type With = UsersGroupWith;

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            create_time: row.try_get("create_time")?,
            update_time: row.try_get("update_time")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            status: decode_enum(row, "status")?,
            edges: UsersGroupEdges::default(),
        })
    }
}

impl UsersGroup {
    pub fn query_members(&self) -> EntityQuery<User> {
        EntityQuery::new().where_(Predicate::InJoin {
            column: "id",
            table: USERS_GROUP_MEMBERS.name,
            select_column: USERS_GROUP_MEMBERS.target_column,
            where_column: USERS_GROUP_MEMBERS.owner_column,
            value: self.id,
        })
    }

    pub fn has_members() -> Predicate {
        Predicate::in_select(
            "id",
            USERS_GROUP_MEMBERS.name,
            USERS_GROUP_MEMBERS.owner_column,
            [],
        )
    }

    /// Groups with at least one member matching every predicate.
    pub fn has_members_with(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::in_select(
            "id",
            USERS_GROUP_MEMBERS.name,
            USERS_GROUP_MEMBERS.owner_column,
            [Predicate::in_select(
                USERS_GROUP_MEMBERS.target_column,
                User::TABLE,
                "id",
                predicates,
            )],
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct UsersGroupWith {
    members: Option<Box<EntityQuery<User>>>,
}

fn members_slot(group: &mut UsersGroup) -> &mut EdgeSlot<Vec<User>> {
    &mut group.edges.members
}

#[async_trait]
impl EagerLoad<UsersGroup> for UsersGroupWith {
    fn collect(&mut self, fields: &FieldSelection) {
        if let Some(field) = fields.field("members") {
            self.members = Some(Box::new(EntityQuery::new().collect_selection(field)));
        }
    }

    fn is_empty(&self) -> bool {
        self.members.is_none()
    }

    async fn load(
        &self,
        client: &Client,
        ctx: &QueryContext,
        nodes: &mut [UsersGroup],
    ) -> Result<(), EntError> {
        if let Some(query) = &self.members {
            load_many_to_many(
                client,
                ctx,
                nodes,
                (**query).clone(),
                "members",
                &USERS_GROUP_MEMBERS,
                USERS_GROUP_MEMBERS.owner_column,
                USERS_GROUP_MEMBERS.target_column,
                members_slot,
            )
            .await?;
        }
        Ok(())
    }
}

impl EntityQuery<UsersGroup> {
    /// Members of any of the matching groups.
    pub fn query_members(&self) -> EntityQuery<User> {
        EntityQuery::new().where_(Predicate::in_select(
            "id",
            USERS_GROUP_MEMBERS.name,
            USERS_GROUP_MEMBERS.target_column,
            [self.subquery(USERS_GROUP_MEMBERS.owner_column, "id")],
        ))
    }

    pub fn with_members(mut self, query: EntityQuery<User>) -> Self {
        self.eager.members = Some(Box::new(query));
        self
    }
}

#[async_trait]
impl Noder for UsersGroup {
    fn node_id(&self) -> i64 {
        self.id
    }

    fn node_type(&self) -> &'static str {
        Self::TYPE_NAME
    }

    async fn node(&self, client: &Client, ctx: &QueryContext) -> Result<NodeView, EntError> {
        let ctx = ctx.without_fields();
        let members = self
            .query_members()
            .order(Order::asc("id"))
            .ids(client, &ctx)
            .await?;

        Ok(NodeView {
            id: self.id,
            type_name: Self::TYPE_NAME.to_string(),
            fields: self.node_fields()?,
            edges: vec![NodeEdge::new(User::TYPE_NAME, "members", members)],
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[ComplexObject]
impl UsersGroup {
    async fn members(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<User>> {
        if let Some(members) = self.edges.members.loaded() {
            return Ok(members.clone());
        }
        let client = ctx.data::<Client>()?;
        let qctx = QueryContext::from_graphql(ctx);
        self.query_members()
            .order(Order::asc("id"))
            .collect_fields(&qctx)
            .all(client, &qctx)
            .await
            .map_err(|e| e.extend())
    }
}

#[derive(Debug)]
pub struct UsersGroupCreate<'a> {
    client: &'a Client,
    name: Option<String>,
    description: Option<String>,
    status: UsersGroupStatus,
    member_ids: Vec<i64>,
}

impl<'a> EntityClient<'a, UsersGroup> {
    pub fn create(&self) -> UsersGroupCreate<'a> {
        UsersGroupCreate {
            client: self.client,
            name: None,
            description: None,
            status: UsersGroupStatus::Active,
            member_ids: Vec::new(),
        }
    }
}

impl UsersGroupCreate<'_> {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn status(mut self, status: UsersGroupStatus) -> Self {
        self.status = status;
        self
    }

    pub fn add_member_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.member_ids.extend(ids);
        self
    }

    pub async fn save(self, ctx: &QueryContext) -> Result<UsersGroup, EntError> {
        let name = self.name.ok_or(EntError::MissingField("name"))?;
        let now = Utc::now();
        let insert = InsertBuilder::new(UsersGroup::TABLE)
            .set("create_time", now)
            .set("update_time", now)
            .set("name", name)
            .set("description", self.description)
            .set("status", self.status);
        let pool = self.client.pool();
        let member_ids = self.member_ids;

        let id = ctx
            .run(async {
                let mut tx = pool.begin().await?;
                let id = insert.execute(&mut tx).await?;
                let pairs: Vec<(i64, i64)> = member_ids.iter().map(|m| (id, *m)).collect();
                insert_edges(&mut tx, &USERS_GROUP_MEMBERS, &pairs).await?;
                tx.commit().await?;
                Ok::<_, sqlx::Error>(id)
            })
            .await?;

        self.client.users_groups().get(ctx, id).await
    }
}

/// Builder returned by `client.users_groups().update()`.
#[derive(Debug)]
pub struct UsersGroupUpdate<'a> {
    client: &'a Client,
    query: EntityQuery<UsersGroup>,
    update: UpdateBuilder,
}

#[derive(Debug)]
pub struct UsersGroupUpdateOne<'a> {
    client: &'a Client,
    id: i64,
    update: UpdateBuilder,
}

impl<'a> EntityClient<'a, UsersGroup> {
    pub fn update(&self) -> UsersGroupUpdate<'a> {
        UsersGroupUpdate {
            client: self.client,
            query: EntityQuery::new(),
            update: UpdateBuilder::new(UsersGroup::TABLE),
        }
    }

    pub fn update_one(&self, group: &UsersGroup) -> UsersGroupUpdateOne<'a> {
        self.update_one_id(group.id)
    }

    pub fn update_one_id(&self, id: i64) -> UsersGroupUpdateOne<'a> {
        UsersGroupUpdateOne {
            client: self.client,
            id,
            update: UpdateBuilder::new(UsersGroup::TABLE),
        }
    }
}

update_setters!(UsersGroupUpdate, UsersGroupUpdateOne, {
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.update = self.update.set("name", name.into());
        self
    }

    pub fn set_description(mut self, description: impl Into<String>) -> Self {
        self.update = self.update.set("description", description.into());
        self
    }

    pub fn set_nillable_description(self, description: Option<String>) -> Self {
        match description {
            Some(description) => self.set_description(description),
            None => self,
        }
    }

    pub fn clear_description(mut self) -> Self {
        self.update = self.update.clear("description");
        self
    }

    pub fn set_status(mut self, status: UsersGroupStatus) -> Self {
        self.update = self.update.set("status", status);
        self
    }

    pub fn set_nillable_status(self, status: Option<UsersGroupStatus>) -> Self {
        match status {
            Some(status) => self.set_status(status),
            None => self,
        }
    }

    pub fn add_member_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.update = self
            .update
            .link(USERS_GROUP_MEMBERS, false, ids.into_iter().collect());
        self
    }

    pub fn remove_member_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.update = self
            .update
            .unlink(USERS_GROUP_MEMBERS, false, ids.into_iter().collect());
        self
    }
});

impl UsersGroupUpdate<'_> {
    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.query = self.query.where_(predicate);
        self
    }

    pub async fn save(self, ctx: &QueryContext) -> Result<usize, EntError> {
        self.update.save(self.client, ctx, self.query).await
    }
}

impl UsersGroupUpdateOne<'_> {
    pub async fn save(self, ctx: &QueryContext) -> Result<UsersGroup, EntError> {
        self.update.save_one(self.client, ctx, self.id).await
    }
}
