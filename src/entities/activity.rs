use std::any::Any;

use async_graphql::dataloader::DataLoader;
use async_graphql::{ComplexObject, Context, ErrorExtensions, SimpleObject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use workgraph_macros::NodeFields;

use super::user::User;
use super::{ent_enum, update_setters};
use super::work_order::WorkOrder;
use crate::ent::eager::load_to_one;
use crate::ent::entity::decode_enum;
use crate::ent::insert::InsertBuilder;
use crate::ent::{
    Client, ColumnDef, EagerLoad, EdgeSlot, EntError, Entity, EntityClient, EntityLoader,
    EntityQuery, FieldSelection, HasForeignKey, NodeEdge, NodeFields, NodeView, Noder, Predicate,
    QueryContext, TableSchema, UpdateBuilder,
};

ent_enum! {
    /// Work order field an activity records a change of.
    ActivityField {
        Priority => "PRIORITY",
        Status => "STATUS",
        Owner => "OWNER",
        Assignee => "ASSIGNEE",
        CreationDate => "CREATION_DATE",
        Name => "NAME",
        Description => "DESCRIPTION",
    }
}

/// Change log entry of a work order.
#[derive(SimpleObject, NodeFields, Debug, Clone)]
#[graphql(complex)]
pub struct Activity {
    #[node(skip)]
    pub id: i64,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub changed_field: ActivityField,
    pub is_create: bool,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    #[node(skip)]
    #[graphql(skip)]
    pub author_id: Option<i64>,
    #[node(skip)]
    #[graphql(skip)]
    pub work_order_id: Option<i64>,
    #[node(skip)]
    #[graphql(skip)]
    pub edges: ActivityEdges,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityEdges {
    pub author: EdgeSlot<Option<User>>,
    pub work_order: EdgeSlot<Option<WorkOrder>>,
}

impl ActivityEdges {
    pub fn author_or_err(&self) -> Result<&User, EntError> {
        self.author.get_one("author", User::LABEL)
    }

    pub fn work_order_or_err(&self) -> Result<&WorkOrder, EntError> {
        self.work_order.get_one("work_order", WorkOrder::LABEL)
    }
}

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("create_time", "TEXT"),
    ColumnDef::new("update_time", "TEXT"),
    ColumnDef::new("changed_field", "TEXT"),
    ColumnDef::new("is_create", "BOOLEAN").default("0"),
    ColumnDef::new("old_value", "TEXT").nullable(),
    ColumnDef::new("new_value", "TEXT").nullable(),
    ColumnDef::foreign_key(Activity::AUTHOR_COLUMN, "users"),
    ColumnDef::foreign_key(Activity::WORK_ORDER_COLUMN, "work_orders"),
];

impl Entity for Activity {
    const TABLE: &'static str = "activities";
    const LABEL: &'static str = "activity";
    const TYPE_NAME: &'static str = "Activity";
    const SCHEMA: TableSchema = TableSchema {
        name: Self::TABLE,
        columns: COLUMNS,
    };

    type With = ActivityWith;

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            create_time: row.try_get("create_time")?,
            update_time: row.try_get("update_time")?,
            changed_field: decode_enum(row, "changed_field")?,
            is_create: row.try_get("is_create")?,
            old_value: row.try_get("old_value")?,
            new_value: row.try_get("new_value")?,
            author_id: row.try_get(Self::AUTHOR_COLUMN)?,
            work_order_id: row.try_get(Self::WORK_ORDER_COLUMN)?,
            edges: ActivityEdges::default(),
        })
    }
}

impl Activity {
    pub const AUTHOR_COLUMN: &'static str = "activity_author";
    pub const WORK_ORDER_COLUMN: &'static str = "work_order_activities";

    pub fn query_author(&self) -> EntityQuery<User> {
        EntityQuery::new().where_(Predicate::id_in(self.author_id))
    }

    pub fn query_work_order(&self) -> EntityQuery<WorkOrder> {
        EntityQuery::new().where_(Predicate::id_in(self.work_order_id))
    }

    /// Activities that have an author.
    pub fn has_author() -> Predicate {
        Predicate::not_null(Self::AUTHOR_COLUMN)
    }

    /// Activities whose author matches every predicate.
    pub fn has_author_with(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::in_select(Self::AUTHOR_COLUMN, User::TABLE, "id", predicates)
    }

    pub fn has_work_order() -> Predicate {
        Predicate::not_null(Self::WORK_ORDER_COLUMN)
    }

    pub fn has_work_order_with(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::in_select(Self::WORK_ORDER_COLUMN, WorkOrder::TABLE, "id", predicates)
    }
}

impl HasForeignKey for Activity {
    fn foreign_key(&self, column: &str) -> Option<i64> {
        match column {
            Self::AUTHOR_COLUMN => self.author_id,
            Self::WORK_ORDER_COLUMN => self.work_order_id,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActivityWith {
    author: Option<Box<EntityQuery<User>>>,
    work_order: Option<Box<EntityQuery<WorkOrder>>>,
}

fn author_slot(activity: &mut Activity) -> &mut EdgeSlot<Option<User>> {
    &mut activity.edges.author
}

fn work_order_slot(activity: &mut Activity) -> &mut EdgeSlot<Option<WorkOrder>> {
    &mut activity.edges.work_order
}

#[async_trait]
impl EagerLoad<Activity> for ActivityWith {
    fn collect(&mut self, fields: &FieldSelection) {
        for field in &fields.children {
            match field.name.as_str() {
                "author" => {
                    self.author = Some(Box::new(EntityQuery::new().collect_selection(field)));
                }
                "workOrder" => {
                    self.work_order = Some(Box::new(EntityQuery::new().collect_selection(field)));
                }
                _ => {}
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.author.is_none() && self.work_order.is_none()
    }

    async fn load(
        &self,
        client: &Client,
        ctx: &QueryContext,
        nodes: &mut [Activity],
    ) -> Result<(), EntError> {
        if let Some(query) = &self.author {
            load_to_one(
                client,
                ctx,
                nodes,
                (**query).clone(),
                "author",
                Activity::AUTHOR_COLUMN,
                |a| a.author_id,
                author_slot,
            )
            .await?;
        }
        if let Some(query) = &self.work_order {
            load_to_one(
                client,
                ctx,
                nodes,
                (**query).clone(),
                "work_order",
                Activity::WORK_ORDER_COLUMN,
                |a| a.work_order_id,
                work_order_slot,
            )
            .await?;
        }
        Ok(())
    }
}

impl EntityQuery<Activity> {
    /// Authors of the matching activities.
    pub fn query_author(&self) -> EntityQuery<User> {
        EntityQuery::new().where_(self.subquery("id", Activity::AUTHOR_COLUMN))
    }

    /// Work orders the matching activities belong to.
    pub fn query_work_order(&self) -> EntityQuery<WorkOrder> {
        EntityQuery::new().where_(self.subquery("id", Activity::WORK_ORDER_COLUMN))
    }

    pub fn with_author(mut self, query: EntityQuery<User>) -> Self {
        self.eager.author = Some(Box::new(query));
        self
    }

    pub fn with_work_order(mut self, query: EntityQuery<WorkOrder>) -> Self {
        self.eager.work_order = Some(Box::new(query));
        self
    }
}

#[async_trait]
impl Noder for Activity {
    fn node_id(&self) -> i64 {
        self.id
    }

    fn node_type(&self) -> &'static str {
        Self::TYPE_NAME
    }

    async fn node(&self, client: &Client, ctx: &QueryContext) -> Result<NodeView, EntError> {
        let ctx = ctx.without_fields();
        let author = self.query_author().ids(client, &ctx).await?;
        let work_order = self.query_work_order().ids(client, &ctx).await?;

        Ok(NodeView {
            id: self.id,
            type_name: Self::TYPE_NAME.to_string(),
            fields: self.node_fields()?,
            edges: vec![
                NodeEdge::new(User::TYPE_NAME, "author", author),
                NodeEdge::new(WorkOrder::TYPE_NAME, "work_order", work_order),
            ],
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[ComplexObject]
impl Activity {
    async fn author(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<User>> {
        if let Some(author) = self.edges.author.loaded() {
            return Ok(author.clone());
        }
        let Some(id) = self.author_id else {
            return Ok(None);
        };
        let loader = ctx.data::<DataLoader<EntityLoader<User>>>()?;
        loader.load_one(id).await.map_err(|e| e.extend())
    }

    async fn work_order(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<WorkOrder>> {
        if let Some(work_order) = self.edges.work_order.loaded() {
            return Ok(work_order.clone());
        }
        let Some(id) = self.work_order_id else {
            return Ok(None);
        };
        let loader = ctx.data::<DataLoader<EntityLoader<WorkOrder>>>()?;
        loader.load_one(id).await.map_err(|e| e.extend())
    }
}

#[derive(Debug)]
pub struct ActivityCreate<'a> {
    client: &'a Client,
    changed_field: Option<ActivityField>,
    is_create: bool,
    old_value: Option<String>,
    new_value: Option<String>,
    author_id: Option<i64>,
    work_order_id: Option<i64>,
}

impl<'a> EntityClient<'a, Activity> {
    pub fn create(&self) -> ActivityCreate<'a> {
        ActivityCreate {
            client: self.client,
            changed_field: None,
            is_create: false,
            old_value: None,
            new_value: None,
            author_id: None,
            work_order_id: None,
        }
    }
}

impl ActivityCreate<'_> {
    pub fn changed_field(mut self, field: ActivityField) -> Self {
        self.changed_field = Some(field);
        self
    }

    pub fn is_create(mut self, is_create: bool) -> Self {
        self.is_create = is_create;
        self
    }

    pub fn old_value(mut self, value: impl Into<String>) -> Self {
        self.old_value = Some(value.into());
        self
    }

    pub fn new_value(mut self, value: impl Into<String>) -> Self {
        self.new_value = Some(value.into());
        self
    }

    pub fn author_id(mut self, id: i64) -> Self {
        self.author_id = Some(id);
        self
    }

    pub fn work_order_id(mut self, id: i64) -> Self {
        self.work_order_id = Some(id);
        self
    }

    pub async fn save(self, ctx: &QueryContext) -> Result<Activity, EntError> {
        let changed_field = self
            .changed_field
            .ok_or(EntError::MissingField("changed_field"))?;
        let now = Utc::now();
        let insert = InsertBuilder::new(Activity::TABLE)
            .set("create_time", now)
            .set("update_time", now)
            .set("changed_field", changed_field)
            .set("is_create", self.is_create)
            .set("old_value", self.old_value)
            .set("new_value", self.new_value)
            .set(Activity::AUTHOR_COLUMN, self.author_id)
            .set(Activity::WORK_ORDER_COLUMN, self.work_order_id);
        let pool = self.client.pool();

        let id = ctx
            .run(async {
                let mut conn = pool.acquire().await?;
                insert.execute(&mut conn).await
            })
            .await?;

        self.client.activities().get(ctx, id).await
    }
}

/// Builder returned by `client.activities().update()`.
#[derive(Debug)]
pub struct ActivityUpdate<'a> {
    client: &'a Client,
    query: EntityQuery<Activity>,
    update: UpdateBuilder,
}

#[derive(Debug)]
pub struct ActivityUpdateOne<'a> {
    client: &'a Client,
    id: i64,
    update: UpdateBuilder,
}

impl<'a> EntityClient<'a, Activity> {
    pub fn update(&self) -> ActivityUpdate<'a> {
        ActivityUpdate {
            client: self.client,
            query: EntityQuery::new(),
            update: UpdateBuilder::new(Activity::TABLE),
        }
    }

    pub fn update_one(&self, activity: &Activity) -> ActivityUpdateOne<'a> {
        self.update_one_id(activity.id)
    }

    pub fn update_one_id(&self, id: i64) -> ActivityUpdateOne<'a> {
        ActivityUpdateOne {
            client: self.client,
            id,
            update: UpdateBuilder::new(Activity::TABLE),
        }
    }
}

update_setters!(ActivityUpdate, ActivityUpdateOne, {
    pub fn set_changed_field(mut self, field: ActivityField) -> Self {
        self.update = self.update.set("changed_field", field);
        self
    }

    pub fn set_is_create(mut self, is_create: bool) -> Self {
        self.update = self.update.set("is_create", is_create);
        self
    }

    pub fn set_old_value(mut self, value: impl Into<String>) -> Self {
        self.update = self.update.set("old_value", value.into());
        self
    }

    pub fn set_nillable_old_value(self, value: Option<String>) -> Self {
        match value {
            Some(value) => self.set_old_value(value),
            None => self,
        }
    }

    pub fn clear_old_value(mut self) -> Self {
        self.update = self.update.clear("old_value");
        self
    }

    pub fn set_new_value(mut self, value: impl Into<String>) -> Self {
        self.update = self.update.set("new_value", value.into());
        self
    }

    pub fn set_nillable_new_value(self, value: Option<String>) -> Self {
        match value {
            Some(value) => self.set_new_value(value),
            None => self,
        }
    }

    pub fn clear_new_value(mut self) -> Self {
        self.update = self.update.clear("new_value");
        self
    }

    pub fn set_author_id(mut self, id: i64) -> Self {
        self.update = self.update.set(Activity::AUTHOR_COLUMN, id);
        self
    }

    pub fn clear_author(mut self) -> Self {
        self.update = self.update.clear(Activity::AUTHOR_COLUMN);
        self
    }

    pub fn set_work_order_id(mut self, id: i64) -> Self {
        self.update = self.update.set(Activity::WORK_ORDER_COLUMN, id);
        self
    }

    pub fn clear_work_order(mut self) -> Self {
        self.update = self.update.clear(Activity::WORK_ORDER_COLUMN);
        self
    }
});

impl ActivityUpdate<'_> {
    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.query = self.query.where_(predicate);
        self
    }

    /// Apply the changes, returning the number of updated activities.
    pub async fn save(self, ctx: &QueryContext) -> Result<usize, EntError> {
        self.update.save(self.client, ctx, self.query).await
    }
}

impl ActivityUpdateOne<'_> {
    pub async fn save(self, ctx: &QueryContext) -> Result<Activity, EntError> {
        self.update.save_one(self.client, ctx, self.id).await
    }
}
