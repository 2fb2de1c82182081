use std::any::Any;

use async_graphql::dataloader::DataLoader;
use async_graphql::{ComplexObject, Context, ErrorExtensions, SimpleObject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use workgraph_macros::NodeFields;

use super::activity::Activity;
use super::user::User;
use super::{ent_enum, update_setters};
use crate::ent::eager::{load_to_many, load_to_one};
use crate::ent::entity::decode_enum;
use crate::ent::insert::InsertBuilder;
use crate::ent::{
    Client, ColumnDef, EagerLoad, EdgeSlot, EntError, Entity, EntityClient, EntityLoader,
    EntityQuery, FieldSelection, HasForeignKey, NodeEdge, NodeFields, NodeView, Noder, Order,
    Predicate, QueryContext, RelationLoader, TableSchema, UpdateBuilder,
};

ent_enum! {
    WorkOrderStatus {
        Planned => "PLANNED",
        InProgress => "IN_PROGRESS",
        Done => "DONE",
    }
}

ent_enum! {
    WorkOrderPriority {
        Urgent => "URGENT",
        High => "HIGH",
        Medium => "MEDIUM",
        Low => "LOW",
        None => "NONE",
    }
}

/// A unit of field work, owned by one user and optionally assigned to another.
#[derive(SimpleObject, NodeFields, Debug, Clone)]
#[graphql(complex)]
pub struct WorkOrder {
    #[node(skip)]
    pub id: i64,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub name: String,
    pub description: Option<String>,
    pub status: WorkOrderStatus,
    pub priority: WorkOrderPriority,
    pub install_date: Option<DateTime<Utc>>,
    #[node(skip)]
    #[graphql(skip)]
    pub owner_id: Option<i64>,
    #[node(skip)]
    #[graphql(skip)]
    pub assignee_id: Option<i64>,
    #[node(skip)]
    #[graphql(skip)]
    pub edges: WorkOrderEdges,
}

#[derive(Debug, Clone, Default)]
pub struct WorkOrderEdges {
    pub owner: EdgeSlot<Option<User>>,
    pub assignee: EdgeSlot<Option<User>>,
    pub activities: EdgeSlot<Vec<Activity>>,
}

impl WorkOrderEdges {
    pub fn owner_or_err(&self) -> Result<&User, EntError> {
        self.owner.get_one("owner", User::LABEL)
    }

    pub fn assignee_or_err(&self) -> Result<&User, EntError> {
        self.assignee.get_one("assignee", User::LABEL)
    }

    pub fn activities_or_err(&self) -> Result<&[Activity], EntError> {
        self.activities.get("activities").map(Vec::as_slice)
    }
}

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("create_time", "TEXT"),
    ColumnDef::new("update_time", "TEXT"),
    ColumnDef::new("name", "TEXT"),
    ColumnDef::new("description", "TEXT").nullable(),
    ColumnDef::new("status", "TEXT").default("'PLANNED'"),
    ColumnDef::new("priority", "TEXT").default("'NONE'"),
    ColumnDef::new("install_date", "TEXT").nullable(),
    ColumnDef::foreign_key(WorkOrder::OWNER_COLUMN, "users"),
    ColumnDef::foreign_key(WorkOrder::ASSIGNEE_COLUMN, "users"),
];

impl Entity for WorkOrder {
    const TABLE: &'static str = "work_orders";
    const LABEL: &'static str = "work_order";
    const TYPE_NAME: &'static str = "WorkOrder";
    const SCHEMA: TableSchema = TableSchema {
        name: Self::TABLE,
        columns: COLUMNS,
    };

    type With = WorkOrderWith;

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
            priority: decode_enum(row, "priority")?,
            install_date: row.try_get("install_date")?,
            owner_id: row.try_get(Self::OWNER_COLUMN)?,
            assignee_id: row.try_get(Self::ASSIGNEE_COLUMN)?,
            edges: WorkOrderEdges::default(),
        })
    }
}

impl WorkOrder {
    pub const OWNER_COLUMN: &'static str = "work_order_owner";
    pub const ASSIGNEE_COLUMN: &'static str = "work_order_assignee";

    pub fn query_owner(&self) -> EntityQuery<User> {
        EntityQuery::new().where_(Predicate::id_in(self.owner_id))
    }

    pub fn query_assignee(&self) -> EntityQuery<User> {
        EntityQuery::new().where_(Predicate::id_in(self.assignee_id))
    }

    pub fn query_activities(&self) -> EntityQuery<Activity> {
        EntityQuery::new().where_(Predicate::eq(Activity::WORK_ORDER_COLUMN, self.id))
    }

    pub fn has_owner() -> Predicate {
        Predicate::not_null(Self::OWNER_COLUMN)
    }

    pub fn has_owner_with(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::in_select(Self::OWNER_COLUMN, User::TABLE, "id", predicates)
    }

    pub fn has_assignee() -> Predicate {
        Predicate::not_null(Self::ASSIGNEE_COLUMN)
    }

    pub fn has_assignee_with(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::in_select(Self::ASSIGNEE_COLUMN, User::TABLE, "id", predicates)
    }

    /// Work orders with at least one activity.
    pub fn has_activities() -> Predicate {
        Self::has_activities_with([])
    }

    /// Work orders with at least one activity matching every predicate.
    pub fn has_activities_with(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        let mut conditions = vec![Predicate::not_null(Activity::WORK_ORDER_COLUMN)];
        conditions.extend(predicates);
        Predicate::in_select("id", Activity::TABLE, Activity::WORK_ORDER_COLUMN, conditions)
    }
}

impl HasForeignKey for WorkOrder {
    fn foreign_key(&self, column: &str) -> Option<i64> {
        match column {
            Self::OWNER_COLUMN => self.owner_id,
            Self::ASSIGNEE_COLUMN => self.assignee_id,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkOrderWith {
    owner: Option<Box<EntityQuery<User>>>,
    assignee: Option<Box<EntityQuery<User>>>,
    activities: Option<Box<EntityQuery<Activity>>>,
}

fn owner_slot(work_order: &mut WorkOrder) -> &mut EdgeSlot<Option<User>> {
    &mut work_order.edges.owner
}

fn assignee_slot(work_order: &mut WorkOrder) -> &mut EdgeSlot<Option<User>> {
    &mut work_order.edges.assignee
}

fn activities_slot(work_order: &mut WorkOrder) -> &mut EdgeSlot<Vec<Activity>> {
    &mut work_order.edges.activities
}

#[async_trait]
impl EagerLoad<WorkOrder> for WorkOrderWith {
    fn collect(&mut self, fields: &FieldSelection) {
        for field in &fields.children {
            match field.name.as_str() {
                "owner" => {
                    self.owner = Some(Box::new(EntityQuery::new().collect_selection(field)));
                }
                "assignee" => {
                    self.assignee = Some(Box::new(EntityQuery::new().collect_selection(field)));
                }
                "activities" => {
                    self.activities = Some(Box::new(EntityQuery::new().collect_selection(field)));
                }
                _ => {}
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.owner.is_none() && self.assignee.is_none() && self.activities.is_none()
    }

    async fn load(
        &self,
        client: &Client,
        ctx: &QueryContext,
        nodes: &mut [WorkOrder],
    ) -> Result<(), EntError> {
        if let Some(query) = &self.owner {
            load_to_one(
                client,
                ctx,
                nodes,
                (**query).clone(),
                "owner",
                WorkOrder::OWNER_COLUMN,
                |w| w.owner_id,
                owner_slot,
            )
            .await?;
        }
        if let Some(query) = &self.assignee {
            load_to_one(
                client,
                ctx,
                nodes,
                (**query).clone(),
                "assignee",
                WorkOrder::ASSIGNEE_COLUMN,
                |w| w.assignee_id,
                assignee_slot,
            )
            .await?;
        }
        if let Some(query) = &self.activities {
            load_to_many(
                client,
                ctx,
                nodes,
                (**query).clone(),
                "activities",
                Activity::WORK_ORDER_COLUMN,
                |a| a.work_order_id,
                activities_slot,
            )
            .await?;
        }
        Ok(())
    }
}

impl EntityQuery<WorkOrder> {
    /// Owners of the matching work orders.
    pub fn query_owner(&self) -> EntityQuery<User> {
        EntityQuery::new().where_(self.subquery("id", WorkOrder::OWNER_COLUMN))
    }

    pub fn query_assignee(&self) -> EntityQuery<User> {
        EntityQuery::new().where_(self.subquery("id", WorkOrder::ASSIGNEE_COLUMN))
    }

    /// Activities of the matching work orders.
    pub fn query_activities(&self) -> EntityQuery<Activity> {
        EntityQuery::new().where_(self.subquery(Activity::WORK_ORDER_COLUMN, "id"))
    }

    pub fn with_owner(mut self, query: EntityQuery<User>) -> Self {
        self.eager.owner = Some(Box::new(query));
        self
    }

    pub fn with_assignee(mut self, query: EntityQuery<User>) -> Self {
        self.eager.assignee = Some(Box::new(query));
        self
    }

    pub fn with_activities(mut self, query: EntityQuery<Activity>) -> Self {
        self.eager.activities = Some(Box::new(query));
        self
    }
}

#[async_trait]
impl Noder for WorkOrder {
    fn node_id(&self) -> i64 {
        self.id
    }

    fn node_type(&self) -> &'static str {
        Self::TYPE_NAME
    }

    async fn node(&self, client: &Client, ctx: &QueryContext) -> Result<NodeView, EntError> {
        let ctx = ctx.without_fields();
        let owner = self.query_owner().ids(client, &ctx).await?;
        let assignee = self.query_assignee().ids(client, &ctx).await?;
        let activities = self
            .query_activities()
            .order(Order::asc("id"))
            .ids(client, &ctx)
            .await?;

        Ok(NodeView {
            id: self.id,
            type_name: Self::TYPE_NAME.to_string(),
            fields: self.node_fields()?,
            edges: vec![
                NodeEdge::new(User::TYPE_NAME, "owner", owner),
                NodeEdge::new(User::TYPE_NAME, "assignee", assignee),
                NodeEdge::new(Activity::TYPE_NAME, "activities", activities),
            ],
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[ComplexObject]
impl WorkOrder {
    async fn owner(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<User>> {
        if let Some(owner) = self.edges.owner.loaded() {
            return Ok(owner.clone());
        }
        load_user(ctx, self.owner_id).await
    }

    async fn assignee(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<User>> {
        if let Some(assignee) = self.edges.assignee.loaded() {
            return Ok(assignee.clone());
        }
        load_user(ctx, self.assignee_id).await
    }

    async fn activities(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Activity>> {
        if let Some(activities) = self.edges.activities.loaded() {
            return Ok(activities.clone());
        }
        let loader = ctx.data::<DataLoader<RelationLoader<Activity>>>()?;
        let activities = loader.load_one(self.id).await.map_err(|e| e.extend())?;
        Ok(activities.unwrap_or_default())
    }
}

async fn load_user(ctx: &Context<'_>, id: Option<i64>) -> async_graphql::Result<Option<User>> {
    let Some(id) = id else {
        return Ok(None);
    };
    let loader = ctx.data::<DataLoader<EntityLoader<User>>>()?;
    loader.load_one(id).await.map_err(|e| e.extend())
}

#[derive(Debug)]
pub struct WorkOrderCreate<'a> {
    client: &'a Client,
    name: Option<String>,
    description: Option<String>,
    status: WorkOrderStatus,
    priority: WorkOrderPriority,
    install_date: Option<DateTime<Utc>>,
    owner_id: Option<i64>,
    assignee_id: Option<i64>,
}

impl<'a> EntityClient<'a, WorkOrder> {
    pub fn create(&self) -> WorkOrderCreate<'a> {
        WorkOrderCreate {
            client: self.client,
            name: None,
            description: None,
            status: WorkOrderStatus::Planned,
            priority: WorkOrderPriority::None,
            install_date: None,
            owner_id: None,
            assignee_id: None,
        }
    }
}

impl WorkOrderCreate<'_> {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn status(mut self, status: WorkOrderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn priority(mut self, priority: WorkOrderPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn install_date(mut self, install_date: DateTime<Utc>) -> Self {
        self.install_date = Some(install_date);
        self
    }

    pub fn owner_id(mut self, id: i64) -> Self {
        self.owner_id = Some(id);
        self
    }

    pub fn assignee_id(mut self, id: i64) -> Self {
        self.assignee_id = Some(id);
        self
    }

    pub async fn save(self, ctx: &QueryContext) -> Result<WorkOrder, EntError> {
        let name = self.name.ok_or(EntError::MissingField("name"))?;
        let now = Utc::now();
        let insert = InsertBuilder::new(WorkOrder::TABLE)
            .set("create_time", now)
            .set("update_time", now)
            .set("name", name)
            .set("description", self.description)
            .set("status", self.status)
            .set("priority", self.priority)
            .set("install_date", self.install_date)
            .set(WorkOrder::OWNER_COLUMN, self.owner_id)
            .set(WorkOrder::ASSIGNEE_COLUMN, self.assignee_id);
        let pool = self.client.pool();

        let id = ctx
            .run(async {
                let mut conn = pool.acquire().await?;
                insert.execute(&mut conn).await
            })
            .await?;

        self.client.work_orders().get(ctx, id).await
    }
}

/// Builder returned by `client.work_orders().update()`.
#[derive(Debug)]
pub struct WorkOrderUpdate<'a> {
    client: &'a Client,
    query: EntityQuery<WorkOrder>,
    update: UpdateBuilder,
}

/// Builder returned by `client.work_orders().update_one(..)`.
#[derive(Debug)]
pub struct WorkOrderUpdateOne<'a> {
    client: &'a Client,
    id: i64,
    update: UpdateBuilder,
}

impl<'a> EntityClient<'a, WorkOrder> {
    pub fn update(&self) -> WorkOrderUpdate<'a> {
        WorkOrderUpdate {
            client: self.client,
            query: EntityQuery::new(),
            update: UpdateBuilder::new(WorkOrder::TABLE),
        }
    }

    pub fn update_one(&self, work_order: &WorkOrder) -> WorkOrderUpdateOne<'a> {
        self.update_one_id(work_order.id)
    }

    pub fn update_one_id(&self, id: i64) -> WorkOrderUpdateOne<'a> {
        WorkOrderUpdateOne {
            client: self.client,
            id,
            update: UpdateBuilder::new(WorkOrder::TABLE),
        }
    }
}

update_setters!(WorkOrderUpdate, WorkOrderUpdateOne, {
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

    pub fn set_status(mut self, status: WorkOrderStatus) -> Self {
        self.update = self.update.set("status", status);
        self
    }

    pub fn set_nillable_status(self, status: Option<WorkOrderStatus>) -> Self {
        match status {
            Some(status) => self.set_status(status),
            None => self,
        }
    }

    pub fn set_priority(mut self, priority: WorkOrderPriority) -> Self {
        self.update = self.update.set("priority", priority);
        self
    }

    pub fn set_nillable_priority(self, priority: Option<WorkOrderPriority>) -> Self {
        match priority {
            Some(priority) => self.set_priority(priority),
            None => self,
        }
    }

    pub fn set_install_date(mut self, install_date: DateTime<Utc>) -> Self {
        self.update = self.update.set("install_date", install_date);
        self
    }

    pub fn set_nillable_install_date(self, install_date: Option<DateTime<Utc>>) -> Self {
        match install_date {
            Some(install_date) => self.set_install_date(install_date),
            None => self,
        }
    }

    pub fn clear_install_date(mut self) -> Self {
        self.update = self.update.clear("install_date");
        self
    }

    pub fn set_owner_id(mut self, id: i64) -> Self {
        self.update = self.update.set(WorkOrder::OWNER_COLUMN, id);
        self
    }

    pub fn set_nillable_owner_id(self, id: Option<i64>) -> Self {
        match id {
            Some(id) => self.set_owner_id(id),
            None => self,
        }
    }

    pub fn clear_owner(mut self) -> Self {
        self.update = self.update.clear(WorkOrder::OWNER_COLUMN);
        self
    }

    pub fn set_assignee_id(mut self, id: i64) -> Self {
        self.update = self.update.set(WorkOrder::ASSIGNEE_COLUMN, id);
        self
    }

    pub fn set_nillable_assignee_id(self, id: Option<i64>) -> Self {
        match id {
            Some(id) => self.set_assignee_id(id),
            None => self,
        }
    }

    pub fn clear_assignee(mut self) -> Self {
        self.update = self.update.clear(WorkOrder::ASSIGNEE_COLUMN);
        self
    }

    pub fn add_activity_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.update = self.update.attach(
            Activity::TABLE,
            Activity::WORK_ORDER_COLUMN,
            ids.into_iter().collect(),
        );
        self
    }

    pub fn remove_activity_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.update = self.update.detach(
            Activity::TABLE,
            Activity::WORK_ORDER_COLUMN,
            ids.into_iter().collect(),
        );
        self
    }
});

impl WorkOrderUpdate<'_> {
    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.query = self.query.where_(predicate);
        self
    }

    /// Apply the changes, returning the number of updated work orders.
    pub async fn save(self, ctx: &QueryContext) -> Result<usize, EntError> {
        self.update.save(self.client, ctx, self.query).await
    }
}

impl WorkOrderUpdateOne<'_> {
    pub async fn save(self, ctx: &QueryContext) -> Result<WorkOrder, EntError> {
        self.update.save_one(self.client, ctx, self.id).await
    }
}
