//! Concrete entities of the work-order graph.
//!
//! Each module holds the record, its edges and edge predicates, its
//! eager-load instructions, node view and mutation builders.

pub mod activity;
pub mod user;
pub mod users_group;
pub mod work_order;

pub use activity::{
    Activity, ActivityCreate, ActivityEdges, ActivityField, ActivityUpdate, ActivityUpdateOne,
    ActivityWith,
};
pub use user::{
    User, UserCreate, UserEdges, UserRole, UserStatus, UserUpdate, UserUpdateOne, UserWith,
};
pub use users_group::{
    USERS_GROUP_MEMBERS, UsersGroup, UsersGroupCreate, UsersGroupEdges, UsersGroupStatus,
    UsersGroupUpdate, UsersGroupUpdateOne, UsersGroupWith,
};
pub use work_order::{
    WorkOrder, WorkOrderCreate, WorkOrderEdges, WorkOrderPriority, WorkOrderStatus,
    WorkOrderUpdate, WorkOrderUpdateOne, WorkOrderWith,
};

use crate::ent::{Entity, JoinTableSchema, NodeRegistry, TableSchema};

/// Defines a text-backed enum column exposed as a GraphQL enum.
macro_rules! ent_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            async_graphql::Enum,
            serde::Serialize,
            serde::Deserialize,
            Copy,
            Clone,
            Debug,
            PartialEq,
            Eq,
            Hash,
        )]
        pub enum $name {
            $(
                #[graphql(name = $text)]
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::ent::EntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err($crate::ent::EntError::InvalidEnumValue {
                        enum_name: stringify!($name),
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$name> for $crate::ent::SqlValue {
            fn from(value: $name) -> Self {
                $crate::ent::SqlValue::String(value.as_str().to_string())
            }
        }
    };
}

pub(crate) use ent_enum;

/// Implements one block of setters on both update builders of an entity.
/// Each builder keeps its pending changes in an `update` field.
macro_rules! update_setters {
    ($many:ident, $one:ident, { $($setters:tt)* }) => {
        impl $many<'_> {
            $($setters)*
        }

        impl $one<'_> {
            $($setters)*
        }
    };
}

pub(crate) use update_setters;

/// Entity tables in directory order. The position of a table is the table
/// index encoded in its global ids.
pub fn all_tables() -> [TableSchema; 4] {
    [User::SCHEMA, UsersGroup::SCHEMA, WorkOrder::SCHEMA, Activity::SCHEMA]
}

pub fn join_tables() -> [JoinTableSchema; 1] {
    [USERS_GROUP_MEMBERS]
}

/// Node loaders for every entity.
pub fn registry() -> NodeRegistry {
    NodeRegistry::new()
        .register::<User>()
        .register::<UsersGroup>()
        .register::<WorkOrder>()
        .register::<Activity>()
}
