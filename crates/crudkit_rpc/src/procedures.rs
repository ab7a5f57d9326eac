//! Procedure table: one entry per `<resource>.<action>` name.

use crudkit_core::db::StorageError;
use crudkit_core::repo::bookmark_repo::{SqliteBookmarkRepository, SqliteCollectionRepository};
use crudkit_core::repo::counter_repo::SqliteCounterRepository;
use crudkit_core::repo::inventory_repo::{SqliteProductRepository, SqliteStockTransactionRepository};
use crudkit_core::repo::pantry_repo::{SqliteCategoryRepository, SqlitePantryItemRepository};
use crudkit_core::{CrudError, CrudResult, ResourceRepository, ResourceService, StockLedgerService};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

pub(crate) type Handler = fn(&Connection, &Value) -> CrudResult<Value>;

pub(crate) struct Procedure {
    pub(crate) name: &'static str,
    pub(crate) handler: Handler,
}

/// Binds a resource marker to the repository built for each call.
trait Resource {
    type Repo<'conn>: ResourceRepository;

    fn open(conn: &Connection) -> CrudResult<Self::Repo<'_>>;
}

macro_rules! resource {
    ($marker:ident => $repo:ident) => {
        enum $marker {}

        impl Resource for $marker {
            type Repo<'conn> = $repo<'conn>;

            fn open(conn: &Connection) -> CrudResult<Self::Repo<'_>> {
                $repo::try_new(conn)
            }
        }
    };
}

resource!(Categories => SqliteCategoryRepository);
resource!(PantryItems => SqlitePantryItemRepository);
resource!(Collections => SqliteCollectionRepository);
resource!(Bookmarks => SqliteBookmarkRepository);
resource!(Products => SqliteProductRepository);
resource!(Counters => SqliteCounterRepository);

macro_rules! crud {
    ($resource:literal, $marker:ty) => {
        [
            Procedure {
                name: concat!($resource, ".create"),
                handler: create::<$marker>,
            },
            Procedure {
                name: concat!($resource, ".get"),
                handler: get::<$marker>,
            },
            Procedure {
                name: concat!($resource, ".update"),
                handler: update::<$marker>,
            },
            Procedure {
                name: concat!($resource, ".delete"),
                handler: delete::<$marker>,
            },
            Procedure {
                name: concat!($resource, ".list"),
                handler: list::<$marker>,
            },
        ]
    };
}

const CATEGORY_PROCEDURES: [Procedure; 5] = crud!("category", Categories);
const PANTRY_ITEM_PROCEDURES: [Procedure; 5] = crud!("pantry_item", PantryItems);
const COLLECTION_PROCEDURES: [Procedure; 5] = crud!("collection", Collections);
const BOOKMARK_PROCEDURES: [Procedure; 5] = crud!("bookmark", Bookmarks);
const PRODUCT_PROCEDURES: [Procedure; 5] = crud!("product", Products);
const COUNTER_PROCEDURES: [Procedure; 5] = crud!("counter", Counters);

const EXTRA_PROCEDURES: [Procedure; 6] = [
    Procedure {
        name: "pantry_item.adjust_quantity",
        handler: pantry_adjust_quantity,
    },
    Procedure {
        name: "pantry_item.expiring",
        handler: pantry_expiring,
    },
    Procedure {
        name: "stock_transaction.record",
        handler: stock_record,
    },
    Procedure {
        name: "stock_transaction.get",
        handler: stock_get,
    },
    Procedure {
        name: "stock_transaction.list",
        handler: stock_list,
    },
    Procedure {
        name: "counter.increment",
        handler: counter_increment,
    },
];

pub(crate) static PROCEDURE_GROUPS: [&[Procedure]; 7] = [
    &CATEGORY_PROCEDURES,
    &PANTRY_ITEM_PROCEDURES,
    &COLLECTION_PROCEDURES,
    &BOOKMARK_PROCEDURES,
    &PRODUCT_PROCEDURES,
    &COUNTER_PROCEDURES,
    &EXTRA_PROCEDURES,
];

pub(crate) fn procedures() -> impl Iterator<Item = &'static Procedure> {
    PROCEDURE_GROUPS.iter().flat_map(|group| group.iter())
}

pub(crate) fn find(name: &str) -> Option<&'static Procedure> {
    procedures().find(|procedure| procedure.name == name)
}

fn create<T: Resource>(conn: &Connection, input: &Value) -> CrudResult<Value> {
    to_json(&ResourceService::new(T::open(conn)?).create(input)?)
}

fn get<T: Resource>(conn: &Connection, input: &Value) -> CrudResult<Value> {
    to_json(&ResourceService::new(T::open(conn)?).get(input)?)
}

fn update<T: Resource>(conn: &Connection, input: &Value) -> CrudResult<Value> {
    to_json(&ResourceService::new(T::open(conn)?).update(input)?)
}

fn delete<T: Resource>(conn: &Connection, input: &Value) -> CrudResult<Value> {
    to_json(&ResourceService::new(T::open(conn)?).delete(input)?)
}

fn list<T: Resource>(conn: &Connection, input: &Value) -> CrudResult<Value> {
    to_json(&ResourceService::new(T::open(conn)?).list(input)?)
}

fn pantry_adjust_quantity(conn: &Connection, input: &Value) -> CrudResult<Value> {
    let service = ResourceService::new(SqlitePantryItemRepository::try_new(conn)?);
    to_json(&service.adjust_quantity(input)?)
}

fn pantry_expiring(conn: &Connection, input: &Value) -> CrudResult<Value> {
    let service = ResourceService::new(SqlitePantryItemRepository::try_new(conn)?);
    to_json(&service.expiring(input)?)
}

fn counter_increment(conn: &Connection, input: &Value) -> CrudResult<Value> {
    let service = ResourceService::new(SqliteCounterRepository::try_new(conn)?);
    to_json(&service.increment(input)?)
}

fn stock_record(conn: &Connection, input: &Value) -> CrudResult<Value> {
    let service = StockLedgerService::new(SqliteStockTransactionRepository::try_new(conn)?);
    to_json(&service.record(input)?)
}

fn stock_get(conn: &Connection, input: &Value) -> CrudResult<Value> {
    let service = StockLedgerService::new(SqliteStockTransactionRepository::try_new(conn)?);
    to_json(&service.get(input)?)
}

fn stock_list(conn: &Connection, input: &Value) -> CrudResult<Value> {
    let service = StockLedgerService::new(SqliteStockTransactionRepository::try_new(conn)?);
    to_json(&service.list(input)?)
}

fn to_json<T: Serialize>(value: &T) -> CrudResult<Value> {
    serde_json::to_value(value).map_err(|err| {
        CrudError::Storage(StorageError::InvalidData(format!(
            "cannot encode response: {err}"
        )))
    })
}
