pub mod core;
pub mod backend;
pub mod schema;
pub mod key;
pub mod record;
pub mod expression;
pub mod query;
pub mod update;
pub mod writer;
pub mod reader;

pub use crate::backend::{AttributeValue, Backend, Item};
pub use crate::core::config::Config;
pub use crate::core::database::Database;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::{generate_id, Document, ID_FIELD};
pub use crate::expression::ast::{Comparator, Condition};
pub use crate::key::boundary::IdRange;
pub use crate::key::codec::ItemIdentity;
pub use crate::query::ast::{AdjacencyResult, ChildQuery, Cursor, FindOptions, FindQuery, FindResult, SortDirection};
pub use crate::reader::batch::{BatchReadResult, ReadDescriptor};
pub use crate::schema::collection::{AccessPattern, CollectionDefinition, Normalizer};
pub use crate::schema::layout::TableLayout;
pub use crate::schema::registry::Registry;
pub use crate::update::changes::{UpdateAction, UpdateSpec};
pub use crate::writer::batch::{BatchWriteResult, WriteDescriptor};
pub use crate::writer::transact::TransactWriteDescriptor;

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                             DYNADEX STRUCT ARCHITECTURE                                     │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── CORE LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                               struct Database                                       │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ config: Config                    // Separator, batch limits, read mode      │ │    │
│  │  │ registry: Arc<Registry>           // Collections, resolved once at startup   │ │    │
│  │  │ backend: Arc<dyn Backend>         // One unary call per operation            │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌──────────────────┐  ┌──────────────────┐  ┌───────────────────────────────────────┐    │
│  │ struct Config    │  │ struct Document  │  │ struct Error                          │    │
│  │ • separator      │  │ • fields: Map<   │  │ • kind: ErrorKind                     │    │
│  │ • max_batch_*    │  │   String, Value> │  │ • context: String                     │    │
│  │ • max_in_values  │  │ • id() / _id     │  │ • path: Option<String>                │    │
│  │ • consistent_rds │  └──────────────────┘  └───────────────────────────────────────┘    │
│  └──────────────────┘                                                                       │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── SCHEMA LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────┐  ┌─────────────────────────┐  ┌────────────────────────┐      │
│  │ struct TableLayout     │  │ struct CollectionDef    │  │ struct Collection      │      │
│  │ • table_name           │  │ • name                  │  │ • patterns: Vec<       │      │
│  │ • primary_key          │  │ • layout                │  │   IndexedPattern>      │      │
│  │ • indexes: Vec<        │  │ • parent + foreign key  │  │ • ttl: ExtractKey      │      │
│  │   SecondaryIndex>      │  │ • access_patterns       │  │ • parent: ParentLink   │      │
│  │ • ttl_attribute        │  │ • ttl_key_path          │  └────────────────────────┘      │
│  └────────────────────────┘  └─────────────────────────┘                                   │
│                                                                                              │
│  ┌────────────────────────┐  ┌─────────────────────────┐                                   │
│  │ struct KeyPath         │  │ struct Registry         │                                   │
│  │ • segments: Field/Index│  │ • collections: HashMap  │                                   │
│  │ • covers() / overlaps()│  │ • get() -> Routing err  │                                   │
│  └────────────────────────┘  └─────────────────────────┘                                   │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── STORAGE RECORD ─────────────────────────────────────────┐
│                                                                                              │
│   pk          sk            gsi1pk            gsi1sk           ttl      type    value       │
│   user|-|u1   user|-|u1     org|-|acme        alice            17e8     user    { ... }     │
│   user|-|u1   post|-|p1     -                 -                -        post    { ... }     │
│                                                                                              │
│   Root:  pk = sk = collection|-|id                                                          │
│   Child: pk = parent|-|parent_id, sk = child|-|id                                           │
│   Index attributes are written in pairs; a missing sort value drops both.                  │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── EXPRESSION LAYER ───────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────┐  ┌─────────────────────────┐  ┌────────────────────────┐      │
│  │ enum Condition         │  │ struct ExpressionContext│  │ struct UpdateSpec      │      │
│  │ • And / Or / Not       │  │ • names: #attrN / #word │  │ • Set / Remove / Add   │      │
│  │ • Field(KeyPathCond)   │  │ • values: :valueN       │  │ • Append / DeleteFrom  │      │
│  └────────────────────────┘  └─────────────────────────┘  └────────────────────────┘      │
│                                                                                              │
│  Condition ──compile──> String + placeholders      UpdateSpec ──derive──> DerivedChanges   │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────── RELATIONSHIPS ────────────────────────────────────────────┐
│                                                                                              │
│  Database ──resolves──> Registry ──yields──> Collection                                     │
│     │                                                                                       │
│     ├──insert/replace──> wrap() ──produces──> PutItemRequest                                │
│     │                                                                                       │
│     ├──update_by_id──> IndexUpdater ──derives──> DerivedChanges ──> UpdateItemRequest       │
│     │                                                                                       │
│     ├──find──> PatternMatcher ──selects──> IndexedPattern ──> QueryPlanner ──> Query       │
│     │                                                                                       │
│     ├──find_children / find_with_children──> SortBounds ──> QueryPlanner ──> Query         │
│     │                                                                                       │
│     ├──batch_*──> BatchReader / BatchWriter ──map leftovers──> descriptors                 │
│     │                                                                                       │
│     └──transact_*──> plan_transact_write / BatchReader::plan_transact                      │
│                                                                                              │
│  Backend responses ──unwrap()──> Document                                                  │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
