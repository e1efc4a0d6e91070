pub mod core;
pub mod schema;
pub mod query;
pub mod search;
pub mod client;
pub mod document;
pub mod diff;
pub mod cascade;
pub mod sync;

pub use crate::core::config::{SearchConfig, SearchType};
pub use crate::core::entity::{EntityInterface, EntityLookup, EntityRecord, TimeSeriesEntity, TimeSeriesRecord};
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::stats::SyncStatsSnapshot;
pub use crate::sync::SearchRepository;

/*
┌──────────────────────────────────── SYNC LAYER ─────────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                          struct SearchRepository                                    │    │
│  │  config: SearchConfig                 // connection + mapping sources               │    │
│  │  registry: IndexMappingRegistry       // entity type -> index / aliases             │    │
│  │  builders: DocumentBuilderRegistry    // entity -> search document                  │    │
│  │  delete_rules: DeleteRuleRegistry     // entity type -> delete cascades             │    │
│  │  client: OnceCell<Arc<dyn SearchClient>>  // built on first use                     │    │
│  │  stats: SyncStats                     // write / cascade counters                   │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  update_entity:  diff::plan_document_write ──► Patch(Script) | Rebuild(Document)           │
│                  cascade::UPDATE_CASCADES   ──► Vec<CascadeOp>  (each applied on its own)  │
│  delete_entity:  DeleteRuleRegistry::plan_delete      ──► Vec<CascadeOp>                   │
│  soft delete:    DeleteRuleRegistry::plan_soft_delete ──► Vec<CascadeOp>                   │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────── CLIENT LAYER ────────────────────────────────────────────┐
│                                                                                              │
│  trait SearchClient ◄── RestSearchClient<D: Dialect> ──► trait Transport                   │
│                              │                               └── HttpTransport (reqwest)   │
│                              ├── ElasticDialect    (painless scripts, ES query DSL)        │
│                              └── OpenSearchDialect                                          │
│                                                                                              │
│  Script { ops: Vec<ScriptOp>, params }   // backend-neutral partial update                 │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
