//! Runtime multiple dispatch.
//!
//! A [`VisitEngine`] routes a call to the one handler operation whose parameter
//! types match the tuple extracted from a data object: the object itself,
//! followed by the values of its tagged slots in position order.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use multivisit::{DispatchError, Slots, Subject, VisitEngine, VisitHandler, Visitable, VisitingMethods};
//!
//! struct Leaf { value: i64 }
//! struct Node { left: Arc<dyn Subject>, right: Arc<dyn Subject> }
//!
//! impl Visitable for Leaf {
//!     fn slots(slots: &mut Slots<Self>) {
//!         slots.stored(0, "value", |leaf| &leaf.value);
//!     }
//! }
//!
//! impl Visitable for Node {
//!     fn slots(slots: &mut Slots<Self>) {
//!         slots.stored(0, "left", |node| &node.left).stored(1, "right", |node| &node.right);
//!     }
//! }
//!
//! struct Summer;
//!
//! impl VisitHandler for Summer {
//!     fn visiting_methods(methods: &mut VisitingMethods<Self>) {
//!         methods
//!             .visit("sum")
//!             .method("sum_leaf", Self::sum_leaf)
//!             .method("sum_node", Self::sum_node);
//!     }
//! }
//! ```

pub mod config;
pub mod deferred;
pub mod engine;
pub mod errors;
pub mod extraction;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod plan_cache;
pub mod types;

pub use config::{CollisionPolicy, ConfigError, EngineConfig};
pub use deferred::{DeferredVisit, PendingVisit};
pub use engine::{EngineBuilder, VisitEngine};
pub use errors::{BoxError, DispatchError, EngineInitError, MalformedDataType};
pub use extraction::buffer::Arg;
pub use extraction::plan::ExtractionPlan;
pub use extraction::{Slot, SlotKind, Slots, Subject, Visitable};
pub use handlers::table::HandlerTable;
pub use handlers::{DEFAULT_VISIT, IntoOperation, VisitHandler, VisitingMethods};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use plan_cache::{PlanCache, PlanCacheStats};
pub use types::{DispatchKey, TypeInfo};
