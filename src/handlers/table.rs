//! Type-keyed handler tables

use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use super::{Invoke, OperationError, VisitHandler, VisitingMethods};
use crate::config::CollisionPolicy;
use crate::errors::{DispatchError, EngineInitError};
use crate::extraction::buffer::Arg;
use crate::types::{DispatchKey, TypeInfo};

/// A visiting method resolved for one dispatch key
pub struct Operation<H, R> {
    name: &'static str,
    key: DispatchKey,
    invoke: Arc<Invoke<H, R>>,
}

impl<H, R> Operation<H, R> {
    /// Member name given at registration
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key(&self) -> &DispatchKey {
        &self.key
    }

    /// Calls the method with already extracted arguments
    pub fn invoke(&self, handler: &H, visit: &str, args: &[Arg<'_>]) -> Result<R, DispatchError> {
        (self.invoke)(handler, args).map_err(|err| match err {
            OperationError::Argument { position, expected } => DispatchError::ArgumentMismatch {
                method: self.name,
                position,
                expected: expected.name(),
            },
            OperationError::Failed(source) => DispatchError::HandlerInvocation {
                visit: visit.to_string(),
                method: self.name,
                source,
            },
        })
    }
}

impl<H, R> fmt::Debug for Operation<H, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish()
    }
}

/// Maps dispatch keys to the visiting methods of `H` for one visit name.
///
/// Built once, read-only afterwards.
pub struct HandlerTable<H, R> {
    handler: TypeInfo,
    visit: String,
    operations: FxHashMap<DispatchKey, Operation<H, R>>,
}

impl<H: VisitHandler, R: 'static> HandlerTable<H, R> {
    /// Collects the methods of `H` tagged with `visit`.
    ///
    /// Methods sharing a key are resolved by `policy`: with
    /// [`CollisionPolicy::LastWins`] the later registration replaces the
    /// earlier one.
    pub fn build(visit: &str, policy: CollisionPolicy) -> Result<Self, EngineInitError> {
        let handler = TypeInfo::of::<H>();
        let expected = TypeInfo::of::<R>();
        let mut operations: FxHashMap<DispatchKey, Operation<H, R>> = FxHashMap::default();

        let entries = VisitingMethods::<H>::collect().into_entries();
        for entry in entries.into_iter().filter(|entry| entry.visit == visit) {
            let output_mismatch = || EngineInitError::OutputTypeMismatch {
                handler: handler.name(),
                visit: visit.to_string(),
                method: entry.name,
                expected: expected.name(),
                found: entry.output.name(),
            };

            if entry.output != expected {
                return Err(output_mismatch());
            }
            let invoke = entry
                .invoke
                .downcast::<Arc<Invoke<H, R>>>()
                .map_err(|_| output_mismatch())?;

            let operation = Operation {
                name: entry.name,
                key: entry.key.clone(),
                invoke: *invoke,
            };

            match operations.entry(entry.key) {
                Entry::Vacant(slot) => {
                    slot.insert(operation);
                }
                Entry::Occupied(mut slot) => match policy {
                    CollisionPolicy::LastWins => {
                        warn!(
                            "Visiting method `{}` of {} shadows `{}` for visit '{}' on {}",
                            operation.name,
                            handler,
                            slot.get().name,
                            visit,
                            slot.key()
                        );
                        slot.insert(operation);
                    }
                    CollisionPolicy::Reject => {
                        return Err(EngineInitError::AmbiguousHandler {
                            handler: handler.name(),
                            visit: visit.to_string(),
                            key: slot.key().clone(),
                            first: slot.get().name,
                            second: operation.name,
                        });
                    }
                },
            }
        }

        if operations.is_empty() {
            return Err(EngineInitError::NoHandlersFound {
                handler: handler.name(),
                visit: visit.to_string(),
            });
        }

        debug!(
            "Built handler table for {}#{} with {} visiting methods",
            handler,
            visit,
            operations.len()
        );

        Ok(Self {
            handler,
            visit: visit.to_string(),
            operations,
        })
    }
}

impl<H, R> HandlerTable<H, R> {
    pub fn lookup(&self, key: &DispatchKey) -> Option<&Operation<H, R>> {
        self.operations.get(key)
    }

    pub fn handler(&self) -> TypeInfo {
        self.handler
    }

    pub fn visit(&self) -> &str {
        &self.visit
    }

    pub fn keys(&self) -> impl Iterator<Item = &DispatchKey> {
        self.operations.keys()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl<H, R> fmt::Debug for HandlerTable<H, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("handler", &self.handler)
            .field("visit", &self.visit)
            .field("operations", &self.operations.len())
            .finish()
    }
}
