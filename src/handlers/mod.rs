//! Handler registration.
//!
//! A handler type lists its visiting methods once, each tagged with the visit
//! it belongs to. An engine built for a visit name keeps only the methods
//! tagged with that name.
//!
//! ```rust,ignore
//! impl VisitHandler for ListVisitor {
//!     fn visiting_methods(methods: &mut VisitingMethods<Self>) {
//!         methods
//!             .visit("length")
//!             .method("length_empty", Self::length_empty)
//!             .method("length_cons", Self::length_cons);
//!         methods
//!             .visit("to_vec")
//!             .method("to_vec_empty", Self::to_vec_empty)
//!             .method("to_vec_cons", Self::to_vec_cons);
//!     }
//! }
//! ```
//!
//! A visiting method takes the handler, then a reference to each dispatch
//! argument, and returns `Result<R, E>`. Its parameter types, in order, form
//! the [`DispatchKey`] it answers to.

pub mod table;

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::errors::BoxError;
use crate::extraction::buffer::Arg;
use crate::types::{DispatchKey, TypeInfo};

/// Visit name used by [`VisitingMethods::method`]
pub const DEFAULT_VISIT: &str = "default";

/// A type whose methods can be selected by dispatch
pub trait VisitHandler: Sized + 'static {
    /// Registers the visiting methods of this handler type
    fn visiting_methods(methods: &mut VisitingMethods<Self>);
}

/// Why a type-erased operation could not produce a result
pub(crate) enum OperationError {
    /// The value at `position` is not of the declared parameter type
    Argument { position: usize, expected: TypeInfo },
    /// The visiting method itself failed
    Failed(BoxError),
}

pub(crate) type Invoke<H, R> = dyn Fn(&H, &[Arg<'_>]) -> Result<R, OperationError> + Send + Sync;

/// A function usable as a visiting method.
///
/// Implemented for `Fn(&H, &P0, .., &Pn) -> Result<R, E>` with one to eight
/// dispatch parameters. `Marker` only disambiguates the arities.
pub trait IntoOperation<H, R, Marker>: Send + Sync + 'static {
    /// Parameter types after the handler, in order
    fn parameter_types() -> Vec<TypeInfo>;

    #[doc(hidden)]
    fn into_invoke(self) -> Arc<Invoke<H, R>>;
}

fn argument<'v, T: Any>(args: &'v [Arg<'_>], position: usize) -> Result<&'v T, OperationError> {
    args.get(position)
        .and_then(|arg| arg.downcast_ref::<T>())
        .ok_or(OperationError::Argument {
            position,
            expected: TypeInfo::of::<T>(),
        })
}

macro_rules! impl_into_operation {
    ($($param:ident => $position:tt),+) => {
        impl<H, R, E, Func, $($param),+> IntoOperation<H, R, (E, $($param,)+)> for Func
        where
            H: 'static,
            R: 'static,
            E: Into<BoxError>,
            Func: Fn(&H, $(&$param),+) -> Result<R, E> + Send + Sync + 'static,
            $($param: Any,)+
        {
            fn parameter_types() -> Vec<TypeInfo> {
                vec![$(TypeInfo::of::<$param>()),+]
            }

            fn into_invoke(self) -> Arc<Invoke<H, R>> {
                Arc::new(move |handler: &H, args: &[Arg<'_>]| {
                    (self)(handler, $(argument::<$param>(args, $position)?),+)
                        .map_err(|err| OperationError::Failed(err.into()))
                })
            }
        }
    };
}

impl_into_operation!(A => 0);
impl_into_operation!(A => 0, B => 1);
impl_into_operation!(A => 0, B => 1, C => 2);
impl_into_operation!(A => 0, B => 1, C => 2, D => 3);
impl_into_operation!(A => 0, B => 1, C => 2, D => 3, F => 4);
impl_into_operation!(A => 0, B => 1, C => 2, D => 3, F => 4, G => 5);
impl_into_operation!(A => 0, B => 1, C => 2, D => 3, F => 4, G => 5, I => 6);
impl_into_operation!(A => 0, B => 1, C => 2, D => 3, F => 4, G => 5, I => 6, J => 7);

/// One registered visiting method, with its output type erased
pub(crate) struct MethodEntry {
    pub(crate) visit: String,
    pub(crate) name: &'static str,
    pub(crate) key: DispatchKey,
    pub(crate) output: TypeInfo,
    /// An `Arc<Invoke<H, R>>` for the handler type and `output`
    pub(crate) invoke: Box<dyn Any>,
}

/// Visiting methods of handler type `H`, in registration order
pub struct VisitingMethods<H> {
    entries: Vec<MethodEntry>,
    _handler: PhantomData<fn(&H)>,
}

impl<H: VisitHandler> VisitingMethods<H> {
    pub(crate) fn collect() -> Self {
        let mut methods = Self {
            entries: Vec::new(),
            _handler: PhantomData,
        };
        H::visiting_methods(&mut methods);
        methods
    }

    /// Registers methods under the visit named `visit`
    pub fn visit(&mut self, visit: impl Into<String>) -> VisitScope<'_, H> {
        VisitScope {
            methods: self,
            visit: visit.into(),
        }
    }

    /// Registers a method under [`DEFAULT_VISIT`]
    pub fn method<R, M, F>(&mut self, name: &'static str, operation: F) -> &mut Self
    where
        R: 'static,
        F: IntoOperation<H, R, M>,
    {
        self.register(DEFAULT_VISIT.to_string(), name, operation);
        self
    }

    fn register<R, M, F>(&mut self, visit: String, name: &'static str, operation: F)
    where
        R: 'static,
        F: IntoOperation<H, R, M>,
    {
        self.entries.push(MethodEntry {
            visit,
            name,
            key: DispatchKey::new(F::parameter_types()),
            output: TypeInfo::of::<R>(),
            invoke: Box::new(operation.into_invoke()),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<MethodEntry> {
        self.entries
    }
}

/// Registers methods under one visit name
pub struct VisitScope<'m, H> {
    methods: &'m mut VisitingMethods<H>,
    visit: String,
}

impl<H: VisitHandler> VisitScope<'_, H> {
    pub fn method<R, M, F>(&mut self, name: &'static str, operation: F) -> &mut Self
    where
        R: 'static,
        F: IntoOperation<H, R, M>,
    {
        self.methods.register(self.visit.clone(), name, operation);
        self
    }
}
