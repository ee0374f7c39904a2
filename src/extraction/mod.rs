//! Extraction model: how a data type exposes its dispatch arguments
//!
//! A dispatch subject declares its slots explicitly by implementing
//! [`Visitable`]. Each slot has a position, a member name and an accessor
//! returning either a value stored in the subject or a value computed from it.
//!
//! # Usage
//!
//! ```rust,ignore
//! struct Cons { head: String, tail: Arc<dyn Subject> }
//!
//! impl Visitable for Cons {
//!     fn slots(slots: &mut Slots<Self>) {
//!         slots
//!             .stored(0, "head", |cons| &cons.head)
//!             .computed(1, "tail", |cons| Arc::clone(&cons.tail));
//!     }
//! }
//! ```
//!
//! Computed accessors only ever receive the subject, so a computed slot cannot
//! take input arguments.

pub mod buffer;
pub mod plan;

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;

use crate::errors::{BoxError, MalformedDataType};
use crate::types::TypeInfo;
use plan::ExtractionPlan;

/// A data type that can be the subject of a dispatch.
///
/// The default implementation declares no slots; such a type dispatches on a
/// key containing only its own type.
pub trait Visitable: Sized + Send + Sync + 'static {
    /// Declares the tagged slots of this type
    fn slots(slots: &mut Slots<Self>) {
        let _ = slots;
    }
}

/// Object-safe view of a [`Visitable`], implemented for every visitable type.
///
/// Slots whose declared type is "any subject" hold an `Arc<dyn Subject>`.
pub trait Subject: Any + Send + Sync {
    /// Runtime type of this subject
    fn subject_type(&self) -> TypeInfo;

    fn as_any(&self) -> &dyn Any;

    /// Builds the extraction plan of this subject's type
    fn extraction_plan(&self) -> Result<ExtractionPlan, MalformedDataType>;
}

impl<T: Visitable> Subject for T {
    fn subject_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn extraction_plan(&self) -> Result<ExtractionPlan, MalformedDataType> {
        ExtractionPlan::build::<T>()
    }
}

impl fmt::Debug for dyn Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<subject {}>", self.subject_type())
    }
}

/// Whether a slot reads a stored value or computes one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Stored,
    Computed,
}

pub(crate) type StoredAccessor = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>;
pub(crate) type ComputedAccessor = Arc<dyn Fn(&dyn Any) -> Result<Box<dyn Any>, BoxError> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Accessor {
    Stored(StoredAccessor),
    Computed(ComputedAccessor),
}

fn stored_accessor<F>(read: F) -> StoredAccessor
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync + 'static,
{
    Arc::new(read)
}

fn computed_accessor<F>(compute: F) -> ComputedAccessor
where
    F: Fn(&dyn Any) -> Result<Box<dyn Any>, BoxError> + Send + Sync + 'static,
{
    Arc::new(compute)
}

/// Raised when an accessor is handed a subject of another type
#[derive(Debug, Error)]
#[error("subject is not a {expected}")]
pub(crate) struct SubjectMismatch {
    pub(crate) expected: &'static str,
}

/// One tagged, ordered member of a dispatch subject
#[derive(Clone)]
pub struct Slot {
    position: usize,
    name: &'static str,
    kind: SlotKind,
    value_type: TypeInfo,
    pub(crate) accessor: Accessor,
}

impl Slot {
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    /// Declared type of the value this slot contributes to the dispatch key
    pub fn value_type(&self) -> TypeInfo {
        self.value_type
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("position", &self.position)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("value_type", &self.value_type)
            .finish()
    }
}

/// Collects the slot declarations of `T`, in declaration order
pub struct Slots<T> {
    slots: Vec<Slot>,
    _subject: PhantomData<fn(&T)>,
}

impl<T: Visitable> Slots<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            _subject: PhantomData,
        }
    }

    /// Declares a stored slot: `accessor` borrows the value from the subject
    pub fn stored<V, F>(&mut self, position: usize, name: &'static str, accessor: F) -> &mut Self
    where
        V: Any,
        F: for<'a> Fn(&'a T) -> &'a V + Send + Sync + 'static,
    {
        let read = stored_accessor(move |subject| {
            subject
                .downcast_ref::<T>()
                .map(|subject| accessor(subject) as &dyn Any)
        });
        self.push(position, name, SlotKind::Stored, TypeInfo::of::<V>(), Accessor::Stored(read))
    }

    /// Declares a computed slot: `accessor` derives the value from the subject
    pub fn computed<V, F>(&mut self, position: usize, name: &'static str, accessor: F) -> &mut Self
    where
        V: Any,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        let compute = computed_accessor(move |subject| {
            let subject = downcast_subject::<T>(subject)?;
            Ok(Box::new(accessor(subject)) as Box<dyn Any>)
        });
        self.push(position, name, SlotKind::Computed, TypeInfo::of::<V>(), Accessor::Computed(compute))
    }

    /// Declares a computed slot whose accessor can fail.
    ///
    /// An error aborts the dispatch with
    /// [`DispatchError::ExtractionFailure`](crate::DispatchError::ExtractionFailure).
    pub fn try_computed<V, E, F>(&mut self, position: usize, name: &'static str, accessor: F) -> &mut Self
    where
        V: Any,
        E: Into<BoxError>,
        F: Fn(&T) -> Result<V, E> + Send + Sync + 'static,
    {
        let compute = computed_accessor(move |subject| {
            let subject = downcast_subject::<T>(subject)?;
            accessor(subject)
                .map(|value| Box::new(value) as Box<dyn Any>)
                .map_err(Into::into)
        });
        self.push(position, name, SlotKind::Computed, TypeInfo::of::<V>(), Accessor::Computed(compute))
    }

    fn push(
        &mut self,
        position: usize,
        name: &'static str,
        kind: SlotKind,
        value_type: TypeInfo,
        accessor: Accessor,
    ) -> &mut Self {
        self.slots.push(Slot {
            position,
            name,
            kind,
            value_type,
            accessor,
        });
        self
    }

    pub(crate) fn into_inner(self) -> Vec<Slot> {
        self.slots
    }
}

fn downcast_subject<T: Any>(subject: &dyn Any) -> Result<&T, BoxError> {
    subject.downcast_ref::<T>().ok_or_else(|| {
        Box::new(SubjectMismatch {
            expected: std::any::type_name::<T>(),
        }) as BoxError
    })
}
