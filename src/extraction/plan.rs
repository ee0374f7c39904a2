//! Extraction plans: the validated, ordered slots of one data type

use std::fmt;
use std::iter;

use tracing::debug;

use super::buffer::{Arg, ExtractionBuffer};
use super::{Accessor, Slot, Slots, Subject, SubjectMismatch, Visitable};
use crate::errors::{DispatchError, MalformedDataType};
use crate::types::{DispatchKey, TypeInfo};

/// Ordered slots of one concrete data type, plus its precomputed dispatch key.
///
/// A plan is a pure function of the type's slot declarations. It is immutable
/// once built and is shared through the [`PlanCache`](crate::PlanCache).
pub struct ExtractionPlan {
    subject: TypeInfo,
    slots: Box<[Slot]>,
    key: DispatchKey,
}

impl ExtractionPlan {
    /// Builds the plan of `T`, validating slot positions
    pub fn build<T: Visitable>() -> Result<Self, MalformedDataType> {
        let mut slots = Slots::<T>::new();
        T::slots(&mut slots);
        Self::from_slots(TypeInfo::of::<T>(), slots.into_inner())
    }

    pub(crate) fn from_slots(subject: TypeInfo, mut slots: Vec<Slot>) -> Result<Self, MalformedDataType> {
        // Stable: slots sharing a position stay in declaration order
        slots.sort_by_key(Slot::position);
        validate_positions(subject, &slots)?;

        let key = DispatchKey::new(
            iter::once(subject)
                .chain(slots.iter().map(Slot::value_type))
                .collect(),
        );

        debug!("Built extraction plan for {}: {}", subject, key);

        Ok(Self {
            subject,
            slots: slots.into_boxed_slice(),
            key,
        })
    }

    pub fn subject(&self) -> TypeInfo {
        self.subject
    }

    /// Slots in position order
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// `(subject type, slot 0 type, .., slot n-1 type)`
    pub fn key(&self) -> &DispatchKey {
        &self.key
    }

    /// Number of values extracted per dispatch: the subject plus one per slot
    pub fn value_count(&self) -> usize {
        self.slots.len() + 1
    }

    /// Extracts the subject and its slot values, in order, into `buffer`
    pub(crate) fn extract_into<'a>(
        &self,
        subject: &'a dyn Subject,
        buffer: &mut ExtractionBuffer<'a>,
    ) -> Result<(), DispatchError> {
        let any = subject.as_any();
        buffer.push(Arg::Borrowed(any));

        for slot in self.slots.iter() {
            let value = match &slot.accessor {
                Accessor::Stored(read) => read(any).map(Arg::Borrowed).ok_or_else(|| {
                    self.extraction_failure(slot, Box::new(SubjectMismatch { expected: self.subject.name() }))
                })?,
                Accessor::Computed(compute) => compute(any)
                    .map(Arg::Owned)
                    .map_err(|source| self.extraction_failure(slot, source))?,
            };
            buffer.push(value);
        }

        Ok(())
    }

    /// Extracts into a freshly allocated vector, outside the buffer pool
    pub fn extract<'a>(&self, subject: &'a dyn Subject) -> Result<Vec<Arg<'a>>, DispatchError> {
        let mut buffer = ExtractionBuffer::unpooled(self.value_count());
        self.extract_into(subject, &mut buffer)?;
        Ok(buffer.into_values())
    }

    fn extraction_failure(&self, slot: &Slot, source: crate::errors::BoxError) -> DispatchError {
        DispatchError::ExtractionFailure {
            subject: self.subject.name(),
            slot: slot.name(),
            source,
        }
    }
}

impl fmt::Debug for ExtractionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionPlan")
            .field("subject", &self.subject)
            .field("slots", &self.slots)
            .finish()
    }
}

/// Checks that sorted positions are exactly `0..slots.len()`
fn validate_positions(subject: TypeInfo, slots: &[Slot]) -> Result<(), MalformedDataType> {
    for (expected, slot) in slots.iter().enumerate() {
        if slot.position() == expected {
            continue;
        }

        // Sorted, so a position behind its index repeats the previous one
        if let Some(previous) = expected.checked_sub(1).map(|i| &slots[i]) {
            if previous.position() == slot.position() {
                return Err(MalformedDataType::DuplicatePosition {
                    subject: subject.name(),
                    position: slot.position(),
                    first: previous.name(),
                    second: slot.name(),
                });
            }
        }

        return Err(MalformedDataType::NonContiguousPosition {
            subject: subject.name(),
            expected,
            found: slot.position(),
            slot: slot.name(),
        });
    }

    Ok(())
}
