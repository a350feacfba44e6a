//! The unit of work flowing through the clinic.
//!
//! A [`Patient`] is owned by exactly one stage at a time: the intake generator that
//! creates it, the stage queue holding it, or the worker processing it. Ownership moves
//! by value at every enqueue and dequeue, so two stages can never hold the same patient.

use std::fmt;

use crossbeam_channel::{Receiver, Sender, bounded};

/// Patient identifier, assigned at creation (1..=N).
pub type PatientId = u32;

/// Zero-based index of a specialist category.
///
/// Displayed one-based (`C1..CK`) to match the way categories are numbered for users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryId(usize);

impl CategoryId {
    /// Create a category id from a zero-based index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The zero-based index into the specialist pools.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0 + 1)
    }
}

/// Sending half of a per-patient completion signal.
///
/// Fired once by the specialist that treats the patient. Dropping it unfired tells the
/// waiting generator that the patient will never be treated.
#[derive(Debug)]
pub struct DischargeSignal(Sender<()>);

/// Receiving half of a per-patient completion signal, held by the intake generator.
#[derive(Debug)]
pub struct DischargeReceipt(Receiver<()>);

impl DischargeReceipt {
    /// Block until the patient is discharged.
    ///
    /// Returns `true` if a specialist signalled completion and `false` if the patient was
    /// dropped without treatment.
    #[must_use]
    pub fn wait(self) -> bool {
        self.0.recv().is_ok()
    }
}

/// A single patient.
#[derive(Debug)]
pub struct Patient {
    id: PatientId,
    category: Option<CategoryId>,
    discharge: Option<DischargeSignal>,
}

impl Patient {
    /// Create an unassigned patient without a completion signal.
    #[must_use]
    pub fn new(id: PatientId) -> Self {
        Self { id, category: None, discharge: None }
    }

    /// Create an unassigned patient whose discharge can be awaited through the returned
    /// receipt.
    #[must_use]
    pub fn with_discharge(id: PatientId) -> (Self, DischargeReceipt) {
        let (tx, rx) = bounded(1);
        (Self { id, category: None, discharge: Some(DischargeSignal(tx)) }, DischargeReceipt(rx))
    }

    /// The patient's identifier.
    #[must_use]
    pub fn id(&self) -> PatientId {
        self.id
    }

    /// The routing category, or `None` while the patient is unassigned.
    #[must_use]
    pub fn category(&self) -> Option<CategoryId> {
        self.category
    }

    /// Assign the routing category.
    ///
    /// # Panics
    ///
    /// Panics if the patient already has a category; assignment happens exactly once.
    pub fn assign(&mut self, category: CategoryId) {
        assert!(
            self.category.is_none(),
            "patient P{} already assigned to {:?}",
            self.id,
            self.category
        );
        self.category = Some(category);
    }

    /// Finish with the patient, firing its completion signal if it has one.
    ///
    /// Consumes the patient: nothing may touch it after stage 2.
    pub fn discharge(self) -> PatientId {
        if let Some(DischargeSignal(tx)) = self.discharge {
            // The generator may have stopped listening; treatment still happened.
            let _ = tx.send(());
        }
        self.id
    }
}

impl fmt::Display for Patient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.id)
    }
}
