//! Orchestration entry point. Each transition lives in its own module as an
//! `impl RentalWorkflow` block: it loads fresh state, checks its guards,
//! commits the primary write and then runs the dependent updates through
//! [`SideEffects`], so a failing dependent never undoes the transition.

use crate::error::{StoreError, WorkflowError};
use crate::store::{DocStore, Filter};
use rental_shared::{DocStatus, Document, RuleViolation};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Item name of the rental line on generated invoices.
    pub rental_item: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rental_item: "Vehicle Rental".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct RentalWorkflow {
    pub(crate) store: DocStore,
    pub(crate) settings: Settings,
}

/// Result of a transition together with the warnings raised by its
/// dependent updates.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

impl<T> Outcome<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }
}

/// Collects failures of dependent updates.
#[derive(Debug, Default)]
pub(crate) struct SideEffects {
    warnings: Vec<String>,
}

impl SideEffects {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Keeps the value of a successful step; a failed step is logged and
    /// recorded as a warning.
    pub(crate) fn absorb<T>(&mut self, step: &str, result: Result<T, WorkflowError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(step, error = %err, "Dependent update failed");
                self.warnings.push(format!("{step}: {err}"));
                None
            }
        }
    }

    /// Takes over the warnings of a nested transition.
    pub(crate) fn carry(&mut self, warnings: Vec<String>) {
        self.warnings.extend(warnings);
    }

    pub(crate) fn finish<T>(self, value: T) -> Outcome<T> {
        Outcome {
            value,
            warnings: self.warnings,
        }
    }
}

impl RentalWorkflow {
    pub fn new(store: DocStore, settings: Settings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &DocStore {
        &self.store
    }

    /// Loads a document the caller referenced by name. A missing document is
    /// a rule violation rather than a store failure.
    pub(crate) async fn require<T: Document>(&self, name: &str) -> Result<T, WorkflowError> {
        match self.store.load::<T>(name).await {
            Ok(doc) => Ok(doc),
            Err(StoreError::NotFound { .. }) => Err(RuleViolation::UnknownDocument {
                doctype: T::DOCTYPE,
                name: name.to_string(),
            }
            .into()),
            Err(err) => Err(err.into()),
        }
    }

    /// Documents of `T` linked to `booking` that are not cancelled.
    pub(crate) async fn open_linked<T: Document>(&self, booking: &str) -> Result<Vec<T>, WorkflowError> {
        let filters = [
            Filter::eq("rental_booking", booking),
            Filter::ne("docstatus", DocStatus::Cancelled),
        ];
        Ok(self.store.list::<T>(&filters).await?)
    }
}
