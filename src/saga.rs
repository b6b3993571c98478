//! Multi-key writes with compensation
//!
//! Stores that keep more than one key per logical write (a tag and its name
//! mirror, both directions of an id mapping, an article and its index
//! entries) run the writes as a `Saga`: an ordered list of steps, each with
//! an undo action. When a step fails, the undo actions of the steps that
//! already succeeded run in reverse order.
//!
//! - every undo succeeds: the original error is returned unchanged
//! - an undo fails: `FolioError::PartialWrite` carries both errors and the
//!   stores may be inconsistent until repaired offline
//!
//! ```text
//! Saga::new("add tag")
//!     .step("put id key", put_id, delete_id)
//!     .step("put name key", put_name, delete_name)
//!     .run()?;
//! ```

use tracing::{debug, warn};

use crate::error::{FolioError, Result};

type Action<'a> = Box<dyn FnOnce() -> Result<()> + 'a>;

struct Step<'a> {
    label: String,
    action: Action<'a>,
    undo: Action<'a>,
}

/// An ordered list of sub-writes with compensating actions
pub struct Saga<'a> {
    operation: String,
    steps: Vec<Step<'a>>,
}

impl<'a> Saga<'a> {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step; `undo` runs only if a later step fails
    pub fn step<A, U>(mut self, label: impl Into<String>, action: A, undo: U) -> Self
    where
        A: FnOnce() -> Result<()> + 'a,
        U: FnOnce() -> Result<()> + 'a,
    {
        self.steps.push(Step {
            label: label.into(),
            action: Box::new(action),
            undo: Box::new(undo),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order, compensating on the first failure
    pub fn run(self) -> Result<()> {
        let mut completed: Vec<(String, Action<'a>)> = Vec::with_capacity(self.steps.len());

        for step in self.steps {
            match (step.action)() {
                Ok(()) => completed.push((step.label, step.undo)),
                Err(err) => {
                    debug!(
                        operation = %self.operation,
                        step = %step.label,
                        error = %err,
                        undo_steps = completed.len(),
                        "saga step failed, rolling back"
                    );
                    return Err(compensate(self.operation, err, completed));
                }
            }
        }

        Ok(())
    }
}

/// Undo completed steps newest first; the first undo failure is reported
fn compensate(operation: String, source: FolioError, completed: Vec<(String, Action<'_>)>) -> FolioError {
    let mut compensation: Option<FolioError> = None;

    for (label, undo) in completed.into_iter().rev() {
        if let Err(err) = undo() {
            warn!(operation = %operation, step = %label, error = %err, "compensation failed");
            compensation.get_or_insert(err);
        }
    }

    match compensation {
        None => source,
        Some(compensation) => FolioError::PartialWrite {
            operation,
            source: Box::new(source),
            compensation: Box::new(compensation),
        },
    }
}
