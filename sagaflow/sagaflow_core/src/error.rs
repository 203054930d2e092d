//! Failure attribution for tasks and flows.
//!
//! Errors compose the same way tasks do: a [`FlowError`] carries the
//! [`TaskError`]s of its children, and a child error may itself wrap the
//! `FlowError` of a nested flow, so the error tree mirrors the task tree.

use std::error::Error as StdError;
use std::fmt;

/// Boxed error returned by task bodies and threaded through the engine.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A failure attributed to one named task.
///
/// Holds the error from the forward action (`do_err`), the error from the
/// compensation (`undo_err`), or both when the failing task was itself
/// rolled back and that rollback failed too.
#[derive(Debug)]
pub struct TaskError {
    name: String,
    do_err: Option<BoxError>,
    undo_err: Option<BoxError>,
}

impl TaskError {
    /// Creates a task error for the task named `name`.
    pub fn new(name: impl Into<String>, do_err: Option<BoxError>, undo_err: Option<BoxError>) -> Self {
        TaskError {
            name: name.into(),
            do_err,
            undo_err,
        }
    }

    /// The name of the task the failure is attributed to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The error returned by the task's forward action, if any.
    pub fn do_err(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.do_err.as_deref()
    }

    /// The error returned by the task's compensation, if any.
    pub fn undo_err(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.undo_err.as_deref()
    }

    /// Consumes the error, returning its name and both error slots.
    pub fn into_parts(self) -> (String, Option<BoxError>, Option<BoxError>) {
        (self.name, self.do_err, self.undo_err)
    }
}

/// Returns the embedded error as a `FlowError` when it carries the same
/// name, which is the nested-flow-as-task case: rendering then delegates
/// to the flow error instead of double-wrapping it.
fn matching_flow_error<'a>(err: &'a BoxError, name: &str) -> Option<&'a FlowError> {
    err.downcast_ref::<FlowError>().filter(|fe| fe.name() == name)
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.do_err, &self.undo_err) {
            (None, None) => write!(f, "TaskError(name={})", self.name),
            (Some(do_err), None) => match matching_flow_error(do_err, &self.name) {
                Some(flow_err) => fmt::Display::fmt(flow_err, f),
                None => write!(f, "TaskError(name={}, doerr={})", self.name, do_err),
            },
            (None, Some(undo_err)) => match matching_flow_error(undo_err, &self.name) {
                Some(flow_err) => fmt::Display::fmt(flow_err, f),
                None => write!(f, "TaskError(name={}, undoerr={})", self.name, undo_err),
            },
            (Some(do_err), Some(undo_err)) => write!(
                f,
                "TaskError(name={}, doerr={}, undoerr={})",
                self.name, do_err, undo_err
            ),
        }
    }
}

impl StdError for TaskError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match (&self.do_err, &self.undo_err) {
            (Some(err), _) => Some(err.as_ref()),
            (None, Some(err)) => Some(err.as_ref()),
            (None, None) => None,
        }
    }
}

/// An ordered collection of [`TaskError`]s.
///
/// Insertion order is significant: it is the order compensations were
/// attempted (reverse of execution order for an ordered flow, completion
/// order for an unordered one).
#[derive(Debug, Default)]
pub struct TaskErrors(Vec<TaskError>);

impl TaskErrors {
    /// Creates an empty collection.
    pub fn new() -> Self {
        TaskErrors(Vec::new())
    }

    /// Constructs a [`TaskError`] from the arguments and appends it.
    pub fn append(
        &mut self,
        name: impl Into<String>,
        do_err: Option<BoxError>,
        undo_err: Option<BoxError>,
    ) {
        self.push(TaskError::new(name, do_err, undo_err));
    }

    /// Appends an already-built task error.
    pub fn push(&mut self, err: TaskError) {
        self.0.push(err);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TaskError> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[TaskError] {
        &self.0
    }
}

impl From<Vec<TaskError>> for TaskErrors {
    fn from(errs: Vec<TaskError>) -> Self {
        TaskErrors(errs)
    }
}

impl From<TaskError> for TaskErrors {
    fn from(err: TaskError) -> Self {
        TaskErrors(vec![err])
    }
}

impl IntoIterator for TaskErrors {
    type Item = TaskError;
    type IntoIter = std::vec::IntoIter<TaskError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TaskErrors {
    type Item = &'a TaskError;
    type IntoIter = std::slice::Iter<'a, TaskError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for TaskErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            fmt::Display::fmt(err, f)?;
        }
        Ok(())
    }
}

impl StdError for TaskErrors {}

/// A failure of a named flow, carrying the task errors of its children.
///
/// A flow error with no task errors still identifies that the named flow
/// failed, though the engines never produce that form themselves.
#[derive(Debug)]
pub struct FlowError {
    name: String,
    errors: TaskErrors,
}

impl FlowError {
    /// Creates a flow error for the flow named `name`.
    pub fn new(name: impl Into<String>, errors: TaskErrors) -> Self {
        FlowError {
            name: name.into(),
            errors,
        }
    }

    /// The name of the flow that failed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The task errors produced by the flow's children.
    pub fn errors(&self) -> &TaskErrors {
        &self.errors
    }

    /// Consumes the error, returning its name and task errors.
    pub fn into_parts(self) -> (String, TaskErrors) {
        (self.name, self.errors)
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "FlowError(name={})", self.name)
        } else {
            write!(f, "FlowError(name={}, errs=[{}])", self.name, self.errors)
        }
    }
}

impl StdError for FlowError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        if self.errors.is_empty() {
            None
        } else {
            Some(&self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(msg: &str) -> BoxError {
        msg.into()
    }

    #[test]
    fn test_task_error_display_variants() {
        let err = TaskError::new("t1", None, None);
        assert_eq!(err.to_string(), "TaskError(name=t1)");

        let err = TaskError::new("t1", Some(boxed("boom")), None);
        assert_eq!(err.to_string(), "TaskError(name=t1, doerr=boom)");

        let err = TaskError::new("t1", None, Some(boxed("rollback boom")));
        assert_eq!(err.to_string(), "TaskError(name=t1, undoerr=rollback boom)");

        let err = TaskError::new("t1", Some(boxed("boom")), Some(boxed("worse")));
        assert_eq!(
            err.to_string(),
            "TaskError(name=t1, doerr=boom, undoerr=worse)"
        );
    }

    #[test]
    fn test_flow_error_display() {
        let err = FlowError::new("f1", TaskErrors::new());
        assert_eq!(err.to_string(), "FlowError(name=f1)");

        let mut errs = TaskErrors::new();
        errs.append("t1", Some(boxed("a")), None);
        errs.append("t2", None, Some(boxed("b")));
        let err = FlowError::new("f1", errs);
        assert_eq!(
            err.to_string(),
            "FlowError(name=f1, errs=[TaskError(name=t1, doerr=a), TaskError(name=t2, undoerr=b)])"
        );
    }

    #[test]
    fn test_nested_flow_error_delegates_rendering() {
        // A task error wrapping the flow error of a nested flow with the
        // same name renders as the flow error alone.
        let inner = FlowError::new(
            "inner",
            TaskError::new("t1", Some(boxed("boom")), None).into(),
        );
        let err = TaskError::new("inner", Some(Box::new(inner)), None);
        assert_eq!(
            err.to_string(),
            "FlowError(name=inner, errs=[TaskError(name=t1, doerr=boom)])"
        );

        // A different name keeps the TaskError wrapper.
        let other = FlowError::new("other", TaskErrors::new());
        let err = TaskError::new("outer", Some(Box::new(other)), None);
        assert_eq!(
            err.to_string(),
            "TaskError(name=outer, doerr=FlowError(name=other))"
        );
    }

    #[test]
    fn test_undo_err_delegates_rendering() {
        let inner = FlowError::new(
            "inner",
            TaskError::new("t1", None, Some(boxed("boom"))).into(),
        );
        let err = TaskError::new("inner", None, Some(Box::new(inner)));
        assert_eq!(
            err.to_string(),
            "FlowError(name=inner, errs=[TaskError(name=t1, undoerr=boom)])"
        );
    }

    #[test]
    fn test_source_chain() {
        let mut errs = TaskErrors::new();
        errs.append("t1", Some(boxed("boom")), None);
        let err = FlowError::new("f1", errs);

        let task_errors = err.source().expect("flow error has a source");
        let task_errors = task_errors
            .downcast_ref::<TaskErrors>()
            .expect("source is the task error collection");
        assert_eq!(task_errors.len(), 1);
        assert_eq!(task_errors.as_slice()[0].name(), "t1");

        let empty = FlowError::new("f1", TaskErrors::new());
        assert!(empty.source().is_none());
    }

    #[test]
    fn test_task_error_source_prefers_do_err() {
        let err = TaskError::new("t1", Some(boxed("do")), Some(boxed("undo")));
        assert_eq!(err.source().expect("has source").to_string(), "do");

        let err = TaskError::new("t1", None, Some(boxed("undo")));
        assert_eq!(err.source().expect("has source").to_string(), "undo");
    }

    #[test]
    fn test_into_parts() {
        let err = TaskError::new("t1", Some(boxed("boom")), None);
        let (name, do_err, undo_err) = err.into_parts();
        assert_eq!(name, "t1");
        assert_eq!(do_err.expect("do error").to_string(), "boom");
        assert!(undo_err.is_none());

        let err = FlowError::new(
            "f1",
            TaskError::new("t1", Some(boxed("boom")), None).into(),
        );
        let (name, errors) = err.into_parts();
        assert_eq!(name, "f1");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.as_slice()[0].name(), "t1");
    }
}
