//! Execution identity scoping.
//!
//! A rollout establishes its [`Subject`] as a tokio task-local for the
//! duration of one run. Everything polled inside that scope (including
//! futures joined on the same task) sees it through [`current_subject`].
//! Work moved to another task with `tokio::spawn` does not.

use std::future::Future;

use fleetroll_core::Subject;

tokio::task_local! {
    static CURRENT_SUBJECT: Subject;
}

/// Run `fut` with `subject` as the current execution identity.
pub async fn with_subject<F: Future>(subject: Subject, fut: F) -> F::Output {
    CURRENT_SUBJECT.scope(subject, fut).await
}

/// The identity of the enclosing rollout, if any.
pub fn current_subject() -> Option<Subject> {
    CURRENT_SUBJECT.try_with(Subject::clone).ok()
}
