use std::fmt::{Display, Formatter};
use std::future::Future;

use crate::controller::{
    FieldKey, FormController, FormError, FormResult, SubmitState, advance_submit_state, write_lock,
};
use crate::validation::ValidationError;

/// How a submit attempt ended when nothing went wrong locally. A validation
/// failure is not an error: it is expressed purely through the error bag.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitOutcome {
    /// Validators passed and the action resolved.
    Submitted,
    /// Validators produced errors; the action was never invoked.
    Invalid,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SubmitError<R> {
    /// Controller-level failure (poisoned lock, overlapping submit).
    Form(FormError),
    /// The submit action rejected. Propagated after local bookkeeping so the
    /// caller's own handling (toast, retry) still fires.
    Rejected(R),
}

impl<R> From<FormError> for SubmitError<R> {
    fn from(error: FormError) -> Self {
        SubmitError::Form(error)
    }
}

impl<R: Display> Display for SubmitError<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Form(error) => error.fmt(f),
            SubmitError::Rejected(rejection) => write!(f, "submit rejected: {rejection}"),
        }
    }
}

impl<R: std::error::Error> std::error::Error for SubmitError<R> {}

/// Caller-defined convention for surfacing a server-reported field error
/// out of a rejected submit (the remote equivalent of "email already
/// registered"). The controller merges the pair into the error bag before
/// propagating the rejection; returning `None` leaves the bag untouched.
pub trait SubmitRejection<E> {
    fn field_error(&self) -> Option<(FieldKey, E)> {
        None
    }
}

impl<T, E> FormController<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
{
    /// One submit attempt with a synchronous action. Every attempt starts
    /// with a clean error bag, then validates; on validation failure the
    /// action is never invoked and the form never reports loading. The
    /// action runs exactly once against a snapshot of the current model.
    pub fn submit<R>(
        &self,
        f: impl FnOnce(&T) -> Result<(), R>,
    ) -> Result<SubmitOutcome, SubmitError<R>>
    where
        R: SubmitRejection<E>,
    {
        let epoch = self.begin_submit()?;

        if !self.validate_form()? {
            self.settle(epoch, SubmitState::Failed, None)?;
            return Ok(SubmitOutcome::Invalid);
        }

        let model = self.begin_action(epoch)?;
        match f(&model) {
            Ok(()) => {
                self.settle(epoch, SubmitState::Succeeded, None)?;
                Ok(SubmitOutcome::Submitted)
            }
            Err(rejection) => {
                self.settle(epoch, SubmitState::Failed, rejection.field_error())?;
                Err(SubmitError::Rejected(rejection))
            }
        }
    }

    /// One submit attempt with an async action; the awaited action is the
    /// only suspension point of the lifecycle. `set` calls interleaving with
    /// the in-flight action are accepted: they touch values and errors while
    /// the completion only writes the submit state and possibly one field
    /// error.
    pub async fn submit_async<F, Fut, R>(&self, f: F) -> Result<SubmitOutcome, SubmitError<R>>
    where
        F: FnOnce(&T) -> Fut,
        Fut: Future<Output = Result<(), R>>,
        R: SubmitRejection<E>,
    {
        let epoch = self.begin_submit()?;

        if !self.validate_form()? {
            self.settle(epoch, SubmitState::Failed, None)?;
            return Ok(SubmitOutcome::Invalid);
        }

        let model = self.begin_action(epoch)?;
        match f(&model).await {
            Ok(()) => {
                self.settle(epoch, SubmitState::Succeeded, None)?;
                Ok(SubmitOutcome::Submitted)
            }
            Err(rejection) => {
                self.settle(epoch, SubmitState::Failed, rejection.field_error())?;
                Err(SubmitError::Rejected(rejection))
            }
        }
    }

    /// Guards the whole attempt, not just the action window: a second submit
    /// arriving while the first is still validating is rejected too.
    fn begin_submit(&self) -> FormResult<u64> {
        let mut state = write_lock(&self.state, "preparing submit")?;
        if state.submit_state.attempt_in_flight() {
            return Err(FormError::AlreadySubmitting);
        }
        state.errors.clear();
        advance_submit_state(&mut state, SubmitState::Validating)?;
        state.submit_count = state.submit_count.saturating_add(1);
        Ok(state.epoch)
    }

    fn begin_action(&self, epoch: u64) -> FormResult<T> {
        let mut state = write_lock(&self.state, "moving submit state to submitting")?;
        if state.epoch != epoch {
            // A reset landed between validation and the action; the attempt
            // it interrupted is over.
            return Err(FormError::AlreadySubmitting);
        }
        advance_submit_state(&mut state, SubmitState::Submitting)?;
        Ok(state.model.clone())
    }

    fn settle(
        &self,
        epoch: u64,
        next: SubmitState,
        field_error: Option<(FieldKey, E)>,
    ) -> FormResult<()> {
        let mut state = write_lock(&self.state, "completing submit")?;
        if state.epoch != epoch {
            // Reset won; leave its Idle state and clean error bag alone.
            return Ok(());
        }
        advance_submit_state(&mut state, next)?;
        if let Some((key, error)) = field_error {
            state.errors.insert(key, error);
        }
        Ok(())
    }
}
