use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::events::ChangeApplier;
use crate::validation::{FieldLens, FieldValidatorFn, FormValidatorFn, ValidationError};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(&'static str);

impl FieldKey {
    pub const fn new(value: &'static str) -> Self {
        Self(value)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Submit lifecycle of one attempt. `Succeeded` and `Failed` are the resting
/// states between attempts; only `Submitting` counts as "loading".
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitState {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

impl SubmitState {
    /// One attempt is active from `Validating` until its terminal state.
    pub(crate) fn attempt_in_flight(self) -> bool {
        matches!(self, SubmitState::Validating | SubmitState::Submitting)
    }

    fn accepts(self, next: SubmitState) -> bool {
        match (self, next) {
            (_, SubmitState::Idle) => true,
            (SubmitState::Idle | SubmitState::Succeeded | SubmitState::Failed, SubmitState::Validating) => true,
            (SubmitState::Validating, SubmitState::Submitting | SubmitState::Failed) => true,
            (SubmitState::Submitting, SubmitState::Succeeded | SubmitState::Failed) => true,
            _ => false,
        }
    }
}

/// Read-only view of the whole form at one instant: model, error bag (at
/// most one error per field), and submit bookkeeping.
#[derive(Clone, Debug)]
pub struct FormSnapshot<T, E> {
    pub model: T,
    pub errors: BTreeMap<FieldKey, E>,
    pub submit_state: SubmitState,
    pub submit_count: u32,
    pub is_dirty: bool,
    pub is_valid: bool,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FormError {
    StatePoisoned(&'static str),
    InvalidStateTransition { from: SubmitState, to: SubmitState },
    AlreadySubmitting,
    UnknownField(FieldKey),
    InputKindMismatch {
        field: FieldKey,
        expected: &'static str,
        received: &'static str,
    },
    InvalidNumber { field: FieldKey, raw: String },
    DraftLoadFailed(String),
    DraftSaveFailed(String),
    DraftClearFailed(String),
}

impl Display for FormError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormError::StatePoisoned(context) => {
                write!(f, "form state lock poisoned while {context}")
            }
            FormError::InvalidStateTransition { from, to } => {
                write!(f, "invalid submit state transition: {from:?} -> {to:?}")
            }
            FormError::AlreadySubmitting => f.write_str("form submit is already in progress"),
            FormError::UnknownField(key) => {
                write!(f, "no field named `{key}` is bound to this form")
            }
            FormError::InputKindMismatch {
                field,
                expected,
                received,
            } => write!(
                f,
                "field `{field}` expects {expected} input, received {received}"
            ),
            FormError::InvalidNumber { field, raw } => {
                write!(f, "field `{field}` cannot parse `{raw}` as a number")
            }
            FormError::DraftLoadFailed(error) => write!(f, "failed to load draft: {error}"),
            FormError::DraftSaveFailed(error) => write!(f, "failed to save draft: {error}"),
            FormError::DraftClearFailed(error) => write!(f, "failed to clear draft: {error}"),
        }
    }
}

impl std::error::Error for FormError {}

pub type FormResult<T> = Result<T, FormError>;

pub(crate) struct FormState<T, E> {
    pub(crate) id: FormId,
    pub(crate) initial_model: T,
    pub(crate) model: T,
    pub(crate) errors: BTreeMap<FieldKey, E>,
    pub(crate) dirty_fields: BTreeSet<FieldKey>,
    pub(crate) submit_state: SubmitState,
    pub(crate) submit_count: u32,
    // Bumped by reset; an in-flight submit completing against a stale epoch
    // must not write its terminal state.
    pub(crate) epoch: u64,
    // Set by wholesale model replacement (hydration); the per-field dirty
    // set cannot account for a swap it never saw.
    pub(crate) hydrated: bool,
}

#[derive(Clone)]
pub struct FormController<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
{
    pub(crate) state: Arc<RwLock<FormState<T, E>>>,
    pub(crate) field_validators: Arc<RwLock<Vec<FieldValidatorFn<T, E>>>>,
    pub(crate) form_validators: Arc<RwLock<Vec<FormValidatorFn<T, E>>>>,
    pub(crate) change_appliers: Arc<RwLock<BTreeMap<FieldKey, ChangeApplier<T, E>>>>,
}

impl<T, E> FormController<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
{
    /// The initial model is cloned and owned here; `reset_to_initial`
    /// restores from this copy, so later mutation of the caller's value
    /// cannot skew a reset.
    pub fn new(initial: T) -> Self {
        Self {
            state: Arc::new(RwLock::new(FormState {
                id: FormId::next(),
                initial_model: initial.clone(),
                model: initial,
                errors: BTreeMap::new(),
                dirty_fields: BTreeSet::new(),
                submit_state: SubmitState::Idle,
                submit_count: 0,
                epoch: 0,
                hydrated: false,
            })),
            field_validators: Arc::new(RwLock::new(Vec::new())),
            form_validators: Arc::new(RwLock::new(Vec::new())),
            change_appliers: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn form_id(&self) -> FormResult<FormId> {
        Ok(read_lock(&self.state, "reading form id")?.id)
    }

    pub fn submit_state(&self) -> FormResult<SubmitState> {
        Ok(read_lock(&self.state, "reading submit state")?.submit_state)
    }

    /// True strictly while the injected submit action is in flight.
    pub fn is_submitting(&self) -> FormResult<bool> {
        Ok(self.submit_state()? == SubmitState::Submitting)
    }

    /// Overwrites the error for one field, typically with a server-reported
    /// message surfaced after a failed remote call.
    pub fn set_field_error<L>(&self, lens: L, error: E) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let mut state = write_lock(&self.state, "setting field error")?;
        state.errors.insert(lens.key(), error);
        Ok(())
    }

    pub fn field_error<L>(&self, lens: L) -> FormResult<Option<E>>
    where
        L: FieldLens<T>,
    {
        Ok(read_lock(&self.state, "reading field error")?
            .errors
            .get(&lens.key())
            .cloned())
    }

    pub fn errors(&self) -> FormResult<BTreeMap<FieldKey, E>> {
        Ok(read_lock(&self.state, "reading error bag")?.errors.clone())
    }

    /// Empties the whole error bag. Values and submit state are untouched;
    /// calling this on an already-clean form is a no-op.
    pub fn clear_errors(&self) -> FormResult<()> {
        write_lock(&self.state, "clearing all field errors")?
            .errors
            .clear();
        Ok(())
    }

    pub fn clear_field_error<L>(&self, lens: L) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        write_lock(&self.state, "clearing field error")?
            .errors
            .remove(&lens.key());
        Ok(())
    }

    /// Full rollback: values back to the initial model, no errors, not
    /// loading. Wins over any submit still in flight (the epoch bump makes
    /// the late completion a no-op on submit state).
    pub fn reset_to_initial(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resetting form")?;
        state.model = state.initial_model.clone();
        state.errors.clear();
        state.dirty_fields.clear();
        state.submit_state = SubmitState::Idle;
        state.submit_count = 0;
        state.epoch += 1;
        state.hydrated = false;
        Ok(())
    }

    /// Wholesale model replacement, used to hydrate a form from persisted
    /// state. Errors and submit state are left alone. The form reports dirty
    /// afterwards regardless of what is registered on it; the per-field
    /// dirty set starts over, so later `set` calls track against the
    /// original initial model again.
    pub fn set_model(&self, next: T) -> FormResult<()> {
        let mut state = write_lock(&self.state, "replacing form model")?;
        state.model = next;
        state.dirty_fields.clear();
        state.hydrated = true;
        Ok(())
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot<T, E>> {
        let state = read_lock(&self.state, "creating form snapshot")?;
        Ok(FormSnapshot {
            model: state.model.clone(),
            errors: state.errors.clone(),
            submit_state: state.submit_state,
            submit_count: state.submit_count,
            is_dirty: state.hydrated || !state.dirty_fields.is_empty(),
            is_valid: state.errors.is_empty(),
        })
    }
}

pub(crate) fn advance_submit_state<T, E>(
    state: &mut FormState<T, E>,
    next: SubmitState,
) -> FormResult<()> {
    if !state.submit_state.accepts(next) {
        return Err(FormError::InvalidStateTransition {
            from: state.submit_state,
            to: next,
        });
    }
    state.submit_state = next;
    Ok(())
}

pub(crate) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(crate) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
