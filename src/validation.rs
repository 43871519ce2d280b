use std::collections::BTreeMap;
use std::sync::Arc;

use crate::controller::{FieldKey, FormController, FormResult, read_lock, write_lock};

pub trait ValidationError: Clone + Send + Sync + 'static {
    fn message(&self) -> String;
}

/// Typed access to one field of the model: a stable key for the error bag
/// plus a getter/setter pair. Implementations are zero-sized and `Copy`;
/// the `FormModel` derive generates one per named struct field.
pub trait FieldLens<T>: Copy + Send + Sync + 'static {
    type Value: Clone + PartialEq + Send + Sync + 'static;

    fn key(self) -> FieldKey;
    fn get<'a>(self, model: &'a T) -> &'a Self::Value;
    fn set(self, model: &mut T, value: Self::Value);
}

pub trait FormModel: Clone + Send + Sync + 'static {
    type Fields;

    fn fields() -> Self::Fields;

    fn field_names() -> &'static [&'static str] {
        &[]
    }
}

pub trait FieldValidator<T, L, E>: Send + Sync
where
    L: FieldLens<T>,
    E: ValidationError,
{
    fn validate(&self, model: &T, value: &L::Value) -> Result<(), E>;
}

impl<T, L, E, F> FieldValidator<T, L, E> for F
where
    L: FieldLens<T>,
    E: ValidationError,
    F: for<'a> Fn(&'a T, &'a L::Value) -> Result<(), E> + Send + Sync,
{
    fn validate(&self, model: &T, value: &L::Value) -> Result<(), E> {
        (self)(model, value)
    }
}

/// Whole-model validator: returns a partial mapping from field keys to
/// errors, empty means valid. This is the construction-time validator of
/// the submit lifecycle; it runs before any submit action.
pub trait FormValidator<T, E>: Send + Sync
where
    E: ValidationError,
{
    fn validate(&self, model: &T) -> BTreeMap<FieldKey, E>;
}

impl<T, E, F> FormValidator<T, E> for F
where
    E: ValidationError,
    F: Fn(&T) -> BTreeMap<FieldKey, E> + Send + Sync,
{
    fn validate(&self, model: &T) -> BTreeMap<FieldKey, E> {
        (self)(model)
    }
}

// Registered validators are erased to plain model-to-errors closures so the
// controller holds one flat list per kind, in registration order.
pub(crate) type FieldValidatorFn<T, E> = Arc<dyn Fn(&T) -> Option<(FieldKey, E)> + Send + Sync>;
pub(crate) type FormValidatorFn<T, E> = Arc<dyn Fn(&T) -> BTreeMap<FieldKey, E> + Send + Sync>;

impl<T, E> FormController<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
{
    pub fn register_field_validator<L, V>(&self, lens: L, validator: V) -> FormResult<()>
    where
        L: FieldLens<T>,
        V: FieldValidator<T, L, E> + 'static,
    {
        let key = lens.key();
        let erased: FieldValidatorFn<T, E> = Arc::new(move |model| {
            validator
                .validate(model, lens.get(model))
                .err()
                .map(|error| (key, error))
        });
        write_lock(&self.field_validators, "registering field validator")?.push(erased);
        Ok(())
    }

    pub fn register_form_validator<V>(&self, validator: V) -> FormResult<()>
    where
        V: FormValidator<T, E> + 'static,
    {
        let erased: FormValidatorFn<T, E> = Arc::new(move |model| validator.validate(model));
        write_lock(&self.form_validators, "registering form validator")?.push(erased);
        Ok(())
    }

    /// Writes one field value. The field's own error is dropped
    /// unconditionally, other fields' errors survive; no validator runs
    /// until the next submit. Dirtiness is recomputed against the initial
    /// model, so typing a value back to its original clears the flag.
    pub fn set<L>(&self, lens: L, value: L::Value) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        let mut state = write_lock(&self.state, "writing field value")?;
        lens.set(&mut state.model, value);
        if lens.get(&state.model) == lens.get(&state.initial_model) {
            state.dirty_fields.remove(&key);
        } else {
            state.dirty_fields.insert(key);
        }
        state.errors.remove(&key);
        Ok(())
    }

    /// Runs every registered validator against the current model and
    /// replaces the error bag with exactly what they produced. Per field the
    /// first reported error wins: field validators in registration order,
    /// then whole-form validators filling the remaining slots.
    pub fn validate_form(&self) -> FormResult<bool> {
        let model = read_lock(&self.state, "reading model for validation")?
            .model
            .clone();
        let field_validators =
            read_lock(&self.field_validators, "reading field validators")?.clone();
        let form_validators = read_lock(&self.form_validators, "reading form validators")?.clone();

        let mut found = BTreeMap::new();
        for validator in field_validators {
            if let Some((key, error)) = validator(&model) {
                found.entry(key).or_insert(error);
            }
        }
        for validator in form_validators {
            for (key, error) in validator(&model) {
                found.entry(key).or_insert(error);
            }
        }

        let mut state = write_lock(&self.state, "applying validation result")?;
        let is_valid = found.is_empty();
        state.errors = found;
        Ok(is_valid)
    }
}
