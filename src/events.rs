use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::controller::{FieldKey, FormController, FormError, FormResult, read_lock, write_lock};
use crate::validation::{FieldLens, ValidationError};

/// Discriminated change payload: the input kind is carried explicitly
/// instead of duck-typing an environment event object. Checkbox payloads
/// are boolean by construction, which is the whole coercion policy.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldInput {
    Text(String),
    Checkbox(bool),
    Select(String),
    Number(Decimal),
}

impl FieldInput {
    pub fn kind(&self) -> &'static str {
        match self {
            FieldInput::Text(_) => "text",
            FieldInput::Checkbox(_) => "checkbox",
            FieldInput::Select(_) => "select",
            FieldInput::Number(_) => "number",
        }
    }
}

/// A change event aimed at one field of one form. Unknown keys are a
/// programmer error and fail loudly; no key is ever created by applying an
/// event.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldChangeEvent {
    pub key: FieldKey,
    pub input: FieldInput,
}

impl FieldChangeEvent {
    pub fn text(key: FieldKey, value: impl Into<String>) -> Self {
        Self {
            key,
            input: FieldInput::Text(value.into()),
        }
    }

    pub fn checkbox(key: FieldKey, checked: bool) -> Self {
        Self {
            key,
            input: FieldInput::Checkbox(checked),
        }
    }

    pub fn select(key: FieldKey, value: impl Into<String>) -> Self {
        Self {
            key,
            input: FieldInput::Select(value.into()),
        }
    }

    pub fn number(key: FieldKey, value: Decimal) -> Self {
        Self {
            key,
            input: FieldInput::Number(value),
        }
    }
}

pub(crate) type ChangeApplier<T, E> =
    Arc<dyn Fn(&FormController<T, E>, FieldInput) -> FormResult<()> + Send + Sync>;

impl<T, E> FormController<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
{
    /// Routes a change event to the field it names. Binding a field
    /// (`bind_text` and friends) is what makes its key known; events for
    /// anything else are rejected with `FormError::UnknownField`.
    pub fn apply_change(&self, event: FieldChangeEvent) -> FormResult<()> {
        let applier = read_lock(&self.change_appliers, "reading change appliers")?
            .get(&event.key)
            .cloned();
        match applier {
            Some(applier) => applier(self, event.input),
            None => Err(FormError::UnknownField(event.key)),
        }
    }

    pub fn bind_text<L>(&self, lens: L) -> FormResult<()>
    where
        L: FieldLens<T, Value = String>,
    {
        self.register_change_applier(
            lens.key(),
            Arc::new(move |controller, input| match input {
                FieldInput::Text(value) => controller.set(lens, value),
                other => Err(kind_mismatch(lens.key(), "text", &other)),
            }),
        )
    }

    pub fn bind_select<L>(&self, lens: L) -> FormResult<()>
    where
        L: FieldLens<T, Value = String>,
    {
        self.register_change_applier(
            lens.key(),
            Arc::new(move |controller, input| match input {
                FieldInput::Select(value) => controller.set(lens, value),
                other => Err(kind_mismatch(lens.key(), "select", &other)),
            }),
        )
    }

    pub fn bind_checkbox<L>(&self, lens: L) -> FormResult<()>
    where
        L: FieldLens<T, Value = bool>,
    {
        self.register_change_applier(
            lens.key(),
            Arc::new(move |controller, input| match input {
                FieldInput::Checkbox(checked) => controller.set(lens, checked),
                other => Err(kind_mismatch(lens.key(), "checkbox", &other)),
            }),
        )
    }

    /// Numeric fields accept a `Number` payload directly, or a `Text`
    /// payload parsed with `Decimal::from_str`; a parse failure is
    /// `FormError::InvalidNumber`, never a silent default.
    pub fn bind_number<L>(&self, lens: L) -> FormResult<()>
    where
        L: FieldLens<T, Value = Decimal>,
    {
        self.register_change_applier(
            lens.key(),
            Arc::new(move |controller, input| match input {
                FieldInput::Number(value) => controller.set(lens, value),
                FieldInput::Text(raw) => match Decimal::from_str(raw.trim()) {
                    Ok(value) => controller.set(lens, value),
                    Err(_) => Err(FormError::InvalidNumber {
                        field: lens.key(),
                        raw,
                    }),
                },
                other => Err(kind_mismatch(lens.key(), "number", &other)),
            }),
        )
    }

    fn register_change_applier(
        &self,
        key: FieldKey,
        applier: ChangeApplier<T, E>,
    ) -> FormResult<()> {
        let mut appliers = write_lock(&self.change_appliers, "registering change applier")?;
        appliers.insert(key, applier);
        Ok(())
    }
}

fn kind_mismatch(field: FieldKey, expected: &'static str, received: &FieldInput) -> FormError {
    FormError::InputKindMismatch {
        field,
        expected,
        received: received.kind(),
    }
}
