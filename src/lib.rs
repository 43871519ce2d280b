mod controller;
mod draft;
mod events;
mod submit;
mod validation;


pub use formwork_derive::FormModel;

pub use controller::{
    FieldKey, FormController, FormError, FormId, FormResult, FormSnapshot, SubmitState,
};
pub use draft::{FormDraftStore, InMemoryDraftStore};
#[cfg(feature = "json-draft")]
pub use draft::{DraftFileError, JsonDraftStore};
pub use events::{FieldChangeEvent, FieldInput};
pub use submit::{SubmitError, SubmitOutcome, SubmitRejection};
pub use validation::{FieldLens, FieldValidator, FormModel, FormValidator, ValidationError};
