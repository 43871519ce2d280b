use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::controller::{FormController, FormError, FormId, FormResult, read_lock};
use crate::validation::ValidationError;

/// Persistence seam for unsubmitted form values, the equivalent of a SPA
/// stashing a half-filled form in local storage.
pub trait FormDraftStore<T>: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn save(&self, form_id: FormId, model: &T) -> Result<(), Self::Error>;
    fn load(&self, form_id: FormId) -> Result<Option<T>, Self::Error>;
    fn clear(&self, form_id: FormId) -> Result<(), Self::Error>;
}

pub struct InMemoryDraftStore<T> {
    drafts: Arc<Mutex<HashMap<FormId, T>>>,
}

impl<T> InMemoryDraftStore<T> {
    pub fn new() -> Self {
        Self {
            drafts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn drafts(&self) -> MutexGuard<'_, HashMap<FormId, T>> {
        match self.drafts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<T> Default for InMemoryDraftStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for InMemoryDraftStore<T> {
    fn clone(&self) -> Self {
        Self {
            drafts: self.drafts.clone(),
        }
    }
}

impl<T> FormDraftStore<T> for InMemoryDraftStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Error = Infallible;

    fn save(&self, form_id: FormId, model: &T) -> Result<(), Self::Error> {
        self.drafts().insert(form_id, model.clone());
        Ok(())
    }

    fn load(&self, form_id: FormId) -> Result<Option<T>, Self::Error> {
        Ok(self.drafts().get(&form_id).cloned())
    }

    fn clear(&self, form_id: FormId) -> Result<(), Self::Error> {
        self.drafts().remove(&form_id);
        Ok(())
    }
}

impl<T, E> FormController<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
{
    pub fn save_draft<S>(&self, store: &S) -> FormResult<()>
    where
        S: FormDraftStore<T>,
    {
        let state = read_lock(&self.state, "saving draft")?;
        store
            .save(state.id, &state.model)
            .map_err(|error| FormError::DraftSaveFailed(error.to_string()))
    }

    /// Restores a stashed draft if one exists. The values go through the
    /// same wholesale replacement as any other hydration, so the form
    /// reports dirty afterwards.
    pub fn load_draft<S>(&self, store: &S) -> FormResult<bool>
    where
        S: FormDraftStore<T>,
    {
        let form_id = self.form_id()?;
        let Some(draft) = store
            .load(form_id)
            .map_err(|error| FormError::DraftLoadFailed(error.to_string()))?
        else {
            return Ok(false);
        };
        self.set_model(draft)?;
        Ok(true)
    }

    pub fn clear_draft<S>(&self, store: &S) -> FormResult<()>
    where
        S: FormDraftStore<T>,
    {
        let form_id = self.form_id()?;
        store
            .clear(form_id)
            .map_err(|error| FormError::DraftClearFailed(error.to_string()))
    }
}

#[cfg(feature = "json-draft")]
pub use self::json::{DraftFileError, JsonDraftStore};

#[cfg(feature = "json-draft")]
mod json {
    use std::fmt::{Display, Formatter};
    use std::io::ErrorKind;
    use std::path::PathBuf;
    use std::{fs, io};

    use serde::Serialize;
    use serde::de::DeserializeOwned;

    use super::FormDraftStore;
    use crate::controller::FormId;

    #[derive(Debug)]
    pub enum DraftFileError {
        Io(io::Error),
        Serde(serde_json::Error),
    }

    impl Display for DraftFileError {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            match self {
                DraftFileError::Io(error) => write!(f, "draft file i/o failed: {error}"),
                DraftFileError::Serde(error) => write!(f, "draft serialization failed: {error}"),
            }
        }
    }

    impl std::error::Error for DraftFileError {}

    impl From<io::Error> for DraftFileError {
        fn from(error: io::Error) -> Self {
            DraftFileError::Io(error)
        }
    }

    impl From<serde_json::Error> for DraftFileError {
        fn from(error: serde_json::Error) -> Self {
            DraftFileError::Serde(error)
        }
    }

    /// One JSON file per form under a caller-chosen directory.
    #[derive(Clone, Debug)]
    pub struct JsonDraftStore {
        dir: PathBuf,
    }

    impl JsonDraftStore {
        pub fn new(dir: impl Into<PathBuf>) -> Self {
            Self { dir: dir.into() }
        }

        fn path(&self, form_id: FormId) -> PathBuf {
            self.dir.join(format!("form-{}.json", form_id.0))
        }
    }

    impl<T> FormDraftStore<T> for JsonDraftStore
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        type Error = DraftFileError;

        fn save(&self, form_id: FormId, model: &T) -> Result<(), Self::Error> {
            fs::create_dir_all(&self.dir)?;
            let body = serde_json::to_vec_pretty(model)?;
            fs::write(self.path(form_id), body)?;
            Ok(())
        }

        fn load(&self, form_id: FormId) -> Result<Option<T>, Self::Error> {
            let body = match fs::read(self.path(form_id)) {
                Ok(body) => body,
                Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
                Err(error) => return Err(error.into()),
            };
            Ok(Some(serde_json::from_slice(&body)?))
        }

        fn clear(&self, form_id: FormId) -> Result<(), Self::Error> {
            match fs::remove_file(self.path(form_id)) {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
                Err(error) => Err(error.into()),
            }
        }
    }
}
