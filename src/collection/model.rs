//! Typed access to a collection through serde.

use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};

use super::Collection;
use crate::document::ID_FIELD;
use crate::query::Criteria;
use crate::{Document, StoreError};

/// Trait for types stored as documents.
///
/// Usually derived:
///
/// ```ignore
/// #[derive(Serialize, Deserialize, Clone, Model)]
/// #[model(collection = "tasks")]
/// struct Task {
///     id: String,
///     title: String,
/// }
/// ```
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Collection name used by [`Collections::collection`](super::Collections::collection).
    const COLLECTION: &'static str;

    /// The document id. An empty id asks the collection to generate one.
    fn id(&self) -> &str;
}

fn to_document<M: Model>(model: &M) -> Result<Document, StoreError> {
    let mut fields = Document::from_value(serde_json::to_value(model)?)?.into_fields();
    fields.remove(ID_FIELD);
    let mut document = Document::from(fields);
    if !model.id().is_empty() {
        document.set(ID_FIELD, model.id());
    }
    Ok(document)
}

fn from_document<M: Model>(document: Document) -> Result<M, StoreError> {
    Ok(serde_json::from_value(document.into_value())?)
}

/// Typed view of a [`Collection`] for one [`Model`] type.
///
/// The plain mutators block on [`Pending::wait`](crate::Pending::wait) and
/// must not be called from async code; use the `*_async` variants there.
pub struct ModelCollection<'a, M> {
    collection: &'a Collection,
    _marker: PhantomData<M>,
}

impl<'a, M: Model> ModelCollection<'a, M> {
    pub fn new(collection: &'a Collection) -> Self {
        Self {
            collection,
            _marker: PhantomData,
        }
    }

    /// Insert a new model. Fails if the id already exists.
    pub fn insert(&self, model: &M) -> Result<M, StoreError> {
        from_document(self.collection.insert(to_document(model)?).wait()?)
    }

    /// Merge the model's fields onto the stored document.
    pub fn update(&self, model: &M) -> Result<M, StoreError> {
        from_document(self.collection.update(to_document(model)?).wait()?)
    }

    pub fn upsert(&self, model: &M) -> Result<M, StoreError> {
        from_document(self.collection.upsert(to_document(model)?).wait()?)
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.collection.delete(id).wait()
    }

    pub async fn insert_async(&self, model: &M) -> Result<M, StoreError> {
        from_document(self.collection.insert(to_document(model)?).await?)
    }

    pub async fn update_async(&self, model: &M) -> Result<M, StoreError> {
        from_document(self.collection.update(to_document(model)?).await?)
    }

    pub async fn upsert_async(&self, model: &M) -> Result<M, StoreError> {
        from_document(self.collection.upsert(to_document(model)?).await?)
    }

    pub async fn delete_async(&self, id: &str) -> Result<(), StoreError> {
        self.collection.delete(id).await
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<M>, StoreError> {
        self.collection
            .find_by_id(id)?
            .map(from_document)
            .transpose()
    }

    pub fn find(&self, criteria: &Criteria) -> Result<Vec<M>, StoreError> {
        self.collection
            .find(criteria)?
            .into_iter()
            .map(from_document)
            .collect()
    }

    pub fn find_one(&self, criteria: &Criteria) -> Result<Option<M>, StoreError> {
        self.collection
            .find_one(criteria)?
            .map(from_document)
            .transpose()
    }

    pub fn count(&self, criteria: &Criteria) -> Result<usize, StoreError> {
        self.collection.count(criteria)
    }
}
