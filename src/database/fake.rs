//! In-process stand-in for the vector store used by unit tests

use std::cell::RefCell;
use std::collections::BTreeMap;

use super::{ChunkRecord, Collection, DistanceSpace, QueryInput, QueryMatch, VectorStore};
use crate::RagError;

#[derive(Debug, Default)]
pub(crate) struct FakeStore {
    collections: RefCell<BTreeMap<String, Vec<ChunkRecord>>>,
    pub(crate) spaces: RefCell<Vec<DistanceSpace>>,
    pub(crate) deleted: RefCell<Vec<String>>,
    pub(crate) queries: RefCell<Vec<String>>,
}

impl FakeStore {
    pub(crate) fn with_collection(name: &str, records: Vec<ChunkRecord>) -> Self {
        let store = Self::default();
        store
            .collections
            .borrow_mut()
            .insert(name.to_string(), records);
        store
    }

    pub(crate) fn records(&self, name: &str) -> Vec<ChunkRecord> {
        self.collections
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn handle(name: &str) -> Collection {
        Collection {
            id: format!("id-{name}"),
            name: name.to_string(),
        }
    }
}

impl VectorStore for FakeStore {
    fn list_collections(&self) -> Result<Vec<Collection>, RagError> {
        Ok(self
            .collections
            .borrow()
            .keys()
            .map(|name| Self::handle(name))
            .collect())
    }

    fn delete_collection(&self, name: &str) -> Result<(), RagError> {
        self.deleted.borrow_mut().push(name.to_string());
        self.collections
            .borrow_mut()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RagError::VectorStore(format!("Collection {name} does not exist")))
    }

    fn get_or_create_collection(
        &self,
        name: &str,
        space: DistanceSpace,
    ) -> Result<Collection, RagError> {
        self.spaces.borrow_mut().push(space);
        self.collections
            .borrow_mut()
            .entry(name.to_string())
            .or_default();
        Ok(Self::handle(name))
    }

    fn add(&self, collection: &Collection, record: &ChunkRecord) -> Result<(), RagError> {
        let mut collections = self.collections.borrow_mut();
        let records = collections
            .get_mut(&collection.name)
            .ok_or_else(|| RagError::VectorStore("Collection was deleted".to_string()))?;

        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    fn query(
        &self,
        collection: &Collection,
        input: QueryInput<'_>,
        n_results: usize,
    ) -> Result<Vec<QueryMatch>, RagError> {
        self.queries.borrow_mut().push(match input {
            QueryInput::Embedding(e) => format!("embedding:{}", e.len()),
            QueryInput::Text(t) => format!("text:{t}"),
        });

        Ok(self
            .records(&collection.name)
            .into_iter()
            .take(n_results)
            .map(|r| QueryMatch {
                id: r.id,
                document: r.document,
                source: Some(r.source),
                distance: Some(0.0),
            })
            .collect())
    }

    fn count(&self, collection: &Collection) -> Result<usize, RagError> {
        Ok(self.records(&collection.name).len())
    }
}
