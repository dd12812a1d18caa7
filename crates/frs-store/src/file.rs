//! File-tree repository: stores each entity as a JSON document.
//!
//! Layout inside a group's tree, for an entity of type `widget` with key
//! `["acme", "w1"]`:
//!
//! ```text
//! widget/acme/w1/entity.json              the entity
//! widget/acme/w1/@resources/<path>        resource content
//! widget/acme/w1/@metadata/<path>.json    resource metadata
//! ```
//!
//! Key components may not be blank, contain `/`, be `.`/`..`, or start
//! with `@` (reserved for the resource areas).

use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde_json::{Map, Value};

use frs_types::{
    lookup, normalize_resource_path, FileTree, Filter, Key, Paging, Resource, ResourceMetadata,
    Sorting,
};

use crate::error::{StoreError, StoreResult};
use crate::traits::{Entity, PropertyMap, Repository};

const ENTITY_FILE: &str = "entity.json";
const RESOURCES_DIR: &str = "@resources";
const METADATA_DIR: &str = "@metadata";
const METADATA_EXT: &str = ".json";

fn join(base: &str, rest: &str) -> String {
    if base.is_empty() {
        rest.to_string()
    } else {
        format!("{base}/{rest}")
    }
}

fn validate_component(key: &Key, component: &str) -> StoreResult<()> {
    let reason = if component.trim().is_empty() {
        "components must not be blank"
    } else if component.contains('/') {
        "components must not contain '/'"
    } else if component == "." || component == ".." {
        "components must not be '.' or '..'"
    } else if component.starts_with('@') {
        "components must not start with '@'"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidKey {
        key: key.clone(),
        reason: reason.into(),
    })
}

fn serialization(path: &str, err: serde_json::Error) -> StoreError {
    StoreError::Serialization {
        path: path.to_string(),
        reason: err.to_string(),
    }
}

/// Set a dotted property path inside a JSON document, creating intermediate
/// objects where the path does not exist yet.
fn set_path(document: &mut Value, path: &str, value: Value) -> Result<(), String> {
    if path.trim().is_empty() {
        return Err("property name must not be empty".into());
    }
    let mut current = document;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => {
                if last {
                    map.insert(segment.to_string(), value);
                    return Ok(());
                }
                map.entry(segment.to_string()).or_insert(Value::Null)
            }
            Value::Array(items) => {
                let slot = segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .ok_or_else(|| format!("no array element {segment:?}"))?;
                if last {
                    *slot = value;
                    return Ok(());
                }
                slot
            }
            _ => return Err(format!("cannot descend into {segment:?}")),
        };
    }
    Ok(())
}

/// [`Repository`] implementation over a [`FileTree`].
pub struct FileRepository<T> {
    root: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> FileRepository<T> {
    /// Repository rooted at the entity's type name.
    pub fn new() -> Self {
        Self::with_root(T::TYPE_NAME)
    }

    /// Repository rooted at a custom directory inside the group.
    pub fn with_root(root: impl Into<String>) -> Self {
        Self {
            root: root.into().trim_matches('/').to_string(),
            _entity: PhantomData,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    fn entity_dir(&self, key: &Key) -> StoreResult<String> {
        for component in key.components() {
            validate_component(key, component)?;
        }
        if key.is_empty() {
            return Ok(self.root.clone());
        }
        Ok(join(&self.root, &key.join("/")))
    }

    fn entity_file(&self, key: &Key) -> StoreResult<String> {
        let dir = self.entity_dir(key)?;
        if !key.is_addressable() {
            return Err(StoreError::InvalidKey {
                key: key.clone(),
                reason: "key does not address an entity".into(),
            });
        }
        Ok(join(&dir, ENTITY_FILE))
    }

    /// Content path, metadata path, and normalized resource path.
    fn resource_files(&self, key: &Key, path: &str) -> StoreResult<(String, String, String)> {
        let path = normalize_resource_path(path)?;
        let dir = self.entity_dir(key)?;
        Ok((
            join(&dir, &format!("{RESOURCES_DIR}/{path}")),
            join(&dir, &format!("{METADATA_DIR}/{path}{METADATA_EXT}")),
            path,
        ))
    }

    fn decode(path: &str, bytes: &[u8]) -> StoreResult<T> {
        serde_json::from_slice(bytes).map_err(|e| serialization(path, e))
    }

    fn to_document(entity: &T) -> StoreResult<Value> {
        serde_json::to_value(entity).map_err(|e| serialization(T::TYPE_NAME, e))
    }

    fn require(&self, tree: &FileTree, key: &Key) -> StoreResult<T> {
        let path = self.entity_file(key)?;
        let bytes = tree.get(&path).ok_or_else(|| StoreError::EntityNotFound {
            type_name: self.type_name().to_string(),
            key: key.clone(),
        })?;
        Self::decode(&path, bytes)
    }

    fn store(&self, tree: &mut FileTree, entity: &T) -> StoreResult<T> {
        let key = entity.key();
        let path = self.entity_file(&key)?;
        let bytes = serde_json::to_vec_pretty(entity).map_err(|e| serialization(&path, e))?;
        let stored = Self::decode(&path, &bytes)?;
        tree.insert(path, bytes);
        Ok(stored)
    }

    /// Every stored entity with its JSON document, in path order.
    fn documents(&self, tree: &FileTree) -> StoreResult<Vec<(T, Value)>> {
        let mut docs = Vec::new();
        for (path, bytes) in tree.list(&self.root) {
            let relative = path[self.root.len()..].trim_start_matches('/');
            let mut segments: Vec<&str> = relative.split('/').collect();
            if segments.pop() != Some(ENTITY_FILE) || segments.is_empty() {
                continue;
            }
            if segments.iter().any(|s| s.starts_with('@')) {
                continue;
            }
            let entity = Self::decode(path, bytes)?;
            let doc = Self::to_document(&entity)?;
            docs.push((entity, doc));
        }
        Ok(docs)
    }

    fn select(
        &self,
        tree: &FileTree,
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
    ) -> StoreResult<Vec<(T, Value)>> {
        let filter = Filter::parse(filter)?;
        let paging = Paging::parse(paging)?;
        let sorting = Sorting::parse(sorting)?;

        let mut docs: Vec<(T, Value)> = self
            .documents(tree)?
            .into_iter()
            .filter(|(_, doc)| filter.matches(doc))
            .collect();
        if let Some(sorting) = &sorting {
            docs.sort_by(|(_, a), (_, b)| sorting.compare(a, b));
        }
        Ok(match paging {
            Some(paging) => paging.apply(docs),
            None => docs,
        })
    }

    fn apply_property(&self, entity: &T, property: &str, value: Value) -> StoreResult<T> {
        let mut doc = Self::to_document(entity)?;
        set_path(&mut doc, property, value).map_err(|reason| StoreError::InvalidProperty {
            name: property.to_string(),
            reason,
        })?;
        let updated: T = serde_json::from_value(doc).map_err(|e| StoreError::InvalidProperty {
            name: property.to_string(),
            reason: e.to_string(),
        })?;
        let (from, to) = (entity.key(), updated.key());
        if from != to {
            return Err(StoreError::KeyChange { from, to });
        }
        Ok(updated)
    }

    /// Set `property` from wire text. A value parsed as JSON that the entity
    /// rejects is retried as the raw string, for properties with no current
    /// value to take the type from.
    fn assign(&self, entity: &T, property: &str, data: &str) -> StoreResult<T> {
        let value = self.new_value(property, data, entity)?;
        let as_text = !value.is_string();
        match self.apply_property(entity, property, value) {
            Err(StoreError::InvalidProperty { .. }) if as_text => {
                self.apply_property(entity, property, Value::String(data.to_string()))
            }
            result => result,
        }
    }

    fn read_metadata(path: &str, bytes: &[u8]) -> StoreResult<ResourceMetadata> {
        serde_json::from_slice(bytes).map_err(|e| serialization(path, e))
    }

    fn select_resources(
        &self,
        tree: &FileTree,
        key: &Key,
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
    ) -> StoreResult<Vec<ResourceMetadata>> {
        let filter = Filter::parse(filter)?;
        let paging = Paging::parse(paging)?;
        let sorting = Sorting::parse(sorting)?;

        self.require(tree, key)?;
        let meta_dir = join(&self.entity_dir(key)?, METADATA_DIR);
        let mut entries = Vec::new();
        for (path, bytes) in tree.list(&meta_dir) {
            let metadata = Self::read_metadata(path, bytes)?;
            let doc = serde_json::to_value(&metadata).map_err(|e| serialization(path, e))?;
            if filter.matches(&doc) {
                entries.push((metadata, doc));
            }
        }
        if let Some(sorting) = &sorting {
            entries.sort_by(|(_, a), (_, b)| sorting.compare(a, b));
        }
        let entries = match paging {
            Some(paging) => paging.apply(entries),
            None => entries,
        };
        Ok(entries.into_iter().map(|(metadata, _)| metadata).collect())
    }
}

impl<T: Entity> Default for FileRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for FileRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRepository")
            .field("root", &self.root)
            .finish()
    }
}

impl<T: Entity> Repository<T> for FileRepository<T> {
    fn exists(&self, tree: &FileTree, entity: &T) -> StoreResult<bool> {
        Ok(tree.contains(&self.entity_file(&entity.key())?))
    }

    fn write(&self, tree: &mut FileTree, entity: &T) -> StoreResult<T> {
        let stored = self.store(tree, entity)?;
        tracing::debug!(type_name = T::TYPE_NAME, key = %entity.key(), "entity written");
        Ok(stored)
    }

    fn read(&self, tree: &FileTree, key: &Key) -> StoreResult<T> {
        self.require(tree, key)
    }

    fn delete(&self, tree: &mut FileTree, key: &Key) -> StoreResult<T> {
        let entity = self.require(tree, key)?;
        let dir = self.entity_dir(key)?;
        tree.remove(&join(&dir, ENTITY_FILE));
        let resources = tree.remove_under(&join(&dir, RESOURCES_DIR));
        tree.remove_under(&join(&dir, METADATA_DIR));
        tracing::debug!(type_name = T::TYPE_NAME, %key, resources, "entity deleted");
        Ok(entity)
    }

    fn count(&self, tree: &FileTree, filter: Option<&str>, paging: Option<&str>) -> StoreResult<u64> {
        Ok(self.select(tree, filter, paging, None)?.len() as u64)
    }

    fn list(
        &self,
        tree: &FileTree,
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
    ) -> StoreResult<Vec<T>> {
        Ok(self
            .select(tree, filter, paging, sorting)?
            .into_iter()
            .map(|(entity, _)| entity)
            .collect())
    }

    fn new_value(&self, property: &str, data: &str, reference: &T) -> StoreResult<Value> {
        let doc = Self::to_document(reference)?;
        let parsed = serde_json::from_str::<Value>(data).ok();
        Ok(match (lookup(&doc, property), parsed) {
            (Some(Value::String(_)), Some(Value::String(text))) => Value::String(text),
            (Some(Value::String(_)), _) => Value::String(data.to_string()),
            (_, Some(value)) => value,
            (_, None) => Value::String(data.to_string()),
        })
    }

    fn set_property(&self, tree: &mut FileTree, key: &Key, property: &str, data: &str) -> StoreResult<T> {
        let entity = self.require(tree, key)?;
        let updated = self.assign(&entity, property, data)?;
        self.store(tree, &updated)
    }

    fn set_property_bulk(
        &self,
        tree: &mut FileTree,
        property: &str,
        data: &str,
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
    ) -> StoreResult<Vec<T>> {
        let selected = self.select(tree, filter, paging, sorting)?;
        let mut updated = Vec::with_capacity(selected.len());
        for (entity, _) in selected {
            let changed = self.assign(&entity, property, data)?;
            updated.push(self.store(tree, &changed)?);
        }
        Ok(updated)
    }

    fn get_property(&self, tree: &FileTree, key: &Key, property: &str) -> StoreResult<Value> {
        let doc = Self::to_document(&self.require(tree, key)?)?;
        lookup(&doc, property)
            .cloned()
            .ok_or_else(|| StoreError::PropertyNotFound {
                key: key.clone(),
                name: property.to_string(),
            })
    }

    fn properties(&self, tree: &FileTree, key: &Key, names: &[String]) -> StoreResult<PropertyMap> {
        let doc = Self::to_document(&self.require(tree, key)?)?;
        Ok(names
            .iter()
            .map(|name| (name.clone(), lookup(&doc, name).cloned().unwrap_or(Value::Null)))
            .collect())
    }

    fn properties_bulk(
        &self,
        tree: &FileTree,
        names: &[String],
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
    ) -> StoreResult<BTreeMap<String, PropertyMap>> {
        Ok(self
            .select(tree, filter, paging, sorting)?
            .into_iter()
            .map(|(entity, doc)| {
                let values = names
                    .iter()
                    .map(|name| (name.clone(), lookup(&doc, name).cloned().unwrap_or(Value::Null)))
                    .collect();
                (entity.key().to_string(), values)
            })
            .collect())
    }

    fn exists_resource(&self, tree: &FileTree, key: &Key, path: &str) -> StoreResult<bool> {
        let (content, _, _) = self.resource_files(key, path)?;
        Ok(tree.contains(&content))
    }

    fn set_resource(&self, tree: &mut FileTree, key: &Key, resource: &Resource) -> StoreResult<T> {
        let entity = self.require(tree, key)?;
        let (content, meta, path) = self.resource_files(key, resource.path())?;
        let metadata = ResourceMetadata {
            path,
            ..resource.metadata.clone()
        };
        let meta_bytes = serde_json::to_vec_pretty(&metadata).map_err(|e| serialization(&meta, e))?;
        tree.insert(content, resource.content.clone());
        tree.insert(meta, meta_bytes);
        tracing::debug!(type_name = T::TYPE_NAME, %key, path = %metadata.path, "resource written");
        Ok(entity)
    }

    fn get_resource(&self, tree: &FileTree, key: &Key, path: &str) -> StoreResult<Resource> {
        self.require(tree, key)?;
        let (content, meta, path) = self.resource_files(key, path)?;
        let data = tree.get(&content).ok_or_else(|| StoreError::ResourceNotFound {
            key: key.clone(),
            path: path.clone(),
        })?;
        let metadata = match tree.get(&meta) {
            Some(bytes) => Self::read_metadata(&meta, bytes)?,
            None => ResourceMetadata::new(path),
        };
        Ok(Resource {
            metadata,
            content: data.to_vec(),
        })
    }

    fn delete_resource(&self, tree: &mut FileTree, key: &Key, path: &str) -> StoreResult<T> {
        let entity = self.require(tree, key)?;
        let (content, meta, path) = self.resource_files(key, path)?;
        if tree.remove(&content).is_none() {
            return Err(StoreError::ResourceNotFound {
                key: key.clone(),
                path,
            });
        }
        tree.remove(&meta);
        tracing::debug!(type_name = T::TYPE_NAME, %key, %path, "resource deleted");
        Ok(entity)
    }

    fn count_resources(
        &self,
        tree: &FileTree,
        key: &Key,
        filter: Option<&str>,
        paging: Option<&str>,
    ) -> StoreResult<u64> {
        Ok(self.select_resources(tree, key, filter, paging, None)?.len() as u64)
    }

    fn list_resources(
        &self,
        tree: &FileTree,
        key: &Key,
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
    ) -> StoreResult<Vec<Resource>> {
        self.select_resources(tree, key, filter, paging, sorting)?
            .into_iter()
            .map(|metadata| {
                let (content, _, _) = self.resource_files(key, &metadata.path)?;
                let data = tree.get(&content).ok_or_else(|| StoreError::ResourceNotFound {
                    key: key.clone(),
                    path: metadata.path.clone(),
                })?;
                Ok(Resource {
                    content: data.to_vec(),
                    metadata,
                })
            })
            .collect()
    }

    fn location(&self, _tree: &FileTree, key: &Key) -> StoreResult<String> {
        self.entity_dir(key)
    }

    fn location_resources(&self, _tree: &FileTree, key: &Key, path: &str) -> StoreResult<String> {
        let (content, _, _) = self.resource_files(key, path)?;
        Ok(content)
    }
}
