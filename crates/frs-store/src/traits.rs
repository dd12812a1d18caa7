use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use frs_types::{FileTree, Key, Paging, Resource};

use crate::error::StoreResult;

/// Key extraction for stored entity types.
///
/// The repository never inspects an entity's fields except through
/// [`Entity::key`] and its serde representation.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Name of the entity type; also the top-level directory in a group.
    const TYPE_NAME: &'static str;

    /// Derive the key from the entity's own content.
    fn key(&self) -> Key;
}

/// Property values keyed by property name.
pub type PropertyMap = BTreeMap<String, Value>;

/// Persistence of entities, properties, and resources inside a file tree.
///
/// Read operations take `&FileTree` and write operations `&mut FileTree`,
/// so a read snapshot can never be mutated through this trait. Filter,
/// paging, and sorting arrive as raw expression strings; `None` or blank
/// means no constraint. Implementations must be stateless with respect to
/// the tree: everything they know comes from the tree they are handed.
pub trait Repository<T: Entity>: Send + Sync {
    /// Name used in messages and locations.
    fn type_name(&self) -> &str {
        T::TYPE_NAME
    }

    // ---- Entities ----

    /// Whether an entity with the same key as `entity` is stored.
    fn exists(&self, tree: &FileTree, entity: &T) -> StoreResult<bool>;

    /// Store `entity` under its own key, replacing any previous content.
    /// Returns the entity as read back from the tree.
    fn write(&self, tree: &mut FileTree, entity: &T) -> StoreResult<T>;

    fn read(&self, tree: &FileTree, key: &Key) -> StoreResult<T>;

    /// Remove the entity and all of its resources. Returns the removed entity.
    fn delete(&self, tree: &mut FileTree, key: &Key) -> StoreResult<T>;

    fn count(&self, tree: &FileTree, filter: Option<&str>, paging: Option<&str>) -> StoreResult<u64>;

    fn list(
        &self,
        tree: &FileTree,
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
    ) -> StoreResult<Vec<T>>;

    // ---- Properties ----

    /// Convert textual `data` into a value for `property`, guided by the
    /// current value on `reference`.
    fn new_value(&self, property: &str, data: &str, reference: &T) -> StoreResult<Value>;

    fn set_property(&self, tree: &mut FileTree, key: &Key, property: &str, data: &str) -> StoreResult<T>;

    /// Set `property` on every entity selected by filter/paging/sorting.
    fn set_property_bulk(
        &self,
        tree: &mut FileTree,
        property: &str,
        data: &str,
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
    ) -> StoreResult<Vec<T>>;

    fn get_property(&self, tree: &FileTree, key: &Key, property: &str) -> StoreResult<Value>;

    /// Values of `names` on one entity; absent properties map to `null`.
    fn properties(&self, tree: &FileTree, key: &Key, names: &[String]) -> StoreResult<PropertyMap>;

    /// Values of `names` on every selected entity, keyed by the entity key.
    fn properties_bulk(
        &self,
        tree: &FileTree,
        names: &[String],
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
    ) -> StoreResult<BTreeMap<String, PropertyMap>>;

    // ---- Resources ----

    fn exists_resource(&self, tree: &FileTree, key: &Key, path: &str) -> StoreResult<bool>;

    /// Create or replace the resource at `resource.metadata.path`.
    /// Returns the owning entity.
    fn set_resource(&self, tree: &mut FileTree, key: &Key, resource: &Resource) -> StoreResult<T>;

    fn get_resource(&self, tree: &FileTree, key: &Key, path: &str) -> StoreResult<Resource>;

    /// Remove the resource at `path`. Returns the owning entity.
    fn delete_resource(&self, tree: &mut FileTree, key: &Key, path: &str) -> StoreResult<T>;

    fn count_resources(
        &self,
        tree: &FileTree,
        key: &Key,
        filter: Option<&str>,
        paging: Option<&str>,
    ) -> StoreResult<u64>;

    fn list_resources(
        &self,
        tree: &FileTree,
        key: &Key,
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
    ) -> StoreResult<Vec<Resource>>;

    // ---- Locations ----

    /// Path of the entity inside the tree. The empty key locates the root
    /// of the entity type.
    fn location(&self, tree: &FileTree, key: &Key) -> StoreResult<String>;

    /// Path of one resource of the entity inside the tree.
    fn location_resources(&self, tree: &FileTree, key: &Key, path: &str) -> StoreResult<String>;

    /// Parse a paging expression.
    fn paging(&self, expression: Option<&str>) -> StoreResult<Option<Paging>> {
        Ok(Paging::parse(expression)?)
    }
}
