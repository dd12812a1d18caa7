use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use frs_store::{Entity, PropertyMap, Repository, StoreResult};
use frs_types::{FileTree, HistoryEntry, Key, Resource, Revision};
use frs_version::{CommitRequest, VersionControl};

use crate::config::ServiceConfig;
use crate::error::ServiceResult;
use crate::hooks::{EntityHooks, HookChain, HookContext, Operation, Outcome};

/// Hook-wrapped entity operations over one version-controlled group.
///
/// Every call opens its own snapshot: reads see the live head or the
/// requested [`Revision`], writes work on a copy of the head that becomes a
/// commit when the repository call succeeds. The sequence is always
///
/// 1. open the snapshot
/// 2. `before` hook (may reject)
/// 3. repository call (writes then commit)
/// 4. exactly one of `after_success` / `after_error`
///
/// Errors leave the service unchanged after passing through `after_error`.
pub struct EntityService<T: Entity, R, V> {
    config: ServiceConfig,
    repository: R,
    versions: V,
    hooks: Box<dyn EntityHooks<T>>,
}

impl<T, R, V> EntityService<T, R, V>
where
    T: Entity,
    R: Repository<T>,
    V: VersionControl,
{
    /// Build a service with the standard hook chain.
    ///
    /// Fails with [`ServiceError::Config`](crate::ServiceError::Config) when
    /// the configuration names no group.
    pub fn new(config: ServiceConfig, repository: R, versions: V) -> ServiceResult<Self> {
        config.validate()?;
        debug!(group = %config.group, type_name = repository.type_name(), "entity service created");
        Ok(Self {
            config,
            repository,
            versions,
            hooks: Box::new(HookChain::standard()),
        })
    }

    /// Replace the hook chain.
    pub fn with_hooks(mut self, hooks: impl EntityHooks<T> + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn group(&self) -> &str {
        &self.config.group
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn versions(&self) -> &V {
        &self.versions
    }

    // -----------------------------------------------------------------------
    // Pipeline
    // -----------------------------------------------------------------------

    fn context<'a>(&'a self, tree: &'a FileTree) -> HookContext<'a, T> {
        HookContext::new(&self.config.group, &self.repository, tree)
    }

    fn finish<O>(
        &self,
        op: &Operation<'_, T>,
        result: ServiceResult<O>,
        outcome: fn(&O) -> Outcome<'_, T>,
    ) -> ServiceResult<O> {
        match &result {
            Ok(value) => self.hooks.after_success(op, &outcome(value)),
            Err(err) => {
                warn!(operation = op.name(), group = %self.config.group, error = %err, "operation failed");
                self.hooks.after_error(op, err);
            }
        }
        result
    }

    fn try_read<O>(
        &self,
        op: &Operation<'_, T>,
        revision: &Revision,
        run: impl FnOnce(&R, &FileTree) -> StoreResult<O>,
    ) -> ServiceResult<O> {
        let snapshot = self.versions.read_directory(&self.config.group, revision)?;
        self.hooks.before(&self.context(snapshot.tree()), op)?;
        Ok(run(&self.repository, snapshot.tree())?)
    }

    fn try_write<O>(
        &self,
        op: &Operation<'_, T>,
        run: impl FnOnce(&R, &mut FileTree) -> StoreResult<O>,
    ) -> ServiceResult<O> {
        let mut snapshot = self.versions.write_directory(&self.config.group)?;
        self.hooks.before(&self.context(snapshot.tree()), op)?;
        let output = run(&self.repository, snapshot.tree_mut())?;

        let message = op.describe(self.repository.type_name(), &self.config.key_separator);
        let request = CommitRequest::new(&self.config.author, message);
        match self.versions.commit(snapshot, &request)? {
            Some(commit) => debug!(commit = %commit.short_hex(), message = %request.message, "change committed"),
            None => debug!(message = %request.message, "nothing to commit"),
        }
        Ok(output)
    }

    fn try_history(
        &self,
        op: &Operation<'_, T>,
        paging: Option<&str>,
        locate: impl FnOnce(&R, &FileTree) -> StoreResult<String>,
    ) -> ServiceResult<Vec<HistoryEntry>> {
        let window = self.repository.paging(paging)?.unwrap_or_default();
        let snapshot = self.versions.read_directory(&self.config.group, &Revision::live())?;
        self.hooks.before(&self.context(snapshot.tree()), op)?;
        let location = locate(&self.repository, snapshot.tree())?;
        Ok(self
            .versions
            .history(&self.config.group, &location, window.offset(), window.max)?)
    }

    fn read_with<O>(
        &self,
        op: Operation<'_, T>,
        revision: &Revision,
        run: impl FnOnce(&R, &FileTree) -> StoreResult<O>,
        outcome: fn(&O) -> Outcome<'_, T>,
    ) -> ServiceResult<O> {
        debug!(operation = op.name(), live = revision.is_live(), "read");
        let result = self.try_read(&op, revision, run);
        self.finish(&op, result, outcome)
    }

    fn write_with<O>(
        &self,
        op: Operation<'_, T>,
        run: impl FnOnce(&R, &mut FileTree) -> StoreResult<O>,
        outcome: fn(&O) -> Outcome<'_, T>,
    ) -> ServiceResult<O> {
        debug!(operation = op.name(), "write");
        let result = self.try_write(&op, run);
        self.finish(&op, result, outcome)
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    /// Whether an entity with `entity`'s key exists at the live head.
    /// Runs no hooks.
    pub fn exists(&self, entity: &T) -> ServiceResult<bool> {
        let snapshot = self.versions.read_directory(&self.config.group, &Revision::live())?;
        Ok(self.repository.exists(snapshot.tree(), entity)?)
    }

    /// Store a new entity. The standard hooks reject an existing key with
    /// a conflict.
    pub fn save(&self, entity: &T) -> ServiceResult<T> {
        self.write_with(
            Operation::Save { entity },
            |repo, tree| repo.write(tree, entity),
            |e| Outcome::Entity(e),
        )
    }

    pub fn read(&self, key: &Key, revision: &Revision) -> ServiceResult<T> {
        self.read_with(
            Operation::Read { key, revision },
            revision,
            |repo, tree| repo.read(tree, key),
            |e| Outcome::Entity(e),
        )
    }

    /// Replace an existing entity. The standard hooks reject a missing key
    /// as not found.
    pub fn update(&self, entity: &T) -> ServiceResult<T> {
        self.write_with(
            Operation::Update { entity },
            |repo, tree| repo.write(tree, entity),
            |e| Outcome::Entity(e),
        )
    }

    pub fn delete(&self, key: &Key) -> ServiceResult<T> {
        self.write_with(
            Operation::Delete { key },
            |repo, tree| repo.delete(tree, key),
            |e| Outcome::Entity(e),
        )
    }

    pub fn count(&self, filter: Option<&str>, paging: Option<&str>, revision: &Revision) -> ServiceResult<u64> {
        self.read_with(
            Operation::Count {
                filter,
                paging,
                revision,
            },
            revision,
            |repo, tree| repo.count(tree, filter, paging),
            |n| Outcome::Count(*n),
        )
    }

    pub fn list(
        &self,
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
        revision: &Revision,
    ) -> ServiceResult<Vec<T>> {
        self.read_with(
            Operation::List {
                filter,
                paging,
                sorting,
                revision,
            },
            revision,
            |repo, tree| repo.list(tree, filter, paging, sorting),
            |v| Outcome::Entities(v),
        )
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    /// Convert textual `data` into a value for `property` the way
    /// [`set_property`](Self::set_property) would. Opens no snapshot.
    pub fn new_value(&self, property: &str, data: &str, reference: &T) -> ServiceResult<Value> {
        Ok(self.repository.new_value(property, data, reference)?)
    }

    pub fn set_property(&self, key: &Key, name: &str, data: &str) -> ServiceResult<T> {
        self.write_with(
            Operation::SetProperty { key, name, data },
            |repo, tree| repo.set_property(tree, key, name, data),
            |e| Outcome::Entity(e),
        )
    }

    /// Set one property on every entity selected by the query.
    pub fn set_property_bulk(
        &self,
        name: &str,
        data: &str,
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
    ) -> ServiceResult<Vec<T>> {
        self.write_with(
            Operation::SetPropertyBulk {
                name,
                data,
                filter,
                paging,
                sorting,
            },
            |repo, tree| repo.set_property_bulk(tree, name, data, filter, paging, sorting),
            |v| Outcome::Entities(v),
        )
    }

    pub fn get_property(&self, key: &Key, name: &str, revision: &Revision) -> ServiceResult<Value> {
        self.read_with(
            Operation::GetProperty { key, name, revision },
            revision,
            |repo, tree| repo.get_property(tree, key, name),
            |v| Outcome::Value(v),
        )
    }

    pub fn properties(&self, key: &Key, names: &[String], revision: &Revision) -> ServiceResult<PropertyMap> {
        self.read_with(
            Operation::Properties {
                key,
                names,
                revision,
            },
            revision,
            |repo, tree| repo.properties(tree, key, names),
            |m| Outcome::Properties(m),
        )
    }

    pub fn properties_bulk(
        &self,
        names: &[String],
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
        revision: &Revision,
    ) -> ServiceResult<BTreeMap<String, PropertyMap>> {
        self.read_with(
            Operation::PropertiesBulk {
                names,
                filter,
                paging,
                sorting,
                revision,
            },
            revision,
            |repo, tree| repo.properties_bulk(tree, names, filter, paging, sorting),
            |m| Outcome::PropertiesBulk(m),
        )
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    /// Attach a new resource. The standard hooks reject an existing path
    /// with a conflict.
    pub fn set_resource(&self, key: &Key, resource: &Resource) -> ServiceResult<T> {
        self.write_with(
            Operation::SetResource { key, resource },
            |repo, tree| repo.set_resource(tree, key, resource),
            |e| Outcome::Entity(e),
        )
    }

    pub fn get_resource(&self, key: &Key, path: &str, revision: &Revision) -> ServiceResult<Resource> {
        self.read_with(
            Operation::GetResource { key, path, revision },
            revision,
            |repo, tree| repo.get_resource(tree, key, path),
            |r| Outcome::Resource(r),
        )
    }

    /// Replace an existing resource. The standard hooks reject a missing
    /// path as not found.
    pub fn update_resource(&self, key: &Key, resource: &Resource) -> ServiceResult<T> {
        self.write_with(
            Operation::UpdateResource { key, resource },
            |repo, tree| repo.set_resource(tree, key, resource),
            |e| Outcome::Entity(e),
        )
    }

    pub fn delete_resource(&self, key: &Key, path: &str) -> ServiceResult<T> {
        self.write_with(
            Operation::DeleteResource { key, path },
            |repo, tree| repo.delete_resource(tree, key, path),
            |e| Outcome::Entity(e),
        )
    }

    pub fn count_resources(
        &self,
        key: &Key,
        filter: Option<&str>,
        paging: Option<&str>,
        revision: &Revision,
    ) -> ServiceResult<u64> {
        self.read_with(
            Operation::CountResources {
                key,
                filter,
                paging,
                revision,
            },
            revision,
            |repo, tree| repo.count_resources(tree, key, filter, paging),
            |n| Outcome::Count(*n),
        )
    }

    pub fn list_resources(
        &self,
        key: &Key,
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
        revision: &Revision,
    ) -> ServiceResult<Vec<Resource>> {
        self.read_with(
            Operation::ListResources {
                key,
                filter,
                paging,
                sorting,
                revision,
            },
            revision,
            |repo, tree| repo.list_resources(tree, key, filter, paging, sorting),
            |v| Outcome::Resources(v),
        )
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Commits that touched the entity, newest first. The empty key covers
    /// every entity of the repository.
    ///
    /// `paging` is applied by the version control, not the repository.
    pub fn history(&self, key: &Key, paging: Option<&str>) -> ServiceResult<Vec<HistoryEntry>> {
        let op = Operation::History { key, paging };
        debug!(operation = op.name(), "history");
        let result = self.try_history(&op, paging, |repo, tree| repo.location(tree, key));
        self.finish(&op, result, |h| Outcome::History(h))
    }

    /// Commits that touched one resource of the entity, newest first.
    pub fn history_resources(&self, key: &Key, path: &str, paging: Option<&str>) -> ServiceResult<Vec<HistoryEntry>> {
        let op = Operation::HistoryResources { key, path, paging };
        debug!(operation = op.name(), "history");
        let result = self.try_history(&op, paging, |repo, tree| repo.location_resources(tree, key, path));
        self.finish(&op, result, |h| Outcome::History(h))
    }
}
