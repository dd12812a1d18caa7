//! Lifecycle hooks around entity service operations.
//!
//! Every operation runs `before` once its snapshot is open, then exactly one
//! of `after_success` or `after_error`. A `before` hook rejects an operation
//! by returning an error; after hooks only observe.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use frs_store::{Entity, PropertyMap, Repository};
use frs_types::{FileTree, HistoryEntry, Key, Resource, Revision};

use crate::error::{ServiceError, ServiceResult};

/// One service call with borrowed inputs.
#[derive(Debug)]
pub enum Operation<'a, T> {
    Save { entity: &'a T },
    Read { key: &'a Key, revision: &'a Revision },
    Update { entity: &'a T },
    Delete { key: &'a Key },
    Count {
        filter: Option<&'a str>,
        paging: Option<&'a str>,
        revision: &'a Revision,
    },
    List {
        filter: Option<&'a str>,
        paging: Option<&'a str>,
        sorting: Option<&'a str>,
        revision: &'a Revision,
    },
    SetProperty { key: &'a Key, name: &'a str, data: &'a str },
    SetPropertyBulk {
        name: &'a str,
        data: &'a str,
        filter: Option<&'a str>,
        paging: Option<&'a str>,
        sorting: Option<&'a str>,
    },
    GetProperty { key: &'a Key, name: &'a str, revision: &'a Revision },
    Properties { key: &'a Key, names: &'a [String], revision: &'a Revision },
    PropertiesBulk {
        names: &'a [String],
        filter: Option<&'a str>,
        paging: Option<&'a str>,
        sorting: Option<&'a str>,
        revision: &'a Revision,
    },
    SetResource { key: &'a Key, resource: &'a Resource },
    GetResource { key: &'a Key, path: &'a str, revision: &'a Revision },
    UpdateResource { key: &'a Key, resource: &'a Resource },
    DeleteResource { key: &'a Key, path: &'a str },
    CountResources {
        key: &'a Key,
        filter: Option<&'a str>,
        paging: Option<&'a str>,
        revision: &'a Revision,
    },
    ListResources {
        key: &'a Key,
        filter: Option<&'a str>,
        paging: Option<&'a str>,
        sorting: Option<&'a str>,
        revision: &'a Revision,
    },
    History { key: &'a Key, paging: Option<&'a str> },
    HistoryResources { key: &'a Key, path: &'a str, paging: Option<&'a str> },
}

impl<T: Entity> Operation<'_, T> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Save { .. } => "save",
            Self::Read { .. } => "read",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Count { .. } => "count",
            Self::List { .. } => "list",
            Self::SetProperty { .. } => "set_property",
            Self::SetPropertyBulk { .. } => "set_property_bulk",
            Self::GetProperty { .. } => "get_property",
            Self::Properties { .. } => "properties",
            Self::PropertiesBulk { .. } => "properties_bulk",
            Self::SetResource { .. } => "set_resource",
            Self::GetResource { .. } => "get_resource",
            Self::UpdateResource { .. } => "update_resource",
            Self::DeleteResource { .. } => "delete_resource",
            Self::CountResources { .. } => "count_resources",
            Self::ListResources { .. } => "list_resources",
            Self::History { .. } => "history",
            Self::HistoryResources { .. } => "history_resources",
        }
    }

    /// Returns `true` for operations that run on a write snapshot.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Save { .. }
                | Self::Update { .. }
                | Self::Delete { .. }
                | Self::SetProperty { .. }
                | Self::SetPropertyBulk { .. }
                | Self::SetResource { .. }
                | Self::UpdateResource { .. }
                | Self::DeleteResource { .. }
        )
    }

    /// Key of the single entity the operation addresses, if any.
    pub fn key(&self) -> Option<Key> {
        match self {
            Self::Save { entity } | Self::Update { entity } => Some(entity.key()),
            Self::Read { key, .. }
            | Self::Delete { key }
            | Self::SetProperty { key, .. }
            | Self::GetProperty { key, .. }
            | Self::Properties { key, .. }
            | Self::SetResource { key, .. }
            | Self::GetResource { key, .. }
            | Self::UpdateResource { key, .. }
            | Self::DeleteResource { key, .. }
            | Self::CountResources { key, .. }
            | Self::ListResources { key, .. }
            | Self::History { key, .. }
            | Self::HistoryResources { key, .. } => Some((*key).clone()),
            Self::Count { .. }
            | Self::List { .. }
            | Self::SetPropertyBulk { .. }
            | Self::PropertiesBulk { .. } => None,
        }
    }

    /// Resource path the operation addresses, if any.
    pub fn resource_path(&self) -> Option<&str> {
        match self {
            Self::SetResource { resource, .. } | Self::UpdateResource { resource, .. } => {
                Some(resource.path())
            }
            Self::GetResource { path, .. }
            | Self::DeleteResource { path, .. }
            | Self::HistoryResources { path, .. } => Some(*path),
            _ => None,
        }
    }

    /// Short description used in commit messages and logs:
    /// `<operation> <type> <key>[ <resource path>]`, with key components
    /// joined by `separator`.
    pub fn describe(&self, type_name: &str, separator: &str) -> String {
        let subject = match self.key() {
            Some(key) => key.join(separator),
            None => "*".to_string(),
        };
        match self.resource_path() {
            Some(path) => format!("{} {type_name} {subject} {path}", self.name()),
            None => format!("{} {type_name} {subject}", self.name()),
        }
    }
}

/// Borrowed view of an operation's result.
#[derive(Debug)]
pub enum Outcome<'a, T> {
    Entity(&'a T),
    Entities(&'a [T]),
    Count(u64),
    Value(&'a Value),
    Properties(&'a PropertyMap),
    PropertiesBulk(&'a BTreeMap<String, PropertyMap>),
    Resource(&'a Resource),
    Resources(&'a [Resource]),
    History(&'a [HistoryEntry]),
}

/// What a `before` hook may look at: the group, the repository, and the
/// tree of the snapshot the operation is about to run on.
pub struct HookContext<'a, T: Entity> {
    group: &'a str,
    repository: &'a dyn Repository<T>,
    tree: &'a FileTree,
}

impl<'a, T: Entity> HookContext<'a, T> {
    pub fn new(group: &'a str, repository: &'a dyn Repository<T>, tree: &'a FileTree) -> Self {
        Self {
            group,
            repository,
            tree,
        }
    }

    pub fn group(&self) -> &str {
        self.group
    }

    pub fn repository(&self) -> &dyn Repository<T> {
        self.repository
    }

    pub fn tree(&self) -> &FileTree {
        self.tree
    }
}

/// Interceptor for entity service operations. Every method defaults to a
/// no-op, so implementations override only what they need.
pub trait EntityHooks<T: Entity>: Send + Sync {
    fn name(&self) -> &str {
        "hooks"
    }

    /// Runs after the snapshot is open and before the repository is called.
    fn before(&self, _ctx: &HookContext<'_, T>, _op: &Operation<'_, T>) -> ServiceResult<()> {
        Ok(())
    }

    fn after_success(&self, _op: &Operation<'_, T>, _outcome: &Outcome<'_, T>) {}

    /// Observes the error the operation is about to return.
    fn after_error(&self, _op: &Operation<'_, T>, _error: &ServiceError) {}
}

/// Hooks that do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpHooks;

impl<T: Entity> EntityHooks<T> for NoOpHooks {
    fn name(&self) -> &str {
        "noop"
    }
}

/// Existence preconditions for create/replace operations:
///
/// - `save` fails with [`ServiceError::Conflict`] if the entity exists
/// - `update` fails with [`ServiceError::NotFound`] if it does not
/// - `set_resource` fails with `Conflict` if the resource path is taken
/// - `update_resource` fails with `NotFound` if the resource is missing
#[derive(Clone, Copy, Debug, Default)]
pub struct ExistenceChecks;

impl<T: Entity> EntityHooks<T> for ExistenceChecks {
    fn name(&self) -> &str {
        "existence-checks"
    }

    fn before(&self, ctx: &HookContext<'_, T>, op: &Operation<'_, T>) -> ServiceResult<()> {
        let repo = ctx.repository();
        match op {
            Operation::Save { entity } => {
                if repo.exists(ctx.tree(), entity)? {
                    return Err(ServiceError::Conflict(format!(
                        "{} {} already exists",
                        repo.type_name(),
                        entity.key()
                    )));
                }
            }
            Operation::Update { entity } => {
                if !repo.exists(ctx.tree(), entity)? {
                    return Err(ServiceError::NotFound(format!(
                        "{} {} does not exist",
                        repo.type_name(),
                        entity.key()
                    )));
                }
            }
            Operation::SetResource { key, resource } => {
                if repo.exists_resource(ctx.tree(), key, resource.path())? {
                    return Err(ServiceError::Conflict(format!(
                        "resource {} already exists on {key}",
                        resource.path()
                    )));
                }
            }
            Operation::UpdateResource { key, resource } => {
                if !repo.exists_resource(ctx.tree(), key, resource.path())? {
                    return Err(ServiceError::NotFound(format!(
                        "resource {} does not exist on {key}",
                        resource.path()
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Ordered hook pipeline.
///
/// `before` stops at the first rejection; after hooks run on every member.
pub struct HookChain<T: Entity> {
    hooks: Vec<Box<dyn EntityHooks<T>>>,
}

impl<T: Entity> HookChain<T> {
    /// Empty chain: no preconditions at all.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// The default chain: [`ExistenceChecks`].
    pub fn standard() -> Self {
        Self::new().with(ExistenceChecks)
    }

    /// Append a hook to the end of the chain.
    pub fn with(mut self, hook: impl EntityHooks<T> + 'static) -> Self {
        self.push(Box::new(hook));
        self
    }

    pub fn push(&mut self, hook: Box<dyn EntityHooks<T>>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }
}

impl<T: Entity> Default for HookChain<T> {
    fn default() -> Self {
        Self::standard()
    }
}

impl<T: Entity> EntityHooks<T> for HookChain<T> {
    fn name(&self) -> &str {
        "chain"
    }

    fn before(&self, ctx: &HookContext<'_, T>, op: &Operation<'_, T>) -> ServiceResult<()> {
        for hook in &self.hooks {
            if let Err(err) = hook.before(ctx, op) {
                debug!(hook = hook.name(), operation = op.name(), error = %err, "operation rejected");
                return Err(err);
            }
        }
        Ok(())
    }

    fn after_success(&self, op: &Operation<'_, T>, outcome: &Outcome<'_, T>) {
        for hook in &self.hooks {
            hook.after_success(op, outcome);
        }
    }

    fn after_error(&self, op: &Operation<'_, T>, error: &ServiceError) {
        for hook in &self.hooks {
            hook.after_error(op, error);
        }
    }
}
