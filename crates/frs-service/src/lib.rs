//! Entity service for frs.
//!
//! Turns a version-controlled group of files into CRUD-able entities with
//! properties, attached resources, history, and point-in-time reads. Each
//! mutation becomes one commit.
//!
//! # Components
//!
//! - [`EntityService`] -- runs every operation through the same pipeline:
//!   snapshot, `before` hook, repository call, commit, after hook
//! - [`EntityHooks`], [`HookChain`] -- interceptors; the standard chain holds
//!   [`ExistenceChecks`]
//! - [`EntityHandler`] -- wire-shaped adapter (names, JSON content, millisecond
//!   timestamps)
//! - [`ServiceConfig`] -- group, commit author, and separators
//!
//! # Error Kinds
//!
//! [`ServiceError::kind`] classifies every failure as configuration,
//! validation, not-found, conflict, or upstream. Repository and version
//! control errors keep their original value inside [`ServiceError::Store`]
//! and [`ServiceError::Version`].

pub mod config;
pub mod error;
pub mod handler;
pub mod hooks;
pub mod service;

pub use config::ServiceConfig;
pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use handler::EntityHandler;
pub use hooks::{EntityHooks, ExistenceChecks, HookChain, HookContext, NoOpHooks, Operation, Outcome};
pub use service::EntityService;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use frs_store::{Entity, FileRepository, StoreError};
    use frs_types::{CommitId, HistoryEntry, Key, Resource, Revision};
    use frs_version::{
        CommitRequest, InMemoryVersionControl, ReadSnapshot, VersionControl, VersionError, VersionResult,
        WriteSnapshot,
    };
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Widget {
        owner: String,
        name: String,
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        size: Option<u32>,
    }

    impl Entity for Widget {
        const TYPE_NAME: &'static str = "widget";

        fn key(&self) -> Key {
            Key::new([self.owner.as_str(), self.name.as_str()])
        }
    }

    type Service = EntityService<Widget, FileRepository<Widget>, Arc<InMemoryVersionControl>>;

    /// Records `<phase>:<operation>` for every hook call.
    #[derive(Clone, Default)]
    struct Recorder {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }

        fn push(&self, phase: &str, op: &Operation<'_, Widget>) {
            self.events.lock().unwrap().push(format!("{phase}:{}", op.name()));
        }
    }

    impl EntityHooks<Widget> for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn before(&self, _ctx: &HookContext<'_, Widget>, op: &Operation<'_, Widget>) -> ServiceResult<()> {
            self.push("before", op);
            Ok(())
        }

        fn after_success(&self, op: &Operation<'_, Widget>, _outcome: &Outcome<'_, Widget>) {
            self.push("success", op);
        }

        fn after_error(&self, op: &Operation<'_, Widget>, _error: &ServiceError) {
            self.push("error", op);
        }
    }

    /// Rejects every delete.
    struct NoDeletes;

    impl EntityHooks<Widget> for NoDeletes {
        fn before(&self, _ctx: &HookContext<'_, Widget>, op: &Operation<'_, Widget>) -> ServiceResult<()> {
            match op {
                Operation::Delete { key } => Err(ServiceError::Validation(format!("{key} is protected"))),
                _ => Ok(()),
            }
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn setup() -> (Service, Arc<InMemoryVersionControl>, Recorder) {
        init_tracing();
        let versions = Arc::new(InMemoryVersionControl::new());
        let recorder = Recorder::default();
        let service = EntityService::new(
            ServiceConfig::new("catalog").with_author("tester"),
            FileRepository::new(),
            Arc::clone(&versions),
        )
        .unwrap()
        .with_hooks(HookChain::standard().with(recorder.clone()));
        (service, versions, recorder)
    }

    fn widget(owner: &str, name: &str) -> Widget {
        Widget {
            owner: owner.into(),
            name: name.into(),
            color: None,
            size: None,
        }
    }

    fn key(owner: &str, name: &str) -> Key {
        Key::new([owner, name])
    }

    fn live() -> Revision {
        Revision::live()
    }

    // -----------------------------------------------------------------------
    // Entity lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn save_read_conflict_and_missing_update() {
        let (service, versions, _) = setup();
        let w1 = widget("acme", "widget-1");

        let saved = service.save(&w1).unwrap();
        assert_eq!(saved, w1);
        assert_eq!(service.read(&key("acme", "widget-1"), &live()).unwrap(), w1);

        let err = service.save(&w1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(versions.commit_count("catalog").unwrap(), 1);

        let err = service.update(&widget("acme", "widget-2")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(versions.commit_count("catalog").unwrap(), 1);
    }

    #[test]
    fn update_replaces_existing_entity() {
        let (service, _, _) = setup();
        service.save(&widget("acme", "w1")).unwrap();
        let mut changed = widget("acme", "w1");
        changed.size = Some(4);
        service.update(&changed).unwrap();
        assert_eq!(service.read(&key("acme", "w1"), &live()).unwrap().size, Some(4));
    }

    #[test]
    fn exists_reflects_live_head() {
        let (service, _, recorder) = setup();
        let w = widget("acme", "w1");
        assert!(!service.exists(&w).unwrap());
        service.save(&w).unwrap();
        assert!(service.exists(&w).unwrap());
        recorder.take();
        service.exists(&w).unwrap();
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn delete_then_read_is_not_found() {
        let (service, _, _) = setup();
        service.save(&widget("acme", "w1")).unwrap();
        let removed = service.delete(&key("acme", "w1")).unwrap();
        assert_eq!(removed.name, "w1");
        let err = service.read(&key("acme", "w1"), &live()).unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::EntityNotFound { .. })));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn commits_are_described_and_authored() {
        let (service, _, _) = setup();
        service.save(&widget("acme", "widget-1")).unwrap();
        let history = service.history(&key("acme", "widget-1"), None).unwrap();
        assert_eq!(history[0].message, "save widget acme;widget-1");
        assert_eq!(history[0].author, "tester");
    }

    #[test]
    fn commit_messages_use_the_configured_key_separator() {
        let mut config = ServiceConfig::new("catalog");
        config.key_separator = "|".into();
        let service =
            EntityService::new(config, FileRepository::<Widget>::new(), InMemoryVersionControl::new()).unwrap();
        service.save(&widget("acme", "widget-1")).unwrap();
        let history = service.history(&key("acme", "widget-1"), None).unwrap();
        assert_eq!(history[0].message, "save widget acme|widget-1");
    }

    // -----------------------------------------------------------------------
    // Point-in-time reads
    // -----------------------------------------------------------------------

    #[test]
    fn read_at_commit_ignores_later_changes() {
        let (service, _, _) = setup();
        let k = key("acme", "w1");
        service.save(&widget("acme", "w1")).unwrap();
        let first = service.history(&k, None).unwrap()[0].commit.to_hex();

        service.set_property(&k, "color", "red").unwrap();
        let revision = Revision::at_commit(first);
        let before = service.read(&k, &revision).unwrap();
        service.set_property(&k, "color", "blue").unwrap();
        let after = service.read(&k, &revision).unwrap();

        assert_eq!(before, after);
        assert_eq!(after.color, None);
        assert_eq!(service.read(&k, &live()).unwrap().color.as_deref(), Some("blue"));
    }

    #[test]
    fn list_and_count_at_revision() {
        let (service, _, _) = setup();
        service.save(&widget("acme", "w1")).unwrap();
        let first = service.history(&Key::empty(), None).unwrap()[0].commit.to_hex();
        service.save(&widget("acme", "w2")).unwrap();

        let revision = Revision::at_commit(first);
        assert_eq!(service.count(None, None, &revision).unwrap(), 1);
        assert_eq!(service.list(None, None, None, &revision).unwrap().len(), 1);
        assert_eq!(service.count(None, None, &live()).unwrap(), 2);
    }

    #[test]
    fn read_at_timestamp() {
        let (service, _, _) = setup();
        let k = key("acme", "w1");
        let yesterday = chrono::Utc::now() - chrono::Duration::days(1);
        service.save(&widget("acme", "w1")).unwrap();

        let err = service.read(&k, &Revision::at_time(yesterday)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let soon = chrono::Utc::now() + chrono::Duration::seconds(1);
        assert!(service.read(&k, &Revision::at_time(soon)).is_ok());
    }

    #[test]
    fn unknown_commit_goes_through_after_error() {
        let (service, _, recorder) = setup();
        service.save(&widget("acme", "w1")).unwrap();
        recorder.take();

        let err = service
            .read(&key("acme", "w1"), &Revision::at_commit("0000dead"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(matches!(err, ServiceError::Version(_)));
        assert_eq!(recorder.take(), vec!["error:read"]);
    }

    // -----------------------------------------------------------------------
    // Hook sequencing
    // -----------------------------------------------------------------------

    #[test]
    fn exactly_one_after_hook_per_call() {
        let (service, _, recorder) = setup();
        let w = widget("acme", "w1");

        service.save(&w).unwrap();
        assert_eq!(recorder.take(), vec!["before:save", "success:save"]);

        service.save(&w).unwrap_err();
        assert_eq!(recorder.take(), vec!["error:save"]);

        service.read(&key("acme", "w1"), &live()).unwrap();
        assert_eq!(recorder.take(), vec!["before:read", "success:read"]);

        service.read(&key("acme", "nope"), &live()).unwrap_err();
        assert_eq!(recorder.take(), vec!["before:read", "error:read"]);
    }

    #[test]
    fn rejecting_hook_aborts_before_repository() {
        let (service, versions, recorder) = setup();
        let service = service.with_hooks(
            HookChain::standard()
                .with(NoDeletes)
                .with(recorder.clone()),
        );
        service.save(&widget("acme", "w1")).unwrap();
        recorder.take();

        let err = service.delete(&key("acme", "w1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(recorder.take(), vec!["error:delete"]);
        assert!(service.read(&key("acme", "w1"), &live()).is_ok());
        assert_eq!(versions.commit_count("catalog").unwrap(), 1);
    }

    #[test]
    fn no_op_hooks_skip_existence_checks() {
        let (service, _, _) = setup();
        let service = service.with_hooks(NoOpHooks);
        let w = widget("acme", "w1");
        service.save(&w).unwrap();
        assert_eq!(service.save(&w).unwrap(), w);
    }

    /// Version control whose commits always lose to a concurrent writer.
    struct LosingCommits(InMemoryVersionControl);

    impl VersionControl for LosingCommits {
        fn read_directory(&self, group: &str, revision: &Revision) -> VersionResult<ReadSnapshot> {
            self.0.read_directory(group, revision)
        }

        fn write_directory(&self, group: &str) -> VersionResult<WriteSnapshot> {
            self.0.write_directory(group)
        }

        fn commit(&self, snapshot: WriteSnapshot, _request: &CommitRequest) -> VersionResult<Option<CommitId>> {
            Err(VersionError::StaleSnapshot {
                group: snapshot.group().to_string(),
                base: "<none>".into(),
                head: "elsewhere".into(),
            })
        }

        fn history(&self, group: &str, path: &str, skip: usize, max: Option<usize>) -> VersionResult<Vec<HistoryEntry>> {
            self.0.history(group, path, skip, max)
        }
    }

    #[test]
    fn failed_commit_reaches_after_error_only() {
        let recorder = Recorder::default();
        let service = EntityService::new(
            ServiceConfig::new("catalog"),
            FileRepository::<Widget>::new(),
            LosingCommits(InMemoryVersionControl::new()),
        )
        .unwrap()
        .with_hooks(HookChain::standard().with(recorder.clone()));

        let err = service.save(&widget("acme", "w1")).unwrap_err();
        assert!(matches!(err, ServiceError::Version(VersionError::StaleSnapshot { .. })));
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(recorder.take(), vec!["before:save", "error:save"]);
        assert!(!service.exists(&widget("acme", "w1")).unwrap());
    }

    #[test]
    fn unchanged_write_succeeds_without_commit() {
        let (service, versions, recorder) = setup();
        let w = widget("acme", "w1");
        service.save(&w).unwrap();
        recorder.take();

        service.update(&w).unwrap();
        assert_eq!(recorder.take(), vec!["before:update", "success:update"]);
        assert_eq!(versions.commit_count("catalog").unwrap(), 1);
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    #[test]
    fn set_and_read_properties() {
        let (service, _, _) = setup();
        let k = key("acme", "widget-1");
        service.save(&widget("acme", "widget-1")).unwrap();

        service.set_property(&k, "color", "blue").unwrap();
        assert_eq!(service.get_property(&k, "color", &live()).unwrap(), json!("blue"));

        let names = vec!["color".to_string(), "size".to_string()];
        let values = service.properties(&k, &names, &live()).unwrap();
        assert_eq!(values["color"], json!("blue"));
        assert_eq!(values["size"], Value::Null);
    }

    #[test]
    fn new_value_uses_reference_type() {
        let (service, _, _) = setup();
        let mut w = widget("acme", "w1");
        w.color = Some("red".into());
        assert_eq!(service.new_value("color", "12", &w).unwrap(), json!("12"));
        assert_eq!(service.new_value("size", "12", &w).unwrap(), json!(12));
    }

    #[test]
    fn bulk_properties() {
        let (service, _, _) = setup();
        for name in ["w1", "w2", "w3"] {
            service.save(&widget("acme", name)).unwrap();
        }
        service.save(&widget("zeta", "w4")).unwrap();

        let updated = service
            .set_property_bulk("size", "5", Some(r#"{"owner":"acme"}"#), Some(r#"{"max":2}"#), None)
            .unwrap();
        assert_eq!(updated.len(), 2);

        let names = vec!["size".to_string()];
        let all = service
            .properties_bulk(&names, None, None, Some(r#"{"property":"name"}"#), &live())
            .unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all["acme;w1"]["size"], json!(5));
        assert_eq!(all["acme;w3"]["size"], Value::Null);

        let sized = service
            .count(Some(r#"{"size":{"$ge":1}}"#), None, &live())
            .unwrap();
        assert_eq!(sized, 2);
    }

    #[test]
    fn key_change_through_property_is_upstream() {
        let (service, _, _) = setup();
        service.save(&widget("acme", "w1")).unwrap();
        let err = service
            .set_property(&key("acme", "w1"), "owner", "other")
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::KeyChange { .. })));
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    #[test]
    fn resource_conflict_and_missing_update() {
        let (service, _, _) = setup();
        let k = key("acme", "w1");
        service.save(&widget("acme", "w1")).unwrap();

        let readme = Resource::new("docs/readme.md", "v1").with_content_type("text/markdown");
        service.set_resource(&k, &readme).unwrap();
        let err = service.set_resource(&k, &readme).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = service
            .update_resource(&k, &Resource::new("docs/missing.md", "x"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        service
            .update_resource(&k, &Resource::new("docs/readme.md", "v2"))
            .unwrap();
        let read = service.get_resource(&k, "docs/readme.md", &live()).unwrap();
        assert_eq!(read.text(), Some("v2"));
    }

    #[test]
    fn delete_missing_resource_is_upstream_not_found() {
        let (service, _, recorder) = setup();
        let k = key("acme", "w1");
        service.save(&widget("acme", "w1")).unwrap();
        recorder.take();

        let err = service.delete_resource(&k, "docs/readme.md").unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::ResourceNotFound { .. })));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(recorder.take(), vec!["before:delete_resource", "error:delete_resource"]);
    }

    #[test]
    fn list_and_count_resources() {
        let (service, _, _) = setup();
        let k = key("acme", "w1");
        service.save(&widget("acme", "w1")).unwrap();
        for path in ["b.txt", "a.txt", "c.bin"] {
            service.set_resource(&k, &Resource::new(path, path)).unwrap();
        }
        service.delete_resource(&k, "c.bin").unwrap();

        let listed = service.list_resources(&k, None, None, None, &live()).unwrap();
        let paths: Vec<&str> = listed.iter().map(Resource::path).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt"]);
        assert_eq!(service.count_resources(&k, None, None, &live()).unwrap(), 2);
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    #[test]
    fn history_is_newest_first_with_paging() {
        let (service, _, _) = setup();
        let k = key("acme", "w1");
        service.save(&widget("acme", "w1")).unwrap();
        service.save(&widget("acme", "w2")).unwrap();
        service.set_property(&k, "size", "1").unwrap();
        service.set_property(&k, "size", "2").unwrap();

        let full = service.history(&k, None).unwrap();
        let messages: Vec<&str> = full.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "set_property widget acme;w1",
                "set_property widget acme;w1",
                "save widget acme;w1",
            ]
        );

        let second = service.history(&k, Some(r#"{"skip":1,"max":1}"#)).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0], full[1]);
    }

    #[test]
    fn history_resources_is_scoped_to_the_path() {
        let (service, _, _) = setup();
        let k = key("acme", "w1");
        service.save(&widget("acme", "w1")).unwrap();
        service.set_resource(&k, &Resource::new("a.txt", "1")).unwrap();
        service.set_resource(&k, &Resource::new("b.txt", "1")).unwrap();
        service.update_resource(&k, &Resource::new("a.txt", "2")).unwrap();

        let history = service.history_resources(&k, "a.txt", None).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].message.starts_with("update_resource widget acme;w1 a.txt"));
        assert_eq!(service.history(&k, None).unwrap().len(), 4);
    }

    #[test]
    fn malformed_history_paging_reaches_after_error() {
        let (service, _, recorder) = setup();
        let err = service.history(&key("acme", "w1"), Some("skip=1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(recorder.take(), vec!["error:history"]);
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    #[test]
    fn missing_group_fails_at_construction() {
        let result = EntityService::<Widget, _, _>::new(
            ServiceConfig::default(),
            FileRepository::<Widget>::new(),
            InMemoryVersionControl::new(),
        );
        let err = result.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn services_share_version_control_per_group() {
        let (service, versions, _) = setup();
        let other = EntityService::new(
            ServiceConfig::new("catalog"),
            FileRepository::<Widget>::with_root("archive"),
            Arc::clone(&versions),
        )
        .unwrap();

        service.save(&widget("acme", "w1")).unwrap();
        other.save(&widget("acme", "w1")).unwrap();
        assert_eq!(versions.commit_count("catalog").unwrap(), 2);
        assert_eq!(service.history(&Key::empty(), None).unwrap().len(), 1);
        assert_eq!(other.history(&Key::empty(), None).unwrap().len(), 1);
    }
}
