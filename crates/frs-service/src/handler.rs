//! Wire-shaped entry points over [`EntityService`].
//!
//! Transports speak in strings: entity names are key components joined by
//! the configured key separator, property name lists are joined by the list
//! separator, contents arrive as JSON, and `at` is milliseconds since the
//! epoch. [`EntityHandler`] turns those into typed service calls.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use frs_store::{Entity, PropertyMap, Repository};
use frs_types::{HistoryEntry, Key, Resource, Revision};
use frs_version::VersionControl;

use crate::error::{ServiceError, ServiceResult};
use crate::service::EntityService;

/// Request adapter for one entity type.
///
/// `Q` is the wire form of the entity. It is deserialized from request
/// content and converted with `Into<T>`; use `Q = T` when the two coincide.
pub struct EntityHandler<T: Entity, Q, R, V> {
    service: Arc<EntityService<T, R, V>>,
    _wire: PhantomData<fn(Q)>,
}

impl<T, Q, R, V> EntityHandler<T, Q, R, V>
where
    T: Entity,
    Q: DeserializeOwned + Into<T>,
    R: Repository<T>,
    V: VersionControl,
{
    pub fn new(service: Arc<EntityService<T, R, V>>) -> Self {
        Self {
            service,
            _wire: PhantomData,
        }
    }

    pub fn service(&self) -> &EntityService<T, R, V> {
        &self.service
    }

    /// Parse an entity name into its key.
    pub fn key(&self, name: &str) -> Key {
        Key::parse(name, &self.service.config().key_separator)
    }

    /// Split a property list, dropping blank entries.
    pub fn names(&self, list: &str) -> Vec<String> {
        list.split(self.service.config().list_separator.as_str())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect()
    }

    /// Deserialize wire content and convert it to the entity type.
    pub fn entity(&self, content: &str) -> ServiceResult<T> {
        let wire: Q = serde_json::from_str(content)
            .map_err(|e| ServiceError::Validation(format!("invalid {} content: {e}", T::TYPE_NAME)))?;
        Ok(wire.into())
    }

    /// Revision selector from wire values; an unrepresentable `at` is a
    /// validation error rather than a live read.
    pub fn revision(&self, commit: Option<String>, at: Option<i64>) -> ServiceResult<Revision> {
        Revision::from_millis(commit, at).map_err(|e| ServiceError::Validation(e.to_string()))
    }

    pub fn save(&self, content: &str) -> ServiceResult<T> {
        self.service.save(&self.entity(content)?)
    }

    pub fn read(&self, name: &str, commit: Option<String>, at: Option<i64>) -> ServiceResult<T> {
        self.service.read(&self.key(name), &self.revision(commit, at)?)
    }

    /// Update the entity addressed by `name`.
    ///
    /// The key derived from the content must match `name` (ignoring case);
    /// otherwise the request fails with a validation error before the
    /// service is called.
    pub fn update(&self, name: &str, content: &str) -> ServiceResult<T> {
        let entity = self.entity(content)?;
        let addressed = self.key(name);
        let derived = entity.key();
        if !derived.matches_ignore_case(&addressed) {
            return Err(ServiceError::Validation(format!(
                "content name '{}' does not match the received path '{}'",
                derived.join(&self.service.config().key_separator),
                name
            )));
        }
        self.service.update(&entity)
    }

    pub fn delete(&self, name: &str) -> ServiceResult<T> {
        self.service.delete(&self.key(name))
    }

    pub fn count(
        &self,
        filter: Option<&str>,
        paging: Option<&str>,
        commit: Option<String>,
        at: Option<i64>,
    ) -> ServiceResult<u64> {
        self.service
            .count(filter, paging, &self.revision(commit, at)?)
    }

    pub fn list(
        &self,
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
        commit: Option<String>,
        at: Option<i64>,
    ) -> ServiceResult<Vec<T>> {
        self.service
            .list(filter, paging, sorting, &self.revision(commit, at)?)
    }

    pub fn set_property(&self, name: &str, property: &str, data: &str) -> ServiceResult<T> {
        self.service.set_property(&self.key(name), property, data)
    }

    pub fn set_property_bulk(
        &self,
        property: &str,
        data: &str,
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
    ) -> ServiceResult<Vec<T>> {
        self.service
            .set_property_bulk(property, data, filter, paging, sorting)
    }

    pub fn get_property(
        &self,
        name: &str,
        property: &str,
        commit: Option<String>,
        at: Option<i64>,
    ) -> ServiceResult<Value> {
        self.service
            .get_property(&self.key(name), property, &self.revision(commit, at)?)
    }

    /// `properties` is a separator-joined list of property names.
    pub fn properties(
        &self,
        name: &str,
        properties: &str,
        commit: Option<String>,
        at: Option<i64>,
    ) -> ServiceResult<PropertyMap> {
        self.service.properties(
            &self.key(name),
            &self.names(properties),
            &self.revision(commit, at)?,
        )
    }

    pub fn properties_bulk(
        &self,
        properties: &str,
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
        commit: Option<String>,
        at: Option<i64>,
    ) -> ServiceResult<BTreeMap<String, PropertyMap>> {
        self.service.properties_bulk(
            &self.names(properties),
            filter,
            paging,
            sorting,
            &self.revision(commit, at)?,
        )
    }

    pub fn set_resource(&self, name: &str, resource: &Resource) -> ServiceResult<T> {
        self.service.set_resource(&self.key(name), resource)
    }

    pub fn get_resource(
        &self,
        name: &str,
        path: &str,
        commit: Option<String>,
        at: Option<i64>,
    ) -> ServiceResult<Resource> {
        self.service
            .get_resource(&self.key(name), path, &self.revision(commit, at)?)
    }

    pub fn update_resource(&self, name: &str, resource: &Resource) -> ServiceResult<T> {
        self.service.update_resource(&self.key(name), resource)
    }

    pub fn delete_resource(&self, name: &str, path: &str) -> ServiceResult<T> {
        self.service.delete_resource(&self.key(name), path)
    }

    pub fn count_resources(
        &self,
        name: &str,
        filter: Option<&str>,
        paging: Option<&str>,
        commit: Option<String>,
        at: Option<i64>,
    ) -> ServiceResult<u64> {
        self.service.count_resources(
            &self.key(name),
            filter,
            paging,
            &self.revision(commit, at)?,
        )
    }

    pub fn list_resources(
        &self,
        name: &str,
        filter: Option<&str>,
        paging: Option<&str>,
        sorting: Option<&str>,
        commit: Option<String>,
        at: Option<i64>,
    ) -> ServiceResult<Vec<Resource>> {
        self.service.list_resources(
            &self.key(name),
            filter,
            paging,
            sorting,
            &self.revision(commit, at)?,
        )
    }

    pub fn history(&self, name: &str, paging: Option<&str>) -> ServiceResult<Vec<HistoryEntry>> {
        self.service.history(&self.key(name), paging)
    }

    /// History of every entity of this type.
    pub fn history_all(&self, paging: Option<&str>) -> ServiceResult<Vec<HistoryEntry>> {
        self.service.history(&Key::empty(), paging)
    }

    pub fn history_resources(
        &self,
        name: &str,
        path: &str,
        paging: Option<&str>,
    ) -> ServiceResult<Vec<HistoryEntry>> {
        self.service
            .history_resources(&self.key(name), path, paging)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::error::ErrorKind;
    use frs_store::FileRepository;
    use frs_version::InMemoryVersionControl;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Gadget {
        vendor: String,
        model: String,
        #[serde(default)]
        price: Option<u32>,
    }

    impl Entity for Gadget {
        const TYPE_NAME: &'static str = "gadget";

        fn key(&self) -> Key {
            Key::new([self.vendor.as_str(), self.model.as_str()])
        }
    }

    /// Wire form with a shorter field set.
    #[derive(Deserialize)]
    struct GadgetAlias {
        vendor: String,
        model: String,
    }

    impl From<GadgetAlias> for Gadget {
        fn from(alias: GadgetAlias) -> Self {
            Gadget {
                vendor: alias.vendor,
                model: alias.model,
                price: None,
            }
        }
    }

    type Service = EntityService<Gadget, FileRepository<Gadget>, InMemoryVersionControl>;

    fn service() -> Arc<Service> {
        Arc::new(
            EntityService::new(
                ServiceConfig::new("shop"),
                FileRepository::new(),
                InMemoryVersionControl::new(),
            )
            .unwrap(),
        )
    }

    fn handler() -> EntityHandler<Gadget, Gadget, FileRepository<Gadget>, InMemoryVersionControl> {
        EntityHandler::new(service())
    }

    const ACME_X1: &str = r#"{"vendor":"acme","model":"x1","price":10}"#;

    #[test]
    fn save_and_read_by_name() {
        let h = handler();
        h.save(ACME_X1).unwrap();
        let read = h.read("acme;x1", None, None).unwrap();
        assert_eq!(read.price, Some(10));
    }

    #[test]
    fn update_accepts_case_insensitive_name() {
        let h = handler();
        h.save(ACME_X1).unwrap();
        let updated = h
            .update("ACME;X1", r#"{"vendor":"acme","model":"x1","price":12}"#)
            .unwrap();
        assert_eq!(updated.price, Some(12));
    }

    #[test]
    fn update_rejects_mismatched_name() {
        let h = handler();
        h.save(ACME_X1).unwrap();
        let err = h.update("acme;x2", ACME_X1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("does not match the received path 'acme;x2'"));
    }

    #[test]
    fn out_of_range_at_is_validation_error() {
        let h = handler();
        h.save(ACME_X1).unwrap();
        let err = h.read("acme;x1", None, Some(i64::MAX)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = h.count(None, None, None, Some(i64::MIN)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn malformed_content_is_validation_error() {
        let err = handler().save("{not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn alias_content_converts_into_entity() {
        let h: EntityHandler<Gadget, GadgetAlias, _, _> = EntityHandler::new(service());
        let saved = h.save(r#"{"vendor":"acme","model":"x9"}"#).unwrap();
        assert_eq!(saved.price, None);
        assert_eq!(saved.key(), Key::new(["acme", "x9"]));
    }

    #[test]
    fn property_lists_use_the_list_separator() {
        let h = handler();
        h.save(ACME_X1).unwrap();
        assert_eq!(h.names(" price, ,model"), vec!["price", "model"]);
        let values = h.properties("acme;x1", "price,color", None, None).unwrap();
        assert_eq!(values["price"], Value::from(10));
        assert_eq!(values["color"], Value::Null);
    }

    #[test]
    fn history_by_name_and_for_all() {
        let h = handler();
        h.save(ACME_X1).unwrap();
        h.save(r#"{"vendor":"acme","model":"x2"}"#).unwrap();
        h.set_property("acme;x1", "price", "11").unwrap();

        assert_eq!(h.history("acme;x1", None).unwrap().len(), 2);
        assert_eq!(h.history_all(None).unwrap().len(), 3);
        assert_eq!(h.history_all(Some(r#"{"max":1}"#)).unwrap()[0].message, "set_property gadget acme;x1");
    }
}
