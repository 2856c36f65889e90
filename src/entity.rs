use crate::metadata::EntityMap;
use chrono::NaiveDateTime;

/// Identifier carried by an entity that has never been stored
pub const NEW_ID: i64 = -1;

/// Capability: the entity has an integer identifier
pub trait HasId {
    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);

    /// Whether the entity still carries the unsaved sentinel
    fn is_new(&self) -> bool {
        self.id() == NEW_ID
    }
}

/// Capability: creation stamp (`CreatedBy`, `CreatedOn`)
pub trait Controllable {
    fn created_by(&self) -> &str;
    fn set_created_by(&mut self, author: String);
    fn created_on(&self) -> NaiveDateTime;
    fn set_created_on(&mut self, on: NaiveDateTime);
}

/// Capability: edit stamp (`EditedBy`, `EditedOn`) on top of the creation stamp
pub trait Auditable: Controllable {
    fn edited_by(&self) -> &str;
    fn set_edited_by(&mut self, author: String);
    fn edited_on(&self) -> NaiveDateTime;
    fn set_edited_on(&mut self, on: NaiveDateTime);
}

/// Capability: rows are flagged deleted instead of removed
pub trait SoftDeletable {
    fn deleted(&self) -> bool;
    fn set_deleted(&mut self, deleted: bool);
}

/// A type mapped onto a table.
///
/// The mapping table replaces runtime reflection: it lists every persisted
/// property with its descriptor and accessors. The capability accessors default
/// to `None`; an entity overrides the ones it implements so the controller can
/// apply timestamping, soft delete and change history.
pub trait Entity: HasId + Default + Clone + Send + Sync + 'static {
    fn mapping() -> EntityMap<Self>;

    fn as_controllable_mut(&mut self) -> Option<&mut dyn Controllable> {
        None
    }

    fn as_auditable(&self) -> Option<&dyn Auditable> {
        None
    }

    fn as_auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        None
    }

    fn as_soft_deletable_mut(&mut self) -> Option<&mut dyn SoftDeletable> {
        None
    }

    /// Whether change history applies to this type
    fn is_auditable() -> bool {
        Self::default().as_auditable().is_some()
    }
}
