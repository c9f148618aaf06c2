//! Permission guarding each kind of change.
//!
//! Routers that do not pass an explicit permission derive it here, before the
//! mutation is applied.

use dcim_audit::{ActionKind, Mutation};
use dcim_auth::Permission;
use dcim_core::EntityKind;

/// Permission required to `action` an entity of `kind`, if the kind is guarded.
pub fn required_permission(kind: EntityKind, action: ActionKind) -> Option<Permission> {
    use ActionKind::*;
    use EntityKind::*;

    let perm = match (kind, action) {
        (Device, Create) => Permission::DeviceCreate,
        (Device, Update) => Permission::DeviceUpdate,
        (Device, Delete) => Permission::DeviceDelete,
        (Rack, Create) => Permission::RackCreate,
        (Rack, Update) => Permission::RackUpdate,
        (Rack, Delete) => Permission::RackDelete,
        (Location, Create) => Permission::LocationCreate,
        (Location, Update) => Permission::LocationUpdate,
        (Location, Delete) => Permission::LocationDelete,
        (User, _) => Permission::UserManage,
        (Manufacturer | Model, _) => return None,
    };
    Some(perm)
}

/// Permission required to apply `mutation`.
pub fn permission_for(mutation: &Mutation) -> Option<Permission> {
    required_permission(mutation.target.kind, mutation.action)
}
