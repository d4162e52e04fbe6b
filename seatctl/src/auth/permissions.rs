//! Role-based permissions.
//!
//! `*All` operations act on every record of a resource, `*Own` operations only on the caller's
//! own records. Ownership itself is enforced where the record is loaded (for example the
//! reservation service refuses to cancel someone else's reservation).

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::trace;

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    db::store::Database,
    errors::{Error, Result},
    types::{Operation, Permission, Resource},
};

const USER_PERMISSIONS: &[(Resource, Operation)] = &[
    (Resource::Concerts, Operation::ReadAll),
    (Resource::Reservations, Operation::CreateOwn),
    (Resource::Reservations, Operation::ReadOwn),
    (Resource::Reservations, Operation::DeleteOwn),
];

/// Whether `role` grants `operation` on `resource`.
pub fn role_has_permission(role: Role, resource: Resource, operation: Operation) -> bool {
    match role {
        Role::Admin => true,
        Role::User => USER_PERMISSIONS.contains(&(resource, operation)),
    }
}

pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    role_has_permission(user.role, resource, operation)
}

/// Fail with `InsufficientPermissions` unless `user` may perform `operation` on `resource`.
pub fn require_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> Result<()> {
    if has_permission(user, resource, operation) {
        return Ok(());
    }
    Err(Error::InsufficientPermissions {
        required: Permission::Allow(resource, operation),
        action: operation,
        resource: resource.to_string(),
    })
}

/// Type-level resources for [`RequiresPermission`].
pub mod resource {
    use crate::types::Resource;

    pub trait ResourceMarker: Send + Sync + 'static {
        const RESOURCE: Resource;
    }

    pub struct Concerts;
    pub struct Reservations;

    impl ResourceMarker for Concerts {
        const RESOURCE: Resource = Resource::Concerts;
    }

    impl ResourceMarker for Reservations {
        const RESOURCE: Resource = Resource::Reservations;
    }
}

/// Type-level operations for [`RequiresPermission`].
pub mod operation {
    use crate::types::Operation;

    pub trait OperationMarker: Send + Sync + 'static {
        const OPERATION: Operation;
    }

    macro_rules! operation_markers {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;

                impl OperationMarker for $name {
                    const OPERATION: Operation = Operation::$name;
                }
            )*
        };
    }

    operation_markers!(CreateAll, CreateOwn, ReadAll, ReadOwn, UpdateAll, DeleteAll, DeleteOwn);
}

/// Extractor that authenticates the caller and checks a permission before the handler runs.
///
/// ```ignore
/// async fn delete_concert<D: Database>(
///     State(state): State<AppState<D>>,
///     _: RequiresPermission<resource::Concerts, operation::DeleteAll>,
///     Path(id): Path<ConcertId>,
/// ) -> Result<StatusCode> { ... }
/// ```
pub struct RequiresPermission<R, O> {
    pub user: CurrentUser,
    _marker: PhantomData<fn() -> (R, O)>,
}

impl<D, R, O> FromRequestParts<AppState<D>> for RequiresPermission<R, O>
where
    D: Database,
    R: resource::ResourceMarker,
    O: operation::OperationMarker,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState<D>) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        trace!(resource = %R::RESOURCE, operation = ?O::OPERATION, "Checking permission");
        require_permission(&user, R::RESOURCE, O::OPERATION)?;
        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}
