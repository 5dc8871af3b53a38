//! Access policies: ordered guard lists evaluated by a single dispatcher.
//!
//! Every protected handler names the [`Policy`] it runs under and calls
//! [`Policy::authorize`] before touching its payload or the store. Guards run
//! in declaration order and the first failure ends evaluation, so later
//! guards (and the operation itself) never run.

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    auth::claims::{Principal, Role},
    enrollments::repo::EnrollmentStore,
};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("requires role `{required}`")]
    Forbidden { required: Role },
    #[error("not enrolled in course {course_id}")]
    NotEnrolled { course_id: Uuid },
    #[error("malformed resource reference `{0}`")]
    MalformedResourceReference(String),
    #[error("enrollment lookup failed")]
    StorageUnavailable(#[source] anyhow::Error),
}

/// A single predicate over the Principal and the addressed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Passes iff a Principal was resolved.
    Authenticated,
    /// Passes iff the Principal carries exactly this role.
    Role(Role),
    /// Passes iff the Principal is enrolled in the addressed course, or is an
    /// admin.
    Enrollment,
}

/// What a passed policy established about the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Access {
    /// Course parsed by the enrollment guard, when the policy has one.
    pub course_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy)]
pub struct Policy {
    name: &'static str,
    guards: &'static [Guard],
}

pub const AUTHENTICATED: Policy = Policy::new("authenticated", &[Guard::Authenticated]);
pub const ADMIN_ONLY: Policy = Policy::new(
    "admin_only",
    &[Guard::Authenticated, Guard::Role(Role::Admin)],
);
pub const ENROLLED: Policy = Policy::new("enrolled", &[Guard::Authenticated, Guard::Enrollment]);

impl Policy {
    pub const fn new(name: &'static str, guards: &'static [Guard]) -> Self {
        Self { name, guards }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn guards(&self) -> &'static [Guard] {
        self.guards
    }

    /// Runs the guards in order against the Principal and the raw course
    /// identifier taken from the request path.
    pub async fn authorize(
        &self,
        principal: Option<&Principal>,
        course_ref: Option<&str>,
        enrollments: &dyn EnrollmentStore,
    ) -> Result<Access, PolicyError> {
        let mut access = Access::default();
        for guard in self.guards {
            if let Err(e) = guard
                .check(principal, course_ref, enrollments, &mut access)
                .await
            {
                warn!(policy = self.name, guard = ?guard, error = %e, "access denied");
                return Err(e);
            }
        }
        debug!(policy = self.name, "access granted");
        Ok(access)
    }
}

impl Guard {
    async fn check(
        &self,
        principal: Option<&Principal>,
        course_ref: Option<&str>,
        enrollments: &dyn EnrollmentStore,
        access: &mut Access,
    ) -> Result<(), PolicyError> {
        let principal = principal.ok_or(PolicyError::Unauthenticated)?;
        match *self {
            Guard::Authenticated => Ok(()),
            Guard::Role(required) => {
                if principal.role == required {
                    Ok(())
                } else {
                    Err(PolicyError::Forbidden { required })
                }
            }
            Guard::Enrollment => {
                let raw = course_ref.unwrap_or_default();
                let course_id = parse_resource_id(raw)?;
                access.course_id = Some(course_id);
                if principal.is_admin() {
                    return Ok(());
                }
                match enrollments.exists(principal.user_id, course_id).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(PolicyError::NotEnrolled { course_id }),
                    Err(e) => Err(PolicyError::StorageUnavailable(e.into())),
                }
            }
        }
    }
}

/// Parses a path identifier, rejecting blanks and non-UUIDs.
pub fn parse_resource_id(raw: &str) -> Result<Uuid, PolicyError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| PolicyError::MalformedResourceReference(raw.to_string()))
}
