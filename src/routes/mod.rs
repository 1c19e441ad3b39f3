/// Router Module Index
///
/// Routes are grouped by the access level they require. Each group gets its
/// guard as a route layer in `create_router`, so a handler can never be
/// mounted without the check that belongs to it.

/// Routes open to anonymous clients: health and the login/registration gateway.
pub mod public;

/// Routes requiring a valid token (any role), and the read-only catalogue
/// routes requiring `ROLE_ADMIN` or `ROLE_USER`.
pub mod authenticated;

/// Mutating catalogue routes restricted to `ROLE_ADMIN`.
pub mod admin;
