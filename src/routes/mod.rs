/// Router Module Index
///
/// Splits the API surface by access requirement. Both routers are nested under
/// `/api` in `create_router`. Page paths are not listed here: they fall
/// through to the page gate, which applies the route table.

/// Routes open to anonymous visitors.
pub mod public;

/// Routes that require a resolved identity (`AuthUser`).
pub mod authenticated;
