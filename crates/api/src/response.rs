//! Response envelope shared by every API handler.

use serde::Serialize;

/// The `{ "data": T }` envelope.
///
/// Success bodies always wrap their payload here; error bodies carry
/// `{ "error", "code" }` instead (see [`crate::error::AppError`]).
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
