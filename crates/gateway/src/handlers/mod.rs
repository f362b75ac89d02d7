//! API handlers module

pub mod health;
pub mod packets;
pub mod queues;
pub mod states;

use ebms_common::errors::AppError;
use validator::Validate;

/// Run the request's declared validation rules
pub(crate) fn validated<T: Validate>(request: T) -> Result<T, AppError> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: e.field_errors().keys().next().map(|f| f.to_string()),
    })?;
    Ok(request)
}
