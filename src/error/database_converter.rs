use crate::error::AppError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Utility for converting database errors to structured AppError variants.
pub struct DatabaseErrorConverter;

impl DatabaseErrorConverter {
    /// Converts a Diesel error to an appropriate AppError variant.
    ///
    /// # Arguments
    /// * `error` - The Diesel error to convert
    /// * `operation` - Description of the database operation that failed
    pub fn convert_diesel_error(error: DieselError, operation: &str) -> AppError {
        match error {
            DieselError::DatabaseError(kind, info) => {
                Self::convert_database_error(kind, info.as_ref(), operation)
            }
            DieselError::NotFound => AppError::NotFound {
                entity: "resource".to_string(),
                field: "id".to_string(),
                value: "unknown".to_string(),
            },
            other => AppError::Database {
                operation: operation.to_string(),
                source: anyhow::Error::from(other),
            },
        }
    }

    fn convert_database_error(
        kind: DatabaseErrorKind,
        info: &(dyn diesel::result::DatabaseErrorInformation + Send + Sync),
        operation: &str,
    ) -> AppError {
        let message = info.message();

        match kind {
            DatabaseErrorKind::NotNullViolation => match info.column_name() {
                Some(column) => AppError::Validation {
                    field: column.to_string(),
                    reason: "Field is required".to_string(),
                },
                None => Self::database(operation, "Not null constraint violation", message),
            },
            DatabaseErrorKind::CheckViolation => {
                match info.constraint_name().and_then(Self::field_from_check_constraint) {
                    Some(field) => AppError::Validation {
                        field,
                        reason: format!("Check constraint failed: {}", message),
                    },
                    None => Self::database(operation, "Check constraint violation", message),
                }
            }
            DatabaseErrorKind::ClosedConnection => AppError::ConnectionPool {
                source: anyhow::Error::msg(message.to_string()),
            },
            _ => Self::database(operation, "Database error", message),
        }
    }

    /// Extracts the column from a Postgres default check constraint name
    /// such as `notifications_user_id_check`.
    fn field_from_check_constraint(constraint: &str) -> Option<String> {
        let body = constraint.strip_suffix("_check")?;
        let (_, field) = body.split_once('_')?;
        (!field.is_empty()).then(|| field.to_string())
    }

    fn database(operation: &str, label: &str, message: &str) -> AppError {
        AppError::Database {
            operation: operation.to_string(),
            source: anyhow::Error::msg(format!("{}: {}", label, message)),
        }
    }
}
