use crate::error::{AppError, AppResult};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Json, Query, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON body extractor that runs `validator` rules before the handler sees it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> AppResult<Self> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Query-string extractor with the same validation behaviour as [`ValidatedJson`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> AppResult<Self> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        value.validate()?;
        Ok(ValidatedQuery(value))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => AppError::UnprocessableContent {
                message: err.body_text(),
            },
            other => AppError::BadRequest {
                message: other.body_text(),
            },
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest {
            message: rejection.body_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, header};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct TestPayload {
        #[validate(range(min = 1, message = "userId must be positive"))]
        user_id: i32,
        #[validate(length(min = 1, max = 20, message = "message must be 1-20 characters"))]
        message: String,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct TestQuery {
        #[validate(range(min = 1, message = "page must be at least 1"))]
        page: Option<u64>,
        is_read: Option<bool>,
    }

    fn json_request(body: &str, content_type: &str) -> Request {
        Request::builder()
            .method(Method::POST)
            .uri("/test")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn query_parts(uri: &str) -> Parts {
        let (parts, _) = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn test_valid_json() {
        let request = json_request(r#"{"user_id": 3, "message": "hello"}"#, "application/json");

        let ValidatedJson(payload) = ValidatedJson::<TestPayload>::from_request(request, &())
            .await
            .unwrap();

        assert_eq!(payload.user_id, 3);
        assert_eq!(payload.message, "hello");
    }

    #[tokio::test]
    async fn test_json_validation_errors_for_every_field() {
        let request = json_request(r#"{"user_id": 0, "message": ""}"#, "application/json");

        let error = ValidatedJson::<TestPayload>::from_request(request, &())
            .await
            .unwrap_err();

        match error {
            AppError::ValidationErrors { errors } => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].field, "message");
                assert_eq!(errors[1].field, "user_id");
                assert_eq!(errors[1].message, "userId must be positive");
            }
            other => panic!("Expected ValidationErrors, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_json_missing_field_is_unprocessable() {
        let request = json_request(r#"{"user_id": 3}"#, "application/json");

        let error = ValidatedJson::<TestPayload>::from_request(request, &())
            .await
            .unwrap_err();

        assert!(matches!(error, AppError::UnprocessableContent { .. }));
    }

    #[tokio::test]
    async fn test_json_syntax_error_is_bad_request() {
        let request = json_request(r#"{"user_id": "#, "application/json");

        let error = ValidatedJson::<TestPayload>::from_request(request, &())
            .await
            .unwrap_err();

        assert!(matches!(error, AppError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn test_json_wrong_content_type_is_bad_request() {
        let request = json_request(r#"{"user_id": 3, "message": "hi"}"#, "text/plain");

        let error = ValidatedJson::<TestPayload>::from_request(request, &())
            .await
            .unwrap_err();

        match error {
            AppError::BadRequest { message } => assert!(!message.is_empty()),
            other => panic!("Expected BadRequest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_valid_query() {
        let mut parts = query_parts("/test?page=2&is_read=false");

        let ValidatedQuery(query) = ValidatedQuery::<TestQuery>::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_eq!(query.page, Some(2));
        assert_eq!(query.is_read, Some(false));
    }

    #[tokio::test]
    async fn test_query_validation_error() {
        let mut parts = query_parts("/test?page=0");

        let error = ValidatedQuery::<TestQuery>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();

        assert!(matches!(error, AppError::ValidationErrors { .. }));
    }

    #[tokio::test]
    async fn test_query_deserialize_error_is_bad_request() {
        let mut parts = query_parts("/test?is_read=maybe");

        let error = ValidatedQuery::<TestQuery>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();

        assert!(matches!(error, AppError::BadRequest { .. }));
    }
}
