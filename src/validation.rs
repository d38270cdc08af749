use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::errors::{AppError, FieldError};

/// ValidatedJson
///
/// JSON body extractor that runs the payload's `validator` rules before the handler
/// sees it. Malformed JSON and rule violations both reject with `AppError::Validation`,
/// so no handler ever touches storage with unchecked input.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                AppError::Validation(vec![FieldError::new("body", rejection.body_text())])
            })?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// ValidatedQuery
///
/// Query-string counterpart of `ValidatedJson`.
#[derive(Debug, Clone)]
pub struct ValidatedQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                AppError::Validation(vec![FieldError::new("query", rejection.body_text())])
            })?;
        value.validate()?;
        Ok(ValidatedQuery(value))
    }
}

/// IdPath
///
/// The `{id}` segment of a resource route, required to be a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdPath(pub i32);

impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let invalid = || AppError::Validation(vec![FieldError::new("id", "must be a positive integer")]);
        let Path(id) = Path::<i32>::from_request_parts(parts, state)
            .await
            .map_err(|_| invalid())?;
        if id < 1 {
            return Err(invalid());
        }
        Ok(IdPath(id))
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details = Vec::new();
        collect("", &errors, &mut details);
        details.sort_by(|a, b| a.field.cmp(&b.field).then_with(|| a.message.cmp(&b.message)));
        AppError::Validation(details)
    }
}

fn collect(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                out.extend(list.iter().map(|e| FieldError::new(path.clone(), describe(e))));
            }
            ValidationErrorsKind::Struct(inner) => collect(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(&format!("{path}[{index}]"), inner, out);
                }
            }
        }
    }
}

/// Human-readable message for a single rule violation. Explicit `message = ...`
/// attributes win; otherwise the rule code picks a generic sentence.
fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    match error.code.as_ref() {
        "email" => "must be a valid email address".to_string(),
        "length" => "has an invalid length".to_string(),
        "range" => "is out of range".to_string(),
        "required" => "is required".to_string(),
        other => format!("failed the {other} check"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Signup {
        #[validate(email)]
        email: String,
        #[validate(length(min = 3, message = "must have at least 3 characters"))]
        nome: String,
    }

    #[test]
    fn every_violated_rule_becomes_one_field_error() {
        let signup = Signup {
            email: "not-an-email".to_string(),
            nome: "Jo".to_string(),
        };
        let err: AppError = signup.validate().unwrap_err().into();
        assert_eq!(
            err,
            AppError::Validation(vec![
                FieldError::new("email", "must be a valid email address"),
                FieldError::new("nome", "must have at least 3 characters"),
            ])
        );
    }

    #[test]
    fn valid_payload_passes() {
        let signup = Signup {
            email: "harry@hogwarts.edu".to_string(),
            nome: "Harry".to_string(),
        };
        assert!(signup.validate().is_ok());
    }
}
