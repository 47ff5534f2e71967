pub mod http;
pub mod services;

use chrono::{DateTime, Utc};
use semval::{context::Context as SemvalContext, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate as FieldValidate, ValidationError, ValidationErrors};

use crate::{
    email::{EmailAddress, EmailInvalidity},
    passwords::{Password, PasswordInvalidity},
};

const DEFAULT_CURRENCY: &str = "USD";

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Signup request body.
#[derive(Clone, Debug, Deserialize)]
pub struct NewUserData {
    pub name: String,
    pub email: String,
    pub password: String,
    pub currency: Option<String>,
}

/// A user about to be registered.
#[derive(Debug)]
pub struct NewUser {
    id: Uuid,
    name: String,
    email: EmailAddress,
    password: Password,
    currency: String,
}

impl NewUser {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    pub fn password(&self) -> &Password {
        &self.password
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NewUserInvalidity {
    MissingName,
    Email(EmailInvalidity),
    Password(PasswordInvalidity),
}

impl Validate for NewUser {
    type Invalidity = NewUserInvalidity;

    fn validate(&self) -> ValidationResult<Self::Invalidity> {
        ValidationContext::new()
            .invalidate_if(self.name.is_empty(), NewUserInvalidity::MissingName)
            .validate_with(&self.email, NewUserInvalidity::Email)
            .validate_with(&self.password, NewUserInvalidity::Password)
            .into()
    }
}

impl ValidatedFrom<NewUserData> for NewUser {
    fn validated_from(from: NewUserData) -> ValidatedResult<Self> {
        let into = NewUser {
            id: Uuid::new_v4(),
            name: from.name.trim().to_owned(),
            email: EmailAddress::unvalidated(from.email),
            password: Password::unvalidated(from.password),
            currency: from
                .currency
                .map(|code| code.trim().to_uppercase())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_owned()),
        };

        match into.validate() {
            Ok(()) => Ok(into),
            Err(context) => Err((into, context)),
        }
    }
}

fn field_error(code: &'static str, message: String) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());

    error
}

/// Report signup invalidities in the same shape as any other field
/// validation failure.
pub fn signup_errors(context: SemvalContext<NewUserInvalidity>) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    for invalidity in context.into_iter() {
        match invalidity {
            NewUserInvalidity::MissingName => errors.add(
                "name",
                field_error("required", "A name is required.".to_owned()),
            ),
            NewUserInvalidity::Email(email) => {
                errors.add("email", field_error("email", email.message().to_owned()))
            }
            NewUserInvalidity::Password(password) => {
                errors.add("password", field_error("password", password.message()))
            }
        }
    }

    errors
}

pub fn password_errors(
    field: &'static str,
    context: SemvalContext<PasswordInvalidity>,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for invalidity in context.into_iter() {
        errors.add(field, field_error("password", invalidity.message()));
    }

    errors
}

#[derive(Clone, Debug, Deserialize, FieldValidate)]
pub struct UserUpdateData {
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[validate(length(equal = 3))]
    pub currency: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeData {
    pub current_password: String,
    pub new_password: String,
}

#[cfg(test)]
mod test {
    use super::*;

    fn data() -> NewUserData {
        NewUserData {
            name: " Ada ".to_owned(),
            email: "ada@Example.com".to_owned(),
            password: "CorrectHorseBatteryStaple".to_owned(),
            currency: None,
        }
    }

    #[test]
    fn validated_from_valid() -> anyhow::Result<()> {
        let user = NewUser::validated_from(data()).expect("user should be valid");

        assert_eq!("Ada", user.name());
        assert_eq!("ada@example.com", user.email().normalized());
        assert_eq!("USD", user.currency());

        let hash = user.password().hash()?;
        assert!(Password::unvalidated(data().password).matches_hash(&hash)?);

        Ok(())
    }

    #[test]
    fn invalid_fields_are_all_reported() {
        let (_, context) = NewUser::validated_from(NewUserData {
            name: "  ".to_owned(),
            email: "nobody".to_owned(),
            password: "short".to_owned(),
            currency: Some("eur".to_owned()),
        })
        .expect_err("should be invalid");

        let errors = signup_errors(context);
        let fields = errors.field_errors();

        assert!(fields.contains_key("name"));
        assert_eq!(2, fields["email"].len());
        assert_eq!(
            Some("Passwords must contain at least 8 characters."),
            fields["password"][0].message.as_deref()
        );
    }

    #[test]
    fn currency_is_uppercased() {
        let mut data = data();
        data.currency = Some(" eur".to_owned());

        let user = NewUser::validated_from(data).expect("user should be valid");

        assert_eq!("EUR", user.currency());
    }
}
