pub mod clients;
mod templates;

use std::sync::Arc;

use semval::prelude::*;
use serde::Serialize;

pub use templates::Templates;

use self::clients::{EmailClient, Message};

/// Renders templated emails and hands them to an [`EmailClient`].
#[derive(Clone)]
pub struct Mailer {
    client: Arc<dyn EmailClient>,
    templates: Templates,
}

impl Mailer {
    pub fn new(client: Arc<dyn EmailClient>, templates: Templates) -> Self {
        Self { client, templates }
    }

    /// Render `template` with `values` and send the result to `to`.
    pub async fn send<T: Serialize + Sync>(
        &self,
        to: &str,
        subject: impl Into<String>,
        template: &str,
        values: &T,
    ) -> anyhow::Result<()> {
        let message = Message {
            to: to.to_owned(),
            subject: subject.into(),
            text: self.templates.render(template, values)?,
        };

        self.client.send(&message).await
    }
}

/// An email address provided by a user.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create an unvalidated address.
    ///
    /// Useful when the address is part of a larger object that is validated
    /// as a whole.
    pub fn unvalidated(address: String) -> Self {
        Self(address.trim().to_owned())
    }

    pub fn address(&self) -> &str {
        &self.0
    }

    /// The address used for lookups and uniqueness.
    ///
    /// Email addresses may have multiple "@" symbols, and the last one
    /// delimits the local part from the domain. Only the domain is treated
    /// as case insensitive.
    pub fn normalized(&self) -> String {
        match self.0.rsplit_once('@') {
            Some((local_part, domain)) => format!("{}@{}", local_part, domain.to_lowercase()),
            None => self.0.clone(),
        }
    }

    fn has_domain(&self) -> bool {
        match self.0.rsplit_once('@') {
            Some((_, domain)) => !domain.is_empty(),
            None => false,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EmailInvalidity {
    /// The address does not have a domain portion.
    MissingDomain,

    /// The address is missing the `@` symbol separating the local and domain
    /// parts.
    MissingSeparator,
}

impl EmailInvalidity {
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingDomain => "Email is missing a domain.",
            Self::MissingSeparator => "Email is missing an '@' symbol.",
        }
    }
}

impl Validate for EmailAddress {
    type Invalidity = EmailInvalidity;

    fn validate(&self) -> ValidationResult<Self::Invalidity> {
        ValidationContext::new()
            .invalidate_if(!self.0.contains('@'), EmailInvalidity::MissingSeparator)
            .invalidate_if(!self.has_domain(), EmailInvalidity::MissingDomain)
            .into()
    }
}

impl ValidatedFrom<&str> for EmailAddress {
    fn validated_from(from: &str) -> ValidatedResult<Self> {
        let into = Self::unvalidated(from.to_owned());

        match into.validate() {
            Ok(()) => Ok(into),
            Err(context) => Err((into, context)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validated_from_missing_at_symbol() {
        let (_, context) =
            EmailAddress::validated_from("missing-an-at-symbol").expect_err("missing an @");
        let errors = context.into_iter().collect::<Vec<_>>();

        assert_eq!(2, errors.len());
        assert_eq!(EmailInvalidity::MissingSeparator, errors[0]);
    }

    #[test]
    fn validated_from_missing_domain() {
        let (_, context) = EmailAddress::validated_from("someone@").expect_err("missing a domain");
        let errors = context.into_iter().collect::<Vec<_>>();

        assert_eq!(vec![EmailInvalidity::MissingDomain], errors);
    }

    #[test]
    fn normalizes_only_the_domain() {
        let parsed = EmailAddress::validated_from(" TeSt@ExAmPlE.com ").expect("valid address");

        assert_eq!("TeSt@ExAmPlE.com", parsed.address());
        assert_eq!("TeSt@example.com", parsed.normalized());
    }
}
