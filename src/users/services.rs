use semval::prelude::*;
use serde_json::json;
use tracing::{debug, error, info};
use uuid::Uuid;
use validator::Validate as _;

use crate::{
    currency::Currency,
    email::{EmailAddress, Mailer},
    passwords::Password,
    repos::{users::DEFAULT_ACCOUNT_NAME, DynUserRepo, UserPersistenceError},
    service_err::{ServiceError, ServiceResult},
};

use super::{
    password_errors, signup_errors, NewUser, NewUserData, PasswordChangeData, User,
    UserUpdateData,
};

#[derive(Clone)]
pub struct UserService {
    user_repo: DynUserRepo,
    mailer: Mailer,
}

impl From<UserPersistenceError> for ServiceError {
    fn from(error: UserPersistenceError) -> Self {
        match error {
            UserPersistenceError::DuplicateEmail(_) => {
                Self::Conflict("A user with that email address already exists.".to_owned())
            }
            UserPersistenceError::UnknownCurrency(code) => {
                Self::Invalid(format!("'{}' is not a supported currency.", code))
            }
            UserPersistenceError::Other(error) => Self::Other(error),
        }
    }
}

impl UserService {
    pub fn new(user_repo: DynUserRepo, mailer: Mailer) -> Self {
        Self { user_repo, mailer }
    }

    /// Register a new user along with their starter account and categories,
    /// then send a welcome email.
    ///
    /// A failure to send the email is logged but does not fail the signup.
    pub async fn register(&self, data: NewUserData) -> ServiceResult<User> {
        let new_user = NewUser::validated_from(data)
            .map_err(|(_, context)| ServiceError::InvalidData(signup_errors(context)))?;

        let password_hash = new_user.password().hash()?;
        let user = self
            .user_repo
            .persist_new_user(&new_user, &password_hash)
            .await?;

        info!(user_id = %user.id, "Registered new user.");

        if let Err(error) = self
            .mailer
            .send(
                &user.email,
                "Welcome to Expense Tracker",
                "emails/welcome.txt",
                &json!({ "name": user.name, "account": DEFAULT_ACCOUNT_NAME }),
            )
            .await
        {
            error!(?error, user_id = %user.id, "Failed to send welcome email.");
        }

        Ok(user)
    }

    /// Find the user with the given credentials.
    ///
    /// # Returns
    ///
    /// `None` if there is no such user or the password does not match.
    pub async fn authenticate(&self, email: &str, password: &str) -> ServiceResult<Option<User>> {
        let email = EmailAddress::unvalidated(email.to_owned()).normalized();

        let user = match self.user_repo.get_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                debug!("No user with the provided email.");

                return Ok(None);
            }
        };

        if Password::unvalidated(password.to_owned()).matches_hash(&user.password)? {
            Ok(Some(user))
        } else {
            debug!(user_id = %user.id, "Password did not match.");

            Ok(None)
        }
    }

    pub async fn get_user(&self, user_id: Uuid) -> ServiceResult<User> {
        self.user_repo
            .get_user(user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))
    }

    pub async fn update_user(&self, user_id: Uuid, data: UserUpdateData) -> ServiceResult<User> {
        data.validate()?;

        Ok(self.user_repo.update_user(user_id, &data).await?)
    }

    pub async fn change_password(&self, user_id: Uuid, data: PasswordChangeData) -> ServiceResult<()> {
        let user = self.get_user(user_id).await?;

        if !Password::unvalidated(data.current_password).matches_hash(&user.password)? {
            return Err(ServiceError::Invalid(
                "The current password is incorrect.".to_owned(),
            ));
        }

        let new_password = Password::validated_from(data.new_password.as_str())
            .map_err(|(_, context)| password_errors("newPassword", context))?;

        self.user_repo
            .update_password(user_id, &new_password.hash()?)
            .await?;

        info!(%user_id, "Changed password.");

        Ok(())
    }

    /// The currency amounts are formatted in for a user.
    pub async fn currency_for(&self, user_id: Uuid) -> ServiceResult<Currency> {
        let user = self.get_user(user_id).await?;

        Ok(self
            .user_repo
            .get_currency(&user.currency)
            .await?
            .unwrap_or_else(Currency::usd))
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::{
        email::{clients::testing::RecordingMailer, Templates},
        repos::UserRepo,
    };

    use super::*;

    #[derive(Default)]
    pub(crate) struct FakeUserRepo {
        pub users: Mutex<Vec<User>>,
    }

    impl FakeUserRepo {
        pub(crate) fn with_user(name: &str, email: &str, password: &str) -> (Self, User) {
            let user = User {
                id: Uuid::new_v4(),
                name: name.to_owned(),
                email: email.to_owned(),
                password: Password::unvalidated(password.to_owned()).hash().unwrap(),
                currency: "USD".to_owned(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };

            let repo = Self::default();
            repo.users.lock().unwrap().push(user.clone());

            (repo, user)
        }
    }

    #[async_trait]
    impl UserRepo for FakeUserRepo {
        async fn persist_new_user(
            &self,
            user: &NewUser,
            password_hash: &str,
        ) -> Result<User, UserPersistenceError> {
            let email = user.email().normalized();
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.email == email) {
                return Err(UserPersistenceError::DuplicateEmail(email));
            }

            let saved = User {
                id: user.id(),
                name: user.name().to_owned(),
                email,
                password: password_hash.to_owned(),
                currency: user.currency().to_owned(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            users.push(saved.clone());

            Ok(saved)
        }

        async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == user_id)
                .cloned())
        }

        async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email)
                .cloned())
        }

        async fn update_user(
            &self,
            user_id: Uuid,
            data: &UserUpdateData,
        ) -> Result<User, UserPersistenceError> {
            let mut users = self.users.lock().unwrap();
            let user = users
                .iter_mut()
                .find(|u| u.id == user_id)
                .ok_or_else(|| anyhow::anyhow!("missing user"))?;
            user.name = data.name.clone();
            user.currency = data.currency.clone();

            Ok(user.clone())
        }

        async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
            for user in self.users.lock().unwrap().iter_mut() {
                if user.id == user_id {
                    user.password = password_hash.to_owned();
                }
            }

            Ok(())
        }

        async fn get_currency(&self, code: &str) -> Result<Option<Currency>> {
            Ok((code == "USD").then(Currency::usd))
        }
    }

    fn service(repo: FakeUserRepo, mailer: Arc<RecordingMailer>) -> UserService {
        UserService::new(
            Arc::new(repo),
            Mailer::new(mailer, Templates::new("http://localhost").unwrap()),
        )
    }

    fn signup() -> NewUserData {
        NewUserData {
            name: "Sam".to_owned(),
            email: "sam@Example.com".to_owned(),
            password: "CorrectHorseBatteryStaple".to_owned(),
            currency: None,
        }
    }

    #[tokio::test]
    async fn register_sends_welcome_email() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = service(FakeUserRepo::default(), mailer.clone());

        let user = service.register(signup()).await.unwrap();

        assert_eq!("sam@example.com", user.email);
        let messages = mailer.messages();
        assert_eq!(1, messages.len());
        assert_eq!("sam@example.com", messages[0].to);
        assert!(messages[0].text.contains("\"Cash\" account"));
    }

    #[tokio::test]
    async fn register_survives_mail_failure() {
        let service = service(
            FakeUserRepo::default(),
            Arc::new(RecordingMailer::failing()),
        );

        assert!(service.register(signup()).await.is_ok());
    }

    #[tokio::test]
    async fn register_duplicate_email_conflicts() {
        let service = service(FakeUserRepo::default(), Arc::default());
        service.register(signup()).await.unwrap();

        let result = service.register(signup()).await;

        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn register_rejects_invalid_data() {
        let service = service(FakeUserRepo::default(), Arc::default());
        let mut data = signup();
        data.password = "short".to_owned();

        let result = service.register(data).await;

        match result {
            Err(ServiceError::InvalidData(errors)) => {
                assert!(errors.field_errors().contains_key("password"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn authenticate_checks_password() {
        let (repo, user) = FakeUserRepo::with_user("Sam", "sam@example.com", "hunter2hunter2");
        let service = service(repo, Arc::default());

        let found = service
            .authenticate("sam@EXAMPLE.com", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(Some(user.id), found.map(|u| u.id));

        let wrong = service
            .authenticate("sam@example.com", "not-the-password")
            .await
            .unwrap();
        assert_eq!(None, wrong);
    }

    #[tokio::test]
    async fn change_password_requires_current_password() {
        let (repo, user) = FakeUserRepo::with_user("Sam", "sam@example.com", "hunter2hunter2");
        let service = service(repo, Arc::default());

        let result = service
            .change_password(
                user.id,
                PasswordChangeData {
                    current_password: "wrong-password".to_owned(),
                    new_password: "a-much-better-password".to_owned(),
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Invalid(_))));

        service
            .change_password(
                user.id,
                PasswordChangeData {
                    current_password: "hunter2hunter2".to_owned(),
                    new_password: "a-much-better-password".to_owned(),
                },
            )
            .await
            .unwrap();

        let found = service
            .authenticate("sam@example.com", "a-much-better-password")
            .await
            .unwrap();
        assert!(found.is_some());
    }
}
