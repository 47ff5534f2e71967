use chrono::{DateTime, Utc};
use semval::prelude::*;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    accounts::services::AccountService,
    email::{EmailAddress, Mailer},
    repos::DynInvitationRepo,
    service_err::{ServiceError, ServiceResult},
    users::services::UserService,
};

use super::{generate_token, validity, Invitation, NewInvitationData};

#[derive(Clone)]
pub struct InvitationService {
    invitation_repo: DynInvitationRepo,
    account_service: AccountService,
    user_service: UserService,
    mailer: Mailer,
}

impl InvitationService {
    pub fn new(
        invitation_repo: DynInvitationRepo,
        account_service: AccountService,
        user_service: UserService,
        mailer: Mailer,
    ) -> Self {
        Self {
            invitation_repo,
            account_service,
            user_service,
            mailer,
        }
    }

    /// Invite someone by email to share an account. Only the account's owner
    /// may invite.
    pub async fn invite(
        &self,
        inviter_id: Uuid,
        account_id: Uuid,
        data: NewInvitationData,
        now: DateTime<Utc>,
    ) -> ServiceResult<Invitation> {
        let account = self
            .account_service
            .get_owned_account(inviter_id, account_id)
            .await?;
        let inviter = self.user_service.get_user(inviter_id).await?;

        let email = EmailAddress::validated_from(data.email.as_str())
            .map_err(|(_, context)| {
                let reason = context
                    .into_iter()
                    .next()
                    .map_or("Invalid email address.", |invalidity| invalidity.message());

                ServiceError::Invalid(reason.to_owned())
            })?
            .normalized();

        if inviter.email.eq_ignore_ascii_case(&email) {
            return Err(ServiceError::Invalid("You cannot invite yourself.".to_owned()));
        }

        let members = self.account_service.list_members(inviter_id, account_id).await?;
        if members.iter().any(|m| m.email.eq_ignore_ascii_case(&email)) {
            return Err(ServiceError::Invalid(
                "That person is already a member of this account.".to_owned(),
            ));
        }

        let invitation = self
            .invitation_repo
            .create_invitation(account_id, inviter_id, &email, &generate_token(), now + validity())
            .await?;

        info!(invitation_id = %invitation.id, %account_id, "Created invitation.");

        if let Err(error) = self
            .mailer
            .send(
                &email,
                format!("{} invited you to share \"{}\"", inviter.name, account.account.name),
                "emails/invitation.txt",
                &json!({
                    "inviter": inviter.name,
                    "account": account.account.name,
                    "token": invitation.token,
                    "expires_at": invitation.expires_at.format("%B %-d, %Y").to_string(),
                }),
            )
            .await
        {
            error!(?error, invitation_id = %invitation.id, "Failed to send invitation email.");
        }

        Ok(invitation)
    }

    /// Pending invitations addressed to the user.
    pub async fn list_received(&self, user_id: Uuid) -> ServiceResult<Vec<Invitation>> {
        let user = self.user_service.get_user(user_id).await?;

        Ok(self.invitation_repo.list_for_email(&user.email).await?)
    }

    /// Invitations sent for an account the user owns.
    pub async fn list_sent(&self, user_id: Uuid, account_id: Uuid) -> ServiceResult<Vec<Invitation>> {
        self.account_service
            .get_owned_account(user_id, account_id)
            .await?;

        Ok(self.invitation_repo.list_for_account(account_id).await?)
    }

    /// Find an invitation the user may answer right now.
    async fn answerable(&self, user_id: Uuid, token: &str, now: DateTime<Utc>) -> ServiceResult<Invitation> {
        let invitation = self
            .invitation_repo
            .get_by_token(token)
            .await?
            .ok_or(ServiceError::NotFound("Invitation"))?;
        let user = self.user_service.get_user(user_id).await?;

        if !invitation.is_addressed_to(&user.email) {
            return Err(ServiceError::Forbidden);
        }

        invitation
            .check_can_respond(now)
            .map_err(|blocker| ServiceError::Invalid(blocker.message()))?;

        Ok(invitation)
    }

    pub async fn accept(&self, user_id: Uuid, token: &str, now: DateTime<Utc>) -> ServiceResult<Invitation> {
        let invitation = self.answerable(user_id, token, now).await?;
        let invitation = self.invitation_repo.accept(&invitation, user_id).await?;

        info!(invitation_id = %invitation.id, account_id = %invitation.account_id, %user_id, "Accepted invitation.");

        Ok(invitation)
    }

    pub async fn decline(&self, user_id: Uuid, token: &str, now: DateTime<Utc>) -> ServiceResult<Invitation> {
        let invitation = self.answerable(user_id, token, now).await?;

        Ok(self.invitation_repo.decline(&invitation).await?)
    }

    /// Revoke an invitation. Only the person who sent it may do so.
    pub async fn revoke(&self, user_id: Uuid, invitation_id: Uuid) -> ServiceResult<()> {
        let invitation = self
            .invitation_repo
            .get_invitation(invitation_id)
            .await?
            .ok_or(ServiceError::NotFound("Invitation"))?;

        if invitation.inviter_id != user_id {
            return Err(ServiceError::NotFound("Invitation"));
        }

        self.invitation_repo
            .delete_invitation(invitation_id)
            .await?;

        Ok(())
    }
}
