use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    database::PostgresConnection,
    invitations::{Invitation, InvitationStatus},
};

pub type DynInvitationRepo = Arc<dyn InvitationRepo + Send + Sync>;

#[async_trait]
pub trait InvitationRepo {
    async fn create_invitation(
        &self,
        account_id: Uuid,
        inviter_id: Uuid,
        invitee_email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Invitation>;

    /// Pending, unexpired invitations addressed to an email.
    async fn list_for_email(&self, email: &str) -> Result<Vec<Invitation>>;

    /// Every invitation sent for an account.
    async fn list_for_account(&self, account_id: Uuid) -> Result<Vec<Invitation>>;

    async fn get_by_token(&self, token: &str) -> Result<Option<Invitation>>;

    async fn get_invitation(&self, invitation_id: Uuid) -> Result<Option<Invitation>>;

    /// Mark the invitation accepted and add the user to the account.
    async fn accept(&self, invitation: &Invitation, user_id: Uuid) -> Result<Invitation>;

    async fn decline(&self, invitation: &Invitation) -> Result<Invitation>;

    async fn delete_invitation(&self, invitation_id: Uuid) -> Result<()>;
}

const SELECT_INVITATION: &str = r#"
    SELECT i.*, a.name AS account_name, u.name AS inviter_name
    FROM invitation i
        JOIN account a ON a.id = i.account_id
        JOIN "user" u ON u.id = i.inviter_id
"#;

impl PostgresConnection {
    async fn set_status(
        &self,
        invitation_id: Uuid,
        status: InvitationStatus,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<Invitation> {
        Ok(sqlx::query_as::<_, Invitation>(
            r#"
            UPDATE invitation
            SET status = $2, responded_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(invitation_id)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?)
    }
}

#[async_trait]
impl InvitationRepo for PostgresConnection {
    async fn create_invitation(
        &self,
        account_id: Uuid,
        inviter_id: Uuid,
        invitee_email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Invitation> {
        Ok(sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitation (account_id, inviter_id, invitee_email, token, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(inviter_id)
        .bind(invitee_email)
        .bind(token)
        .bind(expires_at)
        .fetch_one(&**self)
        .await?)
    }

    async fn list_for_email(&self, email: &str) -> Result<Vec<Invitation>> {
        let query = format!(
            r#"
            {}
            WHERE LOWER(i.invitee_email) = LOWER($1)
                AND i.status = 'pending'
                AND i.expires_at > NOW()
            ORDER BY i.created_at DESC
            "#,
            SELECT_INVITATION
        );

        Ok(sqlx::query_as::<_, Invitation>(&query)
            .bind(email)
            .fetch_all(&**self)
            .await?)
    }

    async fn list_for_account(&self, account_id: Uuid) -> Result<Vec<Invitation>> {
        let query = format!(
            r#"
            {}
            WHERE i.account_id = $1
            ORDER BY i.created_at DESC
            "#,
            SELECT_INVITATION
        );

        Ok(sqlx::query_as::<_, Invitation>(&query)
            .bind(account_id)
            .fetch_all(&**self)
            .await?)
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Invitation>> {
        let query = format!("{} WHERE i.token = $1", SELECT_INVITATION);

        Ok(sqlx::query_as::<_, Invitation>(&query)
            .bind(token)
            .fetch_optional(&**self)
            .await?)
    }

    async fn get_invitation(&self, invitation_id: Uuid) -> Result<Option<Invitation>> {
        let query = format!("{} WHERE i.id = $1", SELECT_INVITATION);

        Ok(sqlx::query_as::<_, Invitation>(&query)
            .bind(invitation_id)
            .fetch_optional(&**self)
            .await?)
    }

    async fn accept(&self, invitation: &Invitation, user_id: Uuid) -> Result<Invitation> {
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO account_member (account_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(invitation.account_id)
        .bind(user_id)
        .execute(&mut tx)
        .await?;

        let accepted = self
            .set_status(invitation.id, InvitationStatus::Accepted, &mut tx)
            .await?;

        tx.commit().await?;

        Ok(accepted)
    }

    async fn decline(&self, invitation: &Invitation) -> Result<Invitation> {
        let mut tx = self.begin().await?;
        let declined = self
            .set_status(invitation.id, InvitationStatus::Declined, &mut tx)
            .await?;
        tx.commit().await?;

        Ok(declined)
    }

    async fn delete_invitation(&self, invitation_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM invitation
            WHERE id = $1
            "#,
        )
        .bind(invitation_id)
        .execute(&**self)
        .await?;

        Ok(())
    }
}
