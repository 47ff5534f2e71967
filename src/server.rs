use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    extract::FromRef,
    http::{header, HeaderValue, Method},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    accounts::services::AccountService,
    ai::{
        client::{ChatClient, OpenAiClient},
        services::AiService,
        Toolbox,
    },
    analytics::services::AnalyticsService,
    authentication::SessionKeys,
    budgets::services::BudgetService,
    categories::services::CategoryService,
    database::PostgresConnection,
    debts::services::DebtService,
    email::{
        clients::{ConsoleMailer, EmailClient, FromAddress, SendgridMailer},
        Mailer, Templates,
    },
    goals::services::GoalService,
    investments::services::InvestmentService,
    invitations::services::InvitationService,
    notifications::{self, NotificationService, SweepReport},
    rate_limit::{MemoryRateLimiter, RateLimiter, RedisRateLimiter},
    reports::services::ReportService,
    transactions::services::TransactionService,
    users::services::UserService,
};

pub struct DatabaseOptions {
    pub pool_size: u32,
    pub timeout_seconds: u8,
    pub url: String,
}

pub struct EmailOptions {
    pub from_address: String,
    pub from_name: String,
    pub sendgrid_key: Option<String>,
    /// Base URL of the web application, used for links in emails.
    pub app_url: String,
}

pub struct AiOptions {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

pub struct Options {
    pub database: DatabaseOptions,
    pub email: EmailOptions,
    pub ai: AiOptions,

    pub bind_address: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub notification_interval: Duration,
    pub redis_url: Option<String>,
    pub secret_key: String,
    pub session_days: u32,
}

#[derive(Clone)]
pub struct AppState {
    session_keys: SessionKeys,
    rate_limiter: Arc<dyn RateLimiter>,

    account_service: AccountService,
    ai_service: AiService,
    analytics_service: AnalyticsService,
    budget_service: BudgetService,
    category_service: CategoryService,
    debt_service: DebtService,
    goal_service: GoalService,
    investment_service: InvestmentService,
    invitation_service: InvitationService,
    report_service: ReportService,
    transaction_service: TransactionService,
    user_service: UserService,
}

fn mailer(opts: &EmailOptions) -> anyhow::Result<Mailer> {
    let from = FromAddress {
        name: opts.from_name.clone(),
        address: opts.from_address.clone(),
    };

    let client: Arc<dyn EmailClient> = match &opts.sendgrid_key {
        Some(api_key) => Arc::new(SendgridMailer::new(api_key.clone(), from)),
        None => {
            warn!("No SendGrid key provided. Emails will be printed to stdout.");

            Arc::new(ConsoleMailer::new(from))
        }
    };

    Ok(Mailer::new(client, Templates::new(opts.app_url.as_str())?))
}

fn rate_limiter(redis_url: Option<&str>) -> anyhow::Result<Arc<dyn RateLimiter>> {
    match redis_url {
        Some(url) => Ok(Arc::new(RedisRateLimiter::new(url)?)),
        None => {
            info!("No Redis URL provided. Rate limits are tracked in memory.");

            Ok(Arc::new(MemoryRateLimiter::new()))
        }
    }
}

pub type DynChatClient = Arc<dyn ChatClient + Send + Sync>;

fn chat_client(opts: &AiOptions) -> anyhow::Result<Option<DynChatClient>> {
    let api_key = match &opts.api_key {
        Some(api_key) => api_key.clone(),
        None => {
            info!("No AI key provided. The assistant is disabled.");

            return Ok(None);
        }
    };

    let client = OpenAiClient::new(&opts.base_url, api_key, opts.model.clone())
        .context("Failed to build assistant HTTP client.")?;

    Ok(Some(Arc::new(client)))
}

fn cors(allowed_origins: &[String]) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE]);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid allowed origin: {}", origin))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(layer.allow_origin(origins))
}

fn routes() -> Router<AppState> {
    Router::new()
        .merge(crate::accounts::http::routes())
        .merge(crate::ai::http::routes())
        .merge(crate::analytics::http::routes())
        .merge(crate::authentication::http::routes())
        .merge(crate::budgets::http::routes())
        .merge(crate::categories::http::routes())
        .merge(crate::debts::http::routes())
        .merge(crate::goals::http::routes())
        .merge(crate::investments::http::routes())
        .merge(crate::invitations::http::routes())
        .merge(crate::reports::http::routes())
        .merge(crate::transactions::http::routes())
        .merge(crate::users::http::routes())
}

/// The external pieces an [`AppState`] is assembled from.
pub struct Dependencies {
    pub db: PostgresConnection,
    pub mailer: Mailer,
    pub session_keys: SessionKeys,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub chat_client: Option<DynChatClient>,
}

pub fn build_state(deps: Dependencies) -> AppState {
    let Dependencies {
        db,
        mailer,
        session_keys,
        rate_limiter,
        chat_client,
    } = deps;

    let account_service = AccountService::new(Arc::new(db.clone()));
    let category_service = CategoryService::new(Arc::new(db.clone()));
    let user_service = UserService::new(Arc::new(db.clone()), mailer.clone());
    let transaction_service = TransactionService::new(
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        account_service.clone(),
    );
    let analytics_service = AnalyticsService::new(Arc::new(db.clone()));
    let budget_service = BudgetService::new(Arc::new(db.clone()), Arc::new(db.clone()));
    let goal_service = GoalService::new(Arc::new(db.clone()), account_service.clone());
    let debt_service = DebtService::new(Arc::new(db.clone()));

    let toolbox = Toolbox {
        account_service: account_service.clone(),
        category_service: category_service.clone(),
        transaction_service: transaction_service.clone(),
        analytics_service: analytics_service.clone(),
        budget_service: budget_service.clone(),
        goal_service: goal_service.clone(),
        debt_service: debt_service.clone(),
    };

    AppState {
        session_keys,
        rate_limiter,

        ai_service: AiService::new(Arc::new(db.clone()), chat_client, toolbox),
        investment_service: InvestmentService::new(Arc::new(db.clone())),
        invitation_service: InvitationService::new(
            Arc::new(db.clone()),
            account_service.clone(),
            user_service.clone(),
            mailer,
        ),
        report_service: ReportService::new(
            Arc::new(db),
            category_service.clone(),
            account_service.clone(),
            user_service.clone(),
        ),

        account_service,
        analytics_service,
        budget_service,
        category_service,
        debt_service,
        goal_service,
        transaction_service,
        user_service,
    }
}

/// Every route with CORS and request tracing applied.
pub fn app_router(state: AppState, allowed_origins: &[String]) -> anyhow::Result<Router> {
    Ok(routes()
        .with_state(state)
        .layer(cors(allowed_origins)?)
        .layer(TraceLayer::new_for_http()))
}

pub async fn serve(opts: Options) -> anyhow::Result<()> {
    let db = PostgresConnection::connect(&opts.database).await?;
    let mailer = mailer(&opts.email)?;

    let state = build_state(Dependencies {
        db: db.clone(),
        mailer: mailer.clone(),
        session_keys: SessionKeys::new(
            opts.secret_key.as_bytes(),
            chrono::Duration::days(opts.session_days.into()),
        ),
        rate_limiter: rate_limiter(opts.redis_url.as_deref())?,
        chat_client: chat_client(&opts.ai)?,
    });

    notifications::scheduler::spawn(
        NotificationService::new(Arc::new(db), mailer),
        opts.notification_interval,
    );

    let app = app_router(state, &opts.allowed_origins)?;

    info!(address = %opts.bind_address, "Starting server.");

    axum::Server::bind(&opts.bind_address)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}

/// Run a single notification sweep.
pub async fn notify(
    database: DatabaseOptions,
    email: EmailOptions,
) -> anyhow::Result<SweepReport> {
    let db = PostgresConnection::connect(&database).await?;
    let service = NotificationService::new(Arc::new(db), mailer(&email)?);

    Ok(service.sweep(chrono::Utc::now().date_naive()).await)
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        state.session_keys.clone()
    }
}

impl FromRef<AppState> for Arc<dyn RateLimiter> {
    fn from_ref(state: &AppState) -> Self {
        state.rate_limiter.clone()
    }
}

impl FromRef<AppState> for AccountService {
    fn from_ref(state: &AppState) -> Self {
        state.account_service.clone()
    }
}

impl FromRef<AppState> for AiService {
    fn from_ref(state: &AppState) -> Self {
        state.ai_service.clone()
    }
}

impl FromRef<AppState> for AnalyticsService {
    fn from_ref(state: &AppState) -> Self {
        state.analytics_service.clone()
    }
}

impl FromRef<AppState> for BudgetService {
    fn from_ref(state: &AppState) -> Self {
        state.budget_service.clone()
    }
}

impl FromRef<AppState> for CategoryService {
    fn from_ref(state: &AppState) -> Self {
        state.category_service.clone()
    }
}

impl FromRef<AppState> for DebtService {
    fn from_ref(state: &AppState) -> Self {
        state.debt_service.clone()
    }
}

impl FromRef<AppState> for GoalService {
    fn from_ref(state: &AppState) -> Self {
        state.goal_service.clone()
    }
}

impl FromRef<AppState> for InvestmentService {
    fn from_ref(state: &AppState) -> Self {
        state.investment_service.clone()
    }
}

impl FromRef<AppState> for InvitationService {
    fn from_ref(state: &AppState) -> Self {
        state.invitation_service.clone()
    }
}

impl FromRef<AppState> for ReportService {
    fn from_ref(state: &AppState) -> Self {
        state.report_service.clone()
    }
}

impl FromRef<AppState> for TransactionService {
    fn from_ref(state: &AppState) -> Self {
        state.transaction_service.clone()
    }
}

impl FromRef<AppState> for UserService {
    fn from_ref(state: &AppState) -> Self {
        state.user_service.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cors_accepts_listed_origins() {
        let origins = vec!["https://app.example.com".to_owned()];

        assert!(cors(&origins).is_ok());
    }

    #[test]
    fn cors_rejects_malformed_origin() {
        let origins = vec!["https://bad\norigin".to_owned()];

        assert!(cors(&origins).is_err());
    }
}
