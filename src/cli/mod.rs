use std::{net::SocketAddr, time::Duration};

use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::server::{self, AiOptions, DatabaseOptions, EmailOptions};

mod migrate;

#[derive(Parser)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    /// DSN to tell Sentry where to send events.
    ///
    /// If provided, errors will be sent to Sentry.
    #[clap(long = "sentry-dsn", env = "SENTRY_DSN")]
    sentry_dsn: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations.
    Migrate(DatabaseArgs),
    /// Apply migrations, then serve the API.
    Serve(ServeOpts),
    /// Send every notification that is due, then exit.
    Notify(NotifyOpts),
}

#[derive(Args)]
struct DatabaseArgs {
    /// The number of connections to use for the database pool.
    #[clap(
        long = "database-pool-size",
        default_value = "16",
        env = "DATABASE_POOL_SIZE"
    )]
    database_pool_size: u32,

    /// The number of seconds before a database connection times out.
    #[clap(long = "database-timeout", default_value = "5")]
    database_timeout: u8,

    /// Connection string for the application database.
    #[clap(long = "database-url", env = "DATABASE_URL")]
    database_url: String,
}

impl From<DatabaseArgs> for DatabaseOptions {
    fn from(args: DatabaseArgs) -> Self {
        Self {
            pool_size: args.database_pool_size,
            timeout_seconds: args.database_timeout,
            url: args.database_url,
        }
    }
}

#[derive(Args)]
struct EmailArgs {
    /// Address to send emails from.
    #[clap(
        long = "email-from-address",
        default_value = "admin@localhost",
        env = "EMAIL_FROM_ADDRESS"
    )]
    email_from_address: String,

    /// Display name to send emails from.
    #[clap(
        long = "email-from-name",
        default_value = "Expense Tracker",
        env = "EMAIL_FROM_NAME"
    )]
    email_from_name: String,

    /// API key for SendGrid.
    ///
    /// If provided, emails will be sent using SendGrid. If this is not set,
    /// emails will be printed to stdout.
    #[clap(long = "sendgrid-key", env = "SENDGRID_KEY")]
    sendgrid_key: Option<String>,

    /// Base URL of the web application, used to build links in emails.
    #[clap(
        long = "app-url",
        default_value = "http://localhost:3000",
        env = "APP_URL"
    )]
    app_url: String,
}

impl From<EmailArgs> for EmailOptions {
    fn from(args: EmailArgs) -> Self {
        Self {
            from_address: args.email_from_address,
            from_name: args.email_from_name,
            sendgrid_key: args.sendgrid_key,
            app_url: args.app_url,
        }
    }
}

#[derive(Args)]
struct ServeOpts {
    #[clap(flatten)]
    database: DatabaseArgs,

    #[clap(flatten)]
    email: EmailArgs,

    /// Address and port to listen on.
    #[clap(
        long = "bind-address",
        default_value = "0.0.0.0:8000",
        env = "BIND_ADDRESS"
    )]
    bind_address: SocketAddr,

    /// Comma separated origins allowed to make cross-origin requests. Use
    /// `*` to allow any origin.
    #[clap(
        long = "allowed-origins",
        env = "ALLOWED_ORIGINS",
        default_value = "http://localhost:3000",
        value_delimiter = ','
    )]
    allowed_origins: Vec<String>,

    /// Connection string for Redis.
    ///
    /// If this is not set, rate limits are tracked in memory and are not
    /// shared between processes.
    #[clap(long = "redis-url", env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Secret key for signing session tokens.
    ///
    /// If this is changed, existing sessions will become invalid.
    /// Generate with: openssl rand -base64 32
    #[clap(long = "secret-key", env = "SECRET_KEY")]
    secret_key: String,

    /// The number of days a session token stays valid.
    #[clap(long = "session-days", default_value = "7", env = "SESSION_DAYS")]
    session_days: u32,

    /// Minutes between notification sweeps.
    #[clap(
        long = "notification-interval-minutes",
        default_value = "60",
        env = "NOTIFICATION_INTERVAL_MINUTES"
    )]
    notification_interval_minutes: u64,

    /// API key for the assistant's chat completion provider.
    ///
    /// If this is not set, the assistant endpoints report that they are not
    /// configured.
    #[clap(long = "ai-api-key", env = "AI_API_KEY")]
    ai_api_key: Option<String>,

    /// Base URL of an OpenAI compatible API.
    #[clap(
        long = "ai-base-url",
        default_value = "https://api.openai.com/v1",
        env = "AI_BASE_URL"
    )]
    ai_base_url: String,

    /// The chat model the assistant uses.
    #[clap(long = "ai-model", default_value = "gpt-4o-mini", env = "AI_MODEL")]
    ai_model: String,
}

impl From<ServeOpts> for server::Options {
    fn from(opts: ServeOpts) -> Self {
        Self {
            database: opts.database.into(),
            email: opts.email.into(),
            ai: AiOptions {
                api_key: opts.ai_api_key,
                base_url: opts.ai_base_url,
                model: opts.ai_model,
            },
            bind_address: opts.bind_address,
            allowed_origins: opts.allowed_origins,
            notification_interval: Duration::from_secs(
                opts.notification_interval_minutes.max(1) * 60,
            ),
            redis_url: opts.redis_url,
            secret_key: opts.secret_key,
            session_days: opts.session_days,
        }
    }
}

#[derive(Args)]
struct NotifyOpts {
    #[clap(flatten)]
    database: DatabaseArgs,

    #[clap(flatten)]
    email: EmailArgs,
}

/// Events are tagged with the package name and version as the release.
fn sentry_options() -> sentry::ClientOptions {
    sentry::ClientOptions {
        release: sentry::release_name!(),
        ..Default::default()
    }
}

pub async fn run_with_sys_args() -> anyhow::Result<()> {
    use tracing_subscriber::prelude::*;

    let cli = Cli::parse();

    let sentry_config = cli.sentry_dsn.map(|dsn| {
        debug!("Enabled sentry.");

        sentry::init((dsn, sentry_options()))
    });

    let sentry_tracing_layer = if sentry_config.is_some() {
        Some(sentry_tracing::layer())
    } else {
        None
    };

    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(sentry_tracing_layer)
        .init();

    match cli.command {
        Commands::Migrate(args) => migrate::run_migrations(&DatabaseOptions::from(args)).await,
        Commands::Serve(opts) => {
            let opts: server::Options = opts.into();
            migrate::run_migrations(&opts.database).await?;

            server::serve(opts).await
        }
        Commands::Notify(opts) => {
            let report = server::notify(opts.database.into(), opts.email.into()).await?;
            info!(?report, "Sent notifications.");

            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_splits_allowed_origins() {
        let cli = Cli::try_parse_from([
            "expense-tracker-api",
            "serve",
            "--database-url",
            "postgres://localhost/expenses",
            "--secret-key",
            "secret",
            "--allowed-origins",
            "https://a.example.com,https://b.example.com",
        ])
        .unwrap();

        match cli.command {
            Commands::Serve(opts) => {
                let opts: server::Options = opts.into();
                assert_eq!(2, opts.allowed_origins.len());
                assert_eq!(Duration::from_secs(3600), opts.notification_interval);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn sentry_release_is_package_version() {
        assert_eq!(
            Some(concat!("expense-tracker-api@", env!("CARGO_PKG_VERSION"))),
            sentry_options().release.as_deref()
        );
    }
}
