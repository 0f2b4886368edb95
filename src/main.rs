use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use recipe_api::{
    accounts,
    api,
    config::Config,
    context::Context,
    cryptography::Hasher,
    error::Error,
    form::SignupForm,
    media::MediaStorage,
    memory::MemoryStore,
    postgres::PgStore,
    schema::UserRole,
    session::TokenLifetime,
    store::Store,
};

#[derive(Parser)]
#[command(name = "recipe-api")]
#[command(author, version, about = "Recipe management HTTP API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply migrations and serve the API (default)
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Create an active staff and superuser account
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
}

/// Connects to Postgres when configured, otherwise falls back to memory.
async fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections)
                .await
                .context("connecting to the database")?;
            store.migrate().await.context("applying migrations")?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

fn describe(error: Error) -> anyhow::Error {
    anyhow::anyhow!("{}", error.body())
}

async fn serve(config: Config) -> Result<()> {
    let store = open_store(&config).await?;
    let token_lifetime = TokenLifetime::days(config.token_lifetime_days);
    if token_lifetime.is_limited() {
        log::info!("Tokens expire after {} days", config.token_lifetime_days);
    }

    let ctx = Context::new(
        store,
        Hasher::new(config.fast_password_hashing),
        MediaStorage::new(config.media_root.clone(), &config.media_url),
    )
    .with_token_lifetime(token_lifetime);

    log::info!("Listening on http://{}", config.bind_address);
    warp::serve(api::routes(ctx)).run(config.bind_address).await;
    Ok(())
}

async fn migrate(config: Config) -> Result<()> {
    let Some(url) = &config.database_url else {
        anyhow::bail!("DATABASE_URL is required to run migrations");
    };

    PgStore::connect(url, 1)
        .await
        .context("connecting to the database")?
        .migrate()
        .await
        .context("applying migrations")?;
    Ok(())
}

async fn create_superuser(config: Config, form: SignupForm) -> Result<()> {
    if config.database_url.is_none() {
        log::warn!("No DATABASE_URL set, the account will vanish when this command exits");
    }

    let store = open_store(&config).await?;
    let signup = form.validate().map_err(|errors| describe(errors.into()))?;
    let user = accounts::register(
        store.as_ref(),
        &Hasher::new(config.fast_password_hashing),
        signup,
        UserRole::Superuser,
    )
    .await
    .map_err(describe)?;

    println!("Superuser {} created", user.email);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Migrate => migrate(config).await,
        Commands::CreateSuperuser {
            email,
            password,
            first_name,
            last_name,
        } => {
            let form = SignupForm {
                email: Some(email),
                password: Some(password),
                first_name: Some(first_name),
                last_name: Some(last_name),
            };
            create_superuser(config, form).await
        }
    }
}
