use clap::{Parser, Subcommand};

mod collect;
mod query;

#[derive(Debug, Parser)]
#[command(name = "domae-cli")]
#[command(about = "domae wholesale collection command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one collection pass against a wholesale supplier
    Collect {
        /// Supplier to collect from (ownerclan, domeme, gentrade)
        #[arg(long)]
        supplier: String,
        /// Collection mode: full, new, or keyword:<term>
        #[arg(long, default_value = "full")]
        collection_type: String,
        /// Maximum number of catalog items to process
        #[arg(long, default_value = "1000")]
        max_products: usize,
    },
    /// Show recent collection batches
    Status {
        /// Filter by supplier (ownerclan, domeme, gentrade)
        #[arg(long)]
        supplier: Option<String>,
        /// Maximum number of batches to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Expire products that outlived the retention window
    Cleanup {
        /// Override the configured retention window in days
        #[arg(long)]
        retention_days: Option<i64>,
    },
    /// Probe the category mapper with a raw supplier category
    MapCategory {
        /// Supplier whose dictionary to consult
        #[arg(long)]
        supplier: String,
        /// Category string exactly as the supplier sends it
        #[arg(long)]
        category: String,
        /// Product name to include in keyword matching
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = domae_core::load_app_config()?;

    match cli.command {
        Commands::Collect {
            supplier,
            collection_type,
            max_products,
        } => {
            let pool = connect(&config).await?;
            collect::run_collect(&pool, &config, &supplier, &collection_type, max_products).await
        }
        Commands::Status { supplier, limit } => {
            let pool = connect(&config).await?;
            query::run_status(&pool, supplier.as_deref(), i64::from(limit)).await
        }
        Commands::Cleanup { retention_days } => {
            let pool = connect(&config).await?;
            query::run_cleanup(&pool, &config, retention_days).await
        }
        Commands::MapCategory {
            supplier,
            category,
            name,
        } => query::run_map_category(&config, &supplier, &category, name.as_deref()),
    }
}

async fn connect(config: &domae_core::AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool = domae_db::connect_pool(&domae_db::PoolConfig::from_app_config(config)).await?;
    domae_db::run_migrations(&pool).await?;
    Ok(pool)
}
