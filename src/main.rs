use bizquery::{Dataset, EngineConfig, Intent, MemoryStore, QueryOrchestrator};

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "bizquery")]
#[command(about = "Grounded business Q&A over operational data")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a natural-language business question
    Ask {
        /// The question, e.g. "Ai đang nợ tôi nhiều nhất?"
        question: String,

        /// Path to a JSON dataset (default: built-in demo data)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Anchor date for relative phrases like "tháng này" (YYYY-MM-DD,
        /// default: today in the business timezone)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// List the supported question catalog
    Intents,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match args.command {
        Commands::Ask {
            question,
            data,
            today,
        } => ask(question, data, today).await,
        Commands::Intents => {
            for intent in Intent::supported() {
                println!("{:<22} e.g. {}", intent.as_str(), intent.example());
            }
            Ok(())
        }
    }
}

async fn ask(question: String, data: Option<PathBuf>, today: Option<NaiveDate>) -> Result<()> {
    let store = match data {
        Some(path) => {
            info!("Loading dataset from {}", path.display());
            MemoryStore::from_json_file(&path)?
        }
        None => {
            info!("No dataset given, using built-in demo data");
            MemoryStore::new(demo_dataset())
        }
    };

    let config = EngineConfig::from_env();
    let orchestrator = QueryOrchestrator::new(Arc::new(store), config);

    let outcome = match today {
        Some(anchor) => orchestrator.process_query_at(&question, anchor).await?,
        None => orchestrator.process_query(&question).await?,
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Small seeded dataset so `bizquery ask` works out of the box.
fn demo_dataset() -> Dataset {
    let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).expect("valid demo date");
    serde_json::from_value(serde_json::json!({
        "customers": [
            {"id": "C001", "name": "Nguyễn Văn Minh"},
            {"id": "C002", "name": "Trần Thị Hoa"},
            {"id": "C003", "name": "Công ty TNHH Hòa Bình"}
        ],
        "suppliers": [
            {"id": "S001", "name": "Xi măng Hà Tiên"},
            {"id": "S002", "name": "Xi măng Nghi Sơn"}
        ],
        "receivables": [
            {"customer_id": "C001", "amount": 120000000.0, "paid_amount": 20000000.0, "due_date": day(2025, 5, 15)},
            {"customer_id": "C002", "amount": 45000000.0, "paid_amount": 45000000.0, "due_date": day(2025, 6, 1)},
            {"customer_id": "C003", "amount": 250000000.0, "paid_amount": 100000000.0, "due_date": day(2025, 3, 20)}
        ],
        "payables": [
            {"supplier_id": "S001", "amount": 500000000.0, "paid_amount": 350000000.0, "due_date": day(2025, 7, 30)},
            {"supplier_id": "S002", "amount": 80000000.0, "paid_amount": 0.0, "due_date": day(2025, 8, 15)}
        ],
        "sales": [
            {"date": day(2025, 7, 3), "cement_type": "PCB30", "quantity": 120.0, "amount": 156000000.0},
            {"date": day(2025, 7, 18), "cement_type": "PCB40", "quantity": 200.0, "amount": 290000000.0},
            {"date": day(2025, 8, 2), "cement_type": "PCB40", "quantity": 80.0, "amount": 116000000.0}
        ],
        "purchases": [
            {"date": day(2025, 6, 20), "cement_type": "PCB30", "quantity": 300.0, "amount": 330000000.0},
            {"date": day(2025, 6, 25), "cement_type": "PCB40", "quantity": 400.0, "amount": 480000000.0}
        ]
    }))
    .expect("demo dataset is well-formed")
}
