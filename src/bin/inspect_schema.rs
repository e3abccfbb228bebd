//! Utility to inspect the database schema and print the quotation tables.

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;

const TABLES: [&str; 4] = ["profiles", "quotations", "route_stages", "user_roles"];

/// Connects to the database and lists the columns of every table the API reads.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let database_url = env::var("DATABASE_URL")
        .or_else(|_| env::var("DB_URL"))
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;

    for table in TABLES {
        let columns: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = $1 ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&pool)
        .await?;

        if columns.is_empty() {
            println!("- {} (missing)", table);
            continue;
        }

        println!("- {}", table);
        for (col, type_, nullable) in columns {
            let marker = if nullable == "YES" { "" } else { " not null" };
            println!("  - {}: {}{}", col, type_, marker);
        }
        println!();
    }

    let status_counts: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM public.quotations GROUP BY status ORDER BY status",
    )
    .fetch_all(&pool)
    .await?;

    if !status_counts.is_empty() {
        println!("Quotation status counts:");
        for (status, count) in status_counts {
            println!("  - {}: {}", status, count);
        }
    }

    Ok(())
}
