//! leaf-sql: statement builder CLI
//!
//! # Usage
//!
//! ```bash
//! # Build SQL from a JSON descriptor
//! leaf-sql build '{"statement": "delete", "table": "s_admin", "condition": {"id": {"EQ": 9}}}'
//!
//! # Build a SELECT from condition cells
//! leaf-sql select s_admin -a a -w "a.age GE 18" -w "username RIGHT_LIKE 'jack'" --limit 10
//!
//! # Run it against a database
//! leaf-sql select s_admin --execute --database-url mysql://root@localhost/app
//! ```

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use leaf_sql::config::EngineConfig;
use leaf_sql::escape;
use leaf_sql::prelude::*;
use sqlx::mysql::MySqlPoolOptions;

#[derive(Parser)]
#[command(name = "leaf-sql")]
#[command(version)]
#[command(about = "Dynamic MySQL statements from condition relations", long_about = None)]
#[command(after_help = "EXAMPLES:
    leaf-sql select s_admin -w 'age EQ 30' -w \"name STR_EQ 'bob'\"
    leaf-sql build --file delete.json
    leaf-sql check \"' or 1=1 --\"")]
struct Cli {
    /// Configuration file (defaults to ./leaf-sql.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Datasource to target
    #[arg(short, long, global = true)]
    datasource: Option<String>,

    /// Database connection URL, overrides configured datasources
    #[arg(long, env = "LEAF_SQL_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Output format for fetched rows
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a statement from a JSON descriptor
    Build {
        /// JSON descriptor; read from stdin when neither this nor --file is given
        descriptor: Option<String>,

        /// Read the descriptor from a file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Run the statement
        #[arg(short, long)]
        execute: bool,
    },
    /// Build a SELECT from condition cells
    Select {
        table: String,

        #[arg(short, long)]
        alias: Option<String>,

        /// Columns to project
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Condition cell, `column OPERATOR value` (repeatable)
        #[arg(short, long = "where")]
        wheres: Vec<String>,

        /// Ordering, `column:direction` (repeatable)
        #[arg(long)]
        order: Vec<String>,

        #[arg(long)]
        limit: Option<u32>,

        /// Keep soft-deleted rows
        #[arg(long)]
        include_deleted: bool,

        /// Page number; fetches one page with a total count
        #[arg(long, requires = "execute")]
        page: Option<u64>,

        #[arg(long, default_value_t = 20)]
        page_size: u64,

        /// Run the statement
        #[arg(short, long)]
        execute: bool,
    },
    /// Report whether text looks like an injection attempt
    Check { text: String },
    /// Escape text as a SQL string literal
    Escape {
        text: String,

        /// Escape for a LIKE pattern
        #[arg(long)]
        like: bool,

        #[arg(long, default_value_t = '\\')]
        escape_char: char,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("{} {}", "Error:".red().bold(), e);
    }

    if let Err(e) = run(&cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("leaf_sql={}", level).parse()?),
        )
        .init();
    Ok(())
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = EngineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let mut ctx = config.context();
    if let Some(datasource) = &cli.datasource {
        ctx = ctx.on(datasource.clone());
    }

    match &cli.command {
        Commands::Build {
            descriptor,
            file,
            execute,
        } => {
            let text = read_descriptor(descriptor.as_deref(), file.as_ref())?;
            let statement: Statement =
                serde_json::from_str(&text).context("invalid statement descriptor")?;
            let sql = statement.build(&ctx)?;
            print_sql(&sql, cli.verbose, &ctx);
            if *execute {
                let executor = connect(cli, &config, &ctx).await?;
                if statement.is_query() {
                    let rows = executor.fetch_all(&ctx, &sql).await?;
                    format_output(&rows, &cli.format);
                } else {
                    let affected = executor.execute(&ctx, &sql).await?;
                    println!("{} {} rows affected", "✓".green(), affected);
                }
            }
        }
        Commands::Select {
            table,
            alias,
            columns,
            wheres,
            order,
            limit,
            include_deleted,
            page,
            page_size,
            execute,
        } => {
            let mut condition = leaf_sql::parse(wheres)?;
            if *include_deleted {
                condition = condition.include_deleted();
            }
            let mut query = QueryDescriptor::new(table.clone())
                .columns(columns.iter().cloned())
                .condition(condition);
            if let Some(alias) = alias {
                query = query.alias(alias.clone());
            }
            for item in order {
                let (column, direction) = item.split_once(':').unwrap_or((item.as_str(), ""));
                query = query.order_by(column, direction);
            }
            if let Some(limit) = limit {
                query = query.limit(*limit);
            }

            let sql = find_by_condition(&ctx, &query)?;
            print_sql(&sql, cli.verbose, &ctx);
            if *execute {
                let executor = connect(cli, &config, &ctx).await?;
                match page {
                    Some(page) => {
                        let page = executor.paginate(&ctx, &sql, *page, *page_size).await?;
                        format_output(&page.records, &cli.format);
                        println!(
                            "page {} of {} ({} total)",
                            page.page.to_string().cyan(),
                            page.pages().to_string().cyan(),
                            page.total
                        );
                    }
                    None => {
                        let rows = executor.fetch_all(&ctx, &sql).await?;
                        format_output(&rows, &cli.format);
                    }
                }
            }
        }
        Commands::Check { text } => {
            if escape::check(text) {
                println!("{} suspicious input", "⚠".yellow().bold());
            } else {
                println!("{} looks clean", "✓".green());
            }
        }
        Commands::Escape {
            text,
            like,
            escape_char,
        } => {
            if *like {
                println!("{}", escape::escape_sql_for_like(text, *escape_char));
            } else {
                println!("{}", escape::escape_string(text));
            }
        }
    }

    Ok(())
}

fn read_descriptor(inline: Option<&str>, file: Option<&PathBuf>) -> anyhow::Result<String> {
    match (inline, file) {
        (Some(_), Some(_)) => bail!("pass the descriptor inline or with --file, not both"),
        (Some(text), None) => Ok(text.to_string()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display())),
        (None, None) => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading descriptor from stdin")?;
            Ok(text)
        }
    }
}

fn print_sql(sql: &str, verbose: bool, ctx: &SqlContext) {
    if verbose {
        println!(
            "{} {}  {} {}",
            "Datasource:".dimmed(),
            ctx.datasource.cyan(),
            "Not deleted:".dimmed(),
            ctx.not_deleted.to_string().yellow()
        );
        println!("{}", "Generated SQL:".green().bold());
    }
    println!("{}", sql.white());
}

async fn connect(cli: &Cli, config: &EngineConfig, ctx: &SqlContext) -> anyhow::Result<Executor> {
    let datasources = match &cli.database_url {
        Some(url) => {
            let pool = MySqlPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(url)
                .await
                .with_context(|| format!("connecting to {}", ctx.datasource))?;
            let mut datasources = Datasources::default();
            datasources.insert(ctx.datasource.clone(), pool);
            datasources
        }
        None if config.datasources.is_empty() => {
            bail!("No database URL. Use --database-url, set LEAF_SQL_DATABASE_URL or configure [datasources]")
        }
        None => Datasources::connect(config).await?,
    };
    Ok(Executor::new(datasources))
}

fn format_output(results: &[Row], format: &OutputFormat) {
    if results.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results).unwrap_or_default());
        }
        OutputFormat::Table => {
            let columns: Vec<&String> = results[0].keys().collect();

            let widths: Vec<usize> = columns
                .iter()
                .map(|c| {
                    results
                        .iter()
                        .filter_map(|row| row.get(*c))
                        .map(|v| v.to_string().chars().count())
                        .fold(c.chars().count(), usize::max)
                })
                .collect();

            let header: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());

            for row in results {
                let cells: Vec<String> = columns
                    .iter()
                    .zip(&widths)
                    .map(|(c, w)| {
                        let val = row.get(*c).map(Value::to_string).unwrap_or_default();
                        format!("{:width$}", val, width = w)
                    })
                    .collect();
                println!("{}", cells.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", results.len().to_string().cyan());
        }
    }
}
