//! `fq`: forensic query DSL tool entry point.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use forensic_query::{CompilerConfig, Dataset};
use forensic_query_cli::commands;
use forensic_query_cli::config::resolve_database_path;
use forensic_query_cli::input::read_query_text;
use forensic_query_cli::output::OutputMode;

#[derive(Parser)]
#[command(
    name = "fq",
    about = "Validate, compile and run forensic query DSL documents",
    version,
    after_help = "Queries are JSON documents, @path to a file, or - to read stdin.\nRun 'fq' with no command to enter interactive mode."
)]
struct Cli {
    /// Path to the SQLite database.
    #[arg(long, global = true)]
    db: Option<String>,

    /// Output results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a query against the schema without running it.
    Validate {
        /// Query JSON, @file, or - for stdin.
        query: Option<String>,

        /// Use a named sample query instead.
        #[arg(long)]
        sample: Option<String>,
    },

    /// Print the parameterized SQL a query compiles to.
    Compile {
        /// Query JSON, @file, or - for stdin.
        query: Option<String>,

        /// Use a named sample query instead.
        #[arg(long)]
        sample: Option<String>,
    },

    /// Run a query against the database.
    Run {
        /// Query JSON, @file, or - for stdin.
        query: Option<String>,

        /// Use a named sample query instead.
        #[arg(long)]
        sample: Option<String>,
    },

    /// Show datasets, fields, types and allowed operators.
    Schema {
        /// Restrict to one dataset.
        dataset: Option<Dataset>,
    },

    /// List the country names accepted by the `country` operator.
    Countries,

    /// List the named sample queries.
    Samples,

    /// Create the database tables.
    Init {
        /// Replace the contents with the sample case data.
        #[arg(long)]
        seed: bool,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   fq completions bash > ~/.local/share/bash-completion/completions/fq
    ///   fq completions zsh > ~/.zfunc/_fq
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },

    /// Launch interactive REPL mode.
    Repl,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mode = OutputMode::from_flag(cli.json);
    let mut stdout = std::io::stdout().lock();

    let ok = match cli.command.unwrap_or(Commands::Repl) {
        Commands::Validate { query, sample } => {
            let text = read_query_text(query.as_deref(), sample.as_deref())?;
            commands::validate(&text, mode, &mut stdout)?
        }

        Commands::Compile { query, sample } => {
            let text = read_query_text(query.as_deref(), sample.as_deref())?;
            commands::compile(&text, CompilerConfig::from_env(), mode, &mut stdout)?
        }

        Commands::Run { query, sample } => {
            let text = read_query_text(query.as_deref(), sample.as_deref())?;
            let db_path = resolve_database_path(cli.db.as_deref());
            tracing::debug!("Database: {db_path}");
            commands::run(&db_path, &text, mode, &mut stdout)?
        }

        Commands::Schema { dataset } => {
            commands::schema(dataset, mode, &mut stdout)?;
            true
        }

        Commands::Countries => {
            commands::countries(mode, &mut stdout)?;
            true
        }

        Commands::Samples => {
            commands::list_samples(mode, &mut stdout)?;
            true
        }

        Commands::Init { seed } => {
            let db_path = resolve_database_path(cli.db.as_deref());
            commands::init(&db_path, seed, mode, &mut stdout)?;
            true
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "fq", &mut stdout);
            true
        }

        Commands::Repl => {
            drop(stdout);
            forensic_query_cli::repl::run(cli.db.as_deref(), mode)?;
            return Ok(());
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
