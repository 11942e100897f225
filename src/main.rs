use anyhow::Result;
use clap::{Parser, Subcommand};
use course_vectors::commands::{
    delete_course, list_courses, migrate, reinitialize, show_config, show_status, write_config,
};
use course_vectors::config::Config;

#[derive(Parser)]
#[command(name = "course-vectors")]
#[command(about = "File-based embedding storage and similarity search for course documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or write the configuration file
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Copy legacy id-named course directories into name-based ones
    Migrate,
    /// Delete every stored vector
    Reinitialize {
        /// Skip the confirmation notice and delete
        #[arg(long)]
        yes: bool,
    },
    /// List stored courses
    List,
    /// Delete all vectors of one course
    Delete {
        /// Course ID to delete
        course_id: String,
    },
    /// Check the embedding server and summarize storage
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load_default()?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                write_config(&config)?;
            }
        }
        Commands::Migrate => migrate(&config).await?,
        Commands::Reinitialize { yes } => reinitialize(&config, yes).await?,
        Commands::List => list_courses(&config).await?,
        Commands::Delete { course_id } => delete_course(&config, &course_id).await?,
        Commands::Status => show_status(&config).await?,
    }

    Ok(())
}
