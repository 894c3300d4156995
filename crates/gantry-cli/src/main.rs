use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "gantry",
    about = "Gantry — Cloud Run + API Gateway stack provisioning",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Stack configuration file. Falls back to GANTRY_PROJECT/GANTRY_REGION
    /// environment variables when absent.
    #[arg(short, long, default_value = "gantry.toml", global = true)]
    config: String,

    /// OpenAPI template path, overriding the config file's
    /// `openapi_template` value.
    #[arg(short, long, global = true)]
    template: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the stack and print the resolved outputs
    Up {
        /// Print the API key secret instead of redacting it
        #[arg(long)]
        show_secrets: bool,
    },
    /// Print the declared resources and their dependency edges
    Preview,
    /// Tear the stack down in reverse dependency order.
    ///
    /// Project-level API activations are retained, since other workloads
    /// may still depend on them.
    Destroy,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gantry=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let template = cli.template.as_deref();

    match cli.command {
        Commands::Up { show_secrets } => {
            commands::up::run(&cli.config, template, show_secrets).await
        }
        Commands::Preview => commands::preview::run(&cli.config, template),
        Commands::Destroy => commands::destroy::run(&cli.config, template).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_flag_parses_on_any_subcommand() {
        let cli = Cli::try_parse_from(["gantry", "preview", "--template", "custom.yaml"]).unwrap();
        assert_eq!(cli.template.as_deref(), Some("custom.yaml"));

        let cli = Cli::try_parse_from(["gantry", "up"]).unwrap();
        assert_eq!(cli.template, None);
        assert_eq!(cli.config, "gantry.toml");
    }
}
