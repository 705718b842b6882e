use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(
    name = "keyward",
    about = "Keystone authentication and policy authorization for Kubernetes"
)]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the authentication and authorization webhook
    Serve(commands::serve::ServeArgs),
    /// Validate a policy file
    Check(commands::check::CheckArgs),
    /// Evaluate a single request against a policy file
    Eval(commands::eval::EvalArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve(args) => commands::serve::run(args).await,
        Commands::Check(args) => commands::check::run(args),
        Commands::Eval(args) => commands::eval::run(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["keyward", "check", "policy.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Check(_)));
        assert!(!cli.verbose);

        let cli = Cli::try_parse_from(["keyward", "serve", "--auth-url", "http://ks:5000", "-v"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Serve(_)));
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["keyward"]).is_err());
    }
}
