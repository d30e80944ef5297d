//! LTI 1.3 Tool - launch endpoint for LTI Advantage platforms.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use tracing::{error, info};

use lti_tool::{
    cli::{Cli, Command, PlatformCommand},
    config::Config,
    registry::{ConfigRegistry, SharedRegistry},
    server::Tool,
    services::{AccessTokenService, AgsClient, NrpsClient},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let mut cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    // Handle subcommands
    match cli.command.take() {
        Some(Command::Check) => run_check(&cli),
        Some(Command::Platform(platform_cmd)) => run_platform_command(&cli, platform_cmd).await,
        Some(Command::Completions { shell }) => {
            let mut command = Cli::command();
            let name = command.get_name().to_string();
            clap_complete::generate(shell, &mut command, name, &mut io::stdout());
            ExitCode::SUCCESS
        }
        Some(Command::Serve) | None => run_server(&cli).await,
    }
}

/// Load configuration and apply CLI overrides.
fn load_config(cli: &Cli) -> lti_tool::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref host) = cli.host {
        config.server.host.clone_from(host);
    }
    Ok(config)
}

/// Validate the configuration and print what it resolves to
fn run_check(cli: &Cli) -> ExitCode {
    match load_config(cli) {
        Ok(config) => {
            println!("✅ Configuration valid");
            println!("   Public URL: {}", config.server.public_url);
            println!(
                "   Listen:     {}:{}",
                config.server.host, config.server.port
            );
            if config.platforms.is_empty() {
                println!("   No platforms registered");
            } else {
                println!("   Platforms:");
                let mut keys: Vec<_> = config.platforms.keys().collect();
                keys.sort();
                for key in keys {
                    let platform = &config.platforms[key];
                    let endpoints = if platform.authorize_url.is_some()
                        && platform.jwk_set_url.is_some()
                    {
                        "configured"
                    } else {
                        "via discovery"
                    };
                    println!(
                        "     {key}: {} issuer={} client_id={} endpoints={endpoints}",
                        platform.name, platform.issuer, platform.client_id
                    );
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Configuration invalid: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run a platform smoke-test command
async fn run_platform_command(cli: &Cli, command: PlatformCommand) -> ExitCode {
    let config = match load_config(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let http = match reqwest::Client::builder()
        .timeout(config.http.timeout)
        .https_only(config.http.https_only)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            eprintln!("❌ Failed to build HTTP client: {e}");
            return ExitCode::FAILURE;
        }
    };
    let registry: SharedRegistry = Arc::new(ConfigRegistry::from_config(&config));
    let tokens = Arc::new(AccessTokenService::new(registry, http.clone()));

    match command {
        PlatformCommand::Token { issuer, scope } => {
            let scopes: Vec<&str> = scope.iter().map(String::as_str).collect();
            match tokens.get_access_token(&issuer, &scopes).await {
                Ok(token) => {
                    println!("✅ Token granted");
                    println!("   token_type: {}", token.token_type);
                    if let Some(expires_in) = token.expires_in {
                        println!("   expires_in: {expires_in}s");
                    }
                    if let Some(scope) = token.scope {
                        println!("   scope:      {scope}");
                    }
                    println!("   access_token:\n{}", token.access_token);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("❌ Token exchange failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }

        PlatformCommand::LineItems { issuer, url } => {
            let ags = AgsClient::new(tokens, http);
            match ags.list_line_items(&issuer, &url).await {
                Ok(items) => {
                    if items.is_empty() {
                        println!("No line items at {url}");
                    } else {
                        println!("Found {} line item(s):\n", items.len());
                        for item in items {
                            println!("  {} (max {})", item.label, item.score_maximum);
                            if let Some(id) = item.id {
                                println!("    id:  {id}");
                            }
                            if let Some(tag) = item.tag {
                                println!("    tag: {tag}");
                            }
                        }
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("❌ AGS call failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }

        PlatformCommand::Memberships { issuer, url } => {
            let nrps = NrpsClient::new(tokens, http);
            match nrps.list_memberships(&issuer, &url).await {
                Ok(container) => {
                    println!(
                        "Context: {} {}",
                        container.context.id,
                        container.context.title.unwrap_or_default()
                    );
                    println!("Found {} member(s):\n", container.members.len());
                    for member in container.members {
                        let display = member.name.unwrap_or_else(|| member.user_id.clone());
                        let roles: Vec<&str> = member
                            .roles
                            .iter()
                            .map(|role| role.rsplit('#').next().unwrap_or(role.as_str()))
                            .collect();
                        println!("  {display} [{}]", roles.join(", "));
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("❌ NRPS call failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// Run the tool server
async fn run_server(cli: &Cli) -> ExitCode {
    let config = match load_config(cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        platforms = config.platforms.len(),
        "Starting LTI tool"
    );

    if let Err(e) = Tool::new(config).run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Tool shutdown complete");
    ExitCode::SUCCESS
}
