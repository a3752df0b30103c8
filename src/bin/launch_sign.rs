// launch-sign - produce or inspect signed launch parameters for local development

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use outing_api::auth::{AuthenticationGate, ParameterMap, SignatureVerifier};
use outing_api::config::AppConfig;

#[derive(Parser)]
#[command(name = "launch-sign")]
#[command(about = "Sign and verify mini app launch parameters")]
#[command(version)]
struct Cli {
    /// App secret; defaults to APP_SECRET_TOKEN
    #[arg(long, global = true, env = "APP_SECRET_TOKEN", hide_env_values = true)]
    secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Build a signed Authorization value")]
    Sign {
        #[arg(long, help = "Platform user id (vk_user_id)")]
        user_id: i64,

        #[arg(long, help = "Signing time as unix seconds, defaults to now")]
        ts: Option<i64>,

        #[arg(long, default_value = "ru", help = "vk_language")]
        language: String,

        #[arg(long = "param", value_name = "KEY=VALUE", help = "Extra launch parameter, repeatable")]
        params: Vec<String>,

        #[arg(long, help = "Print with the 'Bearer ' prefix")]
        bearer: bool,
    },

    #[command(about = "Check a credential the way the server does")]
    Verify {
        credential: String,

        #[arg(long, help = "Enforce the signature age window")]
        strict: bool,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let secret = cli
        .secret
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("no secret: pass --secret or set APP_SECRET_TOKEN"))?;

    let mut config = AppConfig::from_env();
    config.security.app_secret = secret;

    match cli.command {
        Commands::Sign {
            user_id,
            ts,
            language,
            params,
            bearer,
        } => {
            let mut launch = ParameterMap::new();
            launch.insert("vk_user_id".to_string(), user_id.to_string());
            launch.insert("vk_ts".to_string(), ts.unwrap_or_else(|| Utc::now().timestamp()).to_string());
            launch.insert("vk_language".to_string(), language);
            for pair in params {
                let (key, value) = pair
                    .split_once('=')
                    .with_context(|| format!("expected KEY=VALUE, got '{}'", pair))?;
                launch.insert(key.to_string(), value.to_string());
            }

            let verifier = match &config.security.signed_param_prefix {
                Some(prefix) => SignatureVerifier::with_signed_prefix(prefix.clone()),
                None => SignatureVerifier::new(),
            };
            let query = verifier.sign_query(&launch, config.security.app_secret.as_bytes())?;

            if bearer {
                println!("Bearer {}", query);
            } else {
                println!("{}", query);
            }
        }
        Commands::Verify { credential, strict } => {
            config.security.strict_mode = strict;
            let gate = AuthenticationGate::new(config.gate_config());
            let raw = credential.strip_prefix("Bearer ").unwrap_or(&credential);

            let identity = gate.authenticate(raw, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&identity)?);
        }
    }

    Ok(())
}
