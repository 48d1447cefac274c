use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use time::format_description::well_known::Rfc3339;
use tracing::info;

mod cli;
mod data_dir;

use darkroom_core::{
    EchoAdapter, GeminiAdapter, GenerationRequest, ImageBlob, Orchestrator, ProbeOutcome,
    RemoteAdapter,
};
use darkroom_pool::{ApiKey, JsonFileStore, MemoryStore, Validity, redact_secret};
use darkroom_prompt::{Instruction, ModeSettings};

use crate::cli::{Cli, Command, GenerateArgs, KeysCommand, ModeArg};
use crate::data_dir::resolve_data_dir;

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("darkroom failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(&cli.data_dir);
    let store = Arc::new(JsonFileStore::new(
        PathBuf::from(&data_dir).join("keys.json"),
    ));
    info!(data_dir = %data_dir, "key store resolved");

    match cli.command {
        Command::Keys { command } => {
            let adapter: Arc<dyn RemoteAdapter> = Arc::new(GeminiAdapter::new()?);
            let orch = Orchestrator::load(store, adapter).await?;
            run_keys(&orch, command).await
        }
        Command::Generate(args) => {
            if args.offline {
                // Offline runs need no stored keys and must not disturb
                // them: a placeholder key in a throwaway store feeds the
                // echo adapter.
                let store = Arc::new(MemoryStore::with_keys(vec![ApiKey::new("offline")]));
                let orch = Orchestrator::load(store, Arc::new(EchoAdapter)).await?;
                run_generate(&orch, args).await
            } else {
                let adapter: Arc<dyn RemoteAdapter> =
                    Arc::new(GeminiAdapter::new()?.with_model(args.model.clone()));
                let orch = Orchestrator::load(store, adapter).await?;
                run_generate(&orch, args).await
            }
        }
    }
}

async fn run_keys(
    orch: &Orchestrator,
    command: KeysCommand,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match command {
        KeysCommand::Add { secrets, check } => {
            let added = orch.add_keys(secrets, check).await?;
            println!("added {added} key(s)");
        }
        KeysCommand::Remove { secret } => {
            orch.remove_key(&secret).await?;
            println!("removed {}", redact_secret(&secret));
        }
        KeysCommand::Prefer { secret } => {
            orch.prefer_key(&secret).await?;
            println!("preferred {}", redact_secret(&secret));
        }
        KeysCommand::List => {
            let snapshot = orch.snapshot().await;
            if snapshot.is_empty() {
                println!("pool is empty");
            }
            for key in snapshot {
                println!("{}", describe_key(&key)?);
            }
        }
        KeysCommand::Check => {
            for (secret, outcome) in orch.check_keys().await? {
                let verdict = match outcome {
                    ProbeOutcome::Valid => "valid".to_owned(),
                    ProbeOutcome::Invalid => "invalid".to_owned(),
                    ProbeOutcome::Unreachable(message) => format!("unreachable ({message})"),
                };
                println!("{} {verdict}", redact_secret(&secret));
            }
        }
    }
    Ok(())
}

async fn run_generate(
    orch: &Orchestrator,
    args: GenerateArgs,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let settings = load_settings(args.mode, args.settings.as_deref())?;
    let instruction = match args.workflow {
        Some(workflow) => Instruction::Workflow(workflow.into()),
        None => Instruction::parse(&args.prompt),
    };

    let mut request = GenerationRequest::new(
        read_image(&args.image).await?,
        settings,
        instruction,
    );
    if let Some(path) = &args.mask {
        request = request.with_mask(read_image(path).await?);
    }
    if let Some(path) = &args.reference {
        request = request.with_reference(read_image(path).await?);
    }
    if let Some(path) = &args.background {
        request = request.with_background(read_image(path).await?);
    }

    let success = orch.generate(request).await?;
    tokio::fs::write(&args.output, &success.image.bytes).await?;
    println!(
        "wrote {} ({}, via {})",
        args.output.display(),
        success.image.mime_type,
        redact_secret(&success.secret)
    );
    Ok(())
}

fn load_settings(
    mode: ModeArg,
    path: Option<&Path>,
) -> Result<ModeSettings, Box<dyn Error + Send + Sync>> {
    let value = match path {
        Some(path) => serde_json::from_slice(&std::fs::read(path)?)?,
        None => serde_json::Value::Object(serde_json::Map::new()),
    };
    let settings = match mode {
        ModeArg::Portrait => ModeSettings::Portrait(serde_json::from_value(value)?),
        ModeArg::Restore => ModeSettings::Restore(serde_json::from_value(value)?),
        ModeArg::Creative => ModeSettings::Creative(serde_json::from_value(value)?),
        ModeArg::Composite => ModeSettings::Composite(serde_json::from_value(value)?),
    };
    Ok(settings)
}

async fn read_image(path: &Path) -> Result<ImageBlob, Box<dyn Error + Send + Sync>> {
    let bytes = tokio::fs::read(path).await?;
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();
    Ok(ImageBlob::new(bytes, mime_type))
}

fn describe_key(key: &ApiKey) -> Result<String, Box<dyn Error + Send + Sync>> {
    let validity = match key.validity {
        Validity::Unknown => "unknown",
        Validity::Checking => "checking",
        Validity::Valid => "valid",
        Validity::Invalid => "invalid",
    };
    let mut line = format!("{} {validity}", redact_secret(&key.secret));
    if key.is_preferred {
        line.push_str(" [preferred]");
    }
    if let Some(cooldown) = key.cooldown_until {
        line.push_str(&format!(" cooling until {}", cooldown.format(&Rfc3339)?));
    }
    Ok(line)
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("darkroom=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
