//! logsift CLI -- 정규화된 보안 로그 검색/내보내기/적재 명령줄 도구

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;

use logsift_core::config::{GeneralConfig, SiftConfig};

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            let code = e
                .downcast_ref::<CliError>()
                .map(CliError::exit_code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // 설정이 필요한 명령은 로깅 초기화 전에 로드해 general 섹션을 반영
    let loaded = if cli.command.needs_config() {
        Some(SiftConfig::load(&cli.config).await)
    } else {
        None
    };

    let mut general = match &loaded {
        Some(Ok(config)) => config.general.clone(),
        _ => GeneralConfig::default(),
    };
    if let Some(level) = &cli.log_level {
        general.log_level = level.clone();
    }
    logging::init_tracing(&general)?;
    logsift_core::metrics::describe_all();

    tracing::debug!(config = %cli.config.display(), "logsift starting");

    let config = loaded.transpose().map_err(CliError::from)?;
    let writer = OutputWriter::new(cli.output);

    match cli.command {
        Commands::Parse(args) => commands::parse::execute(args, &writer)?,
        Commands::Compile(args) => {
            commands::compile::execute(args, &required(config)?, &writer)?
        }
        Commands::Search(args) => {
            commands::search::execute(args, &required(config)?, &writer).await?
        }
        Commands::Resolve(args) => {
            commands::resolve::execute(args, &required(config)?, &writer).await?
        }
        Commands::Export(args) => {
            commands::export::execute(args, &required(config)?, &writer).await?
        }
        Commands::Load(args) => {
            commands::load::execute(args, &required(config)?, &writer).await?
        }
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await?,
    }

    Ok(())
}

fn required(config: Option<SiftConfig>) -> Result<SiftConfig, CliError> {
    config.ok_or_else(|| CliError::Config("configuration was not loaded".to_owned()))
}
