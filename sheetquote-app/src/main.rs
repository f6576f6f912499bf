use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use sheetquote_config::{AppConfig, ConfigError, MaterialCatalog};
use sheetquote_engine::render::RenderOptions;
use sheetquote_engine::{Analyzer, DocumentSource, Outcome};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod cli;
mod report;

use cli::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.clone());
    init_logging(&config);

    let catalog = match MaterialCatalog::load(&config.pricing) {
        Ok(catalog) => catalog,
        Err(err) => {
            error!(error = %err, "无法加载材料表");
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    info!(materials = catalog.len(), "材料表已加载");

    let analyzer = Analyzer::new(&catalog).with_render_options(RenderOptions {
        segments_per_circle: config.render.segments_per_circle,
    });

    match run(cli.command, &analyzer) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(error = %err, "命令执行失败");
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// 执行子命令。返回 `Ok(false)` 表示引擎给出了 `Failure`，消息已写到标准错误。
fn run(command: Command, analyzer: &Analyzer<'_>) -> anyhow::Result<bool> {
    match command {
        Command::Analyze { file, json } => {
            let outcome = analyzer.analyze_drawing(&DocumentSource::Path(file));
            emit(&outcome, json, report::analysis_text)
        }
        Command::Quote {
            file,
            material,
            quantity,
            json,
        } => {
            let outcome =
                analyzer.estimate_drawing_cost(&DocumentSource::Path(file), &material, quantity);
            emit(&outcome, json, report::quote_text)
        }
        Command::Render { file, output } => {
            let outcome = analyzer.render_drawing(&DocumentSource::Path(file));
            let Outcome::Success(drawing) = &outcome else {
                return emit(&outcome, false, |_| String::new());
            };
            let rendered = serde_json::to_string_pretty(&outcome)?;
            match output {
                Some(path) => {
                    fs::write(&path, rendered)
                        .with_context(|| format!("写入 {} 失败", path.display()))?;
                    info!(
                        path = %path.display(),
                        primitives = drawing.primitives.len(),
                        "图元已导出"
                    );
                }
                None => println!("{rendered}"),
            }
            Ok(true)
        }
        Command::Materials { json } => {
            let catalog = analyzer.catalog();
            if json {
                let rates: Vec<_> = catalog.iter().collect();
                println!("{}", serde_json::to_string_pretty(&json!({ "materials": rates }))?);
            } else {
                print!("{}", report::materials_text(catalog));
            }
            Ok(true)
        }
    }
}

fn emit<T: serde::Serialize>(
    outcome: &Outcome<T>,
    json: bool,
    render_text: impl Fn(&T) -> String,
) -> anyhow::Result<bool> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    }
    match outcome {
        Outcome::Success(payload) => {
            if !json {
                print!("{}", render_text(payload));
            }
            Ok(true)
        }
        Outcome::Failure { message } => {
            eprintln!("错误：{message}");
            Ok(false)
        }
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } | ConfigError::InvalidCatalog(_) => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
