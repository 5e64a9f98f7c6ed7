use std::io::{self, BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use joey_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use joey_contracts::config::{ConfigField, JoeyConfig};
use joey_contracts::events::EventWriter;
use joey_contracts::history::History;
use joey_contracts::presets::{
    aspect_ratio_label, resolve_aspect_ratio, ASPECT_RATIOS, PRESET_ACCESSORIES, PRESET_ACTIONS,
    PRESET_CLOTHING,
};
use joey_engine::{
    decode_data_uri, default_provider_registry, ProviderSettings, StudioController,
};
use serde_json::{json, Value};

#[derive(Debug, Parser)]
#[command(name = "joey-rs", version, about = "Joey character studio CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat(ChatArgs),
    Run(RunArgs),
    Presets,
}

#[derive(Debug, Args)]
struct ProviderArgs {
    #[arg(long, default_value = "gemini")]
    provider: String,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    api_base: Option<String>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    reference: Option<PathBuf>,
    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[arg(long)]
    reference: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    action: Option<String>,
    #[arg(long)]
    clothing: Option<String>,
    #[arg(long)]
    accessory: Option<String>,
    #[arg(long)]
    scene: Option<String>,
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    ratio: Option<String>,
    #[command(flatten)]
    provider: ProviderArgs,
}

impl RunArgs {
    fn field_overrides(&self) -> Vec<(ConfigField, &str)> {
        [
            (ConfigField::Action, self.action.as_deref()),
            (ConfigField::Clothing, self.clothing.as_deref()),
            (ConfigField::Accessory, self.accessory.as_deref()),
            (ConfigField::Scene, self.scene.as_deref()),
            (ConfigField::StyleDescription, self.style.as_deref()),
            (ConfigField::AspectRatio, self.ratio.as_deref()),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|value| (field, value)))
        .collect()
    }
}

fn main() {
    env_logger::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("joey-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    run_command(cli.command)
}

fn run_command(command: Command) -> Result<i32> {
    match command {
        Command::Chat(args) => {
            run_chat_native(args)?;
            Ok(0)
        }
        Command::Run(args) => run_run_native(args),
        Command::Presets => {
            let mut stdout = io::stdout();
            write_presets(&mut stdout)?;
            Ok(0)
        }
    }
}

fn build_controller(
    provider_args: &ProviderArgs,
    out: &Path,
    events: Option<&Path>,
) -> Result<StudioController> {
    let settings = ProviderSettings::from_env()
        .with_model(provider_args.model.as_deref())
        .with_api_base(provider_args.api_base.as_deref());
    let mut registry = default_provider_registry(settings)?;
    let available = registry.names().join(", ");
    let name = provider_args.provider.trim();
    let provider = registry
        .take(name)
        .ok_or_else(|| anyhow!("unknown provider '{name}' (available: {available})"))?;

    std::fs::create_dir_all(out).with_context(|| format!("failed to create {}", out.display()))?;
    let events_path = events
        .map(Path::to_path_buf)
        .unwrap_or_else(|| out.join("events.jsonl"));
    let writer = EventWriter::new(events_path, uuid::Uuid::new_v4().to_string())?;
    writer.emit(
        "session_started",
        json!({
            "provider": name,
            "out_dir": out.to_string_lossy(),
        }),
    )?;
    log::info!("session {} started with provider {name}", writer.session_id());

    Ok(StudioController::new(provider)
        .with_events(writer)
        .with_download_dir(out))
}

fn run_chat_native(args: ChatArgs) -> Result<()> {
    let mut controller = build_controller(&args.provider, &args.out, args.events.as_deref())?;
    let mut stdout = io::stdout();

    if let Some(reference) = args.reference.as_deref() {
        match controller.upload_reference_image(reference) {
            Ok(()) => writeln!(stdout, "参考图已上传: {}", reference.display())?,
            Err(err) => writeln!(stdout, "{err}")?,
        }
    }

    writeln!(
        stdout,
        "Joey studio started ({}). Type /help for commands.",
        controller.provider_name()
    )?;

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        line.clear();
        let read = match input.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        if !dispatch_intent(&mut controller, &intent, &mut stdout)? {
            break;
        }
    }
    Ok(())
}

/// Applies one chat command. Returns `false` when the session should end.
fn dispatch_intent(
    controller: &mut StudioController,
    intent: &Intent,
    out: &mut dyn Write,
) -> Result<bool> {
    match intent.action.as_str() {
        "noop" => {}
        "quit" => return Ok(false),
        "help" => {
            writeln!(out, "Commands: {}", CHAT_HELP_COMMANDS.join(" "))?;
        }
        "presets" => write_presets(out)?,
        "show" => {
            for row in describe_state(controller) {
                writeln!(out, "{row}")?;
            }
        }
        "set_field" => {
            let field = value_as_non_empty_string(intent.command_args.get("field"))
                .and_then(|raw| raw.parse::<ConfigField>().ok());
            let Some(field) = field else {
                writeln!(out, "Usage: /set <field> <value>")?;
                return Ok(true);
            };
            let raw = intent
                .command_args
                .get("value")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let value = normalize_field_value(field, raw);
            controller.set_configuration_field(field, value.clone());
            writeln!(out, "{field} = {}", display_value(&value))?;
        }
        "upload_reference" => {
            let Some(path) = value_as_non_empty_string(intent.command_args.get("path")) else {
                writeln!(out, "/upload requires a path")?;
                return Ok(true);
            };
            match controller.upload_reference_image(Path::new(&path)) {
                Ok(()) => writeln!(out, "参考图已上传: {path}")?,
                Err(err) => writeln!(out, "{err}")?,
            }
        }
        "generate" => {
            writeln!(out, "正在生成 Joey...")?;
            match controller.generate() {
                Ok(()) => {
                    let summary = controller
                        .current_image()
                        .map(describe_handle)
                        .unwrap_or_default();
                    writeln!(
                        out,
                        "生成完成: {summary} (history {}/{})",
                        controller.history().len(),
                        controller.history().limit()
                    )?;
                }
                Err(err) => {
                    let message = controller
                        .error()
                        .map(str::to_string)
                        .unwrap_or_else(|| err.to_string());
                    writeln!(out, "{message}")?;
                }
            }
        }
        "history" => {
            let rows = history_lines(controller.history());
            if rows.is_empty() {
                writeln!(out, "暂无历史记录")?;
            }
            for row in rows {
                writeln!(out, "{row}")?;
            }
        }
        "select_history" => {
            let selected = history_id_at(controller.history(), intent.command_args.get("index"));
            match selected {
                Some(id) if controller.select_history_entry(&id) => {
                    writeln!(out, "已选择 {id}")?;
                }
                _ => writeln!(out, "Usage: /select <n> (see /history)")?,
            }
        }
        "download" => {
            let handle = match intent.command_args.get("index") {
                Some(Value::Number(_)) => {
                    history_id_at(controller.history(), intent.command_args.get("index"))
                        .and_then(|id| controller.history().find(&id).map(|e| e.image.clone()))
                }
                _ => controller.current_image().map(str::to_string),
            };
            let Some(handle) = handle else {
                writeln!(out, "没有可下载的图像")?;
                return Ok(true);
            };
            match controller.download_image(&handle) {
                Ok(path) => writeln!(out, "已保存到 {}", path.display())?,
                Err(err) => writeln!(out, "{err}")?,
            }
        }
        "dismiss_error" => {
            controller.dismiss_error();
        }
        _ => {
            match value_as_non_empty_string(intent.command_args.get("command")) {
                Some(command) if command == "set" => {
                    writeln!(out, "Usage: /set <field> <value>")?;
                }
                Some(command) => writeln!(out, "Unknown command: /{command}")?,
                None => writeln!(out, "Type /help for commands.")?,
            }
        }
    }
    Ok(true)
}

fn run_run_native(args: RunArgs) -> Result<i32> {
    let mut controller = build_controller(&args.provider, &args.out, args.events.as_deref())?;
    controller.upload_reference_image(&args.reference)?;
    for (field, value) in args.field_overrides() {
        controller.set_configuration_field(field, normalize_field_value(field, value));
    }

    if let Err(err) = controller.generate() {
        let message = controller
            .error()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        bail!("{message}");
    }
    let Some(handle) = controller.current_image().map(str::to_string) else {
        bail!("generation finished without an image");
    };
    let path = controller.download_image(&handle)?;
    println!("{}", path.display());
    Ok(0)
}

fn write_presets(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "action: {}", PRESET_ACTIONS.join(" / "))?;
    writeln!(out, "clothing: {}", PRESET_CLOTHING.join(" / "))?;
    writeln!(out, "accessory: {}", PRESET_ACCESSORIES.join(" / "))?;
    let ratios: Vec<&str> = ASPECT_RATIOS.iter().map(|option| option.label).collect();
    writeln!(out, "ratio: {}", ratios.join(" / "))?;
    writeln!(out, "scene, style: free text")
}

fn normalize_field_value(field: ConfigField, raw: &str) -> String {
    match field {
        ConfigField::AspectRatio => resolve_aspect_ratio(raw),
        _ => raw.to_string(),
    }
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(empty)"
    } else {
        value
    }
}

fn describe_config(config: &JoeyConfig) -> Vec<String> {
    ConfigField::ALL
        .iter()
        .map(|field| {
            let value = config.get(*field);
            match (field, aspect_ratio_label(value)) {
                (ConfigField::AspectRatio, Some(label)) => format!("{field}: {label}"),
                _ => format!("{field}: {}", display_value(value)),
            }
        })
        .collect()
}

fn describe_state(controller: &StudioController) -> Vec<String> {
    let mut rows = describe_config(controller.config());
    rows.push(format!(
        "reference: {}",
        controller
            .reference_image()
            .map(|image| format!("{} ({} chars)", image.mime_type, image.data.len()))
            .unwrap_or_else(|| "(none)".to_string())
    ));
    rows.push(format!(
        "current image: {}",
        controller
            .current_image()
            .map(describe_handle)
            .unwrap_or_else(|| "(none)".to_string())
    ));
    if let Some(error) = controller.error() {
        rows.push(format!("error: {error}"));
    }
    rows
}

fn describe_handle(handle: &str) -> String {
    match decode_data_uri(handle) {
        Ok((mime, bytes)) => format!("{mime}, {} bytes", bytes.len()),
        Err(_) => "unreadable image".to_string(),
    }
}

fn history_lines(history: &History) -> Vec<String> {
    history
        .entries()
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            json!({
                "n": idx + 1,
                "id": entry.id,
                "created_at": entry.created_at,
                "action": entry.config.action,
                "scene": entry.config.scene,
            })
            .to_string()
        })
        .collect()
}

/// Resolves a 1-based `/select` or `/download` index to a history entry id.
fn history_id_at(history: &History, index: Option<&Value>) -> Option<String> {
    let position = index.and_then(Value::as_u64)?;
    let slot = usize::try_from(position).ok()?.checked_sub(1)?;
    history.get(slot).map(|entry| entry.id.clone())
}

fn value_as_non_empty_string(value: Option<&Value>) -> Option<String> {
    let raw = value
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}
