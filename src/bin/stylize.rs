//! CLI for Stylize - restyle portrait photos via AI image APIs.

use anyhow::Context;
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use stylize::{
    styles, ApiKeyAuthority, CredentialAuthority, GateState, GeminiModel, GeminiProvider,
    GenerationService, KeyPrompt, SelectedFile, SharedApiKey, SignInPolicy, Studio,
    StudioOptions,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stylize")]
#[command(about = "Restyle portrait photos with a text prompt via Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log request details to stderr (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in styles
    Styles,

    /// Print a photo as a data URL
    Encode(EncodeArgs),

    /// Split a data URL into MIME type and payload
    Decode(DecodeArgs),

    /// Check that an API key is available
    Check(CheckArgs),

    /// Restyle one photo and save the result
    Generate(GenerateArgs),

    /// Interactive session: upload, pick styles, generate, save
    Session(SessionArgs),
}

#[derive(Args)]
struct EncodeArgs {
    /// Photo to encode
    input: PathBuf,

    /// MIME type to use instead of guessing from the extension
    #[arg(long)]
    mime: Option<String>,
}

#[derive(Args)]
struct DecodeArgs {
    /// Data URL, or @path to read it from a file
    data_url: String,

    /// Write the decoded bytes here
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct CheckArgs {
    /// Also ask the API whether the key and model are accepted
    #[arg(long)]
    remote: bool,

    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Args)]
struct GenerateArgs {
    /// Photo to restyle
    input: PathBuf,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// Catalog style to apply
    #[arg(short, long, conflicts_with = "prompt")]
    style: Option<String>,

    /// Custom prompt instead of a catalog style
    #[arg(short, long)]
    prompt: Option<String>,

    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Args)]
struct SessionArgs {
    /// Re-check the key after sign-in instead of trusting it
    #[arg(long)]
    verify_sign_in: bool,

    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Args)]
struct ProviderArgs {
    /// Gemini model (nano-banana, nano-banana-pro)
    #[arg(short, long, default_value = "nano-banana")]
    model: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout: u64,
}

impl ProviderArgs {
    fn build(&self, key: SharedApiKey) -> anyhow::Result<GeminiProvider> {
        let model: GeminiModel = self.model.parse()?;
        Ok(GeminiProvider::builder()
            .shared_key(key)
            .model(model)
            .timeout(std::time::Duration::from_secs(self.timeout))
            .build()?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Styles => list_styles(cli.json)?,
        Commands::Encode(args) => encode(args).await?,
        Commands::Decode(args) => decode(args, cli.json).await?,
        Commands::Check(args) => check(args, cli.json).await?,
        Commands::Generate(args) => generate(args, cli.json).await?,
        Commands::Session(args) => run_session(args).await?,
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "stylize=debug",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn list_styles(json_output: bool) -> anyhow::Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(styles::catalog())?);
        return Ok(());
    }

    println!("Available styles:\n");
    for style in styles::catalog() {
        println!("  {:<14} {}", style.id, style.name);
    }
    Ok(())
}

async fn encode(args: EncodeArgs) -> anyhow::Result<()> {
    let file = match args.mime {
        Some(mime) => SelectedFile::new(&args.input, mime),
        None => SelectedFile::from_path(&args.input),
    };
    stylize::check_upload_type(&file.mime_type)?;
    let data_url = stylize::encode_file_as_data_url(&file).await?;
    println!("{data_url}");
    Ok(())
}

async fn decode(args: DecodeArgs, json_output: bool) -> anyhow::Result<()> {
    let data_url = match args.data_url.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {path}"))?,
        None => args.data_url,
    };
    let image = stylize::decode_data_url(data_url.trim())?;

    if let Some(ref output) = args.output {
        image.save(output).await?;
    }

    if json_output {
        let result = serde_json::json!({
            "mimeType": image.mime_type,
            "base64Length": image.base64_data.len(),
            "sizeBytes": image.approx_size(),
            "output": args.output.as_ref().map(|p| p.display().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("MIME type: {}", image.mime_type);
        println!("Payload: {} base64 chars (~{} bytes)", image.base64_data.len(), image.approx_size());
        if let Some(output) = args.output {
            println!("Saved to {}", output.display());
        }
    }
    Ok(())
}

async fn check(args: CheckArgs, json_output: bool) -> anyhow::Result<()> {
    let key = SharedApiKey::from_env();
    let authority: Arc<dyn CredentialAuthority> = Arc::new(ApiKeyAuthority::new(key.clone()));
    let mut studio = Studio::new(Some(authority), StudioOptions::default());
    let state = studio.start().await;

    let remote = if args.remote && state == GateState::Ready {
        let provider = args.provider.build(key)?;
        Some(provider.health_check().await.map_err(|e| e.to_string()))
    } else {
        None
    };

    if json_output {
        let result = serde_json::json!({
            "gate": state,
            "remote": remote.as_ref().map(|r| r.is_ok()),
            "error": remote.as_ref().and_then(|r| r.as_ref().err()),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        match state {
            GateState::Ready => println!("API key: found"),
            _ => println!("API key: missing (set GEMINI_API_KEY or GOOGLE_API_KEY)"),
        }
        match &remote {
            Some(Ok(())) => println!("Remote check: ok"),
            Some(Err(e)) => println!("Remote check: {e}"),
            None => {}
        }
    }

    if state != GateState::Ready {
        anyhow::bail!("no API key available");
    }
    if let Some(Err(e)) = remote {
        anyhow::bail!(e);
    }
    Ok(())
}

async fn generate(args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let key = SharedApiKey::from_env();
    let authority: Arc<dyn CredentialAuthority> = Arc::new(ApiKeyAuthority::new(key.clone()));
    let provider = args.provider.build(key)?;
    let mut studio = Studio::new(Some(authority), StudioOptions::default());

    if studio.start().await != GateState::Ready {
        anyhow::bail!("no API key available; set GEMINI_API_KEY or GOOGLE_API_KEY");
    }

    studio.upload(&SelectedFile::from_path(&args.input)).await?;
    match (args.style, args.prompt) {
        (_, Some(prompt)) => studio.set_prompt(prompt),
        (Some(style), None) => {
            studio.select_style(&style)?;
        }
        (None, None) => {}
    }

    let start = std::time::Instant::now();
    studio.generate(&provider).await?;
    let image = studio
        .state()
        .generated()
        .context("generation finished without an image")?;
    image.save(&args.output).await?;

    if json_output {
        let result = serde_json::json!({
            "type": "image",
            "success": true,
            "output": args.output.display().to_string(),
            "size_bytes": image.approx_size(),
            "mime_type": image.mime_type,
            "provider": provider.name(),
            "model": provider.model().as_str(),
            "style": studio.state().style_id(),
            "duration_ms": start.elapsed().as_millis() as u64,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Generated image: {} ({} bytes) via {}",
            args.output.display(),
            image.approx_size(),
            provider.name()
        );
        println!("Duration: {}ms", start.elapsed().as_millis());
    }

    Ok(())
}

type StdinLines = Arc<Mutex<Lines<BufReader<Stdin>>>>;

/// Reads a key from the same stdin the session reads commands from.
struct StdinKeyPrompt {
    lines: StdinLines,
}

#[async_trait]
impl KeyPrompt for StdinKeyPrompt {
    async fn prompt_for_key(&self) -> stylize::Result<String> {
        eprint!("Paste your Gemini API key (empty to cancel): ");
        let line = self.lines.lock().await.next_line().await?;
        Ok(line.unwrap_or_default())
    }
}

const SESSION_HELP: &str = "\
Commands:
  upload <path>     pick a photo (png, jpeg, webp, heic, heif)
  styles            list styles
  style <id>        seed the prompt from a style
  prompt <text>     replace the prompt
  show              print the current state
  generate          restyle the photo with the prompt
  original          show the uploaded photo again
  change            clear the photo to pick another
  save <path>       write the displayed image to a file
  signin            enter an API key
  dismiss           clear the error message
  help              this text
  quit              leave";

async fn run_session(args: SessionArgs) -> anyhow::Result<()> {
    let lines: StdinLines = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let key = SharedApiKey::from_env();
    let authority: Arc<dyn CredentialAuthority> = Arc::new(
        ApiKeyAuthority::new(key.clone()).with_prompt(StdinKeyPrompt {
            lines: Arc::clone(&lines),
        }),
    );
    let provider = args.provider.build(key)?;

    let policy = if args.verify_sign_in {
        SignInPolicy::Verify
    } else {
        SignInPolicy::Optimistic
    };
    let mut studio = Studio::new(Some(authority), StudioOptions::new().with_sign_in_policy(policy));

    if studio.start().await != GateState::Ready {
        println!("No API key found. Type `signin` to enter one.");
    }
    println!("{SESSION_HELP}");

    loop {
        eprint!("> ");
        let Some(line) = lines.lock().await.next_line().await? else {
            break;
        };
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => continue,
            "quit" | "exit" => break,
            "help" => println!("{SESSION_HELP}"),
            "styles" => list_styles(false)?,
            "style" => {
                if let Ok(style) = studio.select_style(rest) {
                    println!("Style: {}", style.name);
                }
            }
            "prompt" => studio.set_prompt(rest),
            "upload" => {
                if studio.upload(&SelectedFile::from_path(rest)).await.is_ok() {
                    println!("Uploaded {rest}");
                }
            }
            "generate" => {
                println!("Generating...");
                if studio.generate(&provider).await.is_ok() {
                    println!("Done. `save <path>` to keep it, `original` to compare.");
                }
            }
            "original" => studio.show_original(),
            "change" => studio.change_photo(),
            "save" => match studio.state().displayed_image() {
                Some(image) => match image.save(rest).await {
                    Ok(()) => println!("Saved {rest}"),
                    Err(e) => println!("Error: {e}"),
                },
                None => println!("Nothing to save yet"),
            },
            "signin" => {
                let state = studio.sign_in().await;
                println!("Access: {state:?}");
            }
            "dismiss" => studio.dismiss_error(),
            "show" => print_state(&studio),
            other => println!("Unknown command `{other}`; type `help`"),
        }

        if let Some(error) = studio.state().error() {
            println!("Error: {error}");
        }
    }

    Ok(())
}

fn print_state(studio: &Studio) {
    let state = studio.state();
    println!("Access:    {:?}", studio.gate_state());
    match state.upload() {
        Some(upload) => println!(
            "Photo:     {} ({}, ~{} bytes)",
            upload.file_name,
            upload.image.mime_type,
            upload.image.approx_size()
        ),
        None => println!("Photo:     none"),
    }
    println!("Style:     {}", state.style_id().unwrap_or("custom"));
    println!("Prompt:    {}", state.prompt());
    println!("Phase:     {:?}", state.phase());
    if let Some(image) = state.generated() {
        println!("Result:    {} (~{} bytes)", image.mime_type, image.approx_size());
    }
}
