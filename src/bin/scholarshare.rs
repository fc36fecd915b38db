//! CLI binary for scholarshare.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs the pipeline and writes the results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scholarshare::{
    write_bundle, ContentBundle, ImageSettings, Orientation, Pipeline, PipelineConfig,
    PipelineProgress, Platform, PosterStyle, ProgressCallback, PublishMode, PublishSettings,
    RunOptions, SourceDocument, Stage,
};
use std::collections::HashMap;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner plus one log line per finished stage and platform. Stages after
/// analysis run concurrently, so events interleave.
struct CliProgress {
    bar: ProgressBar,
    platform_starts: Mutex<HashMap<Platform, Instant>>,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            platform_starts: Mutex::new(HashMap::new()),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn shorten(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let cut: String = msg.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        msg.to_string()
    }
}

impl PipelineProgress for CliProgress {
    fn on_stage_start(&self, stage: Stage) {
        let msg = match stage {
            Stage::Input => "reading paper…",
            Stage::Analysis => "analyzing paper…",
            Stage::Publish => "publishing blog post…",
            _ => "generating blog, social posts and poster…",
        };
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message(msg);
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<10} {}",
            green("✓"),
            stage,
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        self.bar.println(format!(
            "  {} {:<10} {}",
            red("✗"),
            stage,
            red(&shorten(error, 100)),
        ));
    }

    fn on_platform_start(&self, platform: Platform) {
        if let Ok(mut starts) = self.platform_starts.lock() {
            starts.insert(platform, Instant::now());
        }
    }

    fn on_platform_complete(&self, platform: Platform, has_image: bool) {
        let elapsed_ms = self
            .platform_starts
            .lock()
            .ok()
            .and_then(|mut s| s.remove(&platform))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        self.bar.println(format!(
            "  {} {:<10} {}  {}",
            green("✓"),
            platform,
            if has_image { "text + image" } else { "text only" },
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_platform_error(&self, platform: Platform, error: &str) {
        self.bar.println(format!(
            "  {} {:<10} {}",
            yellow("⚠"),
            platform,
            yellow(&shorten(error, 100)),
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Everything from an arXiv PDF, written under ./outputs
  scholarshare https://arxiv.org/pdf/1706.03762

  # Local PDF, ACM portrait poster compiled with pdflatex
  scholarshare paper.pdf --style acm --orientation portrait --latex pdflatex

  # Pasted text from stdin, LinkedIn and Twitter only
  pbpaste | scholarshare - --platforms linkedin,twitter

  # Analysis only
  scholarshare paper.pdf --analyze-only

  # Publish the blog post to DEV.to as a draft
  DEVTO_API_KEY=... scholarshare paper.pdf --publish draft

OUTPUT LAYOUT (<run> = <slug>_<YYYYMMDDTHHMMSS>_<hash>):
  outputs/analysis/<run>_analysis.md    outputs/analysis/<run>_analysis.json
  outputs/blog/<run>_blog.md            outputs/social/<run>_<platform>.txt
  outputs/images/<slug>_<platform>_<hash>.png
  outputs/posters/<run>_<style>_<orientation>.tex (.pdf with --latex)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY             OpenAI key (text model and image generation)
  ANTHROPIC_API_KEY          Anthropic key (text model)
  GEMINI_API_KEY             Google Gemini key (text model)
  SCHOLARSHARE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  SCHOLARSHARE_MODEL         Override model ID
  SCHOLARSHARE_IMAGE_API_KEY Image service key (defaults to OPENAI_API_KEY)
  DEVTO_API_KEY              DEV.to key for --publish
"#;

/// Turn research papers into blog posts, social media posts and posters.
#[derive(Parser, Debug)]
#[command(
    name = "scholarshare",
    version,
    about = "Turn research papers into blog posts, social media posts and LaTeX posters using LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF path, text/HTML file, HTTP/HTTPS URL, or `-` to read text from stdin.
    input: String,

    /// Directory for generated files.
    #[arg(short, long, env = "SCHOLARSHARE_OUTPUT_DIR", default_value = "outputs")]
    output_dir: PathBuf,

    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "SCHOLARSHARE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "SCHOLARSHARE_LLM_PROVIDER")]
    provider: Option<String>,

    /// Poster style.
    #[arg(long, env = "SCHOLARSHARE_STYLE", value_enum, default_value = "ieee")]
    style: StyleArg,

    /// Poster orientation.
    #[arg(long, env = "SCHOLARSHARE_ORIENTATION", value_enum, default_value = "landscape")]
    orientation: OrientationArg,

    /// Comma-separated platforms (linkedin, twitter, facebook, instagram) or `all`.
    #[arg(long, env = "SCHOLARSHARE_PLATFORMS", default_value = "all")]
    platforms: String,

    /// LaTeX compiler used to build the poster PDF (e.g. pdflatex). No PDF when unset.
    #[arg(long, env = "SCHOLARSHARE_LATEX")]
    latex: Option<String>,

    /// Skip image generation.
    #[arg(long)]
    no_images: bool,

    /// Image service API key.
    #[arg(long, env = "SCHOLARSHARE_IMAGE_API_KEY", hide_env_values = true)]
    image_api_key: Option<String>,

    /// Image service base URL (OpenAI-compatible).
    #[arg(long, env = "SCHOLARSHARE_IMAGE_BASE_URL", default_value = "https://api.openai.com/v1")]
    image_base_url: String,

    /// Image model.
    #[arg(long, env = "SCHOLARSHARE_IMAGE_MODEL", default_value = "dall-e-3")]
    image_model: String,

    /// Publish the blog post to DEV.to: draft or live.
    #[arg(long, value_enum)]
    publish: Option<PublishArg>,

    /// DEV.to API key.
    #[arg(long, env = "DEVTO_API_KEY", hide_env_values = true)]
    devto_api_key: Option<String>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "SCHOLARSHARE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Paper characters sent to the analyzer before truncation.
    #[arg(long, env = "SCHOLARSHARE_MAX_INPUT_CHARS", default_value_t = 120_000)]
    max_input_chars: usize,

    /// Retries for transient LLM and image failures (0 or 1).
    #[arg(long, env = "SCHOLARSHARE_MAX_RETRIES", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(0..=1))]
    max_retries: u32,

    /// LLM call timeout in seconds.
    #[arg(long, env = "SCHOLARSHARE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Image generation timeout in seconds.
    #[arg(long, env = "SCHOLARSHARE_IMAGE_TIMEOUT", default_value_t = 180)]
    image_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "SCHOLARSHARE_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// LaTeX compile timeout in seconds.
    #[arg(long, env = "SCHOLARSHARE_COMPILE_TIMEOUT", default_value_t = 120)]
    compile_timeout: u64,

    /// Stop after the analysis and print its summary.
    #[arg(long)]
    analyze_only: bool,

    /// Print the full result as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "SCHOLARSHARE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SCHOLARSHARE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SCHOLARSHARE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StyleArg {
    Ieee,
    Acm,
    Nature,
}

impl From<StyleArg> for PosterStyle {
    fn from(v: StyleArg) -> Self {
        match v {
            StyleArg::Ieee => PosterStyle::Ieee,
            StyleArg::Acm => PosterStyle::Acm,
            StyleArg::Nature => PosterStyle::Nature,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OrientationArg {
    Landscape,
    Portrait,
}

impl From<OrientationArg> for Orientation {
    fn from(v: OrientationArg) -> Self {
        match v {
            OrientationArg::Landscape => Orientation::Landscape,
            OrientationArg::Portrait => Orientation::Portrait,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PublishArg {
    Draft,
    Live,
}

impl From<PublishArg> for PublishMode {
    fn from(v: PublishArg) -> Self {
        match v {
            PublishArg::Draft => PublishMode::Draft,
            PublishArg::Live => PublishMode::Live,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs; verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgress::new);
    let config = build_config(
        &cli,
        progress.clone().map(|p| p as ProgressCallback),
    )?;
    let pipeline = Pipeline::from_config(config).context("Failed to set up the pipeline")?;
    let source = read_source(&cli.input)?;

    // ── Analyze-only mode ────────────────────────────────────────────────
    if cli.analyze_only {
        let result = pipeline.analyze_source(&source).await;
        if let Some(ref p) = progress {
            p.finish();
        }
        let (_, analysis) = result.context("Analysis failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&analysis).context("Failed to serialise analysis")?
            );
        } else {
            print!("{}", analysis.summary_markdown());
        }
        return Ok(());
    }

    // ── Full run ─────────────────────────────────────────────────────────
    let options = RunOptions {
        style: cli.style.into(),
        orientation: cli.orientation.into(),
        publish: cli.publish.map(Into::into),
    };
    let result = pipeline.run(&source, &options).await;
    if let Some(ref p) = progress {
        p.finish();
    }
    let bundle = result.context("Generation failed")?;

    let written = write_bundle(&bundle, &cli.output_dir)
        .await
        .context("Failed to write outputs")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&bundle).context("Failed to serialise result")?
        );
    } else if !cli.quiet {
        print_summary(&bundle, &written);
    }

    if let Some(ref e) = bundle.publish_error {
        anyhow::bail!("Publishing failed: {e}");
    }
    if bundle.blog.is_none() && bundle.poster.is_none() && bundle.stats.posts_with_text == 0 {
        anyhow::bail!("No content could be generated");
    }
    Ok(())
}

fn read_source(input: &str) -> Result<SourceDocument> {
    if input == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read paper text from stdin")?;
        return Ok(SourceDocument::Text(text));
    }
    SourceDocument::from_input(input).context("Invalid input")
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let platforms = parse_platforms(&cli.platforms)?;

    let image_api_key = if cli.no_images {
        None
    } else {
        cli.image_api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.is_empty())
    };

    let mut builder = PipelineConfig::builder()
        .max_tokens(cli.max_tokens)
        .max_input_chars(cli.max_input_chars)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .image_timeout_secs(cli.image_timeout)
        .download_timeout_secs(cli.download_timeout)
        .compile_timeout_secs(cli.compile_timeout)
        .platforms(platforms)
        .output_dir(cli.output_dir.clone())
        .image_settings(ImageSettings {
            base_url: cli.image_base_url.clone(),
            api_key: image_api_key,
            model: cli.image_model.clone(),
            ..ImageSettings::default()
        })
        .publish_settings(PublishSettings {
            api_key: cli.devto_api_key.clone(),
            ..PublishSettings::default()
        });

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref latex) = cli.latex {
        builder = builder.latex_compiler(latex.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--platforms` into a list of platforms.
fn parse_platforms(s: &str) -> Result<Vec<Platform>> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("all") {
        return Ok(Platform::ALL.to_vec());
    }
    s.split(',')
        .filter(|p| !p.trim().is_empty())
        .map(|p| p.parse::<Platform>().map_err(anyhow::Error::msg))
        .collect()
}

fn print_summary(bundle: &ContentBundle, written: &[PathBuf]) {
    eprintln!(
        "{} {}  {}",
        green("✔"),
        bold(&bundle.analysis.title),
        dim(&format!("({})", bundle.analysis.complexity)),
    );
    match (&bundle.blog, &bundle.blog_error) {
        (Some(blog), _) => eprintln!(
            "   blog      {} sections, {} min read",
            blog.sections.len(),
            blog.reading_time_minutes
        ),
        (None, Some(e)) => eprintln!("   blog      {}", red(e)),
        (None, None) => {}
    }
    eprintln!(
        "   social    {}/{} with text, {} with image",
        bundle.stats.posts_with_text,
        bundle.social.len(),
        bundle.stats.posts_with_image
    );
    match (&bundle.poster, &bundle.poster_error) {
        (Some(outcome), _) => {
            let compiled = match (&outcome.poster.pdf, &outcome.compile_error) {
                (Some(_), _) => green("PDF compiled"),
                (None, Some(e)) => yellow(&shorten(&e.to_string(), 80)),
                (None, None) => dim("LaTeX only"),
            };
            eprintln!(
                "   poster    {} {}  {}",
                outcome.poster.style, outcome.poster.orientation, compiled
            );
        }
        (None, Some(e)) => eprintln!("   poster    {}", red(e)),
        (None, None) => {}
    }
    if let Some(ref receipt) = bundle.publish {
        eprintln!(
            "   published {} {}",
            if receipt.published { "live" } else { "draft" },
            receipt.url.as_deref().unwrap_or(&receipt.id)
        );
    }
    eprintln!(
        "   {} files written  {}ms total",
        written.len(),
        bundle.stats.total_ms
    );
}
