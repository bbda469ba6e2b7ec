use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use webscrap::builders::{assemble, assemble_bytes};
use webscrap::config::load_options;
use webscrap::core::{
    capture, format_output_path, CaptureError, CaptureOptions, CaptureResult, ContainerKind,
    CssMode, Policy, ResourceCategory,
};
use webscrap::env::{capture as capture_env, core as core_env, generate_env_docs, EnvVar};
use webscrap::network::{HttpTransport, ReferrerPolicy};
use webscrap::parsers::HtmlParser;
use webscrap::utils::url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "webscrap",
    version,
    about = "Capture a web page and its resources into an offline archive",
    after_help = generate_env_docs()
)]
struct Cli {
    /// URL or local path of the page to capture
    target: String,

    /// Output path; supports %title%, %timestamp%, %extension% and %ext%, "-" writes to stdout
    #[arg(short, long)]
    output: Option<String>,

    /// TOML options file
    #[arg(short, long)]
    config: Option<String>,

    /// Output container: folder, zip, maff, single-html
    #[arg(short = 'f', long, value_parser = parse_container)]
    container: Option<ContainerKind>,

    /// Stylesheet handling: raw-url, tidy, match, none
    #[arg(long, value_parser = parse_css_mode)]
    css_mode: Option<CssMode>,

    /// Follow links up to this depth
    #[arg(short, long)]
    depth: Option<u32>,

    /// Per-category policy such as script=remove or image=save-used (repeatable)
    #[arg(short, long = "policy", value_name = "CATEGORY=POLICY", value_parser = parse_policy)]
    policies: Vec<(ResourceCategory, Policy)>,

    /// Only follow links to documents matching this substring or /regex/
    #[arg(long)]
    document_filter: Option<String>,

    /// Only download linked files matching this substring or /regex/
    #[arg(long)]
    file_filter: Option<String>,

    /// Never follow links matching this substring or /regex/
    #[arg(long)]
    exclude: Option<String>,

    /// Extension of linked files to download (repeatable)
    #[arg(long = "file-ext", value_name = "EXT")]
    file_extensions: Vec<String>,

    /// Additional page captured at depth 1 (repeatable)
    #[arg(long = "extra-url", value_name = "URL")]
    extra_urls: Vec<String>,

    /// Keep file names ASCII-only
    #[arg(long)]
    ascii_filenames: bool,

    /// Fetch resources one at a time, in discovery order
    #[arg(long)]
    sequential: bool,

    /// Skip resources larger than this many bytes
    #[arg(long, value_name = "BYTES")]
    max_size: Option<u64>,

    /// Referrer policy used for every request
    #[arg(long, value_parser = parse_referrer_policy)]
    referrer_policy: Option<ReferrerPolicy>,

    /// Record original values of rewritten attributes
    #[arg(long)]
    record_rewrites: bool,

    /// Link to the remote resource when it cannot be saved
    #[arg(long)]
    link_unsaved: bool,

    /// Store data: URIs as separate files
    #[arg(long)]
    save_data_uri: bool,

    /// Include manifest.json in bundle containers
    #[arg(long)]
    save_manifest: bool,

    /// Request timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// User-Agent header
    #[arg(short, long)]
    user_agent: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Only report errors
    #[arg(short, long)]
    silent: bool,
}

fn parse_container(value: &str) -> Result<ContainerKind, String> {
    capture_env::Container::parse(value).map_err(|e| e.message)
}

fn parse_css_mode(value: &str) -> Result<CssMode, String> {
    match value.trim().to_lowercase().as_str() {
        "raw-url" | "raw" => Ok(CssMode::RawUrl),
        "tidy" => Ok(CssMode::Tidy),
        "match" => Ok(CssMode::Match),
        "none" => Ok(CssMode::None),
        _ => Err(format!("unknown css mode '{value}'")),
    }
}

fn parse_referrer_policy(value: &str) -> Result<ReferrerPolicy, String> {
    ReferrerPolicy::parse(value).ok_or_else(|| format!("unknown referrer policy '{value}'"))
}

fn parse_policy(value: &str) -> Result<(ResourceCategory, Policy), String> {
    let (category, policy) = value
        .split_once('=')
        .ok_or_else(|| format!("expected CATEGORY=POLICY, got '{value}'"))?;
    let category = match category.trim().to_lowercase().replace('-', "_").as_str() {
        "image" => ResourceCategory::Image,
        "image_background" | "background" => ResourceCategory::ImageBackground,
        "font" => ResourceCategory::Font,
        "script" => ResourceCategory::Script,
        "style" => ResourceCategory::Style,
        "frame" => ResourceCategory::Frame,
        "embed" => ResourceCategory::Embed,
        "object" => ResourceCategory::Object,
        "applet" => ResourceCategory::Applet,
        "audio" => ResourceCategory::Audio,
        "video" => ResourceCategory::Video,
        "favicon" => ResourceCategory::Favicon,
        other => return Err(format!("unknown resource category '{other}'")),
    };
    let policy = match policy.trim().to_lowercase().as_str() {
        "save" => Policy::Save,
        "save-used" => Policy::SaveUsed,
        "inline" => Policy::Inline,
        "link" => Policy::Link,
        "blank" => Policy::Blank,
        "remove" => Policy::Remove,
        other => return Err(format!("unknown policy '{other}'")),
    };
    Ok((category, policy))
}

fn init_logging(silent: bool) {
    let level = if silent {
        "error".to_string()
    } else {
        core_env::LogLevel::get().unwrap_or_else(|_| "info".to_string())
    };
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(!core_env::NoColor::get_or_default(false))
        .init();
}

/// 本地路径转为 file: URL，缺少协议时补上 https
fn target_url(target: &str) -> CaptureResult<Url> {
    let path = Path::new(target);
    if path.exists() {
        let absolute = path.canonicalize()?;
        return Url::from_file_path(&absolute)
            .map_err(|_| CaptureError::InvalidUrl(target.to_string()));
    }

    match Url::parse(target) {
        Ok(url) => Ok(url),
        Err(_) => Url::parse(&format!("https://{target}"))
            .map_err(|_| CaptureError::InvalidUrl(target.to_string())),
    }
}

fn apply_cli(options: &mut CaptureOptions, cli: &Cli) {
    if let Some(container) = cli.container {
        options.container = container;
    }
    if let Some(css_mode) = cli.css_mode {
        options.css_mode = css_mode;
    }
    if cli.depth.is_some() {
        options.max_depth = cli.depth;
    }
    for (category, policy) in &cli.policies {
        options.policies.set(*category, *policy);
    }
    if cli.document_filter.is_some() {
        options.crawl.document_filter = cli.document_filter.clone();
    }
    if cli.file_filter.is_some() {
        options.crawl.file_filter = cli.file_filter.clone();
    }
    if cli.exclude.is_some() {
        options.crawl.exclude_filter = cli.exclude.clone();
    }
    options.crawl.file_extensions.extend(cli.file_extensions.iter().cloned());
    options.crawl.extra_urls.extend(cli.extra_urls.iter().cloned());
    options.ascii_filenames |= cli.ascii_filenames;
    options.sequential |= cli.sequential;
    if cli.max_size.is_some() {
        options.max_resource_size = cli.max_size;
    }
    if let Some(referrer_policy) = cli.referrer_policy {
        options.referrer_policy = referrer_policy;
    }
    options.record_rewrites |= cli.record_rewrites;
    options.link_unsaved |= cli.link_unsaved;
    options.save_data_uri_as_file |= cli.save_data_uri;
    options.save_manifest |= cli.save_manifest;
    if let Some(timeout) = cli.timeout {
        options.timeout_secs = timeout;
    }
    if cli.user_agent.is_some() {
        options.user_agent = cli.user_agent.clone();
    }
    options.insecure |= cli.insecure;
}

fn run(cli: Cli) -> CaptureResult<()> {
    let mut options = load_options(cli.config.as_deref())?;
    apply_cli(&mut options, &cli);

    let target = target_url(&cli.target)?;
    let transport = HttpTransport::new(&options)?;
    let parser = HtmlParser::new();
    let container = options.container;

    info!("capturing {}", target);
    let output = capture(&target, options, &transport, &parser)?;

    let template = cli.output.clone().unwrap_or_else(|| match container {
        ContainerKind::Folder => "%title%".to_string(),
        _ => "%title%.%extension%".to_string(),
    });

    if template == "-" {
        let bytes = assemble_bytes(&output)?;
        io::stdout().write_all(&bytes)?;
        return Ok(());
    }

    let mut destination = format_output_path(&template, output.title.as_deref(), container);
    if destination.trim().is_empty() || destination.starts_with('.') {
        destination = format!("{}{}", output.time_id, destination.trim());
    }
    assemble(&output, &PathBuf::from(destination))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.silent);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
