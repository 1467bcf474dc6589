//! roomseal: end-to-end encrypted rooms from the command line
//!
//! Commands:
//!   room create            - create a room (fresh salt + verifier) and write its metadata
//!   room check             - test a room code against the room verifier
//!   text seal [<message>]  - encrypt a text message into a record (stdin if omitted)
//!   text open [<record>]   - decrypt a text record (stdin if omitted)
//!   file seal <input>      - stream-encrypt a file into a blob and write its media record
//!   file open <record>     - decrypt a media blob back into a file
//!   config show            - display current configuration
//!
//! The room code is read from ROOMSEAL_ROOM_CODE, or prompted for.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use roomseal_core::config::{CryptoConfig, RoomsealConfig};
use roomseal_crypto::{
    create_room_with, join_room_with, spawn_decrypt, spawn_encrypt, verify_room_code_with,
    KdfParams, MediaDescriptor, MessageRecord, OpenedMessage, OsRandom, RoomKey, RoomMetadata,
    TAG_SIZE,
};

const ROOM_CODE_ENV: &str = "ROOMSEAL_ROOM_CODE";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "roomseal",
    version,
    about = "End-to-end encrypted rooms",
    long_about = "roomseal: derive a room key from a shared room code and seal messages and files for an untrusted transport"
)]
struct Cli {
    /// Path to roomseal.toml configuration file
    #[arg(long, short = 'c', env = "ROOMSEAL_CONFIG", default_value = "roomseal.toml")]
    config: PathBuf,

    /// Room metadata file (salt + verifier, JSON)
    #[arg(long, short = 'r', env = "ROOMSEAL_ROOM", default_value = "room.json", global = true)]
    room: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides logging.level
    #[arg(long, env = "ROOMSEAL_LOG", global = true)]
    log: Option<String>,

    /// Log format (json, text); overrides logging.format
    #[arg(long, env = "ROOMSEAL_LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Room creation and room code checks
    Room {
        #[command(subcommand)]
        action: RoomAction,
    },

    /// Text messages
    Text {
        #[command(subcommand)]
        action: TextAction,
    },

    /// Media files (chunked stream encryption)
    File {
        #[command(subcommand)]
        action: FileAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum RoomAction {
    /// Create a room and write its metadata to --room
    Create {
        /// Overwrite an existing room file
        #[arg(long)]
        force: bool,
    },
    /// Check a room code against the room verifier
    Check,
}

#[derive(Subcommand, Debug)]
enum TextAction {
    /// Encrypt a message and print the record JSON
    Seal {
        /// Message text (read from stdin if omitted)
        message: Option<String>,
    },
    /// Decrypt a text record and print the message
    Open {
        /// Record JSON file (read from stdin if omitted)
        record: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum FileAction {
    /// Encrypt a file into a blob and write its media record
    Seal {
        /// File to encrypt
        input: PathBuf,
        /// Encrypted blob output (default: <input>.sealed)
        #[arg(long, short = 'o')]
        blob: Option<PathBuf>,
        /// Media record output (default: <blob>.json)
        #[arg(long)]
        record: Option<PathBuf>,
        /// Storage path recorded for the blob (default: blob file name)
        #[arg(long)]
        storage_path: Option<String>,
        /// Caption sent with the media
        #[arg(long, default_value = "")]
        caption: String,
    },
    /// Decrypt a media blob into a file
    Open {
        /// Media record JSON
        record: PathBuf,
        /// Encrypted blob (default: the record's storage path)
        #[arg(long)]
        blob: Option<PathBuf>,
        /// Output directory
        #[arg(long, short = 'o', default_value = ".")]
        out_dir: PathBuf,
        /// Overwrite an existing file in the output directory
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let level = cli
        .log
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.logging.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    if !cli.config.exists() {
        warn!(
            "config file not found: {}  (using defaults)",
            cli.config.display()
        );
    }
    debug!(version = env!("CARGO_PKG_VERSION"), "roomseal starting");

    match cli.command {
        Commands::Room { action: RoomAction::Create { force } } => {
            cmd_room_create(&config, &cli.room, force).await
        }
        Commands::Room { action: RoomAction::Check } => cmd_room_check(&config, &cli.room).await,
        Commands::Text { action: TextAction::Seal { message } } => {
            cmd_text_seal(&config, &cli.room, message).await
        }
        Commands::Text { action: TextAction::Open { record } } => {
            cmd_text_open(&config, &cli.room, record.as_deref()).await
        }
        Commands::File {
            action: FileAction::Seal { input, blob, record, storage_path, caption },
        } => {
            cmd_file_seal(
                &config,
                &cli.room,
                &input,
                blob.as_deref(),
                record.as_deref(),
                storage_path.as_deref(),
                &caption,
            )
            .await
        }
        Commands::File { action: FileAction::Open { record, blob, out_dir, force } } => {
            cmd_file_open(&config, &cli.room, &record, blob.as_deref(), &out_dir, force).await
        }
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

// ── Config + logging ──────────────────────────────────────────────────────────

fn load_config(path: &Path) -> Result<RoomsealConfig> {
    if path.exists() {
        RoomsealConfig::load(path).with_context(|| format!("loading config: {}", path.display()))
    } else {
        Ok(RoomsealConfig::default())
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries records and plaintext, so logs go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn kdf_params(config: &RoomsealConfig) -> KdfParams {
    KdfParams {
        iterations: config.crypto.pbkdf2_iterations,
    }
}

// ── Room code + room file helpers ─────────────────────────────────────────────

/// Room code from ROOMSEAL_ROOM_CODE, else an interactive prompt.
fn read_room_code() -> Result<SecretString> {
    if let Ok(code) = std::env::var(ROOM_CODE_ENV) {
        debug!("using room code from {ROOM_CODE_ENV}");
        return Ok(SecretString::from(code));
    }
    let code = rpassword::prompt_password("Room code: ").context("reading room code")?;
    Ok(SecretString::from(code))
}

async fn read_room(path: &Path) -> Result<RoomMetadata> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading room file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing room file: {}", path.display()))
}

async fn write_room(path: &Path, meta: &RoomMetadata) -> Result<()> {
    let json = serde_json::to_string_pretty(meta).context("serializing room metadata")?;
    tokio::fs::write(path, json + "\n")
        .await
        .with_context(|| format!("writing room file: {}", path.display()))
}

/// Read the room file and derive the key, rejecting a wrong code early.
async fn unlock_room(config: &RoomsealConfig, room: &Path) -> Result<RoomKey> {
    let meta = read_room(room).await?;
    let code = read_room_code()?;
    let params = kdf_params(config);

    tokio::task::spawn_blocking(move || join_room_with(&code, &meta, &params))
        .await
        .context("key derivation task failed")?
        .context("wrong room code or damaged room file")
}

async fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => tokio::fs::read_to_string(p)
            .await
            .with_context(|| format!("reading {}", p.display())),
        _ => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
        )
        .context("progress bar template")?
        .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

// ── `roomseal room` ───────────────────────────────────────────────────────────

async fn cmd_room_create(config: &RoomsealConfig, room: &Path, force: bool) -> Result<()> {
    if room.exists() && !force {
        anyhow::bail!(
            "room file already exists: {} (use --force to overwrite)",
            room.display()
        );
    }
    let code = read_room_code()?;
    let params = kdf_params(config);

    let (meta, _key) =
        tokio::task::spawn_blocking(move || create_room_with(&code, &params, &OsRandom))
            .await
            .context("key derivation task failed")?
            .context("creating room")?;

    write_room(room, &meta).await?;
    info!(room = %room.display(), "room created");
    println!("Room created: {}", room.display());
    println!("  salt:      {}", meta.salt);
    if let Some(v) = &meta.verifier_hash {
        println!("  verifier:  {v}");
    }
    Ok(())
}

async fn cmd_room_check(config: &RoomsealConfig, room: &Path) -> Result<()> {
    let meta = read_room(room).await?;
    let salt = meta.salt().context("room file salt")?;
    let verifier = meta
        .verifier()
        .context("room file verifier")?
        .context("room has no verifier; any room code will derive a key")?;
    let code = read_room_code()?;
    let params = kdf_params(config);

    let ok = tokio::task::spawn_blocking(move || {
        verify_room_code_with(&code, salt.as_bytes(), &verifier, &params)
    })
    .await
    .context("key derivation task failed")?;

    if !ok {
        anyhow::bail!("room code does not match {}", room.display());
    }
    println!("Room code OK");
    Ok(())
}

// ── `roomseal text` ───────────────────────────────────────────────────────────

async fn cmd_text_seal(config: &RoomsealConfig, room: &Path, message: Option<String>) -> Result<()> {
    let text = match message {
        Some(m) => m,
        None => read_input(None).await?,
    };
    let key = unlock_room(config, room).await?;

    let record = MessageRecord::seal_text(&key, &text).context("encrypting message")?;
    println!("{}", record.to_json()?);
    Ok(())
}

async fn cmd_text_open(config: &RoomsealConfig, room: &Path, record: Option<&Path>) -> Result<()> {
    let json = read_input(record).await?;
    let record = MessageRecord::from_json(json.trim())?;
    let key = unlock_room(config, room).await?;

    match record.open(&key).context("decrypting message")? {
        OpenedMessage::Text(text) => println!("{text}"),
        OpenedMessage::Media { kind, caption, descriptor, .. } => {
            println!("[{kind}] {} ({})", descriptor.file_name, fmt_bytes(descriptor.file_size));
            if !caption.is_empty() {
                println!("{caption}");
            }
        }
    }
    Ok(())
}

// ── `roomseal file seal` ──────────────────────────────────────────────────────

async fn cmd_file_seal(
    config: &RoomsealConfig,
    room: &Path,
    input: &Path,
    blob: Option<&Path>,
    record: Option<&Path>,
    storage_path: Option<&str>,
    caption: &str,
) -> Result<()> {
    if !input.is_file() {
        anyhow::bail!("not a file: {}", input.display());
    }
    let blob_path = blob
        .map(Path::to_path_buf)
        .unwrap_or_else(|| append_extension(input, "sealed"));
    let record_path = record
        .map(Path::to_path_buf)
        .unwrap_or_else(|| append_extension(&blob_path, "json"));
    let storage_path = storage_path.map(str::to_string).unwrap_or_else(|| {
        blob_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    });

    let key = unlock_room(config, room).await?;

    let size = std::fs::metadata(input)
        .with_context(|| format!("stat {}", input.display()))?
        .len();
    let pb = make_progress_bar(size, "seal")?;
    pb.set_message(display_name(input));

    let sealed = seal_file(&key, &config.crypto, input, &blob_path, &storage_path, caption, &pb).await?;
    pb.finish_with_message("done".to_string());

    let json = sealed.to_json()?;
    tokio::fs::write(&record_path, json + "\n")
        .await
        .with_context(|| format!("writing record: {}", record_path.display()))?;

    if let Some(meta) = &sealed.media_meta {
        println!("  kind:    {}", sealed.content_type);
        println!("  chunks:  {}", meta.chunk_count);
        println!("  bytes:   {}", fmt_bytes(meta.file_size));
    }
    println!("  blob:    {}", blob_path.display());
    println!("  record:  {}", record_path.display());
    Ok(())
}

/// Stream-encrypt `input` into `blob_path` and build the media record.
async fn seal_file(
    key: &RoomKey,
    crypto: &CryptoConfig,
    input: &Path,
    blob_path: &Path,
    storage_path: &str,
    caption: &str,
    pb: &ProgressBar,
) -> Result<MessageRecord> {
    let reader = std::fs::File::open(input)
        .with_context(|| format!("opening {}", input.display()))?;
    let mut pipeline = spawn_encrypt(reader, key, crypto.chunk_size, crypto.pipeline_depth)
        .context("starting encryption")?;

    let mut out = tokio::fs::File::create(blob_path)
        .await
        .with_context(|| format!("creating blob: {}", blob_path.display()))?;

    let mut plaintext_bytes = 0u64;
    while let Some(chunk) = pipeline.chunks.next().await {
        let chunk = chunk.with_context(|| format!("encrypting {}", input.display()))?;
        out.write_all(&chunk)
            .await
            .with_context(|| format!("writing blob: {}", blob_path.display()))?;
        let n = chunk.len().saturating_sub(TAG_SIZE) as u64;
        plaintext_bytes += n;
        pb.inc(n);
    }
    out.flush().await.context("flushing blob")?;

    let header = pipeline
        .header
        .await
        .context("encryption task failed")?
        .context("encryption stopped before the final chunk")?;
    debug!(chunks = header.chunk_count, bytes = plaintext_bytes, "file sealed");

    let descriptor = MediaDescriptor {
        file_name: display_name(input),
        mime_type: guess_mime(input).to_string(),
        file_size: plaintext_bytes,
    };
    MessageRecord::seal_media(key, caption, storage_path, &descriptor, &header)
        .context("encrypting media record")
}

// ── `roomseal file open` ──────────────────────────────────────────────────────

async fn cmd_file_open(
    config: &RoomsealConfig,
    room: &Path,
    record_path: &Path,
    blob: Option<&Path>,
    out_dir: &Path,
    force: bool,
) -> Result<()> {
    let json = read_input(Some(record_path)).await?;
    let record = MessageRecord::from_json(json.trim())?;
    let blob_path = match (blob, &record.media_meta) {
        (Some(b), _) => b.to_path_buf(),
        (None, Some(meta)) => blob_beside_record(record_path, &meta.storage_path),
        (None, None) => anyhow::bail!("{} is not a media record", record_path.display()),
    };

    let key = unlock_room(config, room).await?;
    let dest = open_file(
        &key,
        &record,
        &blob_path,
        out_dir,
        config.crypto.pipeline_depth,
        force,
    )
    .await?;

    println!("Decrypted: {}", dest.display());
    Ok(())
}

/// Locate a blob from the record's storage path. Only the last path
/// component is used, resolved next to the record file.
fn blob_beside_record(record_path: &Path, storage_path: &str) -> PathBuf {
    record_path
        .parent()
        .unwrap_or(Path::new("."))
        .join(sanitize_file_name(storage_path))
}

/// Decrypt a media blob into `out_dir`, named after the sealed file name.
///
/// Writes go to a `.part` file that is renamed only once every chunk has
/// authenticated, and removed otherwise. An existing file is only replaced
/// with `force`.
async fn open_file(
    key: &RoomKey,
    record: &MessageRecord,
    blob_path: &Path,
    out_dir: &Path,
    depth: usize,
    force: bool,
) -> Result<PathBuf> {
    let OpenedMessage::Media { descriptor, header, .. } =
        record.open(key).context("decrypting media record")?
    else {
        anyhow::bail!("record is a text message, not media");
    };

    let name = sanitize_file_name(&descriptor.file_name);
    let dest = out_dir.join(&name);
    let part = out_dir.join(format!("{name}.part"));
    if dest.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            dest.display()
        );
    }

    let reader = std::fs::File::open(blob_path)
        .with_context(|| format!("opening blob: {}", blob_path.display()))?;
    let blob_len = reader
        .metadata()
        .with_context(|| format!("stat blob: {}", blob_path.display()))?
        .len();
    let expected_len = header.encrypted_len(descriptor.file_size);
    if blob_len != expected_len {
        anyhow::bail!(
            "blob {} is {blob_len} bytes, record describes {expected_len}",
            blob_path.display()
        );
    }
    let mut chunks = spawn_decrypt(reader, key, &header, depth).context("starting decryption")?;

    let mut out = tokio::fs::File::create(&part)
        .await
        .with_context(|| format!("creating {}", part.display()))?;

    let written = async {
        let mut written = 0u64;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.with_context(|| format!("decrypting {}", blob_path.display()))?;
            out.write_all(&chunk).await.context("writing plaintext")?;
            written += chunk.len() as u64;
        }
        out.flush().await.context("flushing plaintext")?;
        Ok::<u64, anyhow::Error>(written)
    }
    .await;

    let written = match written {
        Ok(n) => n,
        Err(e) => {
            drop(out);
            if let Err(rm) = tokio::fs::remove_file(&part).await {
                warn!(path = %part.display(), "removing partial output: {rm}");
            }
            return Err(e);
        }
    };
    drop(out);

    if written != descriptor.file_size {
        warn!(
            expected = descriptor.file_size,
            written, "decrypted size differs from the record"
        );
    }
    tokio::fs::rename(&part, &dest)
        .await
        .with_context(|| format!("renaming {} to {}", part.display(), dest.display()))?;
    Ok(dest)
}

// ── `roomseal config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &RoomsealConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string())
}

/// `photo.jpg` + `sealed` → `photo.jpg.sealed`
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// Reduce a sender-chosen file name to a single safe path component.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    match cleaned {
        "" | "." | ".." => "roomseal-download".to_string(),
        other => other.to_string(),
    }
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "wav" => "audio/wav",
        "webm" => "video/webm",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomseal_core::types::ContentType;

    fn test_key() -> RoomKey {
        RoomKey::from_bytes([0x5au8; 32])
    }

    fn small_chunks() -> CryptoConfig {
        CryptoConfig {
            chunk_size: 4096,
            pipeline_depth: 2,
            ..CryptoConfig::default()
        }
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("a/b/Photo.JPG")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("voice.ogg")), "audio/ogg");
        assert_eq!(guess_mime(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(guess_mime(Path::new("README")), "application/octet-stream");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\x\\evil.exe"), "evil.exe");
        assert_eq!(sanitize_file_name("a\nb.txt"), "ab.txt");
        assert_eq!(sanitize_file_name(".."), "roomseal-download");
        assert_eq!(sanitize_file_name("dir/"), "roomseal-download");
    }

    #[test]
    fn test_append_extension() {
        assert_eq!(
            append_extension(Path::new("x/photo.jpg"), "sealed"),
            PathBuf::from("x/photo.jpg.sealed")
        );
    }

    #[test]
    fn test_fmt_bytes() {
        assert_eq!(fmt_bytes(512), "512 B");
        assert_eq!(fmt_bytes(2048), "2.0 KB");
        assert_eq!(fmt_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[tokio::test]
    async fn test_room_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room.json");
        let (meta, _) = create_room_with(
            &SecretString::from("river-stone"),
            &KdfParams { iterations: 1000 },
            &OsRandom,
        )
        .unwrap();

        write_room(&path, &meta).await.unwrap();
        assert_eq!(read_room(&path).await.unwrap(), meta);
    }

    #[tokio::test]
    async fn test_seal_and_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&input, &data).unwrap();

        let key = test_key();
        let blob = dir.path().join("clip.mp4.sealed");
        let record = seal_file(
            &key,
            &small_chunks(),
            &input,
            &blob,
            "clip.mp4.sealed",
            "look",
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();

        assert_eq!(record.content_type, ContentType::Video);
        let meta = record.media_meta.as_ref().unwrap();
        assert_eq!(meta.file_size, data.len() as u64);
        assert_eq!(meta.chunk_count, 5);

        let out_dir = dir.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();
        let dest = open_file(&key, &record, &blob, &out_dir, 2, false).await.unwrap();

        assert_eq!(dest, out_dir.join("clip.mp4"));
        assert_eq!(std::fs::read(&dest).unwrap(), data);
    }

    #[tokio::test]
    async fn test_open_tampered_blob_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.pdf");
        std::fs::write(&input, vec![7u8; 10_000]).unwrap();

        let key = test_key();
        let blob = dir.path().join("notes.sealed");
        let record = seal_file(
            &key,
            &small_chunks(),
            &input,
            &blob,
            "notes.sealed",
            "",
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();

        let mut bytes = std::fs::read(&blob).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        std::fs::write(&blob, bytes).unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        assert!(open_file(&key, &record, &blob, out_dir.path(), 2, false).await.is_err());
        assert_eq!(std::fs::read_dir(out_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_open_file_rejects_text_record() {
        let dir = tempfile::tempdir().unwrap();
        let key = test_key();
        let record = MessageRecord::seal_text(&key, "hi").unwrap();

        let err = open_file(&key, &record, &dir.path().join("none"), dir.path(), 1, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("text message"));
    }

    #[test]
    fn test_blob_beside_record_stays_next_to_record() {
        let record = Path::new("inbox/rec.json");
        assert_eq!(
            blob_beside_record(record, "clip.sealed"),
            PathBuf::from("inbox/clip.sealed")
        );
        assert_eq!(
            blob_beside_record(record, "/etc/shadow"),
            PathBuf::from("inbox/shadow")
        );
        assert_eq!(
            blob_beside_record(record, "../../home/u/.ssh/id_ed25519"),
            PathBuf::from("inbox/id_ed25519")
        );
    }

    async fn sealed_fixture(dir: &Path, name: &str, data: &[u8]) -> (MessageRecord, PathBuf) {
        let input = dir.join(name);
        std::fs::write(&input, data).unwrap();
        let blob = dir.join(format!("{name}.sealed"));
        let record = seal_file(
            &test_key(),
            &small_chunks(),
            &input,
            &blob,
            "blob",
            "",
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();
        (record, blob)
    }

    #[tokio::test]
    async fn test_open_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let (record, blob) = sealed_fixture(dir.path(), "room.json", b"{\"forged\":true}").await;

        let out_dir = tempfile::tempdir().unwrap();
        let existing = out_dir.path().join("room.json");
        std::fs::write(&existing, b"original").unwrap();

        let err = open_file(&test_key(), &record, &blob, out_dir.path(), 2, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(std::fs::read(&existing).unwrap(), b"original");

        let dest = open_file(&test_key(), &record, &blob, out_dir.path(), 2, true)
            .await
            .unwrap();
        assert_eq!(std::fs::read(dest).unwrap(), b"{\"forged\":true}");
    }

    #[tokio::test]
    async fn test_open_rejects_blob_of_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let (record, blob) = sealed_fixture(dir.path(), "data.bin", &[3u8; 9000]).await;

        let mut bytes = std::fs::read(&blob).unwrap();
        bytes.truncate(bytes.len() - 100);
        std::fs::write(&blob, bytes).unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        let err = open_file(&test_key(), &record, &blob, out_dir.path(), 2, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("record describes"));
        assert_eq!(std::fs::read_dir(out_dir.path()).unwrap().count(), 0);
    }
}
