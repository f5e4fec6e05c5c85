//! `cryptattr` CLI tool for key generation, digests and attribute encryption.

#![warn(clippy::pedantic, clippy::nursery)]

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use cryptattr::prelude::*;
use cryptattr_key_file::FileKeySource;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cryptattr")]
#[command(about = "Encrypted attribute tooling", long_about = None)]
struct Cli {
    /// Log level used when `RUST_LOG` is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate missing key files
    Keygen {
        /// Output directory for keys
        #[arg(short, long, default_value = "./keys")]
        output: PathBuf,
    },
    /// Print the digest payload of a plaintext
    Digest {
        #[command(flatten)]
        digest: DigestArgs,
        /// Value to digest
        plaintext: String,
    },
    /// Compare a digest payload with a plaintext candidate
    Verify {
        #[command(flatten)]
        digest: DigestArgs,
        /// Stored payload
        payload: String,
        /// Plaintext candidate
        candidate: String,
    },
    /// Run the write transition of a configured attribute
    Encrypt {
        /// TOML attribute declarations
        #[arg(short, long)]
        config: PathBuf,
        /// Key directory for `key = "source"` declarations
        #[arg(short, long)]
        keys: Option<PathBuf>,
        /// Plaintext attribute to encrypt
        #[arg(short, long)]
        attribute: String,
        /// Other record attributes as `name=value`; also used as salts for
        /// attribute-referenced salts
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
        /// Value to encrypt
        plaintext: String,
    },
}

#[derive(Args)]
struct DigestArgs {
    /// Digest algorithm
    #[arg(long, default_value = "sha1")]
    algorithm: DigestAlgorithm,
    /// Salt appended to the plaintext
    #[arg(long)]
    salt: Option<String>,
    /// Digest without any salt
    #[arg(long, conflicts_with = "salt")]
    unsalted: bool,
    /// Append the salt to the payload
    #[arg(long)]
    embed: bool,
}

impl DigestArgs {
    fn options(&self) -> DigestOptions {
        let salt = match (&self.salt, self.unsalted) {
            (_, true) => SaltSpec::Absent,
            (Some(salt), false) => SaltSpec::literal(salt.clone()),
            (None, false) => SaltSpec::default(),
        };
        let options = DigestOptions::new(self.algorithm).with_salt(salt);
        if self.embed {
            options.embed_salt()
        } else {
            options
        }
    }
}

fn parse_field(field: &str) -> Result<(String, String), String> {
    field
        .split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got `{field}`"))
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level).context("initializing logging")?;

    match cli.command {
        Commands::Keygen { output } => {
            FileKeySource::init(&output)
                .with_context(|| format!("initializing key directory {}", output.display()))?;
            println!("Keys written to: {}", output.display());
        }
        Commands::Digest { digest, plaintext } => {
            let mut record = MemoryRecord::new();
            let cipher = DigestCipher::for_write(&digest.options(), &mut record)?;
            println!("{}", cipher.encrypt(&plaintext)?);
        }
        Commands::Verify { digest, payload, candidate } => {
            let cipher = DigestCipher::for_read(&digest.options(), &MemoryRecord::new(), &payload)?;
            if cipher.matches(&payload, &candidate)? {
                println!("match");
            } else {
                println!("no match");
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Encrypt { config, keys, attribute, fields, plaintext } => {
            let payload = encrypt(&config, keys, &attribute, fields, &plaintext)?;
            println!("{payload}");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn encrypt(
    config: &Path,
    keys: Option<PathBuf>,
    source: &str,
    fields: Vec<(String, String)>,
    plaintext: &str,
) -> Result<String> {
    let keys = keys.map(FileKeySource::new).transpose()?;
    let attributes = AttributesConfig::from_file(config)?
        .build(keys.as_ref().map(|k| k as &dyn KeySource))?;
    let Some(attribute) = attributes.get(source) else {
        bail!("`{source}` is not declared in {}", config.display());
    };

    let mut record = MemoryRecord::new();
    for (name, value) in fields {
        let salt = value.clone();
        record = record.with_salt_creator(name.clone(), move |_| salt.clone());
        record.set_attribute(&name, Some(value.into()));
    }
    record.set_attribute(source, Some(plaintext.into()));

    let outcome = attribute.encrypt_source(&mut record)?;
    debug!(attribute = source, ?outcome, "write transition finished");

    record
        .attribute(attribute.target())
        .map(|value| value.to_string())
        .with_context(|| format!("`{source}` was not encrypted ({outcome:?})"))
}
