// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/sigilcore

//! Reference CLI for the sigil-core watermarking engine.
//!
//! Exit codes: 0 success, 2 usage error, 3 capacity exceeded,
//! 4 extraction failed, 5 signing/config error.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use sigil_core::evidence::{sha256_hex, EvidenceRecord, EvidenceSigner};
use sigil_core::fingerprint::Fingerprint;
use sigil_core::mark::{self, EmbedConfig, MarkError};
use sigil_core::media::OutputFormat;
use sigil_core::robustness;

/// Environment variable holding the 64-char lowercase hex signing key.
const SIGNING_KEY_ENV: &str = "SIGIL_SIGNING_KEY";

const EXIT_CAPACITY: u8 = 3;
const EXIT_EXTRACTION: u8 = 4;
const EXIT_SIGNING: u8 = 5;

/// sigil - forensic watermark embedding and verification
#[derive(Parser)]
#[command(name = "sigil")]
#[command(version)]
#[command(about = "Forensic watermarking: embed, extract, verify, stress-test", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed a payload into an image
    Embed {
        /// Input image path (JPEG/PNG/WebP)
        #[arg(long = "in")]
        input: PathBuf,

        /// Payload text to embed
        #[arg(long)]
        payload: String,

        /// Work identifier (domain separator for all seeds)
        #[arg(long)]
        workid: String,

        /// Embedding strength in [0.05, 0.20]
        #[arg(long, default_value_t = mark::DEFAULT_STRENGTH)]
        strength: f64,

        /// Reed-Solomon parity bytes (8, 12 or 16)
        #[arg(long, default_value_t = 8)]
        ecc: usize,

        /// Output path
        #[arg(long)]
        out: PathBuf,

        /// Write PNG instead of JPEG
        #[arg(long)]
        png: bool,
    },
    /// Extract a payload from a watermarked image
    Extract {
        /// Watermarked image path
        #[arg(long = "in")]
        input: PathBuf,

        /// Work identifier used at embed time
        #[arg(long)]
        workid: String,

        /// Payload hash used at embed time (lowercase hex)
        #[arg(long)]
        payload_hash: String,

        /// Payload byte length
        #[arg(long)]
        length: usize,

        /// Reed-Solomon parity bytes
        #[arg(long, default_value_t = 8)]
        ecc: usize,

        /// Embedding strength used at embed time
        #[arg(long, default_value_t = mark::DEFAULT_STRENGTH)]
        strength: f64,
    },
    /// Verify an evidence record's signature and payload-hash invariant
    Verify {
        /// Evidence record JSON path
        #[arg(long)]
        record: PathBuf,
    },
    /// Run the robustness battery against a watermarked image
    Robust {
        /// Watermarked image path
        #[arg(long = "in")]
        input: PathBuf,

        /// Work identifier used at embed time
        #[arg(long)]
        workid: String,

        /// Payload hash used at embed time (lowercase hex)
        #[arg(long)]
        payload_hash: String,

        /// Payload byte length
        #[arg(long)]
        length: usize,

        /// Reed-Solomon parity bytes
        #[arg(long, default_value_t = 8)]
        ecc: usize,

        /// Embedding strength used at embed time
        #[arg(long, default_value_t = mark::DEFAULT_STRENGTH)]
        strength: f64,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sigil_core=info".into()),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Signer from the environment. `Ok(None)` when the variable is unset;
/// a set-but-malformed key is a hard config error.
fn signer_from_env() -> Result<Option<EvidenceSigner>, MarkError> {
    match std::env::var(SIGNING_KEY_ENV) {
        Ok(key) => EvidenceSigner::from_hex(&key).map(Some),
        Err(_) => Ok(None),
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Embed {
            input,
            payload,
            workid,
            strength,
            ecc,
            out,
            png,
        } => {
            let signer = match signer_from_env() {
                Ok(signer) => signer,
                Err(_) => {
                    eprintln!("{SIGNING_KEY_ENV} is set but not a valid secp256k1 key");
                    return Ok(ExitCode::from(EXIT_SIGNING));
                }
            };

            let original = fs::read(&input).with_context(|| format!("reading {input:?}"))?;
            let payload_hash = sha256_hex(payload.as_bytes());
            let cfg = EmbedConfig {
                strength,
                ecc_bytes: ecc,
                output: if png { OutputFormat::Png } else { OutputFormat::default() },
            };

            let marked = match mark::embed_payload(&original, &payload, &workid, &payload_hash, &cfg)
            {
                Ok(marked) => marked,
                Err(MarkError::CapacityExceeded {
                    required_bits,
                    total_blocks,
                }) => {
                    eprintln!(
                        "capacity exceeded: {required_bits} bits required, {total_blocks} blocks available"
                    );
                    return Ok(ExitCode::from(EXIT_CAPACITY));
                }
                Err(e) => return Err(e.into()),
            };

            fs::write(&out, &marked.bytes).with_context(|| format!("writing {out:?}"))?;

            let fingerprint = Fingerprint::compute(&marked.image);
            println!("workId:       {workid}");
            println!("payloadHash:  {payload_hash}");
            println!("psnr:         {:.2} dB", marked.metrics.psnr);
            println!("ssim:         {:.4}", marked.metrics.ssim);
            println!("pHash:        {:016x}", fingerprint.phash);
            println!("aHash:        {:016x}", fingerprint.ahash);
            println!("dHash:        {:016x}", fingerprint.dhash);
            if let Some(signer) = signer {
                let media_hash = sha256_hex(&original);
                let ts = chrono::Utc::now().timestamp_millis();
                let sig = signer.sign_evidence(&media_hash, &payload_hash, ts);
                println!("signature:    {sig}");
                println!("publicKey:    {}", signer.public_key_hex());
                println!("timestamp:    {ts}");
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Extract {
            input,
            workid,
            payload_hash,
            length,
            ecc,
            strength,
        } => {
            let bytes = fs::read(&input).with_context(|| format!("reading {input:?}"))?;
            let outcome =
                mark::extract_payload(&bytes, &workid, &payload_hash, length, ecc, strength)?;
            match &outcome.payload {
                Some(text) => {
                    println!("payload:          {text}");
                    println!("confidence:       {:.3}", outcome.confidence);
                    println!("errorsFound:      {}", outcome.errors_found);
                    println!("errorsCorrected:  {}", outcome.errors_corrected);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("extraction failed (errorsFound={})", outcome.errors_found);
                    Ok(ExitCode::from(EXIT_EXTRACTION))
                }
            }
        }

        Commands::Verify { record } => {
            let json = fs::read_to_string(&record).with_context(|| format!("reading {record:?}"))?;
            let record: EvidenceRecord =
                serde_json::from_str(&json).context("parsing evidence record")?;
            if !record.payload_hash_consistent() {
                eprintln!("payload hash does not match the canonical payload");
                return Ok(ExitCode::from(EXIT_SIGNING));
            }
            if record.verify_signature() {
                println!("signature valid for {}", record.work_id);
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("signature missing or invalid for {}", record.work_id);
                Ok(ExitCode::from(EXIT_SIGNING))
            }
        }

        Commands::Robust {
            input,
            workid,
            payload_hash,
            length,
            ecc,
            strength,
        } => {
            let bytes = fs::read(&input).with_context(|| format!("reading {input:?}"))?;
            let cases =
                robustness::run_robustness(&bytes, &workid, &payload_hash, length, ecc, strength)?;
            println!("{}", serde_json::to_string_pretty(&cases)?);
            let detected = cases.iter().filter(|c| c.detected).count();
            eprintln!("{detected}/{} cases detected", cases.len());
            Ok(ExitCode::SUCCESS)
        }
    }
}
