//! CLI command implementations

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use hashdir::{ContentStore, HashDir, PutSource, StoreConfig, StoreError};

use crate::EXIT_VERIFY_FAILED;

/// Store each input and print `<digest>  <input>` (or JSON) per line.
pub fn put(config: StoreConfig, inputs: &[String], json: bool) -> Result<ExitCode> {
    let store = HashDir::open(config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for input in inputs {
        let outcome = if input == "-" {
            let stdin = io::stdin();
            let mut reader = stdin.lock();
            store.put(PutSource::Reader(&mut reader))
        } else {
            store.put(PutSource::Path(Path::new(input)))
        }
        .with_context(|| format!("failed to store {}", input))?;

        if json {
            let mut line = serde_json::to_value(&outcome)?;
            line["input"] = serde_json::Value::String(input.clone());
            writeln!(out, "{}", line)?;
        } else {
            writeln!(out, "{}  {}", outcome.digest, input)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

pub fn path(config: StoreConfig, digest: &str) -> Result<ExitCode> {
    let store = HashDir::open(config)?;
    let path = store.path_for(digest)?;
    println!("{}", path.display());
    Ok(ExitCode::SUCCESS)
}

pub fn cat(config: StoreConfig, digest: &str) -> Result<ExitCode> {
    let store = HashDir::open(config)?;
    let mut file = store.open_for_read(digest)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    io::copy(&mut file, &mut out).context("failed to write object to stdout")?;
    out.flush()?;
    Ok(ExitCode::SUCCESS)
}

pub fn has(config: StoreConfig, digest: &str) -> Result<ExitCode> {
    let store = HashDir::open(config)?;
    let digest = store.parse_digest(digest)?;
    if store.exists(&digest) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Re-hash objects; print `<digest>  FAILED` for each mismatch.
pub fn verify(config: StoreConfig, digests: &[String]) -> Result<ExitCode> {
    let store = HashDir::open(config)?;

    let targets = if digests.is_empty() {
        store.digests()?
    } else {
        digests
            .iter()
            .map(|d| store.parse_digest(d))
            .collect::<Result<Vec<_>, StoreError>>()?
    };

    let mut failed = 0usize;
    for digest in &targets {
        if store.verify(digest)? {
            tracing::debug!(digest = %digest, "verified");
        } else {
            println!("{}  FAILED", digest);
            failed += 1;
        }
    }

    if failed > 0 {
        eprintln!("hashdir: {} of {} objects failed verification", failed, targets.len());
        return Ok(ExitCode::from(EXIT_VERIFY_FAILED));
    }
    Ok(ExitCode::SUCCESS)
}

pub fn ls(config: StoreConfig) -> Result<ExitCode> {
    let store = HashDir::open(config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for digest in store.digests()? {
        writeln!(out, "{}", digest)?;
    }
    Ok(ExitCode::SUCCESS)
}
