//! Key and message file operations
//!
//! This module ties the engine to the filesystem for the command-line front
//! end: key files and message files are armored text, written with mode
//! 0o600 on Unix systems.

use crate::alphabet;
use crate::config::Config;
use crate::error::{CypherError, ErrorCategory, ErrorKind, Result};
use crate::keywrap::{KeyPair, PrivateKey, PublicKey};
use crate::message::{self, Package};
use crate::password::PasswordReader;
use crate::vault::{self, SealedBlob};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Generate a key pair and write it out
///
/// The private key is sealed under a password from `password_reader` and
/// written to `private_out`; the public key goes to `public_out`. Neither
/// file may exist beforehand.
pub fn generate_keys(
    private_out: &Path,
    public_out: &Path,
    password_reader: &mut dyn PasswordReader,
    config: &Config,
) -> Result<()> {
    config.validate()?;
    for path in [private_out, public_out] {
        if path.exists() {
            return Err(already_exists(path));
        }
    }

    let password = password_reader.read_password()?;
    let pair = KeyPair::generate(config)?;
    let sealed = vault::seal_private_key(&pair.private, &password, config)
        .map_err(|e| e.with_context("failed to seal private key"))?;

    let sealed_armored = sealed.to_armored()?;
    let public_armored = pair.public.to_armored()?;

    write_file_new(private_out, sealed_armored.as_bytes())?;
    // A private key without its public half is removed so a retry can start over.
    if let Err(e) = write_file_new(public_out, public_armored.as_bytes()) {
        if let Err(cleanup) = fs::remove_file(private_out) {
            tracing::warn!(
                path = %private_out.display(),
                error = %cleanup,
                "failed to remove private key after public key write failed"
            );
        }
        return Err(e);
    }
    tracing::debug!(bits = pair.public.bits(), "wrote key pair");
    Ok(())
}

/// Encrypt a text file for the owner of a public key
///
/// With `strip_unsupported`, characters outside the alphabet are dropped
/// instead of failing the encryption. Returns how many were dropped.
pub fn encrypt_message(
    public_key_path: &Path,
    input_path: &Path,
    output_path: &Path,
    strip_unsupported: bool,
    config: &Config,
) -> Result<usize> {
    let recipient = read_public_key(public_key_path)?;
    let text = read_text(input_path, "input file")?;

    let (text, dropped) = if strip_unsupported {
        let kept = alphabet::strip_unsupported(&text);
        let dropped = text.chars().count() - kept.chars().count();
        (kept, dropped)
    } else {
        (text, 0)
    };
    if dropped > 0 {
        tracing::warn!(dropped, "dropped characters outside the alphabet");
    }

    let package = message::encrypt_for_recipient(&text, &recipient, config)
        .map_err(|e| e.with_context("encryption failed"))?;
    write_file_secure(output_path, package.to_armored()?.as_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;
    Ok(dropped)
}

/// Decrypt a message file with a sealed private key
pub fn decrypt_message(
    private_key_path: &Path,
    input_path: &Path,
    output_path: &Path,
    password_reader: &mut dyn PasswordReader,
    config: &Config,
) -> Result<()> {
    let sealed = read_sealed_key(private_key_path)?;
    let armored = read_text(input_path, "input file")?;
    let package =
        Package::from_armored(armored.trim()).map_err(|e| e.with_context("failed to unarmor"))?;

    let key = unseal(&sealed, password_reader, config)?;
    let plaintext = message::decrypt_package(&package, &key, config)
        .map_err(|e| e.with_context("failed to decrypt"))?;
    write_file_secure(output_path, plaintext.as_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;
    Ok(())
}

/// Re-seal a private key file under a new password
///
/// The old password is checked by unsealing first. The file is replaced
/// atomically (tempfile + fsync + rename), so either the old or the new
/// sealed key exists at `private_key_path`, never a partial one.
pub fn change_password(
    private_key_path: &Path,
    old_password_reader: &mut dyn PasswordReader,
    new_password_reader: &mut dyn PasswordReader,
    config: &Config,
) -> Result<()> {
    let sealed = read_sealed_key(private_key_path)?;
    let key = unseal(&sealed, old_password_reader, config)?;

    let new_password = new_password_reader.read_password()?;
    let resealed = vault::seal_private_key(&key, &new_password, config)
        .map_err(|e| e.with_context("failed to seal private key"))?;
    replace_file_atomic(private_key_path, resealed.to_armored()?.as_bytes())
}

/// Recover the public key file from a sealed private key
pub fn export_public_key_from_private(
    private_key_path: &Path,
    public_out: &Path,
    password_reader: &mut dyn PasswordReader,
    config: &Config,
) -> Result<()> {
    if public_out.exists() {
        return Err(already_exists(public_out));
    }
    let sealed = read_sealed_key(private_key_path)?;
    let key = unseal(&sealed, password_reader, config)?;
    write_file_new(public_out, key.public_key().to_armored()?.as_bytes())
}

fn unseal(
    sealed: &SealedBlob,
    password_reader: &mut dyn PasswordReader,
    config: &Config,
) -> Result<PrivateKey> {
    let password = password_reader.read_password()?;
    vault::unseal_private_key(sealed, &password, config)
        .map_err(|e| e.with_context("failed to unseal private key"))
}

fn read_public_key(path: &Path) -> Result<PublicKey> {
    let armored = read_text(path, "public key file")?;
    PublicKey::from_armored(armored.trim())
        .map_err(|e| e.with_context(format!("failed to load public key {}", path.display())))
}

fn read_sealed_key(path: &Path) -> Result<SealedBlob> {
    let armored = read_text(path, "private key file")?;
    SealedBlob::from_armored(armored.trim())
        .map_err(|e| e.with_context(format!("failed to load private key {}", path.display())))
}

fn read_text(path: &Path, what: &str) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    String::from_utf8(bytes).map_err(|e| {
        CypherError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} {} is not valid UTF-8", what, path.display()),
            e,
        )
    })
}

fn already_exists(path: &Path) -> CypherError {
    CypherError::with_kind(
        ErrorCategory::User,
        ErrorKind::Io,
        format!("refusing to overwrite existing file {}", path.display()),
    )
}

fn io_error(category: ErrorCategory, msg: String, err: io::Error) -> CypherError {
    CypherError::with_kind_and_source(category, ErrorKind::Io, msg, err)
}

/// Atomically replace `path` with `contents`, keeping mode 0o600 on Unix
fn replace_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        Some(_) => Path::new("."),
        None => {
            return Err(CypherError::with_kind(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("{} has no parent directory", path.display()),
            ));
        }
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| io_error(ErrorCategory::Internal, "failed to create tempfile".into(), e))?;

    temp_file
        .write_all(contents)
        .map_err(|e| io_error(ErrorCategory::Internal, "failed to write to tempfile".into(), e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| io_error(ErrorCategory::Internal, "failed to flush tempfile".into(), e))?;
    temp_file.as_file().sync_all().map_err(|e| {
        io_error(
            ErrorCategory::Internal,
            "failed to sync file prior to rename".into(),
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                io_error(
                    ErrorCategory::Internal,
                    "failed to set tempfile permissions".into(),
                    e,
                )
            })?;
    }
    temp_file.persist(path).map_err(|e| {
        CypherError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

/// Create a new file with secure permissions; fails if it exists
fn write_file_new(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    write_with(options, path, contents)
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    write_with(options, path, contents)
}

fn write_with(mut options: fs::OpenOptions, path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            already_exists(path)
        } else {
            io_error(
                ErrorCategory::User,
                format!("failed to open {}", path.display()),
                e,
            )
        }
    })?;
    file.write_all(contents).map_err(|e| {
        io_error(
            ErrorCategory::Internal,
            format!("failed to write {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

fn read_error(path: &Path, err: io::Error) -> CypherError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    io_error(
        category,
        format!("failed to read from {}", path.display()),
        err,
    )
}
