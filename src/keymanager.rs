//! Substitution key lifecycle
//!
//! A [`SubstitutionKey`] is a permutation of [`ALPHABET`]. It is stored on
//! disk as AES-256-CBC ciphertext of its (source, target) byte pairs, in
//! ascending source order, with no header:
//!
//! - cipher key: password bytes, right-padded with `'x'` or truncated to 32 bytes
//! - IV: first 16 password bytes, right-padded with `'x'`
//!
//! The password derivation is not a KDF. It is kept as-is because existing
//! key files depend on it; changing it requires a versioned file format.
//!
//! Loading is self-healing: if the key file is missing, cannot be
//! decrypted, or does not hold a full permutation, a fresh key is generated
//! and written over it. Anything encrypted under the old key becomes
//! unreadable. See [`load_or_regenerate`].

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::blockcrypt::{self, IV_LEN, KEY_LEN};
use crate::error::{ErrorCategory, ErrorKind, Result, XcreeptorError};
use crate::file_ops;
use crate::substitution::CharMap;

/// Characters the substitution cipher supports, in key-file order of
/// generation. Changing this string breaks every existing key file.
pub const ALPHABET: &str =
    "`1234567890-=~!@#$%^&*()_+[]{}|;:,./<>?abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Padding byte for the password-derived key and IV.
const PASSWORD_PAD: u8 = b'x';

/// Bijective mapping of [`ALPHABET`] onto itself.
#[derive(Clone, PartialEq, Eq)]
pub struct SubstitutionKey {
    map: CharMap,
}

impl SubstitutionKey {
    /// Validate that `map` is a full permutation of [`ALPHABET`].
    pub fn from_map(map: CharMap) -> Result<Self> {
        let alphabet: BTreeSet<char> = ALPHABET.chars().collect();

        if map.len() != alphabet.len() {
            return Err(invalid_key(format!(
                "invalid key mapping size: expected {}, got {}",
                alphabet.len(),
                map.len()
            )));
        }
        if let Some(c) = map.keys().find(|c| !alphabet.contains(c)) {
            return Err(invalid_key(format!(
                "key maps character {:?} which is outside the alphabet",
                c
            )));
        }
        let targets: BTreeSet<char> = map.values().copied().collect();
        if targets != alphabet {
            return Err(invalid_key(
                "key mapping is not a permutation of the alphabet",
            ));
        }

        Ok(Self { map })
    }

    /// Parse the decrypted key file payload: consecutive (source, target)
    /// byte pairs. A repeated source keeps its last target.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 2 != 0 {
            return Err(invalid_key(format!(
                "corrupted key data: odd length {}",
                bytes.len()
            )));
        }
        let map = bytes
            .chunks_exact(2)
            .map(|pair| (char::from(pair[0]), char::from(pair[1])))
            .collect();
        Self::from_map(map)
    }

    /// Serialize as (source, target) byte pairs in ascending source order.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(self.map.len() * 2));
        for (&from, &to) in &self.map {
            // ALPHABET is pure ASCII, so each char is a single byte.
            out.push(from as u8);
            out.push(to as u8);
        }
        out
    }

    pub fn as_map(&self) -> &CharMap {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for SubstitutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubstitutionKey")
            .field("len", &self.map.len())
            .finish_non_exhaustive()
    }
}

/// Produce a uniformly random permutation of [`ALPHABET`].
pub fn generate_key() -> SubstitutionKey {
    let mut targets: Vec<char> = ALPHABET.chars().collect();
    targets.shuffle(&mut rand::rng());
    let map = ALPHABET.chars().zip(targets).collect();
    SubstitutionKey { map }
}

/// Derive the key-file cipher key and IV from `password`.
fn derive_file_cipher(password: &[u8]) -> (Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>) {
    let mut key = Zeroizing::new(password.to_vec());
    key.resize(KEY_LEN, PASSWORD_PAD);

    let mut iv = Zeroizing::new(password[..password.len().min(IV_LEN)].to_vec());
    iv.resize(IV_LEN, PASSWORD_PAD);

    (key, iv)
}

/// Encrypt `key` under `password` and write it to `path`, creating parent
/// directories as needed. The write is atomic and owner-only.
pub fn save_key_to_file(key: &SubstitutionKey, path: &Path, password: &[u8]) -> Result<()> {
    let (file_key, file_iv) = derive_file_cipher(password);
    let ciphertext = blockcrypt::block_encrypt(&key.to_bytes(), &file_key, &file_iv)
        .map_err(|e| e.with_context("failed to encrypt key data"))?;
    file_ops::write_file_atomic(path, &ciphertext)
        .map_err(|e| e.with_context(format!("failed to save key to {}", path.display())))?;
    debug!(path = %path.display(), "saved substitution key");
    Ok(())
}

/// Read and decrypt the key file at `path` without any recovery.
pub fn read_key_file(path: &Path, password: &[u8]) -> Result<SubstitutionKey> {
    let ciphertext = fs::read(path)
        .map_err(|e| XcreeptorError::io(format!("failed to read from {}", path.display()), e))?;
    let (file_key, file_iv) = derive_file_cipher(password);
    let plaintext = Zeroizing::new(
        blockcrypt::block_decrypt(&ciphertext, &file_key, &file_iv)
            .map_err(|e| e.with_context("failed to decrypt key file"))?,
    );
    SubstitutionKey::from_bytes(&plaintext)
}

/// Outcome of loading a key through the self-healing path.
#[derive(Debug)]
pub enum KeyLoad {
    /// The key file was read and validated.
    Loaded(SubstitutionKey),
    /// The key file was unusable; a new key was generated and written over
    /// it. `cause` is why the existing file was rejected.
    Regenerated {
        key: SubstitutionKey,
        cause: XcreeptorError,
    },
}

impl KeyLoad {
    pub fn key(&self) -> &SubstitutionKey {
        match self {
            KeyLoad::Loaded(key) => key,
            KeyLoad::Regenerated { key, .. } => key,
        }
    }

    pub fn into_key(self) -> SubstitutionKey {
        match self {
            KeyLoad::Loaded(key) => key,
            KeyLoad::Regenerated { key, .. } => key,
        }
    }

    pub fn is_regenerated(&self) -> bool {
        matches!(self, KeyLoad::Regenerated { .. })
    }
}

/// Load the key at `path`, replacing it with a fresh key on any failure.
///
/// A wrong password is indistinguishable from corruption here and also
/// triggers regeneration. Only a failure to write the replacement key is
/// returned as an error.
pub fn load_or_regenerate(path: &Path, password: &[u8]) -> Result<KeyLoad> {
    match read_key_file(path, password) {
        Ok(key) => {
            debug!(path = %path.display(), "loaded substitution key");
            Ok(KeyLoad::Loaded(key))
        }
        Err(cause) => {
            warn!(
                path = %path.display(),
                error = %cause,
                "key file unusable; generating a new key"
            );
            let key = generate_key();
            save_key_to_file(&key, path, password)?;
            Ok(KeyLoad::Regenerated { key, cause })
        }
    }
}

/// Load the key at `path`, regenerating it if necessary.
pub fn load_key_from_file(path: &Path, password: &[u8]) -> Result<SubstitutionKey> {
    load_or_regenerate(path, password).map(KeyLoad::into_key)
}

/// Key file location and password bound together.
pub struct KeyManager {
    path: PathBuf,
    password: Zeroizing<Vec<u8>>,
}

impl KeyManager {
    pub fn new(path: impl Into<PathBuf>, password: Zeroizing<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            password,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<KeyLoad> {
        load_or_regenerate(&self.path, &self.password)
    }

    pub fn save(&self, key: &SubstitutionKey) -> Result<()> {
        save_key_to_file(key, &self.path, &self.password)
    }

    /// Replace the stored key with a new one. Everything encrypted under the
    /// previous key becomes unreadable.
    pub fn regenerate(&self) -> Result<SubstitutionKey> {
        let key = generate_key();
        self.save(&key)?;
        warn!(path = %self.path.display(), "substitution key regenerated on request");
        Ok(key)
    }
}

fn invalid_key(msg: impl Into<String>) -> XcreeptorError {
    XcreeptorError::with_kind(ErrorCategory::User, ErrorKind::InvalidKey, msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rotated_key(offset: usize) -> SubstitutionKey {
        let chars: Vec<char> = ALPHABET.chars().collect();
        let map = chars
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, chars[(i + offset) % chars.len()]))
            .collect();
        SubstitutionKey::from_map(map).unwrap()
    }

    #[test]
    fn test_alphabet_is_distinct_printable_ascii() {
        let set: BTreeSet<char> = ALPHABET.chars().collect();
        assert_eq!(set.len(), ALPHABET.len());
        assert_eq!(ALPHABET.len(), 91);
        assert!(ALPHABET.chars().all(|c| c.is_ascii_graphic()));
    }

    #[test]
    fn test_generate_key_is_permutation() {
        let alphabet: BTreeSet<char> = ALPHABET.chars().collect();
        for _ in 0..20 {
            let key = generate_key();
            let sources: BTreeSet<char> = key.as_map().keys().copied().collect();
            let targets: BTreeSet<char> = key.as_map().values().copied().collect();
            assert_eq!(key.len(), alphabet.len());
            assert_eq!(sources, alphabet);
            assert_eq!(targets, alphabet);
        }
    }

    #[test]
    fn test_generate_key_is_not_fixed() {
        // 91! permutations; two equal draws in a row means the RNG is broken.
        assert_ne!(generate_key(), generate_key());
    }

    #[test]
    fn test_from_map_rejects_short_mapping() {
        let map: CharMap = [('a', 'b'), ('b', 'a')].into_iter().collect();
        let err = SubstitutionKey::from_map(map).expect_err("expected invalid key");
        assert_eq!(err.kind, Some(ErrorKind::InvalidKey));
        assert!(err.to_string().contains("invalid key mapping size"));
    }

    #[test]
    fn test_from_map_rejects_repeated_targets() {
        let mut map = rotated_key(1).as_map().clone();
        map.insert('a', 'A');
        map.insert('b', 'A');
        let err = SubstitutionKey::from_map(map).expect_err("expected invalid key");
        assert_eq!(err.kind, Some(ErrorKind::InvalidKey));
    }

    #[test]
    fn test_from_map_rejects_foreign_source() {
        let mut map = rotated_key(1).as_map().clone();
        let target = map.remove(&'a').unwrap();
        map.insert(' ', target);
        let err = SubstitutionKey::from_map(map).expect_err("expected invalid key");
        assert_eq!(err.kind, Some(ErrorKind::InvalidKey));
    }

    #[test]
    fn test_bytes_are_sorted_pairs() {
        let key = rotated_key(1);
        let bytes = key.to_bytes();
        assert_eq!(bytes.len(), 2 * ALPHABET.len());

        let sources: Vec<u8> = bytes.iter().step_by(2).copied().collect();
        let mut sorted = sources.clone();
        sorted.sort_unstable();
        assert_eq!(sources, sorted);
        // '!' sorts first and is followed by '@' in the alphabet.
        assert_eq!(&bytes[..2], b"!@");

        assert_eq!(SubstitutionKey::from_bytes(&bytes).unwrap(), key);
    }

    #[test]
    fn test_from_bytes_rejects_odd_length() {
        let err = SubstitutionKey::from_bytes(b"abc").expect_err("expected invalid key");
        assert_eq!(err.kind, Some(ErrorKind::InvalidKey));
        assert!(err.to_string().contains("odd length"));
    }

    #[test]
    fn test_derive_file_cipher_pads_short_password() {
        let (key, iv) = derive_file_cipher(b"hunter2");
        assert_eq!(&key[..], b"hunter2xxxxxxxxxxxxxxxxxxxxxxxxx");
        assert_eq!(&iv[..], b"hunter2xxxxxxxxx");
    }

    #[test]
    fn test_derive_file_cipher_truncates_long_password() {
        let password = b"0123456789abcdefghijklmnopqrstuvwxyz0123";
        let (key, iv) = derive_file_cipher(password);
        assert_eq!(&key[..], &password[..KEY_LEN]);
        assert_eq!(&iv[..], &password[..IV_LEN]);
    }

    #[test]
    fn test_derive_file_cipher_empty_password() {
        let (key, iv) = derive_file_cipher(b"");
        assert_eq!(&key[..], &[b'x'; KEY_LEN][..]);
        assert_eq!(&iv[..], &[b'x'; IV_LEN][..]);
    }

    #[test]
    fn test_save_and_read_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("key.dat");

        let key = generate_key();
        save_key_to_file(&key, &path, b"secret").unwrap();
        assert!(path.exists());

        let raw = fs::read(&path).unwrap();
        // 182 payload bytes pad up to 192.
        assert_eq!(raw.len(), 192);

        assert_eq!(read_key_file(&path, b"secret").unwrap(), key);
    }

    #[test]
    #[cfg(unix)]
    fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("key.dat");
        save_key_to_file(&generate_key(), &path, b"secret").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_reads_existing_key_file() {
        // Written independently with OpenSSL: rotation-by-5 key, password "hunter2".
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("key.dat");
        fs::write(&path, include_bytes!("../testdata/rot5-hunter2.key")).unwrap();

        assert_eq!(read_key_file(&path, b"hunter2").unwrap(), rotated_key(5));
    }

    #[test]
    fn test_load_existing_key() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("key.dat");
        let key = generate_key();
        save_key_to_file(&key, &path, b"secret").unwrap();

        let loaded = load_or_regenerate(&path, b"secret").unwrap();
        assert!(!loaded.is_regenerated());
        assert_eq!(loaded.into_key(), key);
    }

    #[test]
    fn test_missing_file_regenerates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("assets").join("key.dat");

        let loaded = load_or_regenerate(&path, b"secret").unwrap();
        match &loaded {
            KeyLoad::Regenerated { cause, .. } => assert_eq!(cause.kind, Some(ErrorKind::Io)),
            KeyLoad::Loaded(_) => panic!("expected regeneration"),
        }
        assert!(path.exists());
        assert_eq!(&read_key_file(&path, b"secret").unwrap(), loaded.key());
    }

    #[test]
    fn test_wrong_password_regenerates_and_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("key.dat");
        let original = generate_key();
        save_key_to_file(&original, &path, b"right password").unwrap();
        let original_bytes = fs::read(&path).unwrap();

        let first = load_or_regenerate(&path, b"wrong password").unwrap();
        assert!(first.is_regenerated());
        assert_ne!(first.key(), &original);
        assert_ne!(fs::read(&path).unwrap(), original_bytes);

        // The file is now protected by the wrong password, so it loads cleanly.
        let second = load_or_regenerate(&path, b"wrong password").unwrap();
        assert!(!second.is_regenerated());
        assert_eq!(second.key(), first.key());

        // The original password no longer opens it.
        let third = load_key_from_file(&path, b"right password").unwrap();
        assert_eq!(third.len(), ALPHABET.len());
    }

    #[test]
    fn test_garbage_file_regenerates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("key.dat");
        fs::write(&path, b"definitely not a key file").unwrap();

        let loaded = load_or_regenerate(&path, b"secret").unwrap();
        match &loaded {
            KeyLoad::Regenerated { cause, .. } => {
                assert_eq!(cause.kind, Some(ErrorKind::CipherIntegrity))
            }
            KeyLoad::Loaded(_) => panic!("expected regeneration"),
        }
        assert_eq!(&read_key_file(&path, b"secret").unwrap(), loaded.key());
    }

    #[test]
    fn test_encrypted_non_permutation_regenerates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("key.dat");
        let (file_key, file_iv) = derive_file_cipher(b"secret");
        let ciphertext = blockcrypt::block_encrypt(b"abbaab", &file_key, &file_iv).unwrap();
        fs::write(&path, ciphertext).unwrap();

        let loaded = load_or_regenerate(&path, b"secret").unwrap();
        match loaded {
            KeyLoad::Regenerated { cause, .. } => {
                assert_eq!(cause.kind, Some(ErrorKind::InvalidKey))
            }
            KeyLoad::Loaded(_) => panic!("expected regeneration"),
        }
    }

    #[test]
    fn test_unwritable_path_propagates_save_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, b"file in the way").unwrap();
        let path = blocker.join("key.dat");

        let err = load_key_from_file(&path, b"secret").expect_err("expected save failure");
        assert_eq!(err.kind, Some(ErrorKind::Io));
    }

    #[test]
    fn test_key_manager_regenerate_replaces_key() {
        let temp_dir = TempDir::new().unwrap();
        let manager = KeyManager::new(
            temp_dir.path().join("key.dat"),
            Zeroizing::new(b"secret".to_vec()),
        );

        let first = manager.load().unwrap().into_key();
        let second = manager.regenerate().unwrap();
        assert_ne!(first, second);

        let reloaded = manager.load().unwrap();
        assert!(!reloaded.is_regenerated());
        assert_eq!(reloaded.into_key(), second);
    }

    #[test]
    fn test_debug_does_not_reveal_mapping() {
        let rendered = format!("{:?}", rotated_key(1));
        assert!(rendered.contains("len: 91"));
        assert!(!rendered.contains('@'));
    }
}
