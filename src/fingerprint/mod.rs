//! Protocol-compatibility fingerprint.
//!
//! Clients present this value at handshake time so schema drift between a
//! client build and the cluster is caught before any object traffic flows.
//! Backends own the comparison; this module only produces the number.

use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use thiserror::Error;
use tokio::fs;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const PRIME_COUNT: usize = 10_000;

// The 10,000th prime is 104_729.
const SIEVE_LIMIT: usize = 104_730;

static PRIMES: Lazy<Vec<u32>> = Lazy::new(first_primes);

// -----------------------------------------------------------------------------
// ----- HashGenerator ---------------------------------------------------------

/// Prime-weighted accumulator: every added value is multiplied by the next
/// prime in a rotating table of the first 10,000 primes.
#[derive(Debug, Clone, Default)]
pub struct HashGenerator {
    hash: u32,
    index: usize,
}

impl HashGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_int(&mut self, value: i64) {
        let prime = PRIMES[self.index];
        self.hash = self.hash.wrapping_add(prime.wrapping_mul(value as u32));
        self.index = (self.index + 1) % PRIME_COUNT;
    }

    pub fn add_string(&mut self, value: &str) {
        self.add_int(value.len() as i64);
        for byte in value.bytes() {
            self.add_int(i64::from(byte));
        }
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }
}

// -----------------------------------------------------------------------------
// ----- SchemaDigest ----------------------------------------------------------

/// Anything that can describe the active schema to a [`HashGenerator`].
pub trait SchemaDigest {
    fn generate_hash(&self, hashgen: &mut HashGenerator);
}

// -----------------------------------------------------------------------------
// ----- SchemaFiles -----------------------------------------------------------

/// Raw schema files, digested line by line. Blank lines and `//` comments do
/// not contribute, so reformatting a file keeps the fingerprint stable.
#[derive(Debug, Clone, Default)]
pub struct SchemaFiles {
    files: Vec<SchemaFile>,
}

#[derive(Debug, Clone)]
struct SchemaFile {
    path: PathBuf,
    contents: String,
}

impl SchemaFiles {
    pub async fn load(paths: &[PathBuf]) -> Result<Self, FingerprintError> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let contents = fs::read_to_string(path)
                .await
                .map_err(|e| FingerprintError::Io {
                    path: path.clone(),
                    source: e,
                })?;
            files.push(SchemaFile {
                path: path.clone(),
                contents,
            });
        }

        Ok(Self { files })
    }

    pub fn from_sources<I, P, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: AsRef<Path>,
        S: Into<String>,
    {
        let files = sources
            .into_iter()
            .map(|(path, contents)| SchemaFile {
                path: path.as_ref().to_path_buf(),
                contents: contents.into(),
            })
            .collect();

        Self { files }
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path.as_path())
    }
}

impl SchemaDigest for SchemaFiles {
    fn generate_hash(&self, hashgen: &mut HashGenerator) {
        hashgen.add_int(self.files.len() as i64);

        for file in &self.files {
            let lines: Vec<&str> = significant_lines(&file.contents).collect();
            hashgen.add_int(lines.len() as i64);
            for line in lines {
                hashgen.add_string(line);
            }
        }
    }
}

fn significant_lines(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//"))
}

// -----------------------------------------------------------------------------
// ----- ProtocolFingerprint ---------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolFingerprint {
    value: u32,
    source: FingerprintSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintSource {
    Override,
    Computed,
}

impl ProtocolFingerprint {
    /// Any nonzero `manual_override` wins verbatim.
    pub fn resolve(manual_override: u32, schema: &impl SchemaDigest) -> Self {
        if manual_override > 0 {
            return Self {
                value: manual_override,
                source: FingerprintSource::Override,
            };
        }

        Self::compute(schema)
    }

    pub fn compute(schema: &impl SchemaDigest) -> Self {
        let mut hashgen = HashGenerator::new();
        schema.generate_hash(&mut hashgen);

        Self {
            value: hashgen.hash(),
            source: FingerprintSource::Computed,
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn source(&self) -> FingerprintSource {
        self.source
    }
}

impl fmt::Display for ProtocolFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match self.source {
            FingerprintSource::Override => "manual override",
            FingerprintSource::Computed => "computed",
        };
        write!(f, "0x{:08x} ({origin})", self.value)
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Primes ------------------------------------------------------

fn first_primes() -> Vec<u32> {
    let mut composite = vec![false; SIEVE_LIMIT];
    let mut primes = Vec::with_capacity(PRIME_COUNT);

    for n in 2..SIEVE_LIMIT {
        if composite[n] {
            continue;
        }
        primes.push(n as u32);
        if primes.len() == PRIME_COUNT {
            break;
        }
        let mut multiple = n * n;
        while multiple < SIEVE_LIMIT {
            composite[multiple] = true;
            multiple += n;
        }
    }

    primes
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("failed to read schema file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn prime_table_is_complete() {
        assert_eq!(PRIMES.len(), PRIME_COUNT);
        assert_eq!(&PRIMES[..5], &[2, 3, 5, 7, 11]);
        assert_eq!(PRIMES[PRIME_COUNT - 1], 104_729);
    }

    #[test]
    fn add_int_weights_by_rotating_primes() {
        let mut hashgen = HashGenerator::new();
        assert_eq!(hashgen.hash(), 0);

        hashgen.add_int(1);
        assert_eq!(hashgen.hash(), 2);
        hashgen.add_int(1);
        assert_eq!(hashgen.hash(), 5);
        hashgen.add_int(10);
        assert_eq!(hashgen.hash(), 55);
    }

    #[test]
    fn add_string_hashes_length_then_bytes() {
        let mut hashgen = HashGenerator::new();
        hashgen.add_string("ab");
        // 2*len + 3*'a' + 5*'b'
        assert_eq!(hashgen.hash(), 2 * 2 + 3 * 97 + 5 * 98);
    }

    #[test]
    fn index_wraps_after_last_prime() {
        let mut hashgen = HashGenerator::new();
        for _ in 0..PRIME_COUNT {
            hashgen.add_int(0);
        }
        hashgen.add_int(1);
        assert_eq!(hashgen.hash(), 2);
    }

    #[test]
    fn negative_values_wrap() {
        let mut hashgen = HashGenerator::new();
        hashgen.add_int(-1);
        assert_eq!(hashgen.hash(), 2u32.wrapping_mul(u32::MAX));
    }

    #[test]
    fn nonzero_override_is_used_verbatim() {
        let schema = SchemaFiles::from_sources([("a.dc", "dclass Avatar {};")]);
        let fp = ProtocolFingerprint::resolve(0xDEAD_BEEF, &schema);
        assert_eq!(fp.value(), 0xDEAD_BEEF);
        assert_eq!(fp.source(), FingerprintSource::Override);
        assert_eq!(fp.to_string(), "0xdeadbeef (manual override)");
    }

    #[test]
    fn zero_override_computes_from_schema() {
        let schema = SchemaFiles::from_sources([("a.dc", "dclass Avatar {};")]);
        let fp = ProtocolFingerprint::resolve(0, &schema);
        assert_eq!(fp.source(), FingerprintSource::Computed);
        assert_eq!(fp, ProtocolFingerprint::compute(&schema));
    }

    #[test]
    fn formatting_does_not_change_fingerprint() {
        let tight = SchemaFiles::from_sources([("a.dc", "dclass Avatar {\nuint32 hp;\n};")]);
        let loose = SchemaFiles::from_sources([(
            "a.dc",
            "// the avatar\n\ndclass Avatar {\n    uint32 hp;\n\n};\n",
        )]);
        assert_eq!(
            ProtocolFingerprint::compute(&tight),
            ProtocolFingerprint::compute(&loose)
        );
    }

    #[test]
    fn schema_changes_change_fingerprint() {
        let before = SchemaFiles::from_sources([("a.dc", "dclass Avatar {\nuint32 hp;\n};")]);
        let after = SchemaFiles::from_sources([("a.dc", "dclass Avatar {\nuint16 hp;\n};")]);
        assert_ne!(
            ProtocolFingerprint::compute(&before),
            ProtocolFingerprint::compute(&after)
        );
    }

    #[test]
    fn file_boundaries_matter() {
        let one = SchemaFiles::from_sources([("a.dc", "keyword a;\nkeyword b;")]);
        let two = SchemaFiles::from_sources([("a.dc", "keyword a;"), ("b.dc", "keyword b;")]);
        assert_ne!(
            ProtocolFingerprint::compute(&one),
            ProtocolFingerprint::compute(&two)
        );
    }

    #[tokio::test]
    async fn load_reads_files_in_order() {
        let mut first = NamedTempFile::new().unwrap();
        first.write_all(b"keyword ram;\n").unwrap();
        let mut second = NamedTempFile::new().unwrap();
        second.write_all(b"dclass Avatar {};\n").unwrap();

        let paths = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let loaded = SchemaFiles::load(&paths).await.unwrap();
        assert_eq!(loaded.paths().count(), 2);

        let inline = SchemaFiles::from_sources([
            (first.path(), "keyword ram;\n"),
            (second.path(), "dclass Avatar {};\n"),
        ]);
        assert_eq!(
            ProtocolFingerprint::compute(&loaded),
            ProtocolFingerprint::compute(&inline)
        );
    }

    #[tokio::test]
    async fn missing_schema_file_is_an_error() {
        let err = SchemaFiles::load(&[PathBuf::from("/definitely/not/here.dc")])
            .await
            .unwrap_err();
        assert!(matches!(err, FingerprintError::Io { .. }));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
