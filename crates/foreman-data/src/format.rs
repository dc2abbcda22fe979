//! On-disk formats: RON, JSON and TOML, chosen by file extension.
//!
//! Every file the planner reads or writes goes through this module, so a
//! catalog directory, an enabled-object list and a saved graph can each be
//! kept in whichever format the user prefers.

use foreman_core::catalog::CatalogError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors raised while reading, resolving or writing data files.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// The same base name exists in more than one format.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("cannot write {file}: {detail}")]
    Write { file: PathBuf, detail: String },

    /// A name in one file refers to an entity no file defines.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// The records resolved but do not form a valid catalog.
    #[error("invalid catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("load cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    /// Extensions in lookup order.
    pub const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }
}

/// Detect a file's format from its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    Format::ALL
        .into_iter()
        .find(|f| Some(f.extension()) == ext)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Find `{base_name}.ron|toml|json` in `dir`.
///
/// Returns `Ok(None)` when no candidate exists and
/// [`DataLoadError::ConflictingFormats`] when more than one does.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut candidates = Format::ALL
        .into_iter()
        .map(|f| dir.join(format!("{base_name}.{}", f.extension())))
        .filter(|p| p.is_file());

    let Some(first) = candidates.next() else {
        return Ok(None);
    };
    match candidates.next() {
        Some(second) => Err(DataLoadError::ConflictingFormats { a: first, b: second }),
        None => Ok(Some(first)),
    }
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Reading
// ===========================================================================

fn parse_error(path: &Path, e: impl std::fmt::Display) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    }
}

/// Read and deserialize a whole file.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Read a list of records.
///
/// RON and JSON files hold a bare sequence. TOML has no top-level arrays,
/// so the list lives under `toml_key` (`[[recipes]]` tables, for example).
/// An empty TOML file is an empty list.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }

    let content = std::fs::read_to_string(path)?;
    let mut table: toml::Table = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
    match table.remove(toml_key) {
        Some(value) => value.try_into().map_err(|e| parse_error(path, e)),
        None if table.is_empty() => Ok(Vec::new()),
        None => Err(parse_error(path, format!("missing key '{toml_key}'"))),
    }
}

// ===========================================================================
// Writing
// ===========================================================================

/// Serialize a value in the given format.
pub fn to_string<T: Serialize>(value: &T, format: Format) -> Result<String, String> {
    match format {
        Format::Ron => ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
            .map_err(|e| e.to_string()),
        Format::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
        Format::Toml => toml::to_string_pretty(value).map_err(|e| e.to_string()),
    }
}

/// Serialize a value and write it to `path`, in the format its extension names.
pub fn write_file<T: Serialize>(path: &Path, value: &T) -> Result<(), DataLoadError> {
    let format = detect_format(path)?;
    let text = to_string(value, format).map_err(|detail| DataLoadError::Write {
        file: path.to_path_buf(),
        detail,
    })?;
    std::fs::write(path, text)?;
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cleanup, make_test_dir};
    use serde::Deserialize;
    use std::fs;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Named {
        name: String,
        #[serde(default)]
        amount: f64,
    }

    // -----------------------------------------------------------------------
    // detect_format
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("items.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("items.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("a/b/items.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_format_rejects_unknown_and_missing_extension() {
        for name in ["items.yaml", "items", "items.RON.bak"] {
            assert!(
                matches!(
                    detect_format(Path::new(name)),
                    Err(DataLoadError::UnsupportedFormat { .. })
                ),
                "{name} should be unsupported"
            );
        }
    }

    // -----------------------------------------------------------------------
    // find_data_file / require_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn find_data_file_picks_the_single_candidate() {
        let dir = make_test_dir("find_single");
        fs::write(dir.join("recipes.toml"), "").unwrap();

        assert_eq!(
            find_data_file(&dir, "recipes").unwrap(),
            Some(dir.join("recipes.toml"))
        );
        assert_eq!(find_data_file(&dir, "items").unwrap(), None);

        cleanup(&dir);
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("items.ron"), "[]").unwrap();
        fs::write(dir.join("items.json"), "[]").unwrap();

        assert!(matches!(
            find_data_file(&dir, "items"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn find_data_file_ignores_directories() {
        let dir = make_test_dir("find_dir");
        fs::create_dir_all(dir.join("items.json")).unwrap();

        assert_eq!(find_data_file(&dir, "items").unwrap(), None);

        cleanup(&dir);
    }

    #[test]
    fn require_data_file_missing() {
        let dir = make_test_dir("require_missing");

        match require_data_file(&dir, "assemblers") {
            Err(DataLoadError::MissingRequired { file, .. }) => assert_eq!(file, "assemblers"),
            other => panic!("expected MissingRequired, got {other:?}"),
        }

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // deserialize_list
    // -----------------------------------------------------------------------

    #[test]
    fn deserialize_list_in_every_format() {
        let dir = make_test_dir("list_formats");
        fs::write(
            dir.join("a.ron"),
            r#"[(name: "iron-ore"), (name: "coal", amount: 2.0)]"#,
        )
        .unwrap();
        fs::write(
            dir.join("b.json"),
            r#"[{"name": "iron-ore"}, {"name": "coal", "amount": 2.0}]"#,
        )
        .unwrap();
        fs::write(
            dir.join("c.toml"),
            "[[items]]\nname = \"iron-ore\"\n\n[[items]]\nname = \"coal\"\namount = 2.0\n",
        )
        .unwrap();

        for file in ["a.ron", "b.json", "c.toml"] {
            let list: Vec<Named> = deserialize_list(&dir.join(file), "items").unwrap();
            assert_eq!(list.len(), 2, "{file}");
            assert_eq!(list[1].name, "coal");
            assert_eq!(list[1].amount, 2.0);
        }

        cleanup(&dir);
    }

    #[test]
    fn deserialize_list_empty_toml_is_empty() {
        let dir = make_test_dir("list_empty_toml");
        let path = dir.join("modules.toml");
        fs::write(&path, "").unwrap();

        let list: Vec<Named> = deserialize_list(&path, "modules").unwrap();
        assert!(list.is_empty());

        cleanup(&dir);
    }

    #[test]
    fn deserialize_list_toml_wrong_key() {
        let dir = make_test_dir("list_wrong_key");
        let path = dir.join("items.toml");
        fs::write(&path, "[[recipes]]\nname = \"gear\"\n").unwrap();

        let result: Result<Vec<Named>, _> = deserialize_list(&path, "items");
        assert!(matches!(result, Err(DataLoadError::Parse { .. })));

        cleanup(&dir);
    }

    #[test]
    fn deserialize_file_parse_error_names_the_file() {
        let dir = make_test_dir("parse_err");
        let path = dir.join("bad.ron");
        fs::write(&path, "this is not valid RON {{{").unwrap();

        match deserialize_file::<Vec<Named>>(&path) {
            Err(DataLoadError::Parse { file, .. }) => assert_eq!(file, path),
            other => panic!("expected Parse, got {other:?}"),
        }

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // write_file
    // -----------------------------------------------------------------------

    #[test]
    fn write_then_read_back() {
        let dir = make_test_dir("write_read");
        let value = Named {
            name: "steam".to_string(),
            amount: 165.0,
        };

        for file in ["v.ron", "v.json", "v.toml"] {
            let path = dir.join(file);
            write_file(&path, &value).unwrap();
            let back: Named = deserialize_file(&path).unwrap();
            assert_eq!(back, value, "{file}");
        }

        cleanup(&dir);
    }

    #[test]
    fn write_file_rejects_unknown_extension() {
        let dir = make_test_dir("write_bad_ext");
        let path = dir.join("v.yaml");

        let value = Named {
            name: "x".to_string(),
            amount: 0.0,
        };
        assert!(matches!(
            write_file(&path, &value),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        assert!(!path.exists());

        cleanup(&dir);
    }
}
