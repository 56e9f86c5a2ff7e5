//! Pipeline Controller
//!
//! Validates the input selection, resolves it to a list of documents and
//! drives the file processor and formatter over each one.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;
use walkdir::WalkDir;

use crate::output::OutputFormatter;
use crate::processor::FileProcessor;

/// File extensions accepted as spreadsheet documents (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["xls", "xlsx", "xlsm"];

/// Input validation failures. The messages are shown to the user as is.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("Error: Either --file or --dir must be specified\nUse --help for usage information")]
    NoInput,

    #[error("Error: Cannot specify both --file and --dir")]
    ConflictingInput,

    #[error("Error: File not found: {0}")]
    FileNotFound(String),

    #[error("Error: Not a file: {0}")]
    NotAFile(String),

    #[error("Error: Only .xls, .xlsx, and .xlsm files are supported")]
    UnsupportedExtension,

    #[error("Error: Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Error: Not a directory: {0}")]
    NotADirectory(String),

    #[error("No Excel files found in directory: {0}")]
    NoFilesFound(String),

    #[error("Error reading directory: {0}")]
    DirectoryRead(String),
}

/// What the user asked to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    SingleFile(PathBuf),
    Directory { path: PathBuf, recursive: bool },
}

impl InputMode {
    /// Selects the mode; exactly one of `file` and `dir` must be given.
    pub fn from_args(
        file: Option<PathBuf>,
        dir: Option<PathBuf>,
        recursive: bool,
    ) -> Result<Self, InputError> {
        match (file, dir) {
            (None, None) => Err(InputError::NoInput),
            (Some(_), Some(_)) => Err(InputError::ConflictingInput),
            (Some(file), None) => Ok(InputMode::SingleFile(file)),
            (None, Some(path)) => Ok(InputMode::Directory { path, recursive }),
        }
    }

    /// Resolves the mode to the documents to process, in processing order.
    pub fn resolve_files(&self) -> Result<Vec<PathBuf>, InputError> {
        match self {
            InputMode::SingleFile(file) => {
                validate_file(file)?;
                Ok(vec![file.clone()])
            }
            InputMode::Directory { path, recursive } => {
                validate_directory(path)?;
                let files = find_excel_files(path, *recursive)?;
                if files.is_empty() {
                    return Err(InputError::NoFilesFound(path.display().to_string()));
                }
                Ok(files)
            }
        }
    }
}

/// Whether `path` has one of the [`SUPPORTED_EXTENSIONS`].
pub fn is_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

fn validate_file(file: &Path) -> Result<(), InputError> {
    if !file.exists() {
        return Err(InputError::FileNotFound(file.display().to_string()));
    }
    if !file.is_file() {
        return Err(InputError::NotAFile(file.display().to_string()));
    }
    if !is_supported_extension(file) {
        return Err(InputError::UnsupportedExtension);
    }
    Ok(())
}

fn validate_directory(dir: &Path) -> Result<(), InputError> {
    if !dir.exists() {
        return Err(InputError::DirectoryNotFound(dir.display().to_string()));
    }
    if !dir.is_dir() {
        return Err(InputError::NotADirectory(dir.display().to_string()));
    }
    Ok(())
}

/// Lists the supported documents under `dir`, sorted by path.
///
/// Without `recursive` only the direct children of `dir` are considered.
pub fn find_excel_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, InputError> {
    let mut walker = WalkDir::new(dir).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| InputError::DirectoryRead(e.to_string()))?;
        if entry.file_type().is_file() && is_supported_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Pipeline controller.
#[derive(Debug)]
pub struct Pipeline {
    formatter: OutputFormatter,
    processor: FileProcessor,
}

impl Pipeline {
    pub fn new(formatter: OutputFormatter) -> Self {
        Self {
            formatter,
            processor: FileProcessor::new(),
        }
    }

    pub fn with_processor(formatter: OutputFormatter, processor: FileProcessor) -> Self {
        Self {
            formatter,
            processor,
        }
    }

    /// Processes every document of `mode` and returns the exit status.
    ///
    /// Formatted items go to `out` as soon as each file is done; validation
    /// and per-file errors go to `err`. Validation failures return 1. A file
    /// that fails to process is reported and the run continues with status 0.
    pub fn run<O: Write, E: Write>(&self, mode: &InputMode, out: &mut O, err: &mut E) -> i32 {
        let files = match mode.resolve_files() {
            Ok(files) => files,
            Err(e) => {
                let _ = writeln!(err, "{}", e);
                return 1;
            }
        };
        debug!("Processing {} files", files.len());

        for file in &files {
            if let Err(message) = self.process_one(file, out) {
                let _ = writeln!(err, "{}", message);
            }
        }
        0
    }

    fn process_one<O: Write>(&self, file: &Path, out: &mut O) -> Result<(), String> {
        let failure = |e: &dyn std::fmt::Display| {
            format!("Error processing file {}: {}", file.display(), e)
        };
        let items = self.processor.process_file(file).map_err(|e| failure(&e))?;
        self.formatter.render(&items, out).map_err(|e| failure(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_from_args() {
        assert_eq!(InputMode::from_args(None, None, true), Err(InputError::NoInput));
        assert_eq!(
            InputMode::from_args(Some("a.xlsx".into()), Some("dir".into()), true),
            Err(InputError::ConflictingInput)
        );
        assert_eq!(
            InputMode::from_args(Some("a.xlsx".into()), None, true),
            Ok(InputMode::SingleFile("a.xlsx".into()))
        );
        assert_eq!(
            InputMode::from_args(None, Some("dir".into()), false),
            Ok(InputMode::Directory {
                path: "dir".into(),
                recursive: false
            })
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            InputError::NoInput.to_string(),
            "Error: Either --file or --dir must be specified\nUse --help for usage information"
        );
        assert_eq!(
            InputError::FileNotFound("x.xlsx".into()).to_string(),
            "Error: File not found: x.xlsx"
        );
        assert_eq!(
            InputError::NoFilesFound("d".into()).to_string(),
            "No Excel files found in directory: d"
        );
    }

    #[test]
    fn test_is_supported_extension() {
        assert!(is_supported_extension(Path::new("a.xls")));
        assert!(is_supported_extension(Path::new("dir/b.XLSX")));
        assert!(is_supported_extension(Path::new("c.XlSm")));
        assert!(!is_supported_extension(Path::new("d.csv")));
        assert!(!is_supported_extension(Path::new("xlsx")));
        assert!(!is_supported_extension(Path::new("e.xlsb")));
    }

    #[test]
    fn test_single_file_validation() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("data.csv");
        fs::write(&csv, "a,b").unwrap();

        let missing = dir.path().join("missing.xlsx");
        assert_eq!(
            InputMode::SingleFile(missing.clone()).resolve_files(),
            Err(InputError::FileNotFound(missing.display().to_string()))
        );
        assert_eq!(
            InputMode::SingleFile(dir.path().to_path_buf()).resolve_files(),
            Err(InputError::NotAFile(dir.path().display().to_string()))
        );
        assert_eq!(
            InputMode::SingleFile(csv).resolve_files(),
            Err(InputError::UnsupportedExtension)
        );
    }

    #[test]
    fn test_directory_scan() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        for name in ["b.xlsx", "a.XLS", "notes.txt", "sub/c.xlsm"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let recursive = find_excel_files(dir.path(), true).unwrap();
        let names: Vec<String> = recursive
            .iter()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(names, vec!["a.XLS", "b.xlsx", "sub/c.xlsm"]);

        let flat = find_excel_files(dir.path(), false).unwrap();
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn test_directory_validation() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.xlsx");
        fs::write(&file, b"").unwrap();

        let missing = dir.path().join("nope");
        assert_eq!(
            InputMode::Directory { path: missing.clone(), recursive: true }.resolve_files(),
            Err(InputError::DirectoryNotFound(missing.display().to_string()))
        );
        assert_eq!(
            InputMode::Directory { path: file.clone(), recursive: true }.resolve_files(),
            Err(InputError::NotADirectory(file.display().to_string()))
        );
    }

    #[test]
    fn test_run_empty_directory_exits_1() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("readme.md"), b"#").unwrap();
        let mode = InputMode::Directory {
            path: dir.path().to_path_buf(),
            recursive: true,
        };

        let (mut out, mut err) = (Vec::new(), Vec::new());
        let code = Pipeline::new(OutputFormatter::Tsv).run(&mode, &mut out, &mut err);
        assert_eq!(code, 1);
        assert!(out.is_empty());
        assert_eq!(
            String::from_utf8(err).unwrap(),
            format!("No Excel files found in directory: {}\n", dir.path().display())
        );
    }

    #[test]
    fn test_run_reports_broken_file_and_continues() {
        let dir = TempDir::new().unwrap();
        let broken = dir.path().join("broken.xlsx");
        fs::write(&broken, b"not a workbook").unwrap();
        let mode = InputMode::SingleFile(broken.clone());

        let (mut out, mut err) = (Vec::new(), Vec::new());
        let code = Pipeline::new(OutputFormatter::Tsv).run(&mode, &mut out, &mut err);
        assert_eq!(code, 0);
        assert!(out.is_empty());
        let err = String::from_utf8(err).unwrap();
        assert!(err.starts_with(&format!("Error processing file {}: ", broken.display())));
    }
}
