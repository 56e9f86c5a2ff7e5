//! Security Module
//!
//! Limits applied while a document is decoded: input size, ZIP bomb guards
//! and path traversal checks on package entry names.

use crate::error::XlteError;

/// Security limits used while decoding a document.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Maximum total decompressed size of a ZIP package in bytes.
    /// Default: 1 GiB
    pub max_decompressed_size: u64,
    /// Maximum number of entries in a ZIP package.
    /// Default: 10000
    pub max_file_count: usize,
    /// Maximum decompressed size of a single package entry in bytes.
    /// Default: 100 MiB
    pub max_file_size: u64,
    /// Maximum size of the input document in bytes.
    /// Default: 2 GiB
    pub max_input_file_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_decompressed_size: 1_073_741_824, // 1GiB
            max_file_count: 10_000,
            max_file_size: 104_857_600,         // 100MiB
            max_input_file_size: 2_147_483_648, // 2GiB
        }
    }
}

impl SecurityConfig {
    /// Rejects inputs larger than `max_input_file_size`.
    pub fn check_input_size(&self, size: u64) -> Result<(), XlteError> {
        if size > self.max_input_file_size {
            return Err(XlteError::SecurityViolation(format!(
                "File size exceeds maximum allowed size: {} bytes (max: {} bytes)",
                size, self.max_input_file_size
            )));
        }
        Ok(())
    }

    /// Validates every entry of a ZIP package before any part is read.
    ///
    /// Checks the entry count, each entry name, each entry's declared
    /// decompressed size and the running total.
    pub fn check_archive<R: std::io::Read + std::io::Seek>(
        &self,
        archive: &mut zip::ZipArchive<R>,
    ) -> Result<(), XlteError> {
        if archive.len() > self.max_file_count {
            return Err(XlteError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                archive.len(),
                self.max_file_count
            )));
        }

        let mut total_decompressed_size = 0u64;
        for i in 0..archive.len() {
            let file = archive.by_index(i)?;

            let file_name = file.name();
            validate_zip_path(file_name)
                .map_err(|e| XlteError::SecurityViolation(format!("Invalid ZIP path: {}", e)))?;

            let file_size = file.size();
            if file_size > self.max_file_size {
                return Err(XlteError::SecurityViolation(format!(
                    "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                    file_name, file_size, self.max_file_size
                )));
            }

            total_decompressed_size =
                total_decompressed_size
                    .checked_add(file_size)
                    .ok_or_else(|| {
                        XlteError::SecurityViolation(
                            "Total decompressed size calculation overflow".to_string(),
                        )
                    })?;

            if total_decompressed_size > self.max_decompressed_size {
                return Err(XlteError::SecurityViolation(format!(
                    "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                    total_decompressed_size, self.max_decompressed_size
                )));
            }
        }

        Ok(())
    }
}

/// Validates a ZIP entry name.
///
/// Rejects empty names, absolute paths, `..` segments and backslashes.
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    if path.starts_with('/') || path.starts_with("C:\\") || path.starts_with("c:\\") {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}
