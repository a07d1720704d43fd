//! Runtime-supplied allow-exemptions for unsupported members.
//!
//! An exemption is a prefix of the textual member signature form
//! (`Lcom/foo/Bar;->name...`). The whole list is replaced atomically by the
//! privileged runtime surface; readers match against an `Arc` snapshot.
//! Exemptions are consulted only for `Unsupported` members.

use std::sync::{Arc, RwLock};

/// Maximum number of exemption prefixes.
pub const MAX_EXEMPTIONS: usize = 4_096;

/// Maximum length of one exemption prefix.
pub const MAX_EXEMPTION_LENGTH: usize = 1_024;

/// Exemption list replacement failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExemptionError {
    /// Too many prefixes.
    #[error("{count} exemption prefixes (max {MAX_EXEMPTIONS})")]
    TooMany {
        /// Observed count.
        count: usize,
    },

    /// A prefix exceeded the length bound or was empty.
    #[error("exemption prefix {prefix:?} is empty or longer than {MAX_EXEMPTION_LENGTH} bytes")]
    BadPrefix {
        /// Offending prefix, truncated.
        prefix: String,
    },
}

/// Atomically replaceable list of signature prefixes.
#[derive(Debug, Default)]
pub struct ExemptionList {
    prefixes: RwLock<Arc<Vec<String>>>,
}

impl ExemptionList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list.
    ///
    /// # Errors
    ///
    /// [`ExemptionError`] if the list or any prefix violates its bound; the
    /// current list is left untouched on error.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_exemptions(&self, prefixes: Vec<String>) -> Result<(), ExemptionError> {
        if prefixes.len() > MAX_EXEMPTIONS {
            return Err(ExemptionError::TooMany {
                count: prefixes.len(),
            });
        }
        for prefix in &prefixes {
            if prefix.is_empty() || prefix.len() > MAX_EXEMPTION_LENGTH {
                let mut end = prefix.len().min(64);
                while !prefix.is_char_boundary(end) {
                    end -= 1;
                }
                return Err(ExemptionError::BadPrefix {
                    prefix: prefix[..end].to_string(),
                });
            }
        }
        tracing::debug!(count = prefixes.len(), "exemption list replaced");
        *self.prefixes.write().expect("exemption list lock poisoned") = Arc::new(prefixes);
        Ok(())
    }

    /// Whether a textual signature matches any exemption prefix.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn is_exempt(&self, signature: &str) -> bool {
        let prefixes = Arc::clone(&self.prefixes.read().expect("exemption list lock poisoned"));
        prefixes.iter().any(|p| signature.starts_with(p.as_str()))
    }
}
