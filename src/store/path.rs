//! Three-part addresses for registry objects.

use crate::error::{ArrayFlowError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator used by the textual form `container|matrix|array`.
pub const PATH_SEPARATOR: char = '|';

/// Address of a container, matrix or array.
///
/// Empty parts mean "unspecified", so `ArrayPath::matrix("Vol", "Cells")`
/// addresses a matrix rather than an array. Persisted as an ordered triple
/// of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, String, String)", into = "(String, String, String)")]
pub struct ArrayPath {
    pub container: String,
    pub matrix: String,
    pub array: String,
}

impl ArrayPath {
    pub fn new(
        container: impl Into<String>,
        matrix: impl Into<String>,
        array: impl Into<String>,
    ) -> Self {
        Self {
            container: container.into(),
            matrix: matrix.into(),
            array: array.into(),
        }
    }

    /// Path addressing a whole data container.
    pub fn container(container: impl Into<String>) -> Self {
        Self::new(container, "", "")
    }

    /// Path addressing an attribute matrix.
    pub fn matrix(container: impl Into<String>, matrix: impl Into<String>) -> Self {
        Self::new(container, matrix, "")
    }

    /// Same container and matrix, different array.
    pub fn with_array(&self, array: impl Into<String>) -> Self {
        Self::new(self.container.clone(), self.matrix.clone(), array)
    }

    /// Container and matrix parts only.
    pub fn matrix_path(&self) -> Self {
        Self::matrix(self.container.clone(), self.matrix.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.container.is_empty() && self.matrix.is_empty() && self.array.is_empty()
    }

    pub fn has_container(&self) -> bool {
        !self.container.is_empty()
    }

    pub fn has_matrix(&self) -> bool {
        !self.container.is_empty() && !self.matrix.is_empty()
    }

    pub fn has_array(&self) -> bool {
        self.has_matrix() && !self.array.is_empty()
    }

    /// Check the path can address a container.
    pub fn validate_container(&self) -> Result<()> {
        self.check_parts()?;
        if self.container.is_empty() {
            return Err(self.invalid("container name is empty"));
        }
        Ok(())
    }

    /// Check the path can address an attribute matrix.
    pub fn validate_matrix(&self) -> Result<()> {
        self.validate_container()?;
        if self.matrix.is_empty() {
            return Err(self.invalid("attribute matrix name is empty"));
        }
        Ok(())
    }

    /// Check the path can address an array.
    pub fn validate_array(&self) -> Result<()> {
        self.validate_matrix()?;
        if self.array.is_empty() {
            return Err(self.invalid("array name is empty"));
        }
        Ok(())
    }

    fn check_parts(&self) -> Result<()> {
        for part in [&self.container, &self.matrix, &self.array] {
            if part.contains(PATH_SEPARATOR) {
                return Err(self.invalid(&format!("'{}' contains '{}'", part, PATH_SEPARATOR)));
            }
            if part.trim() != part.as_str() {
                return Err(self.invalid(&format!("'{}' has surrounding whitespace", part)));
            }
        }
        if self.container.is_empty() && !self.matrix.is_empty() {
            return Err(self.invalid("matrix given without a container"));
        }
        if self.matrix.is_empty() && !self.array.is_empty() {
            return Err(self.invalid("array given without a matrix"));
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> ArrayFlowError {
        ArrayFlowError::InvalidPath {
            path: self.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ArrayPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.container,
            self.matrix,
            self.array,
            sep = PATH_SEPARATOR
        )
    }
}

impl FromStr for ArrayPath {
    type Err = ArrayFlowError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(PATH_SEPARATOR);
        let container = parts.next().unwrap_or_default();
        let matrix = parts.next().unwrap_or_default();
        let array = parts.next().unwrap_or_default();
        if parts.next().is_some() {
            return Err(ArrayFlowError::InvalidPath {
                path: s.to_string(),
                reason: "more than three parts".to_string(),
            });
        }
        Ok(Self::new(container, matrix, array))
    }
}

impl From<(String, String, String)> for ArrayPath {
    fn from((container, matrix, array): (String, String, String)) -> Self {
        Self {
            container,
            matrix,
            array,
        }
    }
}

impl From<ArrayPath> for (String, String, String) {
    fn from(path: ArrayPath) -> Self {
        (path.container, path.matrix, path.array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let path = ArrayPath::new("M", "cells", "ids");
        assert_eq!(path.to_string(), "M|cells|ids");
        assert_eq!("M|cells|ids".parse::<ArrayPath>().unwrap(), path);
        assert_eq!("M".parse::<ArrayPath>().unwrap(), ArrayPath::container("M"));
        assert!("a|b|c|d".parse::<ArrayPath>().is_err());
    }

    #[test]
    fn test_granularity() {
        let path = ArrayPath::matrix("M", "cells");
        assert!(path.has_matrix());
        assert!(!path.has_array());
        assert!(path.validate_matrix().is_ok());
        assert!(path.validate_array().is_err());
        assert!(path.with_array("ids").validate_array().is_ok());
    }

    #[test]
    fn test_invalid_parts() {
        assert!(ArrayPath::new("", "cells", "").validate_container().is_err());
        assert!(ArrayPath::new("M", "", "ids").validate_container().is_err());
        assert!(ArrayPath::new("M|x", "c", "a").validate_array().is_err());
        let err = ArrayPath::new(" M", "c", "a").validate_array().unwrap_err();
        assert!(matches!(err, ArrayFlowError::InvalidPath { .. }));
    }

    #[test]
    fn test_serializes_as_triple() {
        let path = ArrayPath::new("M", "cells", "");
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#"["M","cells",""]"#);
        let back: ArrayPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
