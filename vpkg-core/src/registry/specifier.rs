//! Package specifiers: `namespace/short-name[@version]`

use std::fmt;

use crate::error::{Result, VpkgError};

/// A parsed package specifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageSpec {
    pub namespace: String,
    pub short_name: String,
    pub version: Option<String>,
}

impl PackageSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = |reason: &str| VpkgError::InvalidSpecifier {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = spec.trim();
        let (name, version) = match trimmed.split_once('@') {
            Some((name, version)) => {
                if version.is_empty() {
                    return Err(invalid("empty version after '@'"));
                }
                if version.contains(char::is_whitespace) || version.contains('@') {
                    return Err(invalid("malformed version"));
                }
                (name, Some(version.to_string()))
            }
            None => (trimmed, None),
        };

        let (namespace, short_name) = name
            .split_once('/')
            .ok_or_else(|| invalid("expected 'namespace/name'"))?;

        for segment in [namespace, short_name] {
            check_segment(segment).map_err(|reason| invalid(reason))?;
        }

        Ok(Self {
            namespace: namespace.to_string(),
            short_name: short_name.to_string(),
            version,
        })
    }

    /// `namespace/short-name`, without the version
    pub fn name(&self) -> String {
        format!("{}/{}", self.namespace, self.short_name)
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}/{}@{}", self.namespace, self.short_name, v),
            None => write!(f, "{}/{}", self.namespace, self.short_name),
        }
    }
}

fn check_segment(segment: &str) -> std::result::Result<(), &'static str> {
    if segment.is_empty() {
        return Err("namespace and name must both be non-empty");
    }
    if segment.contains('/') {
        return Err("too many '/' separators");
    }
    if segment == "." || segment.contains("..") {
        return Err("relative path segments are not allowed");
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("only ASCII letters, digits, '-', '_' and '.' are allowed");
    }
    Ok(())
}
