use crate::notice::Notice;
use serde::{Deserialize, Serialize};

/// A software package discovered in a container image layer.
///
/// Packages are created with a name only and filled incrementally; a package
/// that never receives a version/license/src_url is a valid terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: Option<String>,
    pub license: Option<String>,
    pub src_url: Option<String>,
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(default)]
    pub notices: Vec<Notice>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            license: None,
            src_url: None,
            deps: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn add_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    /// Rebuild a package from its cached record.
    pub fn from_record(record: PackageRecord) -> Self {
        Self {
            name: record.name,
            version: record.version,
            license: record.license,
            src_url: record.src_url,
            deps: record.deps,
            notices: Vec::new(),
        }
    }

    pub fn to_record(&self) -> PackageRecord {
        PackageRecord {
            name: self.name.clone(),
            version: self.version.clone(),
            license: self.license.clone(),
            src_url: self.src_url.clone(),
            deps: self.deps.clone(),
        }
    }
}

/// The cache representation of a package: exactly the attribute set of
/// [`Package`], no notices. Unknown keys in stored data are ignored on read
/// rather than being assigned through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub src_url: Option<String>,
    #[serde(default)]
    pub deps: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_package_is_bare() {
        let pkg = Package::new("curl");
        assert_eq!(pkg.name, "curl");
        assert!(pkg.version.is_none());
        assert!(pkg.license.is_none());
        assert!(pkg.src_url.is_none());
        assert!(pkg.deps.is_empty());
        assert!(pkg.notices.is_empty());
    }

    #[test]
    fn test_record_round_trip() {
        let mut pkg = Package::new("musl");
        pkg.version = Some("1.2.4".to_string());
        pkg.license = Some("MIT".to_string());
        pkg.deps = vec!["libc-utils".to_string()];

        let rebuilt = Package::from_record(pkg.to_record());
        assert_eq!(rebuilt, pkg);
    }

    #[test]
    fn test_record_ignores_unknown_keys() {
        let raw = r#"{
            "name": "zlib",
            "version": "1.3",
            "proof_of_origin": "not-an-attribute"
        }"#;
        let record: PackageRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.name, "zlib");
        assert_eq!(record.version.as_deref(), Some("1.3"));
        assert!(record.license.is_none());
    }
}
