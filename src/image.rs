use crate::command::Command;
use crate::notice::Notice;
use crate::package::Package;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One filesystem delta of an image: the commands that produced it and the
/// packages resolved for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    /// Content-addressable id (`sha256:<hash>` for blob layers).
    pub id: String,
    /// Commands executed to produce this layer, in recorded order.
    pub commands: Vec<Command>,
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub notices: Vec<Notice>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Layer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            commands: Vec::new(),
            packages: Vec::new(),
            notices: Vec::new(),
            created_at: None,
        }
    }

    pub fn add_package(&mut self, package: Package) {
        self.packages.push(package);
    }

    pub fn add_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

/// A container image: ordered layers (base first) plus image-level notices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub name: String,
    pub tag: String,
    /// Image manifest digest when known.
    pub id: Option<String>,
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub notices: Vec<Notice>,
}

impl Image {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            id: None,
            layers: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// Split an image reference into name and tag, defaulting to `latest`
    /// when no tag is given.
    pub fn parse_ref(image_ref: &str) -> Self {
        match image_ref.rsplit_once(':') {
            // a ':' inside a registry host:port is not a tag separator
            Some((name, tag)) if !tag.contains('/') => Self::new(name, tag),
            _ => Self::new(image_ref, "latest"),
        }
    }

    /// The reference string used as notice origin prefix.
    pub fn origin_ref(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }

    pub fn add_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}
