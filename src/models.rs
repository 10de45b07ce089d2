use std::collections::HashMap;

/// One `Host` block from an SSH config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    pub name: String,
    attributes: HashMap<String, String>,
}

impl HostRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: HashMap::new(),
        }
    }

    /// Set an attribute. Keys are case-insensitive and the last value wins.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.attributes.insert(key.to_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(&key.to_lowercase()).map(String::as_str)
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }
}

/// A terminal profile produced from a host record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEntry {
    pub name: String,
    pub commandline: String,
    /// Assigned by the settings merger, never by the mapper
    pub guid: Option<String>,
    pub hidden: bool,
}
