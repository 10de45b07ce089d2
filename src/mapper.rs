use crate::models::{HostRecord, ProfileEntry};

/// A single step that contributes arguments to an `ssh` command line
pub trait CommandRule: Send + Sync {
    fn apply(&self, host: &HostRecord, args: &mut Vec<String>);
}

/// Emits `<flag> <value>` when the host carries `attribute`
#[derive(Debug, Clone)]
pub struct FlagRule {
    pub attribute: &'static str,
    pub flag: &'static str,
}

impl FlagRule {
    pub const fn new(attribute: &'static str, flag: &'static str) -> Self {
        Self { attribute, flag }
    }
}

impl CommandRule for FlagRule {
    fn apply(&self, host: &HostRecord, args: &mut Vec<String>) {
        if let Some(value) = host.get(self.attribute) {
            args.push(self.flag.to_string());
            args.push(value.to_string());
        }
    }
}

/// Turns host records into terminal profiles.
///
/// Rules run in table order and the destination (`[user@]hostname`) is always
/// appended last, so new rules never disturb the position of existing ones.
pub struct AttributeMapper {
    rules: Vec<Box<dyn CommandRule>>,
}

impl Default for AttributeMapper {
    fn default() -> Self {
        Self::empty()
            .with_rule(FlagRule::new("port", "-p"))
            .with_rule(FlagRule::new("identityfile", "-i"))
    }
}

impl AttributeMapper {
    /// A mapper with no option rules; it only emits `ssh <destination>`
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: impl CommandRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn commandline(&self, host: &HostRecord) -> String {
        let mut args = vec!["ssh".to_string()];
        for rule in &self.rules {
            rule.apply(host, &mut args);
        }
        args.push(destination(host));
        args.join(" ")
    }

    pub fn map(&self, host: &HostRecord) -> ProfileEntry {
        ProfileEntry {
            name: host.name.clone(),
            commandline: self.commandline(host),
            guid: None,
            hidden: false,
        }
    }
}

fn destination(host: &HostRecord) -> String {
    let target = host.get("hostname").unwrap_or(host.name.as_str());
    match host.get("user") {
        Some(user) => format!("{}@{}", user, target),
        None => target.to_string(),
    }
}
