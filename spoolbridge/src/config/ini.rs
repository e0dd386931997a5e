use std::collections::HashMap;

use super::ConfigError;

/// parsed ini file
#[derive(Debug, Default)]
pub struct Config {
    pub sections: Vec<Section>,
}

impl Config {
    pub fn parse(file: &str) -> Result<Self, ConfigError> {
        return super::ini_pest::parse_ini(file, None);
    }

    /// find a section, names are case sensitive
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// value of a key, if both the section and the key exist
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?.get(key)
    }

    /// value of a key that must be present
    pub fn require(&self, section: &str, key: &str) -> Result<&str, ConfigError> {
        let s = self
            .section(section)
            .ok_or_else(|| ConfigError::MissingSection(section.to_string()))?;

        return s.get(key).ok_or_else(|| ConfigError::MissingKey {
            section: section.to_string(),
            key: key.to_string(),
        });
    }
}

#[derive(Debug)]
pub struct Section {
    pub name: String,
    /// line of the section header
    pub line: usize,
    /// keys are stored lowercase
    pub(super) values: HashMap<String, String>,
}

impl Section {
    pub fn new(name: String, line: usize) -> Self {
        Self {
            name,
            line,
            values: HashMap::new(),
        }
    }

    /// keys are case insensitive
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// append a continuation line to a value
    pub(super) fn append(&mut self, key: &str, line: &str) {
        if let Some(value) = self.values.get_mut(key) {
            if !value.is_empty() {
                value.push('\n');
            }
            value.push_str(line);
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(&key.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}
