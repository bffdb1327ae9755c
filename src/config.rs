use std::{
    error::Error,
    fs,
    io::{self, ErrorKind},
    path::Path,
};

use serde::{de, Deserialize, Deserializer};
use serde_derive::Deserialize;

use crate::{link::ADDRESS_MASK, BASE_ADDRESS, MAX_LINE_LEN, MEMORY_SIZE};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[serde(rename = "MEMORY")]
    pub memory: Memory,
    #[serde(rename = "SOURCE")]
    pub source: Source,
    #[serde(rename = "OUTPUT")]
    pub output: Output,
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "lowercase", deny_unknown_fields)]
pub struct Memory {
    #[serde(deserialize_with = "deserialize_bases_u32")]
    pub base: u32,
    #[serde(deserialize_with = "deserialize_bases_u32")]
    pub size: u32,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            base: BASE_ADDRESS,
            size: MEMORY_SIZE,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "lowercase", deny_unknown_fields)]
pub struct Source {
    #[serde(deserialize_with = "deserialize_bases_usize")]
    pub line_length: usize,
}

impl Default for Source {
    fn default() -> Self {
        Self {
            line_length: MAX_LINE_LEN,
        }
    }
}

/// File extensions, without the dot.
#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "lowercase", deny_unknown_fields)]
pub struct Output {
    pub source: String,
    pub expanded: String,
    pub object: String,
    pub entries: String,
    pub externals: String,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            source: "as".to_string(),
            expanded: "am".to_string(),
            object: "obj".to_string(),
            entries: "ent".to_string(),
            externals: "ext".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("cant open config {}: {e}", path.display()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, Box<dyn Error>> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        let last = config.memory.base as u64 + config.memory.size as u64 - 1;
        if last > ADDRESS_MASK as u64 {
            tracing::warn!(
                "memory ends at ${last:X}, addresses past $3FF are truncated to 10 bits"
            );
        }
        Ok(config)
    }

    pub fn validate(&self) -> io::Result<()> {
        if self.memory.size == 0 {
            return Err(invalid("memory size must be at least one word"));
        }
        let last = self.memory.base as u64 + self.memory.size as u64 - 1;
        if last > MAX_ADDRESS {
            return Err(invalid(&format!(
                "memory ends at ${last:X}, past the last address ${MAX_ADDRESS:X}"
            )));
        }
        if self.source.line_length == 0 {
            return Err(invalid("line length must be at least one character"));
        }
        let out = &self.output;
        for (key, ext) in [
            ("source", &out.source),
            ("expanded", &out.expanded),
            ("object", &out.object),
            ("entries", &out.entries),
            ("externals", &out.externals),
        ] {
            if ext.is_empty() || ext.contains(['.', '/', '\\']) {
                return Err(invalid(&format!("\"{ext}\" is not a valid {key} extension")));
            }
        }
        if out.source == out.expanded {
            return Err(invalid("source and expanded extensions must differ"));
        }
        Ok(())
    }
}

/// Highest address a configured image may reach.
const MAX_ADDRESS: u64 = u16::MAX as u64;

fn invalid(msg: &str) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, msg.to_string())
}

fn parse_bases<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let buf = String::deserialize(deserializer)?;
    if let Some(hex) = buf.strip_prefix('$') {
        u64::from_str_radix(hex, 16)
            .map_err(|e| de::Error::custom(format!("{buf} is not a valid base 16 value: {e}")))
    } else if let Some(bin) = buf.strip_prefix('%') {
        u64::from_str_radix(bin, 2)
            .map_err(|e| de::Error::custom(format!("{buf} is not a valid base 2 value: {e}")))
    } else {
        buf.parse::<u64>()
            .map_err(|e| de::Error::custom(format!("{buf} is not a valid base 10 value: {e}")))
    }
}

fn deserialize_bases_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = parse_bases(deserializer)?;
    u32::try_from(value).map_err(|e| de::Error::custom(format!("{value} is too large: {e}")))
}

fn deserialize_bases_usize<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = parse_bases(deserializer)?;
    usize::try_from(value).map_err(|e| de::Error::custom(format!("{value} is too large: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.memory.base, 100);
        assert_eq!(config.memory.size, 1024);
        assert_eq!(config.source.line_length, 80);
        assert_eq!(config.output.object, "obj");
        assert_eq!(config.output.expanded, "am");
    }

    #[test]
    fn numeric_bases() {
        let config = Config::parse(
            r#"
            [MEMORY]
            base = "$40"
            size = "%100000000"

            [SOURCE]
            line_length = "120"
            "#,
        )
        .unwrap();
        assert_eq!(config.memory.base, 0x40);
        assert_eq!(config.memory.size, 256);
        assert_eq!(config.source.line_length, 120);
        assert_eq!(config.output.source, "as");
    }

    #[test]
    fn output_extensions() {
        let config = Config::parse(
            r#"
            [OUTPUT]
            object = "ob"
            externals = "externs"
            "#,
        )
        .unwrap();
        assert_eq!(config.output.object, "ob");
        assert_eq!(config.output.externals, "externs");
        assert_eq!(config.output.entries, "ent");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::parse("[MEMORY]\nbase = \"$zz\"\n").is_err());
        assert!(Config::parse("[MEMORY]\nsize = \"0\"\n").is_err());
        assert!(Config::parse("[MEMORY]\nstart = \"1\"\n").is_err());
        assert!(Config::parse("[SOURCE]\nline_length = \"0\"\n").is_err());
        assert!(Config::parse("[OUTPUT]\nobject = \".ob\"\n").is_err());
        assert!(Config::parse("[OUTPUT]\nexpanded = \"as\"\n").is_err());
        assert!(Config::parse("[MEMORY]\nbase = 100\n").is_err());
        assert!(Config::parse("[MEMORY]\nbase = \"$FFFFFFFF\"\n").is_err());
        assert!(Config::parse("[MEMORY]\nbase = \"$FC01\"\n").is_err());
        assert!(Config::parse("[MEMORY]\nsize = \"$FFFFFFFF\"\n").is_err());
    }

    #[test]
    fn image_may_fill_the_address_space() {
        let config = Config::parse("[MEMORY]\nbase = \"$FC00\"\n").unwrap();
        assert_eq!(config.memory.base + config.memory.size - 1, 0xFFFF);
    }
}
