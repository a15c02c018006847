//! XML configuration support.
//! - Loads endpoint write settings from an XML file (quick_xml + serde).
//! - Writes a commented template for operators to start from.
//!
//! Notes:
//! - Unknown XML fields are rejected so misspelled options surface early.
//! - Values are trimmed; empty strings are treated as absent.

use anyhow::{Context, Result, anyhow};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::paths::path_has_symlink_ancestor;
use super::types::{ConflictPolicy, LogLevel, StoreConfig};
use super::{CONFIG_ENV_VAR, DEFAULT_BUFFER_SIZE};
use crate::fs_ops::PermissionSet;
use crate::platform::atomic_write;

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    root: Option<String>,
    file_exist: Option<String>,
    buffer_size: Option<String>,
    charset: Option<String>,
    append_chars: Option<String>,
    allow_null_body: Option<bool>,
    keep_last_modified: Option<bool>,
    chmod: Option<String>,
    chmod_directory: Option<String>,
    auto_create: Option<bool>,
    copy_and_delete_on_rename_fail: Option<bool>,
    rename_using_copy: Option<bool>,
    force_writes: Option<bool>,
    log_level: Option<String>,
    log_file: Option<String>,
}

/// Store settings plus the logging options that travel in the same file.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub store: StoreConfig,
    pub log_level: Option<LogLevel>,
    pub log_file: Option<PathBuf>,
}

fn trimmed(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_perms(field: &str, raw: Option<String>) -> Result<Option<PermissionSet>> {
    match trimmed(raw) {
        Some(s) => {
            let perms = PermissionSet::parse(&s).with_context(|| format!("config field <{field}>"))?;
            Ok(Some(perms))
        }
        None => Ok(None),
    }
}

// Map XmlConfig -> LoadedConfig
fn xml_to_config(parsed: XmlConfig) -> Result<LoadedConfig> {
    let mut store = StoreConfig::default();

    if let Some(root) = trimmed(parsed.root) {
        store.root = PathBuf::from(root);
    }
    if let Some(policy) = trimmed(parsed.file_exist) {
        store.policy = policy
            .parse::<ConflictPolicy>()
            .map_err(|e| anyhow!(e))
            .context("config field <file_exist>")?;
    }
    store.buffer_size = match trimmed(parsed.buffer_size) {
        Some(raw) => raw
            .parse::<usize>()
            .with_context(|| format!("config field <buffer_size>: '{raw}'"))?,
        None => DEFAULT_BUFFER_SIZE,
    };
    store.charset = trimmed(parsed.charset);
    // Separators are whitespace-sensitive ("\n"), so keep them verbatim.
    store.append_separator = parsed.append_chars.filter(|s| !s.is_empty());
    store.chmod = parse_perms("chmod", parsed.chmod)?;
    store.dir_chmod = parse_perms("chmod_directory", parsed.chmod_directory)?;

    // Flags
    if let Some(v) = parsed.allow_null_body {
        store.allow_null_body = v;
    }
    if let Some(v) = parsed.keep_last_modified {
        store.keep_last_modified = v;
    }
    if let Some(v) = parsed.auto_create {
        store.auto_create = v;
    }
    if let Some(v) = parsed.copy_and_delete_on_rename_fail {
        store.copy_and_delete_on_rename_fail = v;
    }
    if let Some(v) = parsed.rename_using_copy {
        store.rename_using_copy = v;
    }
    if let Some(v) = parsed.force_writes {
        store.force_writes = v;
    }

    let log_level = trimmed(parsed.log_level)
        .map(|s| s.parse::<LogLevel>().map_err(|e| anyhow!(e)))
        .transpose()
        .context("config field <log_level>")?;
    let log_file = trimmed(parsed.log_file).map(PathBuf::from);

    Ok(LoadedConfig { store, log_level, log_file })
}

/// Parse a config from an XML string.
pub fn parse_config_xml(contents: &str) -> Result<LoadedConfig> {
    let parsed: XmlConfig = from_xml_str(contents).context("parse config xml")?;
    xml_to_config(parsed)
}

/// Load a config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<LoadedConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let loaded = parse_config_xml(&contents)
        .with_context(|| format!("load config xml '{}'", path.display()))?;
    debug!(path = %path.display(), policy = %loaded.store.policy, "loaded store config");
    Ok(loaded)
}

/// If FILE_STORE_CONFIG is set, load and return that config; otherwise Ok(None).
pub fn load_config_from_env() -> Result<Option<LoadedConfig>> {
    match env::var_os(CONFIG_ENV_VAR) {
        Some(p) => load_config_from_xml_path(Path::new(&p)).map(Some),
        None => Ok(None),
    }
}

/// Write a commented template config. Refuses to follow symlinked ancestors
/// and never overwrites an existing file.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        return Err(anyhow!(
            "Refusing to create config: ancestor of {} is a symlink",
            path.display()
        ));
    }
    if path.exists() {
        return Err(anyhow!("Config file already exists: {}", path.display()));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = format!(
        "<!--\n  file_store configuration (XML)\n\n    root                           -> endpoint directory; relative targets resolve under it\n    file_exist                     -> Ignore | Fail | Move | Append | Override\n    buffer_size                    -> stream copy chunk size in bytes\n    charset                        -> write text in this encoding (e.g. iso-8859-1)\n    append_chars                   -> written after each payload when appending\n    chmod / chmod_directory        -> rwxr-x--- or octal (750)\n    allow_null_body, keep_last_modified, auto_create,\n    copy_and_delete_on_rename_fail, rename_using_copy, force_writes -> true/false\n-->\n<config>\n  <root>.</root>\n  <file_exist>Override</file_exist>\n  <buffer_size>{}</buffer_size>\n  <allow_null_body>false</allow_null_body>\n  <keep_last_modified>false</keep_last_modified>\n  <log_level>normal</log_level>\n</config>\n",
        DEFAULT_BUFFER_SIZE
    );

    atomic_write(path, content.as_bytes())
        .with_context(|| format!("write template config '{}'", path.display()))?;
    info!("Created template config at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let xml = r#"<config>
  <root> /data/out </root>
  <file_exist>append</file_exist>
  <buffer_size> 4096 </buffer_size>
  <charset>iso-8859-1</charset>
  <append_chars>;</append_chars>
  <allow_null_body>true</allow_null_body>
  <keep_last_modified>true</keep_last_modified>
  <chmod>rw-r-----</chmod>
  <chmod_directory>750</chmod_directory>
  <force_writes>false</force_writes>
  <log_level>debug</log_level>
</config>"#;
        let loaded = parse_config_xml(xml).unwrap();
        let s = &loaded.store;
        assert_eq!(s.root, PathBuf::from("/data/out"));
        assert_eq!(s.policy, ConflictPolicy::Append);
        assert_eq!(s.buffer_size, 4096);
        assert_eq!(s.charset.as_deref(), Some("iso-8859-1"));
        assert_eq!(s.append_separator.as_deref(), Some(";"));
        assert!(s.allow_null_body);
        assert!(s.keep_last_modified);
        assert_eq!(s.chmod.map(|p| p.mode()), Some(0o640));
        assert_eq!(s.dir_chmod.map(|p| p.mode()), Some(0o750));
        assert!(!s.force_writes);
        assert_eq!(loaded.log_level, Some(LogLevel::Debug));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let loaded = parse_config_xml("<config></config>").unwrap();
        assert_eq!(loaded.store.policy, ConflictPolicy::Override);
        assert_eq!(loaded.store.buffer_size, DEFAULT_BUFFER_SIZE);
        assert!(loaded.log_file.is_none());
    }

    #[test]
    fn unknown_field_rejected() {
        assert!(parse_config_xml("<config><bogus>1</bogus></config>").is_err());
    }

    #[test]
    fn bad_policy_rejected() {
        let err = parse_config_xml("<config><file_exist>sometimes</file_exist></config>")
            .unwrap_err();
        assert!(format!("{err:#}").contains("file_exist"));
    }

    #[test]
    fn bad_buffer_size_rejected() {
        for raw in ["lots", "-1", "4k"] {
            let xml = format!("<config><buffer_size>{raw}</buffer_size></config>");
            let err = parse_config_xml(&xml).unwrap_err();
            assert!(format!("{err:#}").contains("buffer_size"), "{raw}: {err:#}");
        }
    }

    #[test]
    fn bad_log_level_rejected() {
        let err = parse_config_xml("<config><log_level>chatty</log_level></config>").unwrap_err();
        assert!(format!("{err:#}").contains("log_level"), "{err:#}");
    }

    #[test]
    fn template_is_loadable() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("conf").join("file_store.xml");
        create_template_config(&path).unwrap();
        let loaded = load_config_from_xml_path(&path).unwrap();
        assert_eq!(loaded.store.policy, ConflictPolicy::Override);
        assert!(create_template_config(&path).is_err(), "must not overwrite");
    }
}
