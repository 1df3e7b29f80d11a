//! Ignition config, spec version 2.3.0.
//!
//! Field order and omission rules follow Ignition's own JSON encoding so
//! that the rendered document is byte-for-byte what provisioning agents
//! expect: the five top-level sections and the `ignition.config`,
//! `ignition.security.tls` and `ignition.timeouts` objects are always
//! present, everything else is omitted when empty.

use serde::Serialize;

/// Spec version written into every rendered config.
pub const IGNITION_VERSION: &str = "2.3.0";

fn is_false(value: &bool) -> bool {
    !*value
}

/// Root of an Ignition config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Metadata about the config itself.
    pub ignition: Ignition,
    /// systemd-networkd units.
    pub networkd: Networkd,
    /// Users and groups.
    pub passwd: Passwd,
    /// Filesystems, files, directories and links.
    pub storage: Storage,
    /// systemd units.
    pub systemd: Systemd,
}

impl Config {
    /// Creates an empty config carrying the current spec version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ignition: Ignition {
                version: IGNITION_VERSION.to_string(),
                ..Ignition::default()
            },
            ..Self::default()
        }
    }
}

/// The `ignition` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ignition {
    /// Configs to merge or replace this one with.
    pub config: IgnitionConfig,
    /// TLS settings for remote fetches.
    pub security: Security,
    /// Fetch timeouts.
    pub timeouts: Timeouts,
    /// Spec version.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
}

/// Remote configs referenced by this one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IgnitionConfig {
    /// Configs merged into this one.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub append: Vec<ConfigReference>,
    /// Config that replaces this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace: Option<ConfigReference>,
}

/// A remote config reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigReference {
    /// URL of the config.
    pub source: String,
    /// Expected hash of the config.
    pub verification: Verification,
}

/// Content verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Verification {
    /// `<function>-<hex digest>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// The `ignition.security` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Security {
    /// TLS settings.
    pub tls: Tls,
}

/// TLS settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tls {
    /// Additional trusted certificate authorities.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub certificate_authorities: Vec<CaReference>,
}

/// A certificate authority reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaReference {
    /// URL of the PEM bundle.
    pub source: String,
    /// Expected hash of the bundle.
    pub verification: Verification,
}

/// Fetch timeouts in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeouts {
    /// Time to wait for response headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_response_headers: Option<i64>,
    /// Total time for a fetch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_total: Option<i64>,
}

/// The `networkd` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Networkd {
    /// networkd units.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<NetworkdUnit>,
}

/// A networkd unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkdUnit {
    /// Unit file contents.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub contents: String,
    /// Drop-in files.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropins: Vec<Dropin>,
    /// Unit file name.
    pub name: String,
}

/// The `passwd` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Passwd {
    /// Groups to create.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<PasswdGroup>,
    /// Users to create or modify.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<PasswdUser>,
}

/// A user account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswdUser {
    /// GECOS field.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gecos: String,
    /// Supplementary groups.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    /// Home directory.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub home_dir: String,
    /// Login name.
    pub name: String,
    /// Skip creating the home directory.
    #[serde(skip_serializing_if = "is_false")]
    pub no_create_home: bool,
    /// Skip adding the user to lastlog and faillog.
    #[serde(skip_serializing_if = "is_false")]
    pub no_log_init: bool,
    /// Skip creating a group named after the user.
    #[serde(skip_serializing_if = "is_false")]
    pub no_user_group: bool,
    /// Hashed password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Primary group.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub primary_group: String,
    /// Authorized SSH public keys.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh_authorized_keys: Vec<String>,
    /// Login shell.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub shell: String,
    /// Create a system account.
    #[serde(skip_serializing_if = "is_false")]
    pub system: bool,
    /// Numeric user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
}

/// A group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswdGroup {
    /// Numeric group id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<i64>,
    /// Group name.
    pub name: String,
    /// Hashed password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Create a system group.
    #[serde(skip_serializing_if = "is_false")]
    pub system: bool,
}

/// The `storage` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Storage {
    /// Directories to create.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub directories: Vec<Directory>,
    /// Files to write.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,
    /// Filesystems to create or reference.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filesystems: Vec<Filesystem>,
    /// Links to create.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

/// A filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Filesystem {
    /// How to create or find the filesystem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount: Option<Mount>,
    /// Name referenced by files, directories and links.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Path of an already mounted filesystem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Filesystem creation parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
    /// Block device path.
    pub device: String,
    /// Filesystem type.
    pub format: String,
    /// Filesystem label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Extra mkfs options.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Filesystem UUID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Wipe any existing filesystem.
    #[serde(skip_serializing_if = "is_false")]
    pub wipe_filesystem: bool,
}

/// Owner of a node, by id or name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeOwner {
    /// Numeric id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// A regular file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct File {
    /// Filesystem name.
    pub filesystem: String,
    /// Group owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<NodeOwner>,
    /// Replace an existing node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    /// Absolute path inside the filesystem.
    pub path: String,
    /// User owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<NodeOwner>,
    /// Append instead of replacing.
    #[serde(skip_serializing_if = "is_false")]
    pub append: bool,
    /// File contents.
    pub contents: FileContents,
    /// Permission bits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<i64>,
}

/// Contents of a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileContents {
    /// Compression of the source (`gzip`).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub compression: String,
    /// URL of the contents.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    /// Expected hash of the contents.
    pub verification: Verification,
}

/// A directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Directory {
    /// Filesystem name.
    pub filesystem: String,
    /// Group owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<NodeOwner>,
    /// Replace an existing node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    /// Absolute path inside the filesystem.
    pub path: String,
    /// User owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<NodeOwner>,
    /// Permission bits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<i64>,
}

/// A symbolic or hard link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Link {
    /// Filesystem name.
    pub filesystem: String,
    /// Group owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<NodeOwner>,
    /// Replace an existing node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    /// Absolute path inside the filesystem.
    pub path: String,
    /// User owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<NodeOwner>,
    /// Create a hard link.
    #[serde(skip_serializing_if = "is_false")]
    pub hard: bool,
    /// Link target.
    pub target: String,
}

/// The `systemd` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Systemd {
    /// systemd units.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<Unit>,
}

/// A systemd unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Unit {
    /// Unit file contents.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub contents: String,
    /// Drop-in files.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropins: Vec<Dropin>,
    /// Deprecated enable flag.
    #[serde(skip_serializing_if = "is_false")]
    pub enable: bool,
    /// Whether the unit is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Whether the unit is masked.
    #[serde(skip_serializing_if = "is_false")]
    pub mask: bool,
    /// Unit file name.
    pub name: String,
}

/// A unit drop-in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dropin {
    /// Drop-in contents.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub contents: String,
    /// Drop-in file name.
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_shape() {
        let json = serde_json::to_string(&Config::new()).unwrap();
        assert_eq!(
            json,
            r#"{"ignition":{"config":{},"security":{"tls":{}},"timeouts":{},"version":"2.3.0"},"networkd":{},"passwd":{},"storage":{},"systemd":{}}"#
        );
    }

    #[test]
    fn test_file_field_order() {
        let file = File {
            filesystem: "root".to_string(),
            path: "/etc/hostname".to_string(),
            contents: FileContents {
                source: "data:,node1".to_string(),
                ..FileContents::default()
            },
            mode: Some(420),
            ..File::default()
        };

        let json = serde_json::to_string(&file).unwrap();
        assert_eq!(
            json,
            r#"{"filesystem":"root","path":"/etc/hostname","contents":{"source":"data:,node1","verification":{}},"mode":420}"#
        );
    }

    #[test]
    fn test_user_uses_camel_case() {
        let user = PasswdUser {
            name: "core".to_string(),
            ssh_authorized_keys: vec!["ssh-ed25519 AAAA".to_string()],
            no_create_home: true,
            ..PasswdUser::default()
        };

        let json = serde_json::to_string(&user).unwrap();
        assert_eq!(
            json,
            r#"{"name":"core","noCreateHome":true,"sshAuthorizedKeys":["ssh-ed25519 AAAA"]}"#
        );
    }
}
