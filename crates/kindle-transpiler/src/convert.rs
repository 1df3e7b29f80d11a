//! Container Linux Config sections to Ignition.

use crate::dynamic;
use crate::ignition::{
    CaReference, Config, ConfigReference, Directory, Dropin, File, FileContents, Filesystem,
    Link, Mount, NetworkdUnit, NodeOwner, PasswdGroup, PasswdUser, Unit, Verification,
};
use crate::walker::{child, index, Walker};
use kindle_core::Platform;
use serde_yaml::{Mapping, Value};

const ROOT_KEYS: &[&str] = &["ignition", "storage", "systemd", "networkd", "passwd"];

const SYSTEMD_SUFFIXES: &[&str] = &[
    ".service",
    ".socket",
    ".device",
    ".mount",
    ".automount",
    ".swap",
    ".target",
    ".path",
    ".timer",
    ".snapshot",
    ".slice",
    ".scope",
];

const NETWORKD_SUFFIXES: &[&str] = &[".link", ".netdev", ".network"];

const FILESYSTEM_FORMATS: &[&str] = &["ext4", "btrfs", "xfs", "vfat", "swap"];

const ROOT_FILESYSTEM: &str = "root";

/// Converts a parsed document into an Ignition config.
pub(crate) fn convert(root: &Value, platform: Option<Platform>, w: &mut Walker) -> Config {
    let mut config = Config::new();

    if root.is_null() {
        w.fatal("not a config (empty)", "");
        return config;
    }
    let Some(root) = w.table(root, "", ROOT_KEYS) else {
        return config;
    };

    if let Some(section) =
        w.table_field(root, "ignition", "", &["config", "timeouts", "security"])
    {
        convert_ignition(section, &mut config, w);
    }
    if let Some(section) = w.table_field(
        root,
        "storage",
        "",
        &["filesystems", "files", "directories", "links"],
    ) {
        convert_storage(section, &mut config, w);
    }
    if let Some(section) = w.table_field(root, "systemd", "", &["units"]) {
        convert_systemd(section, &mut config, w);
    }
    if let Some(section) = w.table_field(root, "networkd", "", &["units"]) {
        convert_networkd(section, &mut config, w);
    }
    if let Some(section) = w.table_field(root, "passwd", "", &["users", "groups"]) {
        convert_passwd(section, &mut config, w);
    }

    dynamic::resolve(&mut config.systemd, platform, w);
    config
}

fn verification(map: &Mapping, path: &str, w: &mut Walker) -> Verification {
    let Some(v) = w.table_field(map, "verification", path, &["hash"]) else {
        return Verification::default();
    };
    let path = child(path, "verification");
    let Some(hash) = w.table_field(v, "hash", &path, &["function", "sum"]) else {
        return Verification::default();
    };
    let path = child(&path, "hash");

    let function = w.string(hash, "function", &path).unwrap_or_default();
    let sum = w.string(hash, "sum", &path).unwrap_or_default();
    if function != "sha512" {
        w.fatal(format!("unrecognized hash function: {function}"), &path);
        return Verification::default();
    }
    if sum.is_empty() {
        w.fatal("hash sum is required", &path);
        return Verification::default();
    }

    Verification {
        hash: Some(format!("{function}-{sum}")),
    }
}

fn source_url(map: &Mapping, key: &str, path: &str, w: &mut Walker) -> String {
    let url = w.string(map, key, path).unwrap_or_default();
    let valid = ["http://", "https://", "s3://", "tftp://", "data:"]
        .iter()
        .any(|scheme| url.starts_with(scheme));
    if !valid {
        w.fatal(format!("invalid url \"{url}\""), &child(path, key));
    }
    url
}

fn config_reference(map: &Mapping, path: &str, w: &mut Walker) -> ConfigReference {
    ConfigReference {
        source: source_url(map, "source", path, w),
        verification: verification(map, path, w),
    }
}

fn convert_ignition(section: &Mapping, config: &mut Config, w: &mut Walker) {
    let path = "ignition";
    let reference_keys = &["source", "verification"];

    if let Some(refs) = w.table_field(section, "config", path, &["append", "replace"]) {
        let refs_path = child(path, "config");
        let append_path = child(&refs_path, "append");
        for (i, item) in w.list(refs, "append", &refs_path).iter().enumerate() {
            let item_path = index(&append_path, i);
            if let Some(item) = w.table(item, &item_path, reference_keys) {
                let reference = config_reference(item, &item_path, w);
                config.ignition.config.append.push(reference);
            }
        }
        if let Some(replace) = w.table_field(refs, "replace", &refs_path, reference_keys) {
            let replace_path = child(&refs_path, "replace");
            config.ignition.config.replace = Some(config_reference(replace, &replace_path, w));
        }
    }

    if let Some(timeouts) = w.table_field(
        section,
        "timeouts",
        path,
        &["http_response_headers", "http_total"],
    ) {
        let t_path = child(path, "timeouts");
        config.ignition.timeouts.http_response_headers =
            w.integer(timeouts, "http_response_headers", &t_path);
        config.ignition.timeouts.http_total = w.integer(timeouts, "http_total", &t_path);
    }

    if let Some(security) = w.table_field(section, "security", path, &["tls"]) {
        let s_path = child(path, "security");
        if let Some(tls) = w.table_field(security, "tls", &s_path, &["certificate_authorities"]) {
            let tls_path = child(&s_path, "tls");
            let ca_path = child(&tls_path, "certificate_authorities");
            for (i, item) in w
                .list(tls, "certificate_authorities", &tls_path)
                .iter()
                .enumerate()
            {
                let item_path = index(&ca_path, i);
                if let Some(item) = w.table(item, &item_path, reference_keys) {
                    let ca = CaReference {
                        source: source_url(item, "source", &item_path, w),
                        verification: verification(item, &item_path, w),
                    };
                    config.ignition.security.tls.certificate_authorities.push(ca);
                }
            }
        }
    }
}

fn owner(map: &Mapping, key: &str, path: &str, w: &mut Walker) -> Option<NodeOwner> {
    let owner = w.table_field(map, key, path, &["id", "name"])?;
    let path = child(path, key);
    Some(NodeOwner {
        id: w.integer(owner, "id", &path),
        name: w.string(owner, "name", &path).unwrap_or_default(),
    })
}

/// Fields shared by files, directories and links.
struct Node {
    filesystem: String,
    path: String,
    user: Option<NodeOwner>,
    group: Option<NodeOwner>,
    overwrite: Option<bool>,
}

fn node(map: &Mapping, path: &str, filesystems: &[String], w: &mut Walker) -> Node {
    let filesystem = w
        .string(map, "filesystem", path)
        .unwrap_or_else(|| ROOT_FILESYSTEM.to_string());
    if filesystem != ROOT_FILESYSTEM && !filesystems.contains(&filesystem) {
        w.fatal(
            format!("no filesystem named \"{filesystem}\" is defined"),
            &child(path, "filesystem"),
        );
    }

    let node_path = w.string(map, "path", path).unwrap_or_default();
    if !node_path.starts_with('/') {
        w.fatal("path not absolute", &child(path, "path"));
    }

    Node {
        filesystem,
        path: node_path,
        user: owner(map, "user", path, w),
        group: owner(map, "group", path, w),
        overwrite: w.boolean(map, "overwrite", path),
    }
}

const NODE_KEYS: &[&str] = &["filesystem", "path", "user", "group", "overwrite"];

fn keys(extra: &[&'static str]) -> Vec<&'static str> {
    NODE_KEYS.iter().chain(extra).copied().collect()
}

fn file_contents(map: &Mapping, path: &str, w: &mut Walker) -> FileContents {
    let Some(contents) = w.table_field(map, "contents", path, &["inline", "remote"]) else {
        return FileContents::default();
    };
    let path = child(path, "contents");

    let inline = w.string(contents, "inline", &path);
    let remote = w.table_field(
        contents,
        "remote",
        &path,
        &["url", "compression", "verification"],
    );

    match (inline, remote) {
        (Some(_), Some(_)) => {
            w.fatal("only one of inline or remote may be specified", &path);
            FileContents::default()
        }
        (Some(inline), None) => FileContents {
            source: format!("data:,{}", urlencoding::encode(&inline)),
            ..FileContents::default()
        },
        (None, Some(remote)) => {
            let remote_path = child(&path, "remote");
            let compression = w
                .string(remote, "compression", &remote_path)
                .unwrap_or_default();
            if !compression.is_empty() && compression != "gzip" {
                w.fatal(
                    format!("unsupported compression \"{compression}\""),
                    &child(&remote_path, "compression"),
                );
            }
            FileContents {
                compression,
                source: source_url(remote, "url", &remote_path, w),
                verification: verification(remote, &remote_path, w),
            }
        }
        (None, None) => FileContents::default(),
    }
}

fn convert_storage(section: &Mapping, config: &mut Config, w: &mut Walker) {
    let path = "storage";

    let fs_path = child(path, "filesystems");
    for (i, item) in w.list(section, "filesystems", path).iter().enumerate() {
        let item_path = index(&fs_path, i);
        let Some(item) = w.table(item, &item_path, &["name", "mount", "path"]) else {
            continue;
        };
        let name = w.string(item, "name", &item_path).unwrap_or_default();
        if name.is_empty() {
            w.fatal("filesystem name is required", &item_path);
        }

        let mount = w
            .table_field(
                item,
                "mount",
                &item_path,
                &["device", "format", "create", "wipe_filesystem", "label", "uuid", "options"],
            )
            .map(|mount| {
                let mount_path = child(&item_path, "mount");
                let device = w.string(mount, "device", &mount_path).unwrap_or_default();
                if !device.starts_with('/') {
                    w.fatal("device path not absolute", &child(&mount_path, "device"));
                }
                let format = w.string(mount, "format", &mount_path).unwrap_or_default();
                if !FILESYSTEM_FORMATS.contains(&format.as_str()) {
                    w.fatal(
                        format!("invalid filesystem format \"{format}\""),
                        &child(&mount_path, "format"),
                    );
                }
                if mount.contains_key("create") {
                    w.warn(
                        "create is deprecated, use wipe_filesystem",
                        &child(&mount_path, "create"),
                    );
                }
                Mount {
                    device,
                    format,
                    label: w.string(mount, "label", &mount_path),
                    options: w.strings(mount, "options", &mount_path),
                    uuid: w.string(mount, "uuid", &mount_path),
                    wipe_filesystem: w
                        .boolean(mount, "wipe_filesystem", &mount_path)
                        .unwrap_or(false),
                }
            });

        let fs_dir = w.string(item, "path", &item_path);
        if mount.is_some() == fs_dir.is_some() {
            w.fatal("exactly one of mount or path must be specified", &item_path);
        }

        config.storage.filesystems.push(Filesystem {
            mount,
            name,
            path: fs_dir,
        });
    }

    let defined: Vec<String> = config
        .storage
        .filesystems
        .iter()
        .map(|fs| fs.name.clone())
        .collect();

    let files_path = child(path, "files");
    let file_keys = keys(&["contents", "mode", "append"]);
    for (i, item) in w.list(section, "files", path).iter().enumerate() {
        let item_path = index(&files_path, i);
        let Some(item) = w.table(item, &item_path, &file_keys) else {
            continue;
        };
        let node = node(item, &item_path, &defined, w);
        let mode = w.mode(item, "mode", &item_path);
        if mode.is_none() && !item.contains_key("mode") {
            w.warn("permissions unset, defaulting to 0644", &item_path);
        }
        config.storage.files.push(File {
            filesystem: node.filesystem,
            group: node.group,
            overwrite: node.overwrite,
            path: node.path,
            user: node.user,
            append: w.boolean(item, "append", &item_path).unwrap_or(false),
            contents: file_contents(item, &item_path, w),
            mode,
        });
    }

    let dirs_path = child(path, "directories");
    let dir_keys = keys(&["mode"]);
    for (i, item) in w.list(section, "directories", path).iter().enumerate() {
        let item_path = index(&dirs_path, i);
        let Some(item) = w.table(item, &item_path, &dir_keys) else {
            continue;
        };
        let node = node(item, &item_path, &defined, w);
        let mode = w.mode(item, "mode", &item_path);
        if mode.is_none() && !item.contains_key("mode") {
            w.warn("permissions unset, defaulting to 0755", &item_path);
        }
        config.storage.directories.push(Directory {
            filesystem: node.filesystem,
            group: node.group,
            overwrite: node.overwrite,
            path: node.path,
            user: node.user,
            mode,
        });
    }

    let links_path = child(path, "links");
    let link_keys = keys(&["target", "hard"]);
    for (i, item) in w.list(section, "links", path).iter().enumerate() {
        let item_path = index(&links_path, i);
        let Some(item) = w.table(item, &item_path, &link_keys) else {
            continue;
        };
        let node = node(item, &item_path, &defined, w);
        let target = w.string(item, "target", &item_path).unwrap_or_default();
        if target.is_empty() {
            w.fatal("link target is required", &item_path);
        }
        config.storage.links.push(Link {
            filesystem: node.filesystem,
            group: node.group,
            overwrite: node.overwrite,
            path: node.path,
            user: node.user,
            hard: w.boolean(item, "hard", &item_path).unwrap_or(false),
            target,
        });
    }
}

fn dropins(map: &Mapping, path: &str, w: &mut Walker) -> Vec<Dropin> {
    let list_path = child(path, "dropins");
    let mut out = Vec::new();
    for (i, item) in w.list(map, "dropins", path).iter().enumerate() {
        let item_path = index(&list_path, i);
        let Some(item) = w.table(item, &item_path, &["name", "contents"]) else {
            continue;
        };
        let name = w.string(item, "name", &item_path).unwrap_or_default();
        if !name.ends_with(".conf") {
            w.fatal("invalid systemd unit drop-in extension", &child(&item_path, "name"));
        }
        out.push(Dropin {
            contents: w.string(item, "contents", &item_path).unwrap_or_default(),
            name,
        });
    }
    out
}

fn unit_name(map: &Mapping, path: &str, suffixes: &[&str], kind: &str, w: &mut Walker) -> String {
    let name = w.string(map, "name", path).unwrap_or_default();
    if name.is_empty() {
        w.fatal("unit name is required", path);
    } else if !suffixes.iter().any(|s| name.ends_with(s)) {
        w.fatal(format!("invalid {kind} unit extension"), &child(path, "name"));
    }
    name
}

fn convert_systemd(section: &Mapping, config: &mut Config, w: &mut Walker) {
    let units_path = "systemd.units";
    for (i, item) in w.list(section, "units", "systemd").iter().enumerate() {
        let item_path = index(units_path, i);
        let Some(item) = w.table(
            item,
            &item_path,
            &["name", "enable", "enabled", "mask", "contents", "dropins"],
        ) else {
            continue;
        };

        let name = unit_name(item, &item_path, SYSTEMD_SUFFIXES, "systemd", w);
        let enable = w.boolean(item, "enable", &item_path).unwrap_or(false);
        if item.contains_key("enable") {
            w.warn(
                "enable is deprecated, use enabled",
                &child(&item_path, "enable"),
            );
        }

        config.systemd.units.push(Unit {
            contents: w.string(item, "contents", &item_path).unwrap_or_default(),
            dropins: dropins(item, &item_path, w),
            enable,
            enabled: w.boolean(item, "enabled", &item_path),
            mask: w.boolean(item, "mask", &item_path).unwrap_or(false),
            name,
        });
    }
}

fn convert_networkd(section: &Mapping, config: &mut Config, w: &mut Walker) {
    let units_path = "networkd.units";
    for (i, item) in w.list(section, "units", "networkd").iter().enumerate() {
        let item_path = index(units_path, i);
        let Some(item) = w.table(item, &item_path, &["name", "contents", "dropins"]) else {
            continue;
        };

        let name = unit_name(item, &item_path, NETWORKD_SUFFIXES, "networkd", w);
        config.networkd.units.push(NetworkdUnit {
            contents: w.string(item, "contents", &item_path).unwrap_or_default(),
            dropins: dropins(item, &item_path, w),
            name,
        });
    }
}

fn convert_passwd(section: &Mapping, config: &mut Config, w: &mut Walker) {
    let users_path = "passwd.users";
    for (i, item) in w.list(section, "users", "passwd").iter().enumerate() {
        let item_path = index(users_path, i);
        let Some(item) = w.table(
            item,
            &item_path,
            &[
                "name",
                "password_hash",
                "ssh_authorized_keys",
                "uid",
                "gecos",
                "home_dir",
                "no_create_home",
                "primary_group",
                "groups",
                "no_user_group",
                "system",
                "no_log_init",
                "shell",
            ],
        ) else {
            continue;
        };

        let name = w.string(item, "name", &item_path).unwrap_or_default();
        if name.is_empty() {
            w.fatal("user name is required", &item_path);
        }

        config.passwd.users.push(PasswdUser {
            gecos: w.string(item, "gecos", &item_path).unwrap_or_default(),
            groups: w.strings(item, "groups", &item_path),
            home_dir: w.string(item, "home_dir", &item_path).unwrap_or_default(),
            name,
            no_create_home: w.boolean(item, "no_create_home", &item_path).unwrap_or(false),
            no_log_init: w.boolean(item, "no_log_init", &item_path).unwrap_or(false),
            no_user_group: w.boolean(item, "no_user_group", &item_path).unwrap_or(false),
            password_hash: w.string(item, "password_hash", &item_path),
            primary_group: w.string(item, "primary_group", &item_path).unwrap_or_default(),
            ssh_authorized_keys: w.strings(item, "ssh_authorized_keys", &item_path),
            shell: w.string(item, "shell", &item_path).unwrap_or_default(),
            system: w.boolean(item, "system", &item_path).unwrap_or(false),
            uid: w.integer(item, "uid", &item_path),
        });
    }

    let groups_path = "passwd.groups";
    for (i, item) in w.list(section, "groups", "passwd").iter().enumerate() {
        let item_path = index(groups_path, i);
        let Some(item) = w.table(item, &item_path, &["name", "gid", "password_hash", "system"])
        else {
            continue;
        };

        let name = w.string(item, "name", &item_path).unwrap_or_default();
        if name.is_empty() {
            w.fatal("group name is required", &item_path);
        }

        config.passwd.groups.push(PasswdGroup {
            gid: w.integer(item, "gid", &item_path),
            name,
            password_hash: w.string(item, "password_hash", &item_path),
            system: w.boolean(item, "system", &item_path).unwrap_or(false),
        });
    }
}
