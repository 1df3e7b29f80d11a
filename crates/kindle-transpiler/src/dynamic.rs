//! Dynamic data resolved from the platform's metadata service.
//!
//! Unit contents may reference values only known at boot, such as
//! `{PRIVATE_IPV4}`. With a platform selected they are rewritten to the
//! environment variable `coreos-metadata` writes for that platform, and the
//! unit gains a drop-in that pulls the metadata environment in.

use crate::ignition::{Dropin, Systemd};
use crate::walker::{child, index, Walker};
use kindle_core::Platform;

/// Name of the drop-in added to units that use dynamic data.
pub const METADATA_DROPIN: &str = "20-clct-metadata.conf";

const METADATA_DROPIN_CONTENTS: &str = "[Unit]\n\
Requires=coreos-metadata.service\n\
After=coreos-metadata.service\n\
\n\
[Service]\n\
EnvironmentFile=/run/metadata/coreos\n";

/// A value that can be filled in from instance metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicVar {
    /// `{HOSTNAME}`
    Hostname,
    /// `{PRIVATE_IPV4}`
    PrivateIpv4,
    /// `{PUBLIC_IPV4}`
    PublicIpv4,
    /// `{PRIVATE_IPV6}`
    PrivateIpv6,
    /// `{PUBLIC_IPV6}`
    PublicIpv6,
}

impl DynamicVar {
    const ALL: [DynamicVar; 5] = [
        Self::Hostname,
        Self::PrivateIpv4,
        Self::PublicIpv4,
        Self::PrivateIpv6,
        Self::PublicIpv6,
    ];

    /// Placeholder as written in a config.
    pub const fn placeholder(&self) -> &'static str {
        match self {
            Self::Hostname => "{HOSTNAME}",
            Self::PrivateIpv4 => "{PRIVATE_IPV4}",
            Self::PublicIpv4 => "{PUBLIC_IPV4}",
            Self::PrivateIpv6 => "{PRIVATE_IPV6}",
            Self::PublicIpv6 => "{PUBLIC_IPV6}",
        }
    }
}

/// Environment variable holding `var` on `platform`, if it provides it.
pub fn metadata_variable(platform: Platform, var: DynamicVar) -> Option<&'static str> {
    use DynamicVar::{Hostname, PrivateIpv4, PrivateIpv6, PublicIpv4, PublicIpv6};

    match (platform, var) {
        (Platform::Azure, PrivateIpv4) => Some("COREOS_AZURE_IPV4_DYNAMIC"),
        (Platform::Azure, PublicIpv4) => Some("COREOS_AZURE_IPV4_VIRTUAL"),
        (Platform::CloudStackConfigDrive, Hostname) => {
            Some("COREOS_CLOUDSTACK_CONFIGDRIVE_LOCAL_HOSTNAME")
        }
        (Platform::CloudStackConfigDrive, PrivateIpv4) => {
            Some("COREOS_CLOUDSTACK_CONFIGDRIVE_LOCAL_IPV4")
        }
        (Platform::CloudStackConfigDrive, PublicIpv4) => {
            Some("COREOS_CLOUDSTACK_CONFIGDRIVE_PUBLIC_IPV4")
        }
        (Platform::Custom, Hostname) => Some("COREOS_CUSTOM_HOSTNAME"),
        (Platform::Custom, PrivateIpv4) => Some("COREOS_CUSTOM_PRIVATE_IPV4"),
        (Platform::Custom, PublicIpv4) => Some("COREOS_CUSTOM_PUBLIC_IPV4"),
        (Platform::Custom, PrivateIpv6) => Some("COREOS_CUSTOM_PRIVATE_IPV6"),
        (Platform::Custom, PublicIpv6) => Some("COREOS_CUSTOM_PUBLIC_IPV6"),
        (Platform::DigitalOcean, Hostname) => Some("COREOS_DIGITALOCEAN_HOSTNAME"),
        (Platform::DigitalOcean, PrivateIpv4) => Some("COREOS_DIGITALOCEAN_IPV4_PRIVATE_0"),
        (Platform::DigitalOcean, PublicIpv4) => Some("COREOS_DIGITALOCEAN_IPV4_PUBLIC_0"),
        (Platform::DigitalOcean, PrivateIpv6) => Some("COREOS_DIGITALOCEAN_IPV6_PRIVATE_0"),
        (Platform::DigitalOcean, PublicIpv6) => Some("COREOS_DIGITALOCEAN_IPV6_PUBLIC_0"),
        (Platform::Ec2, Hostname) => Some("COREOS_EC2_HOSTNAME"),
        (Platform::Ec2, PrivateIpv4) => Some("COREOS_EC2_IPV4_LOCAL"),
        (Platform::Ec2, PublicIpv4) => Some("COREOS_EC2_IPV4_PUBLIC"),
        (Platform::Gce, Hostname) => Some("COREOS_GCE_HOSTNAME"),
        (Platform::Gce, PrivateIpv4) => Some("COREOS_GCE_IP_LOCAL_0"),
        (Platform::Gce, PublicIpv4) => Some("COREOS_GCE_IP_EXTERNAL_0"),
        (Platform::OpenStackMetadata, Hostname) => Some("COREOS_OPENSTACK_HOSTNAME"),
        (Platform::OpenStackMetadata, PrivateIpv4) => Some("COREOS_OPENSTACK_IPV4_LOCAL"),
        (Platform::OpenStackMetadata, PublicIpv4) => Some("COREOS_OPENSTACK_IPV4_PUBLIC"),
        (Platform::Packet, Hostname) => Some("COREOS_PACKET_HOSTNAME"),
        (Platform::Packet, PrivateIpv4) => Some("COREOS_PACKET_IPV4_PRIVATE_0"),
        (Platform::Packet, PublicIpv4) => Some("COREOS_PACKET_IPV4_PUBLIC_0"),
        (Platform::Packet, PublicIpv6) => Some("COREOS_PACKET_IPV6_PUBLIC_0"),
        (Platform::VagrantVirtualBox, Hostname) => Some("COREOS_VAGRANT_VIRTUALBOX_HOSTNAME"),
        (Platform::VagrantVirtualBox, PrivateIpv4) => {
            Some("COREOS_VAGRANT_VIRTUALBOX_PRIVATE_IPV4")
        }
        _ => None,
    }
}

/// Rewrites placeholders in `text`, returning whether any were found.
fn substitute(
    text: &mut String,
    platform: Option<Platform>,
    walker: &mut Walker,
    path: &str,
) -> bool {
    let mut found = false;
    for var in DynamicVar::ALL {
        if !text.contains(var.placeholder()) {
            continue;
        }
        found = true;

        let Some(platform) = platform else {
            walker.fatal(
                format!(
                    "{} requires a platform to be specified",
                    var.placeholder()
                ),
                path,
            );
            continue;
        };

        match metadata_variable(platform, var) {
            Some(env) => *text = text.replace(var.placeholder(), &format!("${{{env}}}")),
            None => walker.fatal(
                format!("platform {platform} does not support {}", var.placeholder()),
                path,
            ),
        }
    }
    found
}

/// Resolves dynamic data in every unit and drop-in.
pub(crate) fn resolve(systemd: &mut Systemd, platform: Option<Platform>, walker: &mut Walker) {
    for (i, unit) in systemd.units.iter_mut().enumerate() {
        let unit_path = index("systemd.units", i);
        let mut uses_metadata =
            substitute(&mut unit.contents, platform, walker, &child(&unit_path, "contents"));

        for (j, dropin) in unit.dropins.iter_mut().enumerate() {
            let dropin_path = child(&index(&child(&unit_path, "dropins"), j), "contents");
            uses_metadata |= substitute(&mut dropin.contents, platform, walker, &dropin_path);
        }

        if uses_metadata && platform.is_some() {
            unit.dropins.push(Dropin {
                name: METADATA_DROPIN.to_string(),
                contents: METADATA_DROPIN_CONTENTS.to_string(),
            });
        }
    }
}
