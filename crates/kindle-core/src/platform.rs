//! Known provisioning platforms.
//!
//! The platform hint tells the transpiler which metadata service will be
//! available at boot so that dynamic values such as `{PRIVATE_IPV4}` can be
//! resolved.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A provisioning platform understood by the transpiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Microsoft Azure.
    Azure,
    /// Apache CloudStack with a config drive.
    CloudStackConfigDrive,
    /// User-provided metadata.
    Custom,
    /// DigitalOcean.
    DigitalOcean,
    /// Amazon EC2.
    Ec2,
    /// Google Compute Engine.
    Gce,
    /// OpenStack metadata service.
    OpenStackMetadata,
    /// Packet bare metal.
    Packet,
    /// Vagrant with the VirtualBox provider.
    VagrantVirtualBox,
}

impl Platform {
    /// Every known platform, in alphabetical order of their names.
    pub const ALL: [Platform; 9] = [
        Self::Azure,
        Self::CloudStackConfigDrive,
        Self::Custom,
        Self::DigitalOcean,
        Self::Ec2,
        Self::Gce,
        Self::OpenStackMetadata,
        Self::Packet,
        Self::VagrantVirtualBox,
    ];

    /// Returns the configuration name of this platform.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Azure => "azure",
            Self::CloudStackConfigDrive => "cloudstack-configdrive",
            Self::Custom => "custom",
            Self::DigitalOcean => "digitalocean",
            Self::Ec2 => "ec2",
            Self::Gce => "gce",
            Self::OpenStackMetadata => "openstack-metadata",
            Self::Packet => "packet",
            Self::VagrantVirtualBox => "vagrant-virtualbox",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a platform name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown platform \"{0}\"")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPlatform(s.to_string()))
    }
}
