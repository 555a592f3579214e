//! Core value types shared by the catalog, the demand and the search
//!
//! Enum parsing is case-insensitive and accepts the spellings seen in
//! provider price sheets and request forms. Anything else is a validation
//! error naming the field, never a silent default.

use crate::error::{FleetError, Result};
use crate::error_helpers::validation_error_with_examples;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cloud provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "AWS", alias = "aws")]
    Aws,
    #[serde(rename = "Azure", alias = "azure")]
    Azure,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Aws, Provider::Azure];

    /// Directory name used by the JSON catalog layout
    pub fn slug(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Aws => write!(f, "AWS"),
            Provider::Azure => write!(f, "Azure"),
        }
    }
}

impl FromStr for Provider {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" | "amazon" | "ec2" => Ok(Provider::Aws),
            "azure" | "microsoft" => Ok(Provider::Azure),
            other => Err(validation_error_with_examples(
                "provider",
                format!("Unknown provider: '{}'", other),
                &["AWS", "Azure"],
            )),
        }
    }
}

/// Operating system of an instance offering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperatingSystem {
    Linux,
    Windows,
}

impl OperatingSystem {
    pub const ALL: [OperatingSystem; 2] = [OperatingSystem::Linux, OperatingSystem::Windows];

    pub fn slug(&self) -> &'static str {
        match self {
            OperatingSystem::Linux => "linux",
            OperatingSystem::Windows => "windows",
        }
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingSystem::Linux => write!(f, "Linux"),
            OperatingSystem::Windows => write!(f, "Windows"),
        }
    }
}

impl FromStr for OperatingSystem {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" => Ok(OperatingSystem::Linux),
            "windows" => Ok(OperatingSystem::Windows),
            other => Err(validation_error_with_examples(
                "os",
                format!("Unknown operating system: '{}'", other),
                &["Linux", "Windows"],
            )),
        }
    }
}

/// CPU architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Architecture {
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "arm64")]
    Arm64,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86_64 => write!(f, "x86_64"),
            Architecture::Arm64 => write!(f, "arm64"),
        }
    }
}

impl FromStr for Architecture {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x86_64" | "x86-64" | "amd64" | "x64" => Ok(Architecture::X86_64),
            "arm64" | "aarch64" => Ok(Architecture::Arm64),
            other => Err(validation_error_with_examples(
                "architecture",
                format!("Unknown architecture: '{}'", other),
                &["x86_64", "arm64"],
            )),
        }
    }
}

/// How capacity is bought
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PurchaseType {
    #[serde(alias = "On-Demand")]
    OnDemand,
    Reserved,
    Spot,
}

impl PurchaseType {
    /// Lower-case form used in billing labels
    pub fn slug(&self) -> &'static str {
        match self {
            PurchaseType::OnDemand => "on-demand",
            PurchaseType::Reserved => "reserved",
            PurchaseType::Spot => "spot",
        }
    }
}

impl fmt::Display for PurchaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for PurchaseType {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "ondemand" => Ok(PurchaseType::OnDemand),
            "reserved" | "reservedinstance" | "ri" => Ok(PurchaseType::Reserved),
            "spot" => Ok(PurchaseType::Spot),
            _ => Err(validation_error_with_examples(
                "purchase_type",
                format!("Unknown purchase type: '{}'", s.trim()),
                &["On-Demand", "Reserved", "Spot"],
            )),
        }
    }
}

/// One resource dimension a demand can constrain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Vcpu,
    Memory,
    Storage,
    Iops,
    Bandwidth,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Vcpu,
        Dimension::Memory,
        Dimension::Storage,
        Dimension::Iops,
        Dimension::Bandwidth,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Vcpu => "vcpu",
            Dimension::Memory => "memory",
            Dimension::Storage => "storage",
            Dimension::Iops => "iops",
            Dimension::Bandwidth => "bandwidth",
        }
    }
}

/// Amounts along every dimension: an instance's capacity or a demand
///
/// Memory is GiB, storage GB, bandwidth Mbps.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Resources {
    pub vcpu: f64,
    pub memory: f64,
    #[serde(default)]
    pub storage: f64,
    #[serde(default)]
    pub iops: f64,
    #[serde(default)]
    pub bandwidth: f64,
}

impl Resources {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Vcpu => self.vcpu,
            Dimension::Memory => self.memory,
            Dimension::Storage => self.storage,
            Dimension::Iops => self.iops,
            Dimension::Bandwidth => self.bandwidth,
        }
    }

    pub fn scaled(&self, factor: f64) -> Resources {
        Resources {
            vcpu: self.vcpu * factor,
            memory: self.memory * factor,
            storage: self.storage * factor,
            iops: self.iops * factor,
            bandwidth: self.bandwidth * factor,
        }
    }

    pub fn plus(&self, other: &Resources) -> Resources {
        Resources {
            vcpu: self.vcpu + other.vcpu,
            memory: self.memory + other.memory,
            storage: self.storage + other.storage,
            iops: self.iops + other.iops,
            bandwidth: self.bandwidth + other.bandwidth,
        }
    }

    /// Dimensions with a strictly positive amount
    pub fn requested(&self) -> impl Iterator<Item = Dimension> + '_ {
        Dimension::ALL.into_iter().filter(|d| self.get(*d) > 0.0)
    }

    /// What `provided` still lacks to reach `self`, per dimension
    ///
    /// Exact: any positive gap is reported, however small.
    pub fn shortfall(&self, provided: &Resources) -> Resources {
        let gap = |required: f64, provided: f64| (required - provided).max(0.0);
        Resources {
            vcpu: gap(self.vcpu, provided.vcpu),
            memory: gap(self.memory, provided.memory),
            storage: gap(self.storage, provided.storage),
            iops: gap(self.iops, provided.iops),
            bandwidth: gap(self.bandwidth, provided.bandwidth),
        }
    }

    /// True when every amount is at least the corresponding one in `required`
    pub fn covers(&self, required: &Resources) -> bool {
        required.shortfall(self).requested().next().is_none()
    }

    /// First dimension holding a negative or non-finite amount
    pub fn first_invalid(&self) -> Option<Dimension> {
        Dimension::ALL
            .into_iter()
            .find(|d| !self.get(*d).is_finite() || self.get(*d) < 0.0)
    }
}
