//! Compute device selection
//!
//! The autograd engine executes on the host. Devices are carried explicitly in
//! [`crate::autograd::Context`] and recorded on the model when it is moved.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Compute device for a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ComputeDevice {
    /// Host execution
    #[default]
    Cpu,
    /// CUDA GPU with device ID
    Cuda { device_id: usize },
}

impl ComputeDevice {
    /// Check if this device is CUDA
    #[must_use]
    pub const fn is_cuda(&self) -> bool {
        matches!(self, Self::Cuda { .. })
    }

    /// Get device ID for CUDA devices
    #[must_use]
    pub const fn device_id(&self) -> Option<usize> {
        match self {
            Self::Cuda { device_id } => Some(*device_id),
            Self::Cpu => None,
        }
    }

    /// Fail unless tensors can be placed on this device
    pub fn ensure_available(&self) -> Result<()> {
        match self {
            Self::Cpu => Ok(()),
            Self::Cuda { .. } => Err(Error::UnsupportedDevice(format!(
                "{self}: this build executes on the host only"
            ))),
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda { device_id } => write!(f, "cuda:{device_id}"),
        }
    }
}

impl FromStr for ComputeDevice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda { device_id: 0 }),
            other => {
                let id = other
                    .strip_prefix("cuda:")
                    .and_then(|id| id.parse::<usize>().ok())
                    .ok_or_else(|| {
                        Error::InvalidArgument(format!(
                            "unknown device '{s}': expected cpu, cuda or cuda:<id>"
                        ))
                    })?;
                Ok(Self::Cuda { device_id: id })
            }
        }
    }
}

impl TryFrom<String> for ComputeDevice {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ComputeDevice> for String {
    fn from(device: ComputeDevice) -> Self {
        device.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devices() {
        assert_eq!("cpu".parse::<ComputeDevice>().unwrap(), ComputeDevice::Cpu);
        assert_eq!(
            "CUDA".parse::<ComputeDevice>().unwrap(),
            ComputeDevice::Cuda { device_id: 0 }
        );
        assert_eq!(
            "cuda:3".parse::<ComputeDevice>().unwrap(),
            ComputeDevice::Cuda { device_id: 3 }
        );
        assert!("tpu".parse::<ComputeDevice>().is_err());
        assert!("cuda:x".parse::<ComputeDevice>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        let device = ComputeDevice::Cuda { device_id: 1 };
        assert_eq!(device.to_string(), "cuda:1");
        assert_eq!(device.to_string().parse::<ComputeDevice>().unwrap(), device);
    }

    #[test]
    fn test_only_cpu_available() {
        assert!(ComputeDevice::Cpu.ensure_available().is_ok());
        let err = ComputeDevice::Cuda { device_id: 0 }
            .ensure_available()
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedDevice(_)));
    }

    #[test]
    fn test_device_id() {
        assert_eq!(ComputeDevice::Cpu.device_id(), None);
        assert_eq!(ComputeDevice::Cuda { device_id: 2 }.device_id(), Some(2));
        assert!(ComputeDevice::Cuda { device_id: 2 }.is_cuda());
    }
}
