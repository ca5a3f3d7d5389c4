//! Exclusive device claims.
//!
//! A claim is exclusive ownership of a device address by one session. The
//! registry hands out at most one live [`DeviceClaim`] per address; the
//! claim releases itself on drop, so no failure path can leak a device.

use ridgeline_core::{DeviceAddress, Error, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

type ClaimSet = Arc<Mutex<HashSet<DeviceAddress>>>;

/// Registry of claimed device addresses.
///
/// Cloning the registry is cheap and all clones share the same claim set,
/// so one registry instance can serve a whole coordinator.
///
/// # Examples
///
/// ```
/// use ridgeline_core::DeviceAddress;
/// use ridgeline_session::ClaimRegistry;
///
/// let registry = ClaimRegistry::new();
/// let address = DeviceAddress::new("dev-0").unwrap();
///
/// let claim = registry.claim(&address).unwrap();
/// assert!(registry.claim(&address).is_err());
///
/// drop(claim);
/// assert!(registry.claim(&address).is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClaimRegistry {
    claimed: ClaimSet,
}

impl ClaimRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim exclusive ownership of a device address.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceBusy` if the address is already claimed by a
    /// live claim.
    pub fn claim(&self, address: &DeviceAddress) -> Result<DeviceClaim> {
        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());

        if !claimed.insert(address.clone()) {
            return Err(Error::device_busy(address.as_str()));
        }

        debug!(address = %address, "device claimed");

        Ok(DeviceClaim {
            address: address.clone(),
            claimed: Arc::clone(&self.claimed),
        })
    }

    /// Check whether an address is currently claimed.
    #[must_use]
    pub fn is_claimed(&self, address: &DeviceAddress) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(address)
    }
}

/// Exclusive ownership of one device address.
///
/// Released when dropped.
#[derive(Debug)]
pub struct DeviceClaim {
    address: DeviceAddress,
    claimed: ClaimSet,
}

impl DeviceClaim {
    /// The claimed device address.
    #[must_use]
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }
}

impl Drop for DeviceClaim {
    fn drop(&mut self) {
        self.claimed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.address);
        debug!(address = %self.address, "device claim released");
    }
}
