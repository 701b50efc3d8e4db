use tracing::{info, warn};

use crate::error::MediaError;
use crate::media::{MediaDevices, StreamConstraints};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionState {
    Checking,
    Granted,
    Denied(String),
}

/// Probes camera access by opening a default stream and releasing it straight away.
pub async fn check_permission(devices: &dyn MediaDevices) -> PermissionState {
    match devices.open(StreamConstraints::default()).await {
        Ok(mut stream) => {
            stream.stop();
            info!("Camera access granted");
            PermissionState::Granted
        }
        Err(MediaError::AccessDenied) => {
            warn!("Camera access denied");
            PermissionState::Denied(MediaError::AccessDenied.to_string())
        }
        Err(e) => {
            warn!("Camera unavailable: {}", e);
            PermissionState::Denied(e.to_string())
        }
    }
}
