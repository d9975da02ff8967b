use basalt_appliance::ApplianceError;
use miette::Diagnostic;
use thiserror::Error;

/// Error type for the host-side attach/detach pipeline
#[derive(Error, Debug, Diagnostic)]
pub enum HostError {
    /// Volume does not exist on the appliance
    #[error("Volume not found: {name}")]
    #[diagnostic(
        code(basalt::host::volume_not_found),
        help("Create the volume first with `docker volume create -d basalt {name}`")
    )]
    VolumeNotFound { name: String },

    /// External utility exited non-zero
    #[error("Command '{command}' failed with exit code {exit_code}")]
    #[diagnostic(code(basalt::host::command_failed), help("output: {output}"))]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },

    /// Block device never appeared under /dev/disk/by-uuid
    #[error("Device {path} did not appear within {attempts} attempts")]
    #[diagnostic(
        code(basalt::host::device_timeout),
        help("Check `iscsiadm -m session` for a live session and the appliance ACL for this host's initiator")
    )]
    DeviceTimeout { path: String, attempts: usize },

    /// Volume never reported admin_state=online
    #[error("Volume {name} never came online ({attempts} attempts)")]
    #[diagnostic(code(basalt::host::online_timeout))]
    OnlineTimeout { name: String, attempts: usize },

    /// Storage endpoint never published IQN/portals
    #[error("Storage endpoint for {name} not ready after {attempts} attempts")]
    #[diagnostic(
        code(basalt::host::endpoint_timeout),
        help("The endpoint reported no IQN or portals despite the online transition")
    )]
    EndpointTimeout { name: String, attempts: usize },

    /// by-uuid symlink target matched no multipath aggregate
    #[error("Couldn't find dm-* path for {path}, found non dm-* device: {device}")]
    #[diagnostic(code(basalt::host::multipath_unresolved))]
    MultipathUnresolved { path: String, device: String },

    /// Destination is already a mount point
    #[error("Destination mount-point {destination} is in use already")]
    #[diagnostic(code(basalt::host::already_mounted))]
    AlreadyMounted { destination: String },

    /// Mount failed even after a format attempt
    #[error("Could not mount {device} on {destination}: {output}")]
    #[diagnostic(code(basalt::host::mount_failed))]
    MountFailed {
        device: String,
        destination: String,
        output: String,
    },

    /// Unmount kept failing past the retry budget
    #[error("Could not unmount {destination} within {attempts} attempts: {output}")]
    #[diagnostic(code(basalt::host::unmount_failed))]
    UnmountFailed {
        destination: String,
        attempts: usize,
        output: String,
    },

    /// Host initiator identity could not be read
    #[error("Could not read initiator name from {path}: {message}")]
    #[diagnostic(
        code(basalt::host::initiator_file),
        help("The file should contain a line of the form InitiatorName=iqn.1993-08.org.debian:01:abcdef")
    )]
    InitiatorFile { path: String, message: String },

    /// Appliance error
    #[error(transparent)]
    #[diagnostic(transparent)]
    Appliance(#[from] ApplianceError),

    /// Filesystem-level error
    #[error("I/O error: {0}")]
    #[diagnostic(code(basalt::host::io))]
    Io(#[from] std::io::Error),
}

/// Result type alias for host operations
pub type Result<T> = std::result::Result<T, HostError>;

impl HostError {
    pub fn volume_not_found(name: impl Into<String>) -> Self {
        Self::VolumeNotFound { name: name.into() }
    }

    pub fn command_failed(
        command: impl Into<String>,
        exit_code: i32,
        output: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            output: output.into(),
        }
    }

    pub fn device_timeout(path: impl Into<String>, attempts: usize) -> Self {
        Self::DeviceTimeout {
            path: path.into(),
            attempts,
        }
    }

    pub fn multipath_unresolved(path: impl Into<String>, device: impl Into<String>) -> Self {
        Self::MultipathUnresolved {
            path: path.into(),
            device: device.into(),
        }
    }

    pub fn already_mounted(destination: impl Into<String>) -> Self {
        Self::AlreadyMounted {
            destination: destination.into(),
        }
    }

    pub fn initiator_file(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InitiatorFile {
            path: path.into(),
            message: message.into(),
        }
    }
}
