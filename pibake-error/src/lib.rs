use thiserror::Error;

pub type BakeResult<T> = Result<T, BakeError>;

/// Checked failures surfaced to the operator before or instead of any
/// destructive action.
#[derive(Error, Debug)]
pub enum BakeError {
    #[error("This tool must run as root (try sudo)")]
    NotRoot,

    #[error("Missing required tool on PATH: {0}")]
    MissingTool(String),

    #[error("Cross-architecture chroot needs {0}. Install qemu-user-static and register binfmt handlers.")]
    MissingEmulator(String),

    #[error("Aborted: confirmation did not match")]
    ConfirmationMismatch,

    #[error("Operation aborted by user")]
    Aborted,
}
