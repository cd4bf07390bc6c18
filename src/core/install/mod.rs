mod installer;

pub use installer::{InstallResult, VersionInstaller};
