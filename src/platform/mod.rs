use std::path::Path;

/// Platform-specific operations abstracted behind a common interface.
/// Each OS provides its own `NativePlatform` implementation so call sites
/// remain free of `#[cfg]` blocks.
pub trait Platform {
    /// Set restrictive *directory* permissions (0o700 on Unix, no-op on Windows).
    fn restrict_dir_permissions(path: &Path);

    /// Set restrictive *file* permissions (0o600 on Unix, no-op on Windows).
    fn restrict_file_permissions(path: &Path);

    /// Whether the process appears to run inside a container
    /// (Kubernetes pod or Docker).
    fn is_containerised() -> bool;
}

/// Kubernetes mounts the service account namespace into every pod.
pub(crate) const K8S_NAMESPACE_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";
pub(crate) const DOCKER_ENV_FILE: &str = "/.dockerenv";

/// Decide container membership from marker files and the contents of
/// `/proc/self/cgroup` (when readable).
pub(crate) fn detect_container(markers: &[&Path], cgroup: Option<&str>) -> bool {
    if markers.iter().any(|p| p.exists()) {
        return true;
    }
    cgroup.is_some_and(|text| {
        text.lines()
            .any(|line| line.contains("kubepods") || line.contains("docker"))
    })
}

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::NativePlatform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::NativePlatform;
