use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use super::{DOCKER_ENV_FILE, K8S_NAMESPACE_FILE, Platform, detect_container};

pub struct NativePlatform;

impl Platform for NativePlatform {
    fn restrict_dir_permissions(path: &Path) {
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700));
    }

    fn restrict_file_permissions(path: &Path) {
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }

    fn is_containerised() -> bool {
        let cgroup = std::fs::read_to_string("/proc/self/cgroup").ok();
        detect_container(
            &[Path::new(K8S_NAMESPACE_FILE), Path::new(DOCKER_ENV_FILE)],
            cgroup.as_deref(),
        )
    }
}
