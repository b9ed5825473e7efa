use std::path::Path;

use super::Platform;

pub struct NativePlatform;

impl Platform for NativePlatform {
    fn restrict_dir_permissions(_path: &Path) {
        // Windows uses ACLs; default user-profile permissions are adequate
    }

    fn restrict_file_permissions(_path: &Path) {}

    fn is_containerised() -> bool {
        false
    }
}
