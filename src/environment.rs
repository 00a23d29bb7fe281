use std::path::Path;
use tracing::debug;

const OS_RELEASE: &str = "/etc/os-release";

/// One-word description of the host, e.g. `ubuntu`, `arch` or `macos`.
pub fn detect() -> String {
    if cfg!(target_os = "linux") {
        detect_distro(Path::new(OS_RELEASE))
    } else {
        std::env::consts::OS.to_string()
    }
}

/// Reads the `ID=` entry of an os-release file, `unknown` when unavailable.
pub fn detect_distro(os_release: &Path) -> String {
    let distro = std::fs::read_to_string(os_release)
        .ok()
        .and_then(|content| parse_os_release_id(&content))
        .unwrap_or_else(|| "unknown".to_string());
    debug!("Detected distribution: {}", distro);
    distro
}

fn parse_os_release_id(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.trim().strip_prefix("ID="))
        .map(|value| value.trim().trim_matches('"').trim_matches('\'').to_lowercase())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_os_release_id() {
        let content = "NAME=\"Ubuntu\"\nVERSION_ID=\"22.04\"\nID=ubuntu\nID_LIKE=debian\n";
        assert_eq!(parse_os_release_id(content).as_deref(), Some("ubuntu"));

        let quoted = "ID=\"Fedora\"\n";
        assert_eq!(parse_os_release_id(quoted).as_deref(), Some("fedora"));

        assert_eq!(parse_os_release_id("ID_LIKE=debian\n"), None);
        assert_eq!(parse_os_release_id("ID=\n"), None);
    }

    #[test]
    fn test_detect_distro_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("os-release");
        std::fs::write(&path, "PRETTY_NAME=\"Arch Linux\"\nID=arch\n").unwrap();
        assert_eq!(detect_distro(&path), "arch");
    }

    #[test]
    fn test_missing_file_is_unknown() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(detect_distro(&temp_dir.path().join("missing")), "unknown");
    }

    #[test]
    fn test_detect_is_never_empty() {
        assert!(!detect().is_empty());
    }
}
