//! Device and runtime metadata attached to every sent event.

use serde::{Deserialize, Serialize};

/// SDK identifier reported in `systemProps.sdkVersion`.
pub const SDK_VERSION: &str = concat!("beacon-rs@", env!("CARGO_PKG_VERSION"));

/// Read-only system metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub is_debug: bool,
    pub os_name: String,
    pub os_version: String,
    pub locale: String,
    pub app_version: String,
    pub app_build_number: String,
    pub sdk_version: String,
}

impl SystemInfo {
    /// Collect what the process can see about its host.
    pub fn detect(app_version: &str, app_build_number: &str, is_debug: bool) -> Self {
        Self {
            is_debug,
            os_name: os_name(std::env::consts::OS).to_string(),
            os_version: detect_os_version(),
            locale: detect_locale(),
            app_version: app_version.to_string(),
            app_build_number: app_build_number.to_string(),
            sdk_version: SDK_VERSION.to_string(),
        }
    }

    /// Short platform tag used in crash summaries, e.g. `Linux6.1-x86_64-en-US`.
    pub fn platform_tag(&self) -> String {
        format!(
            "{}{}-{}-{}",
            self.os_name,
            self.os_version,
            std::env::consts::ARCH,
            self.locale
        )
    }
}

/// Source of system metadata.
///
/// Hosts that know more about the device than the process environment
/// (mobile shells, desktop frameworks) implement this to supply their own.
pub trait SystemInfoProvider: Send + Sync {
    fn system_info(&self) -> SystemInfo;
}

/// Provider returning a fixed value.
#[derive(Debug, Clone)]
pub struct StaticSystemInfo(pub SystemInfo);

impl SystemInfoProvider for StaticSystemInfo {
    fn system_info(&self) -> SystemInfo {
        self.0.clone()
    }
}

fn os_name(os: &str) -> &str {
    match os {
        "linux" => "Linux",
        "macos" => "macOS",
        "windows" => "Windows",
        "ios" => "iOS",
        "android" => "Android",
        "freebsd" => "FreeBSD",
        _ => "",
    }
}

fn detect_os_version() -> String {
    #[cfg(target_os = "linux")]
    {
        if let Ok(content) = std::fs::read_to_string("/etc/os-release") {
            if let Some(version) = parse_os_release_version(&content) {
                return version;
            }
        }
    }

    String::new()
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_os_release_version(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        line.strip_prefix("VERSION_ID=")
            .map(|v| v.trim().trim_matches('"').to_string())
            .filter(|v| !v.is_empty())
    })
}

fn detect_locale() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
        .map(|value| normalize_locale(&value))
        .unwrap_or_default()
}

/// `en_US.UTF-8` → `en-US`; `C` and `POSIX` carry no locale.
fn normalize_locale(raw: &str) -> String {
    let base = raw.split(['.', '@']).next().unwrap_or_default();
    if base == "C" || base == "POSIX" {
        return String::new();
    }
    base.replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdk_version_prefix() {
        assert!(SDK_VERSION.starts_with("beacon-rs@"));
    }

    #[test]
    fn test_detect_fills_app_fields() {
        let info = SystemInfo::detect("2.0.1", "77", false);
        assert_eq!(info.app_version, "2.0.1");
        assert_eq!(info.app_build_number, "77");
        assert!(!info.is_debug);
        assert_eq!(info.sdk_version, SDK_VERSION);
    }

    #[test]
    fn test_os_name_mapping() {
        assert_eq!(os_name("macos"), "macOS");
        assert_eq!(os_name("windows"), "Windows");
        assert_eq!(os_name("plan9"), "");
    }

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("en_US.UTF-8"), "en-US");
        assert_eq!(normalize_locale("pt_BR"), "pt-BR");
        assert_eq!(normalize_locale("de_DE@euro"), "de-DE");
        assert_eq!(normalize_locale("C"), "");
        assert_eq!(normalize_locale("POSIX"), "");
    }

    #[test]
    fn test_parse_os_release() {
        let content = "NAME=\"Ubuntu\"\nVERSION_ID=\"22.04\"\nID=ubuntu\n";
        assert_eq!(parse_os_release_version(content).as_deref(), Some("22.04"));
        assert_eq!(parse_os_release_version("NAME=Arch\n"), None);
    }

    #[test]
    fn test_static_provider() {
        let info = SystemInfo::detect("1.0", "1", true);
        let provider = StaticSystemInfo(info.clone());
        assert_eq!(provider.system_info(), info);
    }
}
