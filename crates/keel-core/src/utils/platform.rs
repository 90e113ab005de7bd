use std::env::consts;

/// Human readable name of the host, matched against plugin `Platform`
/// patterns, e.g. `Linux (linux x86_64)`.
pub fn platform_name() -> String {
    format!("{} ({} {})", os_display_name(consts::OS), consts::OS, consts::ARCH)
}

fn os_display_name(os: &str) -> &'static str {
    match os {
        "linux" => "Linux",
        "macos" => "macOS",
        "windows" => "Windows",
        "freebsd" => "FreeBSD",
        "openbsd" => "OpenBSD",
        "netbsd" => "NetBSD",
        "android" => "Android",
        "ios" => "iOS",
        _ => "Unknown",
    }
}
