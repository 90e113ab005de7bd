#![cfg(test)]

use crate::utils::platform_name;

#[test]
fn test_platform_name_mentions_os_and_arch() {
    let name = platform_name();
    assert!(name.contains(std::env::consts::OS));
    assert!(name.contains(std::env::consts::ARCH));
    assert!(name.contains('('));
}

#[cfg(target_os = "linux")]
#[test]
fn test_platform_name_on_linux() {
    assert!(platform_name().starts_with("Linux (linux "));
}
