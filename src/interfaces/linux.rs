// Linux-specific interface helpers: /sys/class/net operstate and link speed.

/// Read /sys/class/net/<interface>/operstate. `unknown` counts as up (tun/wireguard report it).
/// None when the file is missing or on other platforms.
pub(super) fn read_operstate(interface_name: &str) -> Option<bool> {
    #[cfg(target_os = "linux")]
    {
        let path = format!("/sys/class/net/{}/operstate", interface_name);
        if let Ok(state) = std::fs::read_to_string(&path) {
            return Some(matches!(state.trim(), "up" | "unknown"));
        }
    }
    let _ = interface_name;
    None
}

/// Read link speed from /sys/class/net/<interface>/speed (Mbps) as bits per second.
/// None when unavailable or negative (virtual and wireless links report -1).
pub(super) fn get_interface_speed(interface_name: &str) -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let path = format!("/sys/class/net/{}/speed", interface_name);
        if let Ok(content) = std::fs::read_to_string(&path)
            && let Ok(mbps) = content.trim().parse::<i64>()
            && mbps > 0
        {
            return Some((mbps as u64) * 1_000_000);
        }
    }
    let _ = interface_name;
    None
}
