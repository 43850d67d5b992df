//! Client environment classification.
//!
//! Port, device and browser type come from user-agent rule tables evaluated
//! in order, first match wins. Network info comes from the host's connection
//! API, with a `NetType/` user-agent token as the effective-type fallback.

use std::sync::OnceLock;

use pagepulse_core::models::record::{
    BrowserType, DeviceInfo, DeviceType, GeoInfo, NetworkInfo, PortType,
};
use pagepulse_core::ports::host::HostCapabilities;
use regex::Regex;
use tracing::debug;

/// One predicate → category rule.
pub struct Rule<T> {
    pub matches: fn(&str) -> bool,
    pub category: T,
}

/// First matching category, else `fallback`
pub fn classify<T: Copy>(rules: &[Rule<T>], user_agent: &str, fallback: T) -> T {
    rules
        .iter()
        .find(|rule| (rule.matches)(user_agent))
        .map_or(fallback, |rule| rule.category)
}

/// Lower-cased tokens that mark a mobile client
const MOBILE_TOKENS: [&str; 8] = [
    "ipad",
    "iphone os",
    "midp",
    "rv:1.2.3.4",
    "ucweb",
    "android",
    "windows ce",
    "windows mobile",
];

fn is_mobile(ua: &str) -> bool {
    let ua = ua.to_lowercase();
    MOBILE_TOKENS.iter().any(|token| ua.contains(token))
}

fn ios_pattern() -> &'static Regex {
    static IOS: OnceLock<Regex> = OnceLock::new();
    IOS.get_or_init(|| Regex::new(r"(?i)\(i[^;]+;( U;)? CPU.+Mac OS X").expect("valid regex"))
}

fn net_type_pattern() -> &'static Regex {
    static NET_TYPE: OnceLock<Regex> = OnceLock::new();
    NET_TYPE.get_or_init(|| Regex::new(r"NetType/(\w+)").expect("valid regex"))
}

fn is_ios(ua: &str) -> bool {
    ios_pattern().is_match(ua)
}

fn is_android(ua: &str) -> bool {
    let ua = ua.to_lowercase();
    ua.contains("android") || ua.contains("adr")
}

fn is_ipad(ua: &str) -> bool {
    ua.to_lowercase().contains("ipad")
}

pub const PORT_RULES: &[Rule<PortType>] = &[Rule {
    matches: is_mobile,
    category: PortType::Mobile,
}];

pub const DEVICE_RULES: &[Rule<DeviceType>] = &[
    Rule {
        matches: is_ios,
        category: DeviceType::Ios,
    },
    Rule {
        matches: is_android,
        category: DeviceType::Android,
    },
    Rule {
        matches: is_ipad,
        category: DeviceType::Ipad,
    },
];

fn is_opera(ua: &str) -> bool {
    ua.contains("Opera")
}

fn is_internet_explorer(ua: &str) -> bool {
    ua.contains("compatible") && ua.contains("MSIE")
}

fn is_edge(ua: &str) -> bool {
    ua.contains("Edge")
}

fn is_firefox(ua: &str) -> bool {
    ua.contains("Firefox")
}

fn is_safari(ua: &str) -> bool {
    ua.contains("Safari") && !ua.contains("Chrome")
}

fn is_chrome(ua: &str) -> bool {
    ua.contains("Chrome") && ua.contains("Safari")
}

// Opera before IE: old Opera builds also claim "compatible; MSIE".
pub const BROWSER_RULES: &[Rule<BrowserType>] = &[
    Rule {
        matches: is_opera,
        category: BrowserType::Opera,
    },
    Rule {
        matches: is_internet_explorer,
        category: BrowserType::InternetExplorer,
    },
    Rule {
        matches: is_edge,
        category: BrowserType::Edge,
    },
    Rule {
        matches: is_firefox,
        category: BrowserType::Firefox,
    },
    Rule {
        matches: is_safari,
        category: BrowserType::Safari,
    },
    Rule {
        matches: is_chrome,
        category: BrowserType::Chrome,
    },
];

pub fn port_type(user_agent: &str) -> PortType {
    classify(PORT_RULES, user_agent, PortType::Desktop)
}

pub fn device_type(user_agent: &str) -> DeviceType {
    classify(DEVICE_RULES, user_agent, DeviceType::Unknown)
}

pub fn browser_type(user_agent: &str) -> BrowserType {
    classify(BROWSER_RULES, user_agent, BrowserType::Unknown)
}

/// Effective type from an in-app `NetType/<x>` user-agent token.
pub fn effective_type_from_ua(user_agent: &str) -> &'static str {
    let token = net_type_pattern()
        .captures(user_agent)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_default();

    match token.as_str() {
        "wifi" => "wifi",
        "4g" => "4g",
        "3g" | "3gnet" => "3g",
        "2g" => "2g",
        _ => "other",
    }
}

/// Network part of the base record
pub fn network_info(host: &HostCapabilities, geo: &GeoInfo) -> NetworkInfo {
    let connection = host.connection().unwrap_or_else(|| {
        debug!("host has no connection info");
        Default::default()
    });
    let effective_type = match connection.effective_type {
        Some(effective) if !effective.is_empty() => effective,
        _ => effective_type_from_ua(&host.navigator().user_agent).to_string(),
    };

    NetworkInfo {
        downlink: connection.downlink,
        connection_type: connection.connection_type,
        effective_type,
        rtt: connection.rtt,
        save_data: connection.save_data,
        network_changes: host.network_changes(),
        ip: geo.ip.clone(),
        city: geo.city.clone(),
    }
}

/// Device part of the base record
pub fn device_info(host: &HostCapabilities) -> DeviceInfo {
    let navigator = host.navigator();
    let ua = navigator.user_agent.as_str();

    DeviceInfo {
        port_type: port_type(ua),
        device_type: device_type(ua),
        browser_type: browser_type(ua),
        app_version: navigator.app_version.clone(),
        language: navigator.language.as_deref().map(str::to_lowercase),
    }
}
