//! Device identity derived from the factory MAC address.
//!
//! Supplies the public address written to the radio at init and a stable
//! advertised name of the form `<prefix>-XXYYZZ` (last 3 MAC bytes, upper
//! hex), so devices on the same bench can be told apart in a scan.

use core::fmt::Write;

use crate::config::MAX_ADV_NAME_LEN;

/// Full 6-byte MAC address, least-significant byte first.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is exactly the 6 bytes the call writes.
    unsafe {
        esp_idf_sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Host: a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// `<prefix>-XXYYZZ`; the prefix is shortened to fit the name buffer.
pub fn advertised_name(prefix: &str, mac: &MacAddress) -> heapless::String<MAX_ADV_NAME_LEN> {
    const SUFFIX_LEN: usize = 7; // "-XXYYZZ"
    let keep = prefix
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= MAX_ADV_NAME_LEN - SUFFIX_LEN)
        .last()
        .unwrap_or(0);
    let mut name = heapless::String::new();
    let _ = write!(
        name,
        "{}-{:02X}{:02X}{:02X}",
        &prefix[..keep],
        mac[3],
        mac[4],
        mac[5]
    );
    name
}
