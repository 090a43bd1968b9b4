use crate::{command, store::write_atomic};
use anyhow::{Context, Result};
use log::{error, info};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use std::{fmt::Write, path::PathBuf, time::Duration};
use trait_variant::make;

// ============================================================================
// Constants
// ============================================================================

const CTRL_INTERFACE: &str = "DIR=/var/run/wpa_supplicant GROUP=netdev";
const PSK_ROUNDS: u32 = 4096;
const PSK_LEN: usize = 32;

// ============================================================================
// Applier
// ============================================================================

/// Requests a network change; it does not wait for the interface to associate
#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait NetworkApplier {
    async fn apply(&self, ssid: &str, passphrase: &str) -> Result<()>;
}

/// Network applier backed by wpa_supplicant
#[derive(Clone, Debug)]
pub struct WpaSupplicantApplier {
    config_path: PathBuf,
    interface: String,
    country: String,
    timeout: Duration,
}

impl WpaSupplicantApplier {
    pub fn new(
        config_path: impl Into<PathBuf>,
        interface: impl Into<String>,
        country: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            interface: interface.into(),
            country: country.into(),
            timeout,
        }
    }

    /// Render the wpa_supplicant configuration for a single network
    fn render_config(&self, ssid: &str, passphrase: &str) -> String {
        let mut conf = String::new();

        let _ = writeln!(conf, "ctrl_interface={CTRL_INTERFACE}");
        let _ = writeln!(conf, "update_config=1");
        let _ = writeln!(conf, "country={}", self.country);
        let _ = writeln!(conf);
        let _ = writeln!(conf, "network={{");
        let _ = writeln!(conf, "\tssid={}", encode_ssid(ssid));
        let _ = writeln!(conf, "\tpsk={}", derive_psk(ssid, passphrase));
        let _ = writeln!(conf, "}}");

        conf
    }
}

impl NetworkApplier for WpaSupplicantApplier {
    async fn apply(&self, ssid: &str, passphrase: &str) -> Result<()> {
        let conf = self.render_config(ssid, passphrase);

        write_atomic(&self.config_path, conf.as_bytes()).context(format!(
            "failed to write wpa_supplicant config {:?}",
            self.config_path
        ))?;

        info!("wrote wpa_supplicant config for {ssid:?}");

        // connectivity is probed separately, so a failed reconfigure is not fatal
        if let Err(e) = command::run(
            "wpa_cli",
            &["-i", &self.interface, "reconfigure"],
            self.timeout,
        )
        .await
        {
            error!("wpa_cli reconfigure failed: {e:#}");
        }

        Ok(())
    }
}

/// Raw 256-bit PSK as 64 hex digits, never quoted
///
/// A passphrase that already is 64 hex digits is taken as the raw key, as wpa_supplicant does.
fn derive_psk(ssid: &str, passphrase: &str) -> String {
    if passphrase.len() == 2 * PSK_LEN && passphrase.bytes().all(|b| b.is_ascii_hexdigit()) {
        return passphrase.to_ascii_lowercase();
    }

    let mut psk = [0u8; PSK_LEN];
    pbkdf2_hmac::<Sha1>(passphrase.as_bytes(), ssid.as_bytes(), PSK_ROUNDS, &mut psk);

    hex(&psk)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::new(), |mut hex, b| {
        let _ = write!(hex, "{b:02x}");
        hex
    })
}

/// Quoted SSID when printable ASCII without quotes, hex-encoded otherwise
fn encode_ssid(ssid: &str) -> String {
    if ssid.bytes().all(|b| (0x20..0x7f).contains(&b) && b != b'"') {
        format!("\"{ssid}\"")
    } else {
        hex(ssid.as_bytes())
    }
}
