//! Provisioning controller
//!
//! Drives the device from hotspot/setup mode to normal mode. Every transition is
//! triggered by a client call; nothing happens in the background.

use crate::{
    auth_gateway_client::{AuthGateway, GatewayUser},
    error::ProvisioningError,
    services::{connectivity::ConnectivityProbe, mode::ModeSwitch, network::NetworkApplier},
    store::{DocumentKey, JsonStore},
};
use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::{fmt, net::IpAddr, time::Duration};
use tokio::time::sleep;

/// Durable device state
///
/// Fields this service does not know about are kept as they are. Known fields are read
/// one by one, so a bad value in one of them does not discard the others.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DeviceState {
    #[serde(default, deserialize_with = "lenient_flag")]
    pub setup_complete: bool,
    #[serde(
        default,
        deserialize_with = "lenient_user",
        skip_serializing_if = "Option::is_none"
    )]
    pub user: Option<User>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct User {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub account_type: String,
}

/// Non-zero numbers count as set; anything but a boolean or number counts as unset
fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        other => {
            warn!("ignoring invalid setup_complete value: {other}");
            false
        }
    })
}

fn lenient_user<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<User>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }

    match User::deserialize(value) {
        Ok(user) => Ok(Some(user)),
        Err(e) => {
            warn!("ignoring invalid stored user: {e}");
            Ok(None)
        }
    }
}

impl From<GatewayUser> for User {
    fn from(user: GatewayUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            account_type: user.account_type,
        }
    }
}

#[derive(Clone, Default, Deserialize, PartialEq, Serialize)]
pub struct NetworkCredentials {
    #[serde(default)]
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for NetworkCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Status {
    pub setup_complete: bool,
    pub ip: Option<IpAddr>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuthenticatedUser {
    pub email: String,
    pub account_type: String,
}

#[derive(Clone, Debug)]
pub struct ProvisionerSettings {
    /// Wait between requesting a network change and probing for an address
    pub settle_interval: Duration,
    pub normal_service: String,
    pub setup_service: String,
}

#[derive(Clone)]
pub struct Provisioner<Applier, Probe, Gateway, Switch>
where
    Applier: NetworkApplier,
    Probe: ConnectivityProbe,
    Gateway: AuthGateway,
    Switch: ModeSwitch,
{
    store: JsonStore,
    applier: Applier,
    probe: Probe,
    gateway: Gateway,
    mode_switch: Switch,
    settings: ProvisionerSettings,
}

impl<Applier, Probe, Gateway, Switch> Provisioner<Applier, Probe, Gateway, Switch>
where
    Applier: NetworkApplier,
    Probe: ConnectivityProbe,
    Gateway: AuthGateway,
    Switch: ModeSwitch,
{
    pub fn new(
        store: JsonStore,
        applier: Applier,
        probe: Probe,
        gateway: Gateway,
        mode_switch: Switch,
        settings: ProvisionerSettings,
    ) -> Self {
        Self {
            store,
            applier,
            probe,
            gateway,
            mode_switch,
            settings,
        }
    }

    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    pub fn device_state(&self) -> DeviceState {
        self.store
            .read(DocumentKey::DeviceState, DeviceState::default())
    }

    /// Saved credentials, if both ssid and password are present
    pub fn network_credentials(&self) -> Option<NetworkCredentials> {
        self.store
            .read::<Option<NetworkCredentials>>(DocumentKey::NetworkCredentials, None)
            .filter(|c| !c.ssid.is_empty() && !c.password.is_empty())
    }

    pub async fn status(&self) -> Status {
        Status {
            setup_complete: self.device_state().setup_complete,
            ip: self.probe.current_lan_address().await,
        }
    }

    pub fn save_network_credentials(
        &self,
        ssid: &str,
        password: &str,
    ) -> Result<(), ProvisioningError> {
        let ssid = ssid.trim();

        if ssid.is_empty() || password.is_empty() {
            return Err(ProvisioningError::InvalidInput(
                "Missing Wi-Fi SSID or password".to_string(),
            ));
        }

        let credentials = NetworkCredentials {
            ssid: ssid.to_string(),
            password: password.to_string(),
        };

        self.store
            .write(DocumentKey::NetworkCredentials, &credentials)
            .map_err(ProvisioningError::Storage)?;

        info!("saved Wi-Fi credentials for {ssid:?}");
        Ok(())
    }

    /// Apply the saved credentials and confirm the device obtained an address
    ///
    /// Waits exactly one settle interval before probing. `NotConnected` means the
    /// association may still be in progress; the call is idempotent and can be retried.
    pub async fn connect_network(&self) -> Result<IpAddr, ProvisioningError> {
        let credentials = self
            .network_credentials()
            .ok_or(ProvisioningError::NoCredentials)?;

        info!("applying Wi-Fi configuration for {:?}", credentials.ssid);

        self.applier
            .apply(&credentials.ssid, &credentials.password)
            .await
            .map_err(ProvisioningError::NetworkApply)?;

        debug!(
            "waiting {}ms for network to settle",
            self.settings.settle_interval.as_millis()
        );
        sleep(self.settings.settle_interval).await;

        let ip = self
            .probe
            .current_lan_address()
            .await
            .ok_or(ProvisioningError::NotConnected)?;

        info!("connected to {:?} with address {ip}", credentials.ssid);
        Ok(ip)
    }

    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, ProvisioningError> {
        let email = email.trim();

        if email.is_empty() || password.is_empty() {
            return Err(ProvisioningError::InvalidInput(
                "Missing email or password".to_string(),
            ));
        }

        let user = User::from(self.gateway.login(email, password).await?);

        let mut state = self.device_state();
        state.user = Some(user.clone());
        self.store
            .write(DocumentKey::DeviceState, &state)
            .map_err(ProvisioningError::Storage)?;

        info!("authenticated {} ({})", user.email, user.account_type);

        Ok(AuthenticatedUser {
            email: user.email,
            account_type: user.account_type,
        })
    }

    /// Record setup as complete, then hand over to the normal-mode service
    ///
    /// Only persisting the flag can fail; the mode switch is best-effort.
    pub async fn finish_setup(&self) -> Result<(), ProvisioningError> {
        let mut state = self.device_state();
        state.setup_complete = true;
        self.store
            .write(DocumentKey::DeviceState, &state)
            .map_err(ProvisioningError::Storage)?;

        info!("setup complete, switching to normal mode");

        let normal = &self.settings.normal_service;
        let setup = &self.settings.setup_service;

        self.mode_switch
            .enable(normal)
            .await
            .log(&format!("enable {normal}"));
        self.mode_switch
            .disable(setup)
            .await
            .log(&format!("disable {setup}"));

        Ok(())
    }
}
