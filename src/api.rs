use crate::{
    auth_gateway_client::AuthGateway,
    response::{ServiceResultResponse, handle_service_result},
    services::{
        connectivity::ConnectivityProbe, mode::ModeSwitch, network::NetworkApplier,
        provisioning::Provisioner,
    },
};
use actix_web::{HttpResponse, Responder, web};
use log::debug;
use serde::{Deserialize, de::DeserializeOwned};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SaveWifiPayload {
    ssid: String,
    password: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Clone)]
pub struct Api<Applier, Probe, Gateway, Switch>
where
    Applier: NetworkApplier,
    Probe: ConnectivityProbe,
    Gateway: AuthGateway,
    Switch: ModeSwitch,
{
    pub provisioner: Provisioner<Applier, Probe, Gateway, Switch>,
}

impl<Applier, Probe, Gateway, Switch> Api<Applier, Probe, Gateway, Switch>
where
    Applier: NetworkApplier + 'static,
    Probe: ConnectivityProbe + 'static,
    Gateway: AuthGateway + 'static,
    Switch: ModeSwitch + 'static,
{
    pub fn new(provisioner: Provisioner<Applier, Probe, Gateway, Switch>) -> Self {
        Api { provisioner }
    }

    /// Register the provisioning endpoints
    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.route("/api/status", web::get().to(Self::status))
            .route("/api/save_wifi", web::post().to(Self::save_wifi))
            .route("/api/connect_wifi", web::post().to(Self::connect_wifi))
            .route("/api/login", web::post().to(Self::login))
            .route("/api/finish_setup", web::post().to(Self::finish_setup))
            .route("/api/version", web::get().to(Self::version));
    }

    pub async fn status(api: web::Data<Self>) -> impl Responder {
        debug!("status() called");
        api.provisioner.status().await.into_response()
    }

    pub async fn save_wifi(body: web::Bytes, api: web::Data<Self>) -> impl Responder {
        debug!("save_wifi() called");

        let payload: SaveWifiPayload = lenient_json(&body);

        handle_service_result(
            api.provisioner
                .save_network_credentials(&payload.ssid, &payload.password),
            "save_wifi",
        )
    }

    pub async fn connect_wifi(api: web::Data<Self>) -> impl Responder {
        debug!("connect_wifi() called");
        handle_service_result(api.provisioner.connect_network().await, "connect_wifi")
    }

    pub async fn login(body: web::Bytes, api: web::Data<Self>) -> impl Responder {
        debug!("login() called");

        let payload: LoginPayload = lenient_json(&body);

        handle_service_result(
            api.provisioner
                .authenticate(&payload.email, &payload.password)
                .await,
            "login",
        )
    }

    pub async fn finish_setup(api: web::Data<Self>) -> impl Responder {
        debug!("finish_setup() called");
        handle_service_result(api.provisioner.finish_setup().await, "finish_setup")
    }

    pub async fn version() -> impl Responder {
        HttpResponse::Ok().body(env!("CARGO_PKG_VERSION"))
    }
}

/// Parse a JSON body regardless of content type; anything unparsable counts as empty
fn lenient_json<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_else(|e| {
        debug!("ignoring unparsable request body: {e}");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth_gateway_client::{GatewayUser, MockAuthGateway},
        error::ProvisioningError,
        services::{
            connectivity::MockConnectivityProbe,
            mode::{BestEffort, MockModeSwitch},
            network::MockNetworkApplier,
            provisioning::ProvisionerSettings,
        },
        store::JsonStore,
    };
    use actix_web::{App, http::StatusCode, test};
    use anyhow::anyhow;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tempfile::TempDir;

    type TestApi = Api<MockNetworkApplier, MockConnectivityProbe, MockAuthGateway, MockModeSwitch>;

    struct Mocks {
        applier: MockNetworkApplier,
        probe: MockConnectivityProbe,
        gateway: MockAuthGateway,
        mode_switch: MockModeSwitch,
    }

    fn mocks() -> Mocks {
        Mocks {
            applier: MockNetworkApplier::new(),
            probe: MockConnectivityProbe::new(),
            gateway: MockAuthGateway::new(),
            mode_switch: MockModeSwitch::new(),
        }
    }

    fn make_api(dir: &TempDir, mocks: Mocks) -> TestApi {
        Api::new(Provisioner::new(
            JsonStore::new(dir.path().join("state.json"), dir.path().join("wifi.json")),
            mocks.applier,
            mocks.probe,
            mocks.gateway,
            mocks.mode_switch,
            ProvisionerSettings {
                settle_interval: Duration::ZERO,
                normal_service: "homebase-normal.service".to_string(),
                setup_service: "homebase-hotspot.service".to_string(),
            },
        ))
    }

    async fn call(
        api: TestApi,
        req: test::TestRequest,
    ) -> (StatusCode, Value) {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(api))
                .configure(TestApi::configure),
        )
        .await;
        let resp = test::call_service(&app, req.to_request()).await;
        let status = resp.status();
        let body = test::read_body(resp).await;
        (
            status,
            serde_json::from_slice(&body).unwrap_or(Value::Null),
        )
    }

    #[actix_web::test]
    async fn status_reports_flag_and_address() {
        let dir = TempDir::new().expect("should create temp dir");
        let mut mocks = mocks();
        mocks
            .probe
            .expect_current_lan_address()
            .returning(|| Box::pin(async { Some("192.168.1.42".parse().unwrap()) }));
        std::fs::write(dir.path().join("state.json"), r#"{"setup_complete":true}"#)
            .expect("should write");

        let (status, body) = call(
            make_api(&dir, mocks),
            test::TestRequest::get().uri("/api/status"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"setup_complete": true, "ip": "192.168.1.42"}));
    }

    #[actix_web::test]
    async fn status_reports_null_address() {
        let dir = TempDir::new().expect("should create temp dir");
        let mut mocks = mocks();
        mocks
            .probe
            .expect_current_lan_address()
            .returning(|| Box::pin(async { None }));

        let (status, body) = call(
            make_api(&dir, mocks),
            test::TestRequest::get().uri("/api/status"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"setup_complete": false, "ip": null}));
    }

    #[actix_web::test]
    async fn save_wifi_accepts_credentials() {
        let dir = TempDir::new().expect("should create temp dir");

        let (status, body) = call(
            make_api(&dir, mocks()),
            test::TestRequest::post()
                .uri("/api/save_wifi")
                .set_json(json!({"ssid": " HomeNet ", "password": "password1"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));

        let saved: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("wifi.json")).expect("should read"),
        )
        .expect("should parse");
        assert_eq!(saved, json!({"ssid": "HomeNet", "password": "password1"}));
    }

    #[actix_web::test]
    async fn save_wifi_rejects_missing_fields() {
        let dir = TempDir::new().expect("should create temp dir");

        let (status, body) = call(
            make_api(&dir, mocks()),
            test::TestRequest::post()
                .uri("/api/save_wifi")
                .set_json(json!({"ssid": "   "})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"success": false, "error": "Missing Wi-Fi SSID or password"})
        );
    }

    #[actix_web::test]
    async fn save_wifi_treats_garbage_body_as_empty() {
        let dir = TempDir::new().expect("should create temp dir");

        let (status, body) = call(
            make_api(&dir, mocks()),
            test::TestRequest::post()
                .uri("/api/save_wifi")
                .set_payload("ssid=HomeNet"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
    }

    #[actix_web::test]
    async fn connect_wifi_without_credentials_is_bad_request() {
        let dir = TempDir::new().expect("should create temp dir");

        let (status, body) = call(
            make_api(&dir, mocks()),
            test::TestRequest::post().uri("/api/connect_wifi"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"success": false, "error": "No Wi-Fi saved"}));
    }

    #[actix_web::test]
    async fn connect_wifi_without_address_is_conflict() {
        let dir = TempDir::new().expect("should create temp dir");
        std::fs::write(
            dir.path().join("wifi.json"),
            r#"{"ssid":"HomeNet","password":"password1"}"#,
        )
        .expect("should write");
        let mut mocks = mocks();
        mocks
            .applier
            .expect_apply()
            .returning(|_, _| Box::pin(async { Ok(()) }));
        mocks
            .probe
            .expect_current_lan_address()
            .returning(|| Box::pin(async { None }));

        let (status, body) = call(
            make_api(&dir, mocks),
            test::TestRequest::post().uri("/api/connect_wifi"),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            body,
            json!({"success": false, "error": "Wi-Fi not connected yet"})
        );
    }

    #[actix_web::test]
    async fn connect_wifi_reports_address() {
        let dir = TempDir::new().expect("should create temp dir");
        std::fs::write(
            dir.path().join("wifi.json"),
            r#"{"ssid":"HomeNet","password":"password1"}"#,
        )
        .expect("should write");
        let mut mocks = mocks();
        mocks
            .applier
            .expect_apply()
            .returning(|_, _| Box::pin(async { Ok(()) }));
        mocks
            .probe
            .expect_current_lan_address()
            .returning(|| Box::pin(async { Some("10.0.0.5".parse().unwrap()) }));

        let (status, body) = call(
            make_api(&dir, mocks),
            test::TestRequest::post().uri("/api/connect_wifi"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "ip": "10.0.0.5"}));
    }

    #[actix_web::test]
    async fn login_returns_user() {
        let dir = TempDir::new().expect("should create temp dir");
        let mut mocks = mocks();
        mocks.gateway.expect_login().returning(|_, _| {
            Box::pin(async {
                Ok(GatewayUser {
                    id: json!(1),
                    email: "a@b.com".into(),
                    account_type: "pro".into(),
                })
            })
        });

        let (status, body) = call(
            make_api(&dir, mocks),
            test::TestRequest::post()
                .uri("/api/login")
                .set_json(json!({"email": "a@b.com", "password": "pw"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"success": true, "user": {"email": "a@b.com", "account_type": "pro"}})
        );
    }

    #[actix_web::test]
    async fn login_maps_gateway_errors() {
        let cases: Vec<(fn() -> ProvisioningError, StatusCode)> = vec![
            (
                || ProvisioningError::InvalidCredentials("Invalid credentials.".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                || ProvisioningError::GatewayUnreachable(anyhow!("timed out")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                || ProvisioningError::MalformedGatewayResponse,
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (make_error, expected) in cases {
            let dir = TempDir::new().expect("should create temp dir");
            let mut mocks = mocks();
            mocks
                .gateway
                .expect_login()
                .returning(move |_, _| Box::pin(async move { Err(make_error()) }));

            let (status, body) = call(
                make_api(&dir, mocks),
                test::TestRequest::post()
                    .uri("/api/login")
                    .set_json(json!({"email": "a@b.com", "password": "pw"})),
            )
            .await;

            assert_eq!(status, expected);
            assert_eq!(body["success"], json!(false));
            assert_eq!(body["error"], json!(make_error().to_string()));
            assert!(!dir.path().join("state.json").exists());
        }
    }

    #[actix_web::test]
    async fn login_rejects_missing_password() {
        let dir = TempDir::new().expect("should create temp dir");
        let mut mocks = mocks();
        mocks.gateway.expect_login().never();

        let (status, body) = call(
            make_api(&dir, mocks),
            test::TestRequest::post()
                .uri("/api/login")
                .set_json(json!({"email": "a@b.com"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"success": false, "error": "Missing email or password"})
        );
    }

    #[actix_web::test]
    async fn finish_setup_succeeds_when_mode_switch_fails() {
        let dir = TempDir::new().expect("should create temp dir");
        let mut mocks = mocks();
        mocks
            .mode_switch
            .expect_enable()
            .returning(|_| Box::pin(async { BestEffort::Failed(anyhow!("no systemd")) }));
        mocks
            .mode_switch
            .expect_disable()
            .returning(|_| Box::pin(async { BestEffort::Failed(anyhow!("no systemd")) }));

        let (status, body) = call(
            make_api(&dir, mocks),
            test::TestRequest::post().uri("/api/finish_setup"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));

        let state: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("state.json")).expect("should read"),
        )
        .expect("should parse");
        assert_eq!(state["setup_complete"], json!(true));
    }

    #[actix_web::test]
    async fn version_is_plain_text() {
        let dir = TempDir::new().expect("should create temp dir");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(make_api(&dir, mocks())))
                .configure(TestApi::configure),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/version").to_request(),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(test::read_body(resp).await, env!("CARGO_PKG_VERSION"));
    }
}
