#![allow(dead_code)]

use medgrid_server::config::{BootstrapAdmin, MIN_JWT_SECRET_LEN};
use medgrid_server::{AppConfig, AppState, build_app};
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const ADMIN_EMAIL: &str = "admin@medgrid.test";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = "s".repeat(MIN_JWT_SECRET_LEN);
    config.auth.bootstrap_admin = Some(BootstrapAdmin {
        email: ADMIN_EMAIL.into(),
        password: ADMIN_PASSWORD.into(),
        full_name: "Test Admin".into(),
    });
    config
}

pub struct TestServer {
    pub base: String,
    pub addr: std::net::SocketAddr,
    pub client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let state = AppState::new(test_config());
        state.bootstrap().await.expect("bootstrap admin");
        let app = build_app(state);

        let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await;
        });

        Self {
            base: format!("http://{addr}/api"),
            addr,
            client: reqwest::Client::new(),
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    pub async fn register_nurse(&self, email: &str) -> String {
        let resp = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({
                "email": email,
                "password": "nurse-password",
                "fullName": "Ward Nurse",
                "role": "nurse"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn patch(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .patch(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    /// Creates a department with `beds` beds numbered 1..=beds.
    pub async fn ward(&self, admin: &str, name: &str, beds: usize) -> (String, Vec<String>) {
        let resp = self.post(admin, "/departments", json!({ "name": name })).await;
        assert_eq!(resp.status(), 201);
        let department: Value = resp.json().await.unwrap();
        let department_id = department["id"].as_str().unwrap().to_string();

        let mut bed_ids = Vec::new();
        for n in 1..=beds {
            let resp = self
                .post(
                    admin,
                    "/beds",
                    json!({ "departmentId": department_id, "bedNumber": n.to_string() }),
                )
                .await;
            assert_eq!(resp.status(), 201);
            let bed: Value = resp.json().await.unwrap();
            bed_ids.push(bed["id"].as_str().unwrap().to_string());
        }
        (department_id, bed_ids)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

pub fn admission(department_id: &str, bed_id: &str, last_name: &str) -> Value {
    json!({
        "firstName": "Ada",
        "lastName": last_name,
        "dateOfBirth": "1980-04-12",
        "gender": "female",
        "contactNumber": "555-0100",
        "emergencyContact": {
            "name": "Sam",
            "relationship": "sibling",
            "contactNumber": "555-0101"
        },
        "departmentId": department_id,
        "bedId": bed_id,
        "reasonForAdmission": "observation"
    })
}
