use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::{
    domain::{ExportFormat, PaymentId, PaymentMethod, PlanId, SourceId},
    error::ApiError,
    protocol::{
        ArticleCountResponse, ArticleListResponse, AuthResponse, CategoriesResponse,
        ChangePlanRequest, ChangePlanResponse, CreatePaymentRequest, KeywordSearchRequest,
        LoginRequest, MessageResponse, MyPlanResponse, NewSource, NewTask, Payment, PaymentCheckout,
        PaymentsResponse, Plan, PlansResponse, ProfileResponse, RegisterRequest, ScheduledTask,
        ScrapeResponse, ScrapingQuota, SearchResponse, Source, SourceListResponse,
        SourceResponse, SourceUpdate, TaskListResponse, TaskResponse, UserProfile,
        VerifyYapeRequest, VerifyYapeResponse,
    },
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub mod config;
pub mod error;
pub mod feeds;
pub mod list_fetch;
pub mod session;

pub use config::{load_settings, ClientSettings};
pub use error::ClientError;
pub use feeds::{NewsQuery, SearchQuery, SourceFilter};
pub use list_fetch::{
    ErrorInfo, FetchMode, FetchOutcome, FetchPhase, FetchState, ListFetchController, Page,
    PageSource,
};
pub use session::Session;

const MAX_SEARCH_LIMIT: u32 = 500;

/// Typed wrapper over the dashboard's REST backend. The session is owned
/// here and updated by `login`/`register`/`logout`; nothing is read from
/// ambient storage.
pub struct DashboardClient {
    http: Client,
    session: RwLock<Session>,
}

impl DashboardClient {
    pub fn new(session: Session) -> Self {
        Self {
            http: Client::new(),
            session: RwLock::new(session),
        }
    }

    pub fn with_timeout(session: Session, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Network(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            session: RwLock::new(session),
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ClientError> {
        let mut session = Session::new(&settings.api_url)?;
        if let Some(token) = &settings.token {
            session = session.with_token(token.clone());
        }
        Self::with_timeout(session, settings.request_timeout())
    }

    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    // ==================== auth ====================

    pub async fn login(&self, username: &str, password: &str) -> Result<UserProfile, ClientError> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: AuthResponse = self
            .send_json(self.request(Method::POST, &["auth", "login"]).await?.json(&body))
            .await?;
        info!(user_id = response.user.id.0, "signed in");
        self.session
            .write()
            .await
            .sign_in(response.access_token, response.user.clone());
        Ok(response.user)
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ClientError> {
        let body = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let response: AuthResponse = self
            .send_json(
                self.request(Method::POST, &["auth", "register"])
                    .await?
                    .json(&body),
            )
            .await?;
        info!(user_id = response.user.id.0, "registered and signed in");
        self.session
            .write()
            .await
            .sign_in(response.access_token, response.user.clone());
        Ok(response.user)
    }

    pub async fn profile(&self) -> Result<UserProfile, ClientError> {
        let response: ProfileResponse = self
            .send_json(self.authed(Method::GET, &["auth", "perfil"]).await?)
            .await?;
        self.session.write().await.set_user(response.user.clone());
        Ok(response.user)
    }

    pub async fn logout(&self) {
        self.session.write().await.clear();
    }

    // ==================== scraping ====================

    pub async fn run_scraping(
        &self,
        limit: u32,
        source_id: Option<SourceId>,
    ) -> Result<ScrapeResponse, ClientError> {
        let mut request = self
            .authed(Method::POST, &["scraping", "ejecutar"])
            .await?
            .query(&[("limite", limit)]);
        if let Some(source_id) = source_id {
            request = request.query(&[("fuente_id", source_id.0)]);
        }
        self.send_json(request).await
    }

    pub async fn scraping_stats(&self) -> Result<ScrapingQuota, ClientError> {
        self.send_json(self.authed(Method::GET, &["scraping", "estadisticas"]).await?)
            .await
    }

    // ==================== news ====================

    pub async fn list_news(
        &self,
        query: &NewsQuery,
        offset: usize,
        limit: usize,
    ) -> Result<ArticleListResponse, ClientError> {
        let request = self
            .request(Method::GET, &["noticias"])
            .await?
            .query(query)
            .query(&[("limite", limit), ("offset", offset)]);
        self.send_json(request).await
    }

    pub async fn count_news(&self) -> Result<u64, ClientError> {
        let response: ArticleCountResponse = self
            .send_json(self.request(Method::GET, &["noticias", "contar"]).await?)
            .await?;
        Ok(response.total)
    }

    pub async fn clear_news(&self) -> Result<Option<String>, ClientError> {
        let response: MessageResponse = self
            .send_json(self.authed(Method::DELETE, &["noticias"]).await?)
            .await?;
        Ok(response.message)
    }

    pub async fn categories(&self) -> Result<Vec<String>, ClientError> {
        let response: CategoriesResponse = self
            .send_json(self.request(Method::GET, &["categorias"]).await?)
            .await?;
        Ok(response.categories)
    }

    pub async fn search_news(
        &self,
        query: &SearchQuery,
        limit: u32,
    ) -> Result<SearchResponse, ClientError> {
        query.validate()?;
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT);
        let request = self
            .request(Method::GET, &["noticias", "buscar"])
            .await?
            .query(query)
            .query(&[("limite", limit)]);
        self.send_json(request).await
    }

    pub async fn search_keywords(
        &self,
        words: &[String],
        limit: u32,
    ) -> Result<SearchResponse, ClientError> {
        let words: Vec<String> = words
            .iter()
            .map(|word| word.trim().to_string())
            .filter(|word| !word.is_empty())
            .collect();
        if words.is_empty() {
            return Err(ClientError::InvalidInput(
                "at least one keyword is required".into(),
            ));
        }
        let body = KeywordSearchRequest {
            words,
            limit: limit.clamp(1, MAX_SEARCH_LIMIT),
        };
        self.send_json(
            self.request(Method::POST, &["noticias", "buscar", "palabras-clave"])
                .await?
                .json(&body),
        )
        .await
    }

    pub async fn export_news(
        &self,
        format: ExportFormat,
        limit: u32,
        source_id: Option<SourceId>,
    ) -> Result<Vec<u8>, ClientError> {
        let mut request = self
            .request(Method::GET, &["noticias", "exportar"])
            .await?
            .query(&[("formato", format.extension())])
            .query(&[("limite", limit)]);
        if let Some(source_id) = source_id {
            request = request.query(&[("fuente_id", source_id.0)]);
        }
        self.send_bytes(request).await
    }

    // ==================== sources ====================

    pub async fn list_sources(&self, active_only: bool) -> Result<Vec<Source>, ClientError> {
        let mut request = self.request(Method::GET, &["fuentes"]).await?;
        if active_only {
            request = request.query(&[("activas", "true")]);
        }
        let response: SourceListResponse = self.send_json(request).await?;
        Ok(response.sources)
    }

    pub async fn get_source(&self, id: SourceId) -> Result<Source, ClientError> {
        let id = id.to_string();
        let response: SourceResponse = self
            .send_json(self.request(Method::GET, &["fuentes", &id]).await?)
            .await?;
        Ok(response.source)
    }

    pub async fn create_source(&self, name: &str, url: &str) -> Result<Source, ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::InvalidInput("source name is required".into()));
        }
        url::Url::parse(url.trim())?;
        let body = NewSource {
            name: name.to_string(),
            url: url.trim().to_string(),
        };
        let response: SourceResponse = self
            .send_json(self.authed(Method::POST, &["fuentes"]).await?.json(&body))
            .await?;
        info!(source_id = response.source.id.0, "source created");
        Ok(response.source)
    }

    pub async fn update_source(
        &self,
        id: SourceId,
        update: &SourceUpdate,
    ) -> Result<Source, ClientError> {
        if update.is_empty() {
            return Err(ClientError::InvalidInput("nothing to update".into()));
        }
        if let Some(url) = &update.url {
            url::Url::parse(url.trim())?;
        }
        let id = id.to_string();
        let response: SourceResponse = self
            .send_json(
                self.authed(Method::PUT, &["fuentes", &id])
                    .await?
                    .json(update),
            )
            .await?;
        Ok(response.source)
    }

    pub async fn delete_source(&self, id: SourceId) -> Result<Option<String>, ClientError> {
        let id = id.to_string();
        let response: MessageResponse = self
            .send_json(self.authed(Method::DELETE, &["fuentes", &id]).await?)
            .await?;
        Ok(response.message)
    }

    // ==================== statistics ====================

    pub async fn general_stats(&self) -> Result<Value, ClientError> {
        self.send_json(self.request(Method::GET, &["estadisticas"]).await?)
            .await
    }

    pub async fn trends(&self, days: u32) -> Result<Value, ClientError> {
        let request = self
            .request(Method::GET, &["estadisticas", "tendencias"])
            .await?
            .query(&[("dias", days.max(1))]);
        self.send_json(request).await
    }

    pub async fn top_sources(&self, limit: u32) -> Result<Value, ClientError> {
        let request = self
            .request(Method::GET, &["estadisticas", "top-fuentes"])
            .await?
            .query(&[("limite", limit.max(1))]);
        self.send_json(request).await
    }

    // ==================== scheduler ====================

    pub async fn list_tasks(&self) -> Result<Vec<ScheduledTask>, ClientError> {
        let response: TaskListResponse = self
            .send_json(self.request(Method::GET, &["scheduler", "tareas"]).await?)
            .await?;
        Ok(response.tasks)
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<ScheduledTask, ClientError> {
        if task.name.trim().is_empty() {
            return Err(ClientError::InvalidInput("task name is required".into()));
        }
        if task.interval_minutes == 0 {
            return Err(ClientError::InvalidInput(
                "interval must be at least one minute".into(),
            ));
        }
        let response: TaskResponse = self
            .send_json(
                self.request(Method::POST, &["scheduler", "tareas"])
                    .await?
                    .json(task),
            )
            .await?;
        Ok(response.task)
    }

    pub async fn get_task(&self, name: &str) -> Result<ScheduledTask, ClientError> {
        let response: TaskResponse = self
            .send_json(
                self.request(Method::GET, &["scheduler", "tareas", name])
                    .await?,
            )
            .await?;
        Ok(response.task)
    }

    pub async fn delete_task(&self, name: &str) -> Result<Option<String>, ClientError> {
        let response: MessageResponse = self
            .send_json(
                self.request(Method::DELETE, &["scheduler", "tareas", name])
                    .await?,
            )
            .await?;
        Ok(response.message)
    }

    pub async fn pause_task(&self, name: &str) -> Result<Option<String>, ClientError> {
        let response: MessageResponse = self
            .send_json(
                self.request(Method::POST, &["scheduler", "tareas", name, "pausar"])
                    .await?,
            )
            .await?;
        Ok(response.message)
    }

    pub async fn resume_task(&self, name: &str) -> Result<Option<String>, ClientError> {
        let response: MessageResponse = self
            .send_json(
                self.request(Method::POST, &["scheduler", "tareas", name, "reanudar"])
                    .await?,
            )
            .await?;
        Ok(response.message)
    }

    // ==================== plans and subscriptions ====================

    pub async fn list_plans(&self) -> Result<Vec<Plan>, ClientError> {
        let response: PlansResponse = self
            .send_json(self.request(Method::GET, &["planes"]).await?)
            .await?;
        Ok(response.plans)
    }

    pub async fn my_plan(&self) -> Result<MyPlanResponse, ClientError> {
        self.send_json(
            self.authed(Method::GET, &["suscripciones", "mi-plan"])
                .await?,
        )
        .await
    }

    pub async fn change_plan(
        &self,
        plan_id: PlanId,
        payment_id: PaymentId,
    ) -> Result<ChangePlanResponse, ClientError> {
        let body = ChangePlanRequest {
            plan_id,
            payment_id,
        };
        self.send_json(
            self.authed(Method::POST, &["suscripciones", "cambiar"])
                .await?
                .json(&body),
        )
        .await
    }

    // ==================== payments ====================

    pub async fn create_payment(
        &self,
        plan_id: PlanId,
        method: PaymentMethod,
    ) -> Result<PaymentCheckout, ClientError> {
        let body = CreatePaymentRequest { plan_id, method };
        let checkout: PaymentCheckout = self
            .send_json(
                self.authed(Method::POST, &["pagos", "crear"])
                    .await?
                    .json(&body),
            )
            .await?;
        info!(payment_id = checkout.payment_id().0, ?method, "payment created");
        Ok(checkout)
    }

    /// Submits proof of a Yape transfer. The receipt image, if any, travels
    /// base64-encoded.
    pub async fn verify_yape(
        &self,
        payment_id: PaymentId,
        receipt_image: Option<&[u8]>,
    ) -> Result<VerifyYapeResponse, ClientError> {
        let body = VerifyYapeRequest {
            payment_id,
            receipt_image: receipt_image.map(|bytes| STANDARD.encode(bytes)),
        };
        self.send_json(
            self.authed(Method::POST, &["pagos", "verificar-yape"])
                .await?
                .json(&body),
        )
        .await
    }

    pub async fn my_payments(&self) -> Result<Vec<Payment>, ClientError> {
        let response: PaymentsResponse = self
            .send_json(self.authed(Method::GET, &["pagos", "mis-pagos"]).await?)
            .await?;
        Ok(response.payments)
    }

    // ==================== admin ====================

    pub async fn pending_payments(&self) -> Result<Vec<Payment>, ClientError> {
        let response: PaymentsResponse = self
            .send_json(
                self.authed(Method::GET, &["admin", "pagos", "pendientes"])
                    .await?,
            )
            .await?;
        Ok(response.payments)
    }

    pub async fn approve_payment(&self, id: PaymentId) -> Result<Option<String>, ClientError> {
        let id = id.to_string();
        let response: MessageResponse = self
            .send_json(
                self.authed(Method::POST, &["admin", "pagos", &id, "aprobar"])
                    .await?,
            )
            .await?;
        Ok(response.message)
    }

    // ==================== plumbing ====================

    /// Builds a request, attaching the bearer token when the session has one.
    async fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        let session = self.session.read().await;
        let url = session.endpoint(segments)?;
        debug!(%method, %url, "api request");
        let mut request = self.http.request(method, url);
        if let Some(token) = session.token() {
            request = request.bearer_auth(token);
        }
        Ok(request)
    }

    /// Like [`request`](Self::request), but fails fast without a token.
    async fn authed(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        if !self.session.read().await.is_authenticated() {
            return Err(ClientError::NotAuthenticated);
        }
        self.request(method, segments).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            let err = ApiError::from_response(status, &body);
            warn!(status, error = %err.message, "api request failed");
            return Err(ClientError::server(status, err.message));
        }
        decode_envelope(status, &body)
    }

    async fn send_bytes(&self, request: RequestBuilder) -> Result<Vec<u8>, ClientError> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_response(status, &body);
            warn!(status, error = %err.message, "api download failed");
            return Err(ClientError::server(status, err.message));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Decodes a 2xx body into `T`. The backend reports some failures as
/// `{"success": false, "error": ...}` with a 2xx status; those become
/// `ClientError::Server`.
pub fn decode_envelope<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ClientError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| ClientError::InvalidResponse(format!("body is not json: {err}")))?;
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let err = ApiError::from_response(status, body);
        return Err(ClientError::server(status, err.message));
    }
    serde_json::from_value(value).map_err(|err| ClientError::InvalidResponse(err.to_string()))
}

/// Serializes `value` for display, falling back to `Debug` output.
pub fn to_pretty_json<T: Serialize + std::fmt::Debug>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| format!("{value:?}"))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
