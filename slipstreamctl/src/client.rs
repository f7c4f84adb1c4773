//! HTTP client for the SlipStream REST API.

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use slipstream_core::module_path::MODULE_ROOT;
use slipstream_core::xml::{self, Listing};
use slipstream_core::{
    normalize_module_url, Module, NodeParameter, Result, Run, SlipStreamError, Usage,
    VirtualMachine,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::session::SessionStore;

/// Normalize a server URL by removing trailing slashes.
fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Validate an endpoint URL: only http and https are accepted.
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    if endpoint.is_empty() {
        return Err(SlipStreamError::Config(
            "Endpoint URL cannot be empty".to_string(),
        ));
    }

    let url = Url::parse(endpoint).map_err(|e| {
        SlipStreamError::Config(format!("Invalid endpoint URL '{}': {}", endpoint, e))
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(SlipStreamError::Config(format!(
            "Invalid URL scheme ({}). Only HTTP(S) URLs are allowed",
            scheme
        ))),
    }
}

fn transport(endpoint: &str, err: reqwest::Error) -> SlipStreamError {
    SlipStreamError::Transport(format!("request to {} failed: {}", endpoint, err))
}

/// Extract the run id from a run creation response.
///
/// The server answers with a `Location` header pointing at the new run. When
/// the redirect was followed, the final URL carries the same information.
fn run_id_from(response: &Response) -> Result<Uuid> {
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| response.url().path().to_string());

    let last = location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    Uuid::parse_str(last).map_err(|e| {
        SlipStreamError::Parse(format!(
            "run location {:?} does not end with a run id: {}",
            location, e
        ))
    })
}

/// Insert a form field, replacing an earlier field of the same name.
fn set_field(form: &mut Vec<(String, String)>, name: String, value: String) {
    match form.iter_mut().find(|(n, _)| *n == name) {
        Some(field) => field.1 = value,
        None => form.push((name, value)),
    }
}

/// HTTP client for the SlipStream server.
///
/// Every request goes through the shared [`SessionStore`], which supplies the
/// session cookie and is written back to disk after each response. Listings
/// are requested as XML and mapped lazily through [`Listing`].
#[derive(Debug, Clone)]
pub struct SlipStreamClient {
    client: Client,
    base_url: String,
    endpoint: Url,
    session: Arc<SessionStore>,
}

impl SlipStreamClient {
    /// Create a client for `endpoint`.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Base URL of the server (e.g., "https://slipstream.sixsq.com")
    /// * `session` - Cookie jar shared with the caller
    /// * `timeout_secs` - Request timeout in seconds
    /// * `insecure` - Skip TLS certificate verification
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not an http(s) URL or the HTTP
    /// client cannot be created.
    pub fn with_config(
        endpoint: &str,
        session: Arc<SessionStore>,
        timeout_secs: u64,
        insecure: bool,
    ) -> Result<Self> {
        let base_url = normalize_url(endpoint);
        let endpoint = parse_endpoint(&base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/xml"));

        if insecure {
            warn!("TLS certificate verification is disabled");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("slipstream-cli/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .cookie_provider(Arc::clone(&session))
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| SlipStreamError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            endpoint,
            session,
        })
    }

    /// Base endpoint without trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Whether a persisted session cookie exists for the endpoint.
    pub fn has_session(&self) -> bool {
        self.session.has_session_for(&self.endpoint)
    }

    /// Browser URL of a run.
    pub fn run_url(&self, run_id: &Uuid) -> String {
        format!("{}/run/{}", self.base_url, run_id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, persist the cookie jar and check the status code.
    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<Response> {
        trace!("Sending request to {}", endpoint);
        let response = request.send().await.map_err(|e| transport(endpoint, e))?;
        self.session.save()?;

        let status = response.status();
        debug!("{} answered {}", endpoint, status);

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SlipStreamError::Http {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
            body: body.trim().to_string(),
        })
    }

    async fn xml_get(&self, path: &str) -> Result<String> {
        let response = self.send(self.client.get(self.url(path)), path).await?;
        response.text().await.map_err(|e| transport(path, e))
    }

    /// Log in; the session cookie is captured by the jar.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let form = [("username", username), ("password", password)];
        self.send(self.client.post(self.url("/login")).form(&form), "/login")
            .await?;
        debug!("Logged in as {}", username);
        Ok(())
    }

    /// Log out on the server side.
    pub async fn logout(&self) -> Result<()> {
        self.send(self.client.get(self.url("/logout")), "/logout")
            .await?;
        Ok(())
    }

    /// Drop every persisted cookie scoped to the endpoint host.
    pub fn clear_session(&self) -> Result<usize> {
        match self.endpoint.host_str() {
            Some(host) => self.session.clear_host(host),
            None => Ok(0),
        }
    }

    /// List the application catalog.
    pub async fn list_applications(&self) -> Result<Listing<Module>> {
        let text = self.xml_get("/").await?;
        xml::applications(&text)
    }

    /// Children of the module at `url` (already normalized).
    ///
    /// An access-denied listing yields `None` so callers can skip the branch.
    async fn module_children(&self, url: &str) -> Result<Option<Listing<Module>>> {
        match self.xml_get(url).await {
            Ok(text) => xml::module_children(&text).map(Some),
            Err(e) if e.status() == Some(StatusCode::FORBIDDEN.as_u16()) => {
                debug!("Access denied for path: {}. Skipping.", url);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Walk the modules below `path` (the module root when `None`).
    ///
    /// With `recurse`, project children are descended into depth first.
    pub fn list_modules(&self, path: Option<&str>, recurse: bool) -> ModuleWalker<'_> {
        let url = path
            .map(normalize_module_url)
            .unwrap_or_else(|| MODULE_ROOT.to_string());
        debug!("Listing modules from {} (recurse: {})", url, recurse);

        ModuleWalker {
            client: self,
            recurse,
            pending: Some(url),
            stack: Vec::new(),
            done: false,
        }
    }

    /// Fetch a single module.
    pub async fn get_module(&self, path: &str) -> Result<Module> {
        let url = normalize_module_url(path);
        match self.xml_get(&url).await {
            Ok(text) => xml::module(&text),
            Err(e) => {
                if e.status() == Some(StatusCode::FORBIDDEN.as_u16()) {
                    warn!("Access denied for module {}", path);
                }
                Err(e)
            }
        }
    }

    /// List runs, active ones only unless `inactive` is set.
    pub async fn list_runs(&self, inactive: bool) -> Result<Listing<Run>> {
        let active_only = if inactive { "0" } else { "1" };
        let path = format!("/run?activeOnly={}", active_only);
        let text = self.xml_get(&path).await?;
        xml::runs(&text)
    }

    pub async fn list_virtual_machines(&self) -> Result<Listing<VirtualMachine>> {
        let text = self.xml_get("/vms").await?;
        xml::virtual_machines(&text)
    }

    /// Usage and quota per cloud.
    pub async fn usage(&self) -> Result<Listing<Usage>> {
        let text = self.xml_get("/dashboard").await?;
        xml::usage(&text)
    }

    async fn create_run(&self, form: Vec<(String, String)>) -> Result<Uuid> {
        trace!("Run request fields: {:?}", form);
        let response = self
            .send(self.client.post(self.url("/run")).form(&form), "/run")
            .await?;
        let run_id = run_id_from(&response)?;
        debug!("Created run {}", run_id);
        Ok(run_id)
    }

    fn single_image_form(kind: &str, path: &str, cloud: Option<&str>) -> Vec<(String, String)> {
        vec![
            ("type".to_string(), kind.to_string()),
            ("refqname".to_string(), path.to_string()),
            (
                "parameter--cloudservice".to_string(),
                cloud.unwrap_or("default").to_string(),
            ),
        ]
    }

    /// Build an image on `cloud` (the user's default cloud when `None`).
    pub async fn build_image(&self, path: &str, cloud: Option<&str>) -> Result<Uuid> {
        self.create_run(Self::single_image_form("Machine", path, cloud))
            .await
    }

    /// Run an image on `cloud` (the user's default cloud when `None`).
    pub async fn run_image(&self, path: &str, cloud: Option<&str>) -> Result<Uuid> {
        self.create_run(Self::single_image_form("Run", path, cloud))
            .await
    }

    /// Run a deployment with per-node parameters; a later parameter for the
    /// same node and key replaces an earlier one.
    pub async fn run_deployment(&self, path: &str, params: &[NodeParameter]) -> Result<Uuid> {
        let mut form = vec![("refqname".to_string(), path.to_string())];
        for param in params {
            set_field(&mut form, param.form_field(), param.value.clone());
        }
        self.create_run(form).await
    }

    /// Terminate a run; any 2xx answer is success.
    pub async fn terminate(&self, run_id: &Uuid) -> Result<()> {
        let path = format!("/run/{}", run_id);
        self.send(self.client.delete(self.url(&path)), &path)
            .await?;
        Ok(())
    }

    fn versioned_module_url(path: &str, version: Option<u64>) -> String {
        match version {
            Some(version) => normalize_module_url(&format!("{}/{}", path, version)),
            None => normalize_module_url(path),
        }
    }

    /// Publish a module version to the store.
    pub async fn publish(&self, path: &str, version: u64) -> Result<()> {
        let url = format!("{}/publish", Self::versioned_module_url(path, Some(version)));
        self.send(self.client.put(self.url(&url)), &url).await?;
        Ok(())
    }

    /// Remove a module version from the store.
    pub async fn unpublish(&self, path: &str, version: u64) -> Result<()> {
        let url = format!("{}/publish", Self::versioned_module_url(path, Some(version)));
        self.send(self.client.delete(self.url(&url)), &url).await?;
        Ok(())
    }

    /// Delete a module, or a single version of it.
    pub async fn delete_module(&self, path: &str, version: Option<u64>) -> Result<()> {
        let url = Self::versioned_module_url(path, version);
        self.send(self.client.delete(self.url(&url)), &url).await?;
        Ok(())
    }
}

/// Lazy pre-order walk over the module tree.
///
/// Child listings are fetched on demand, one request per visited project.
/// A branch the user may not read ends silently; any other failure is
/// yielded once and ends the walk.
#[derive(Debug)]
pub struct ModuleWalker<'a> {
    client: &'a SlipStreamClient,
    recurse: bool,
    pending: Option<String>,
    stack: Vec<Listing<Module>>,
    done: bool,
}

impl ModuleWalker<'_> {
    /// Next module in pre-order, `None` once the walk is over.
    pub async fn next(&mut self) -> Option<Result<Module>> {
        if self.done {
            return None;
        }

        if let Some(url) = self.pending.take() {
            match self.client.module_children(&url).await {
                Ok(Some(listing)) => self.stack.push(listing),
                Ok(None) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        loop {
            let item = self.stack.last_mut()?.next();
            match item {
                None => {
                    self.stack.pop();
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(module)) => {
                    if self.recurse && module.is_project() {
                        debug!("Recursing into path: {}", module.versioned_path());
                        self.pending = Some(normalize_module_url(&module.versioned_path()));
                    }
                    return Some(Ok(module));
                }
            }
        }
    }

    /// Drain the walk, failing on the first error.
    pub async fn try_collect(mut self) -> Result<Vec<Module>> {
        let mut modules = Vec::new();
        while let Some(module) = self.next().await {
            modules.push(module?);
        }
        Ok(modules)
    }
}
