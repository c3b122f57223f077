//! Blocking client for the FogBugz XML API.
//!
//! A session starts with endpoint discovery through `api.xml`, logs on, and
//! then loads every reference list into a [`ReferenceCache`]. All later calls
//! carry the session token as a query parameter. Reads are sent as GET,
//! mutations as POST form bodies.

use super::retry::RetryPolicy;
use super::{CaseStore, ReferenceCache, xml};
use crate::error::{MigrateError, Result};
use crate::model::{CaseFields, TargetCase, TargetStatus, marker_for};
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;
use tracing::{debug, info};

/// API version implemented by this client.
pub const SUPPORTED_API_VERSION: u32 = 3;

/// FogBugz category id for bugs.
const BUG_CATEGORY: u64 = 1;

/// Connection settings for one FogBugz installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSettings {
    /// URL of the installation's `api.xml` descriptor.
    pub url: String,
    pub user: String,
    pub password: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// The resolved API endpoint plus any query pairs the descriptor fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub query: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
}

impl Method {
    /// Whether a failed attempt may be sent again.
    ///
    /// A GET is repeated after any connection-level failure. A POST is only
    /// repeated when the connection was never established: an I/O error can
    /// arrive after the server has already applied the write.
    fn is_transient(self, err: &ureq::Error) -> bool {
        let ureq::Error::Transport(transport) = err else {
            return false;
        };
        matches!(
            (self, transport.kind()),
            (_, ureq::ErrorKind::ConnectionFailed) | (Self::Get, ureq::ErrorKind::Io)
        )
    }
}

/// An authenticated FogBugz session with its reference data.
pub struct FogBugzClient {
    agent: ureq::Agent,
    settings: TargetSettings,
    endpoint: Option<Endpoint>,
    token: Option<String>,
    cache: ReferenceCache,
}

impl std::fmt::Debug for FogBugzClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FogBugzClient")
            .field("url", &self.settings.url)
            .field("user", &self.settings.user)
            .field("endpoint", &self.endpoint)
            .field("logged_in", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl FogBugzClient {
    /// Log on and prefetch all reference data.
    ///
    /// # Errors
    ///
    /// Fails if discovery, logon or any reference list call fails.
    pub fn connect(settings: TargetSettings) -> Result<Self> {
        let agent = ureq::AgentBuilder::new().timeout(settings.timeout).build();
        let mut client = Self {
            agent,
            settings,
            endpoint: None,
            token: None,
            cache: ReferenceCache::new(),
        };
        client.login()?;
        client.load_references()?;
        Ok(client)
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.settings.user
    }

    /// Discover the endpoint and exchange credentials for a session token.
    ///
    /// Any existing session is logged off first.
    ///
    /// # Errors
    ///
    /// Fails if the descriptor requires a newer API version than
    /// [`SUPPORTED_API_VERSION`] or logon reports an error.
    pub fn login(&mut self) -> Result<()> {
        self.logout()?;

        let descriptor_body = self.fetch_descriptor()?;
        let descriptor = xml::parse_api_descriptor(&descriptor_body)?;
        debug!(
            url = %self.settings.url,
            version = descriptor.version,
            min_version = descriptor.min_version,
            api_url = %descriptor.url,
            "Read API descriptor"
        );
        check_api_version(&descriptor)?;
        self.endpoint = Some(resolve_endpoint(&self.settings.url, &descriptor.url)?);

        let body = self.execute(
            "logon",
            Method::Get,
            vec![
                ("email", self.settings.user.clone()),
                ("password", self.settings.password.clone()),
            ],
        )?;
        self.token = Some(xml::parse_token(&body)?);
        info!(user = %self.settings.user, "Logged in to FogBugz");
        Ok(())
    }

    /// Invalidate the session token. A no-op when not logged in.
    ///
    /// # Errors
    ///
    /// Fails if the logoff request itself fails.
    pub fn logout(&mut self) -> Result<()> {
        if self.token.is_none() {
            return Ok(());
        }
        let body = self.execute("logoff", Method::Get, Vec::new())?;
        self.token = None;
        xml::check_response("logoff", &body)?;
        debug!(user = %self.settings.user, "Logged off");
        Ok(())
    }

    fn load_references(&mut self) -> Result<()> {
        let mut cache = ReferenceCache::new();

        let body = self.execute("listProjects", Method::Get, Vec::new())?;
        xml::parse_projects(&body, &mut cache)?;
        let body = self.execute("listAreas", Method::Get, Vec::new())?;
        xml::parse_areas(&body, &mut cache)?;
        let body = self.execute(
            "listFixFors",
            Method::Get,
            vec![("fIncludeDeleted", "1".to_string())],
        )?;
        xml::parse_fix_fors(&body, &mut cache)?;
        let body = self.execute("listPriorities", Method::Get, Vec::new())?;
        xml::parse_priorities(&body, &mut cache)?;
        let body = self.execute(
            "listPeople",
            Method::Get,
            vec![
                ("fIncludeNormal", "1".to_string()),
                ("fIncludeVirtual", "1".to_string()),
                ("fIncludeDeleted", "1".to_string()),
            ],
        )?;
        xml::parse_people(&body, &mut cache)?;
        let body = self.execute("listStatuses", Method::Get, Vec::new())?;
        xml::parse_statuses(&body, &mut cache)?;

        info!(references = %cache.summary(), "Loaded FogBugz reference data");
        self.cache = cache;
        Ok(())
    }

    fn fetch_descriptor(&self) -> Result<String> {
        const OP: &str = "api.xml";
        let url = &self.settings.url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(MigrateError::Config(format!(
                "API URL {url} must use the http or https scheme"
            )));
        }
        self.settings
            .retry
            .run(OP, |e| Method::Get.is_transient(e), || {
                self.agent.get(url).call()?.into_string().map_err(Into::into)
            })
            .map_err(|e| http_error(OP, &e))
    }

    /// Send one command and return the raw response body.
    fn execute(
        &self,
        command: &str,
        method: Method,
        params: Vec<(&str, String)>,
    ) -> Result<String> {
        let endpoint = self.endpoint.as_ref().ok_or(MigrateError::NotLoggedIn)?;
        debug!(command, ?method, endpoint = %endpoint.url, "Sending request");

        self.settings
            .retry
            .run(command, |e| method.is_transient(e), || {
                let request = match method {
                    Method::Get => self.agent.get(&endpoint.url),
                    Method::Post => self.agent.post(&endpoint.url),
                };
                let mut request = endpoint
                    .query
                    .iter()
                    .fold(request, |req, (key, value)| req.query(key, value))
                    .query("cmd", command);
                if let Some(token) = &self.token {
                    request = request.query("token", token);
                }

                let response = match method {
                    Method::Get => params
                        .iter()
                        .fold(request, |req, (key, value)| req.query(key, value))
                        .call()?,
                    Method::Post => {
                        let form: Vec<(&str, &str)> =
                            params.iter().map(|(k, v)| (*k, v.as_str())).collect();
                        request.send_form(&form)?
                    }
                };
                response.into_string().map_err(Into::into)
            })
            .map_err(|e| http_error(command, &e))
    }

    fn mutate(&self, command: &str, params: Vec<(&str, String)>) -> Result<String> {
        let body = self.execute(command, Method::Post, params)?;
        xml::check_response(command, &body)?;
        Ok(body)
    }
}

impl CaseStore for FogBugzClient {
    fn references(&self) -> &ReferenceCache {
        &self.cache
    }

    fn find_by_marker(&self, source_id: u64) -> Result<Option<TargetCase>> {
        let query = format!("computer:\"{}\"", marker_for(source_id));
        let body = self.execute(
            "search",
            Method::Get,
            vec![("q", query), ("cols", xml::CASE_COLUMNS.join(","))],
        )?;
        let found = xml::parse_search(source_id, &body)?;
        match &found {
            Some(case) => debug!(source_id, case_id = case.id, "Found migrated case"),
            None => debug!(source_id, "No migrated case found"),
        }
        Ok(found)
    }

    fn create_case(&mut self, fields: &CaseFields, opening_comment: &str) -> Result<u64> {
        let mut params = field_params(fields);
        params.push(("ixCategory", BUG_CATEGORY.to_string()));
        params.push(("dt", format_date(fields.opened)));
        params.push(("sEvent", opening_comment.to_string()));

        let body = self.mutate("new", params)?;
        let case_id = xml::parse_new_case(&body)?;
        info!(case_id, marker = %fields.marker, "Created case");
        Ok(case_id)
    }

    fn update_case(&mut self, case_id: u64, fields: &CaseFields, comment: &str) -> Result<()> {
        let mut params = vec![("ixBug", case_id.to_string())];
        params.extend(field_params(fields));
        params.push(("sEvent", comment.to_string()));
        self.mutate("edit", params)?;
        info!(case_id, "Updated case");
        Ok(())
    }

    fn append_note(&mut self, case_id: u64, note: &str) -> Result<()> {
        self.mutate(
            "edit",
            vec![
                ("ixBug", case_id.to_string()),
                ("sEvent", note.to_string()),
            ],
        )?;
        debug!(case_id, "Appended note");
        Ok(())
    }

    fn resolve_as_status(
        &mut self,
        case_id: u64,
        status: &TargetStatus,
        as_of: DateTime<Utc>,
    ) -> Result<()> {
        self.mutate(
            "resolve",
            vec![
                ("ixBug", case_id.to_string()),
                ("ixStatus", status.id.to_string()),
                ("sEvent", resolution_note(status, as_of, None)),
            ],
        )?;
        info!(case_id, status = %status.name, "Resolved case");
        Ok(())
    }

    fn resolve_as_duplicate(
        &mut self,
        case_id: u64,
        status: &TargetStatus,
        as_of: DateTime<Utc>,
        duplicate_of_case: u64,
    ) -> Result<()> {
        self.mutate(
            "resolve",
            vec![
                ("ixBug", case_id.to_string()),
                ("ixStatus", status.id.to_string()),
                ("ixBugOriginal", duplicate_of_case.to_string()),
                (
                    "sEvent",
                    resolution_note(status, as_of, Some(duplicate_of_case)),
                ),
            ],
        )?;
        info!(case_id, duplicate_of_case, "Resolved case as duplicate");
        Ok(())
    }

    fn reassign(&mut self, case_id: u64, owner_id: u64, comment: &str) -> Result<()> {
        self.mutate(
            "assign",
            vec![
                ("ixBug", case_id.to_string()),
                ("ixPersonAssignedTo", owner_id.to_string()),
                ("sEvent", comment.to_string()),
            ],
        )?;
        info!(case_id, owner_id, "Reassigned case");
        Ok(())
    }

    fn close(&mut self, case_id: u64) -> Result<()> {
        self.mutate("close", vec![("ixBug", case_id.to_string())])?;
        info!(case_id, "Closed case");
        Ok(())
    }
}

impl Drop for FogBugzClient {
    fn drop(&mut self) {
        if let Err(err) = self.logout() {
            debug!(error = %err, "Logoff on drop failed");
        }
    }
}

/// Fail when the installation no longer speaks the API version implemented here.
///
/// # Errors
///
/// Returns [`MigrateError::UnsupportedApiVersion`].
pub fn check_api_version(descriptor: &xml::ApiDescriptor) -> Result<()> {
    if descriptor.min_version > SUPPORTED_API_VERSION {
        return Err(MigrateError::UnsupportedApiVersion {
            min_version: descriptor.min_version,
            supported: SUPPORTED_API_VERSION,
        });
    }
    Ok(())
}

/// Resolve the descriptor's relative endpoint against the descriptor URL's origin.
///
/// `https://bugs.example.com/fogbugz/api.xml` with `api.asp?` resolves to
/// `https://bugs.example.com/api.asp`.
///
/// # Errors
///
/// Fails if the descriptor URL has no `scheme://host` part.
pub fn resolve_endpoint(descriptor_url: &str, relative: &str) -> Result<Endpoint> {
    let (scheme, rest) = descriptor_url
        .split_once("://")
        .ok_or_else(|| MigrateError::Config(format!("API URL {descriptor_url} has no scheme")))?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if authority.is_empty() {
        return Err(MigrateError::Config(format!(
            "API URL {descriptor_url} has no host"
        )));
    }

    let (path, query) = relative.trim().split_once('?').unwrap_or((relative.trim(), ""));
    let query = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.to_string(), value.to_string())
        })
        .collect();

    Ok(Endpoint {
        url: format!("{scheme}://{authority}/{}", path.trim_start_matches('/')),
        query,
    })
}

fn http_error(operation: &str, err: &ureq::Error) -> MigrateError {
    MigrateError::Http {
        operation: operation.to_string(),
        message: err.to_string(),
    }
}

fn field_params(fields: &CaseFields) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("sTitle", fields.title.clone()),
        ("ixProject", fields.project_id.to_string()),
        ("ixArea", fields.area_id.to_string()),
        ("ixPriority", fields.priority_id.to_string()),
        ("ixPersonAssignedTo", fields.assigned_to_id.to_string()),
        ("sVersion", fields.version.clone()),
        ("sComputer", fields.marker.clone()),
    ];
    if let Some(fix_for_id) = fields.fix_for_id {
        params.push(("ixFixFor", fix_for_id.to_string()));
    }
    params
}

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn resolution_note(status: &TargetStatus, as_of: DateTime<Utc>, duplicate_of: Option<u64>) -> String {
    let mut note = format!(
        "Resolved as {} in Bugzilla on {}.",
        status.name,
        as_of.format("%Y-%m-%d %H:%M UTC")
    );
    if let Some(case_id) = duplicate_of {
        note.push_str(&format!(" Duplicate of case {case_id}."));
    }
    note
}
