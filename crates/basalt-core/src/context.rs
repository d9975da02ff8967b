use uuid::Uuid;

/// Per-request logging context.
///
/// Every top-level plugin operation creates one of these; the request name
/// and generated trace id travel through log lines and outbound HTTP
/// headers. This is the only observability available when debugging
/// interleaved runtime requests.
#[derive(Debug, Clone)]
pub struct ReqContext {
    /// Request name (e.g. "Create", "Mount")
    pub req: &'static str,
    /// Generated trace id, unique per request
    pub tid: String,
}

impl ReqContext {
    pub fn new(req: &'static str) -> Self {
        Self {
            req,
            tid: Uuid::new_v4().to_string(),
        }
    }
}

impl std::fmt::Display for ReqContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.req, self.tid)
    }
}
