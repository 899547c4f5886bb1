//! Route table: maps (path, method) pairs to handler functions.
//!
//! Two kinds of routes live side by side:
//!
//! - **Exact routes** ([`RouteTable::register`] and the `get`/`post`/… helpers)
//!   match the request path byte for byte. `/items/` is not `/items` and never
//!   matches `/items/42`.
//! - **Pattern routes** ([`RouteTable::register_pattern`]) compile `:name` and
//!   trailing `/*` segments and expose the captures on the
//!   [`Context`](crate::Context).
//!
//! Lookup tries the exact table first and then the patterns in registration
//! order. For either kind, registering the same key again replaces the
//! earlier handler.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Context, PathParams};
use crate::error::HandlerResult;
use crate::http::Method;

mod pattern;

pub use pattern::WILDCARD;
use pattern::Pattern;

/// Boxed future returned by a type-erased [`Handler`].
pub type BoxFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Type-erased, heap-allocated async handler.
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so a matched handler can be
/// cloned out of the table and run on its own task. You never construct
/// this type directly; pass any [`IntoHandler`] to the registration methods.
pub type Handler = Arc<dyn Fn(Context) -> BoxFuture + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = HandlerResult> + Send` that is
/// also `Send + Sync + 'static` implements this trait automatically.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> BoxFuture;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture {
        Box::pin((self)(ctx))
    }
}

/// The (path, method) pair an exact route is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub path: String,
    pub method: Method,
}

impl RouteKey {
    pub fn new(path: impl Into<String>, method: impl Into<Method>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
        }
    }
}

/// A successful lookup: the handler plus any captured path parameters.
pub struct RouteMatch {
    pub handler: Handler,
    pub params: PathParams,
}

struct PatternRoute {
    method: Method,
    source: String,
    pattern: Pattern,
    handler: Handler,
}

/// Maps route keys to handlers.
///
/// Built with `&mut` methods during setup; the server moves it behind an
/// [`Arc`] when it starts serving, after which it is read-only.
///
/// # Examples
///
/// ```rust
/// use nanoserver::{Context, Method, RouteTable, StatusCode};
///
/// let mut routes = RouteTable::new();
/// routes.register("/", "get", |ctx: Context| async move {
///     ctx.send_json_ok(&serde_json::json!({"message": "Hello from NanoServer!"}))
/// });
/// routes.register_pattern("/items/:id", Method::Get, |ctx: Context| async move {
///     let id = ctx.param("id").unwrap_or_default().to_owned();
///     ctx.send_json(&id, StatusCode::Ok)
/// });
///
/// assert!(routes.lookup("/", &Method::Get).is_some());
/// assert!(routes.lookup("/", &Method::Post).is_none());
/// let hit = routes.lookup("/items/42", &Method::Get).unwrap();
/// assert_eq!(hit.params.get("id"), Some("42"));
/// ```
#[derive(Default)]
pub struct RouteTable {
    exact: HashMap<RouteKey, Handler>,
    patterns: Vec<PatternRoute>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to the exact `(path, method)` key.
    ///
    /// Method names are upper-cased, so `"get"` and [`Method::Get`] are the
    /// same key. The path is stored verbatim. A previous handler for the
    /// same key is replaced.
    pub fn register(
        &mut self,
        path: impl Into<String>,
        method: impl Into<Method>,
        handler: impl IntoHandler,
    ) {
        let key = RouteKey::new(path, method);
        self.exact.insert(key, erase(handler));
    }

    /// Binds `handler` to a compiled path pattern (`/items/:id`, `/files/*`).
    ///
    /// Registering the same pattern string and method again replaces the
    /// handler and keeps the original position in the match order.
    pub fn register_pattern(
        &mut self,
        pattern: &str,
        method: impl Into<Method>,
        handler: impl IntoHandler,
    ) {
        let method = method.into();
        let handler = erase(handler);

        if let Some(route) = self
            .patterns
            .iter_mut()
            .find(|r| r.method == method && r.source == pattern)
        {
            route.handler = handler;
            return;
        }

        self.patterns.push(PatternRoute {
            method,
            source: pattern.to_owned(),
            pattern: Pattern::parse(pattern),
            handler,
        });
    }

    pub fn get(&mut self, path: impl Into<String>, handler: impl IntoHandler) {
        self.register(path, Method::Get, handler);
    }

    pub fn post(&mut self, path: impl Into<String>, handler: impl IntoHandler) {
        self.register(path, Method::Post, handler);
    }

    pub fn put(&mut self, path: impl Into<String>, handler: impl IntoHandler) {
        self.register(path, Method::Put, handler);
    }

    pub fn delete(&mut self, path: impl Into<String>, handler: impl IntoHandler) {
        self.register(path, Method::Delete, handler);
    }

    pub fn patch(&mut self, path: impl Into<String>, handler: impl IntoHandler) {
        self.register(path, Method::Patch, handler);
    }

    pub fn options(&mut self, path: impl Into<String>, handler: impl IntoHandler) {
        self.register(path, Method::Options, handler);
    }

    /// Finds the handler for `(target, method)`.
    ///
    /// `target` is the request target as sent. Exact routes compare it
    /// whole, query string included, so `/?x=1` does not match a route
    /// registered as `/`. Patterns only see the part before `?`.
    ///
    /// Exact routes win over patterns; patterns are tried in registration
    /// order and the first match is returned.
    pub fn lookup(&self, target: &str, method: &Method) -> Option<RouteMatch> {
        let key = RouteKey::new(target, method);
        if let Some(handler) = self.exact.get(&key) {
            return Some(RouteMatch {
                handler: Arc::clone(handler),
                params: PathParams::new(),
            });
        }

        let path = target.split_once('?').map_or(target, |(path, _)| path);
        self.patterns
            .iter()
            .filter(|route| &route.method == method)
            .find_map(|route| {
                let params = route.pattern.matches(path)?;
                Some(RouteMatch {
                    handler: Arc::clone(&route.handler),
                    params,
                })
            })
    }

    /// Number of registered routes of both kinds.
    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.patterns.is_empty()
    }
}

// Erase the concrete handler type and store it as a `Handler` trait object.
fn erase(handler: impl IntoHandler) -> Handler {
    Arc::new(move |ctx| handler.call(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ResponseWriter;
    use crate::http::{Request, StatusCode};

    fn context(method: &str, path: &str) -> (Context, ResponseWriter) {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (request, _) = Request::parse(raw.as_bytes()).unwrap();
        let writer = ResponseWriter::new();
        (Context::new(request, PathParams::new(), writer.clone()), writer)
    }

    fn replying(status: StatusCode) -> impl IntoHandler {
        move |ctx: Context| async move { ctx.send_json(&status.as_u16(), status) }
    }

    // Runs the matched handler and returns the status it wrote.
    async fn run(routes: &RouteTable, method: &str, path: &str) -> Option<StatusCode> {
        let (ctx, writer) = context(method, path);
        let hit = routes.lookup(ctx.path(), ctx.method())?;
        (hit.handler)(ctx).await.unwrap();
        writer.take().map(|r| r.status())
    }

    #[test]
    fn starts_empty() {
        let routes = RouteTable::new();
        assert!(routes.is_empty());
        assert_eq!(routes.len(), 0);
        assert!(routes.lookup("/", &Method::Get).is_none());
    }

    #[test]
    fn method_names_are_normalized() {
        let mut routes = RouteTable::new();
        routes.register("/items", "post", replying(StatusCode::Created));
        assert!(routes.lookup("/items", &Method::Post).is_some());
        assert!(routes.lookup("/items", &Method::Get).is_none());
    }

    #[test]
    fn exact_paths_are_not_normalized() {
        let mut routes = RouteTable::new();
        routes.get("/items/", replying(StatusCode::Ok));
        let hit = routes.lookup("/items/", &Method::Get).unwrap();
        assert!(hit.params.is_empty());
        assert!(routes.lookup("/items", &Method::Get).is_none());
        assert!(routes.lookup("/items/42", &Method::Get).is_none());
        assert!(routes.lookup("/Items/", &Method::Get).is_none());
    }

    #[test]
    fn query_string_is_part_of_the_exact_key() {
        let mut routes = RouteTable::new();
        routes.get("/", replying(StatusCode::Ok));
        routes.register_pattern("/items/:id", Method::Get, replying(StatusCode::Ok));
        assert!(routes.lookup("/?x=1", &Method::Get).is_none());
        let hit = routes.lookup("/items/5?verbose=1", &Method::Get).unwrap();
        assert_eq!(hit.params.get("id"), Some("5"));
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let mut routes = RouteTable::new();
        routes.get("/path", replying(StatusCode::Ok));
        routes.get("/path", replying(StatusCode::Accepted));
        assert_eq!(routes.len(), 1);
        assert_eq!(run(&routes, "GET", "/path").await, Some(StatusCode::Accepted));
    }

    #[tokio::test]
    async fn pattern_reregistration_replaces_in_place() {
        let mut routes = RouteTable::new();
        routes.register_pattern("/items/:id", Method::Get, replying(StatusCode::Ok));
        routes.register_pattern("/items/:id", "GET", replying(StatusCode::Gone));
        assert_eq!(routes.len(), 1);
        assert_eq!(run(&routes, "GET", "/items/1").await, Some(StatusCode::Gone));
    }

    #[tokio::test]
    async fn exact_beats_pattern() {
        let mut routes = RouteTable::new();
        routes.register_pattern("/items/:id", Method::Get, replying(StatusCode::Ok));
        routes.get("/items/special", replying(StatusCode::Accepted));
        assert_eq!(
            run(&routes, "GET", "/items/special").await,
            Some(StatusCode::Accepted)
        );
        assert_eq!(run(&routes, "GET", "/items/7").await, Some(StatusCode::Ok));
    }

    #[tokio::test]
    async fn first_matching_pattern_wins() {
        let mut routes = RouteTable::new();
        routes.register_pattern("/files/*", Method::Get, replying(StatusCode::Ok));
        routes.register_pattern("/files/:name", Method::Get, replying(StatusCode::Accepted));
        assert_eq!(run(&routes, "GET", "/files/a.txt").await, Some(StatusCode::Ok));
    }

    #[test]
    fn pattern_captures_are_returned() {
        let mut routes = RouteTable::new();
        routes.register_pattern("/users/:id/posts/:post", "get", replying(StatusCode::Ok));
        let hit = routes.lookup("/users/7/posts/99", &Method::Get).unwrap();
        assert_eq!(hit.params.len(), 2);
        assert_eq!(hit.params.get("id"), Some("7"));
        assert_eq!(hit.params.get("post"), Some("99"));
        assert!(routes.lookup("/users/7/posts/99", &Method::Delete).is_none());
    }

    #[test]
    fn method_helpers_register_exact_routes() {
        let mut routes = RouteTable::new();
        routes.get("/r", replying(StatusCode::Ok));
        routes.post("/r", replying(StatusCode::Ok));
        routes.put("/r", replying(StatusCode::Ok));
        routes.delete("/r", replying(StatusCode::Ok));
        routes.patch("/r", replying(StatusCode::Ok));
        routes.options("/r", replying(StatusCode::Ok));
        assert_eq!(routes.len(), 6);
        for method in [
            Method::Get,
            Method::Post,
            Method::Put,
            Method::Delete,
            Method::Patch,
            Method::Options,
        ] {
            assert!(routes.lookup("/r", &method).is_some(), "{method} missing");
        }
        assert!(routes.lookup("/r", &Method::Head).is_none());
    }
}
