//! Splitting an HTTP/2 `:path` pseudo-header into gRPC service and method.

/// Splits `path` (an HTTP/2 `:path` value, e.g. `"/pkg.Service/Method"`)
/// into its service and method components.
///
/// This is a literal split on the first `/` after a mandatory leading
/// `/`, not a "fully qualified method name" parse: it does not validate
/// that `service` looks like a dotted package-qualified identifier, and a
/// path with more than two segments (`"/a/b/c"`) yields `("a", "b/c")`
/// rather than an error, matching the reference client's own permissive
/// behavior. Callers that need stricter validation must layer it on top.
#[must_use]
pub fn split_service_method(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix('/')?;
    let slash = rest.find('/')?;
    let (service, method) = rest.split_at(slash);
    let method = &method[1..];
    if service.is_empty() || method.is_empty() {
        return None;
    }
    Some((service, method))
}
