use super::*;
use http::Method;

fn router() -> Router<&'static str> {
    let mut router = Router::new();
    router.insert(Method::GET, "/", "index");
    router.insert(Method::GET, "/users/:id", "get_user");
    router.insert(Method::DELETE, "/users/:id", "delete_user");
    router
}

#[test]
fn test_lookup_matched() {
    let router = router();
    match router.lookup(&Method::GET, "/users/42") {
        RouteOutcome::Matched { value, params } => {
            assert_eq!(*value, "get_user");
            assert_eq!(params.len(), 1);
            assert_eq!(params[0].1, "42");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn test_lookup_method_not_allowed() {
    let router = router();
    let outcome = router.lookup(&Method::POST, "/users/42");
    assert_eq!(outcome.status(), 405);
    match outcome {
        RouteOutcome::MethodNotAllowed { allowed } => {
            assert_eq!(allowed, vec![Method::DELETE, Method::GET]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn test_lookup_not_found() {
    let router = router();
    let outcome = router.lookup(&Method::GET, "/404");
    assert_eq!(outcome.status(), 404);
    assert!(matches!(outcome, RouteOutcome::NotFound));
}

#[test]
fn test_trailing_slash_is_ignored() {
    let router = router();
    assert!(matches!(
        router.lookup(&Method::GET, "/users/42/"),
        RouteOutcome::Matched { .. }
    ));
}
