//! Path templates with `:name` segments and HTTP mock lookup

use std::collections::HashMap;

use crate::config::HttpMockConfig;

/// Parameters bound by a successful path match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMatch {
    pub params: HashMap<String, String>,
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Match a request path against a template such as `/users/:id`.
///
/// Both sides are split into non-empty segments, so leading and trailing
/// slashes do not matter. `:name` segments bind anything; others must be equal.
pub fn match_path_pattern(pattern: &str, actual: &str) -> Option<PathMatch> {
    let expected = segments(pattern);
    let given = segments(actual);

    if expected.len() != given.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (want, got) in expected.iter().zip(given.iter()) {
        match want.strip_prefix(':') {
            Some(name) => {
                params.insert(name.to_string(), (*got).to_string());
            }
            None if want == got => {}
            None => return None,
        }
    }

    Some(PathMatch { params })
}

/// First mock, in configured order, whose method and path match.
///
/// A mock without a method matches every method.
pub fn find_http_mock<'a>(
    mocks: &'a [HttpMockConfig],
    method: &str,
    path: &str,
) -> Option<(usize, &'a HttpMockConfig, PathMatch)> {
    mocks.iter().enumerate().find_map(|(i, mock)| {
        if !mock.route.accepts(method) {
            return None;
        }
        match_path_pattern(&mock.route.path, path).map(|m| (i, mock, m))
    })
}
