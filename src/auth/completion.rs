//! The completion marker an external login leaves in the landing URL.

use strum::{Display, EnumString};

use super::credential::Credential;
use crate::host::Location;

/// Outcome reported alongside the completion marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum LoginStatus {
    Success,
    AccessDenied,
}

/// A credential issued (or withheld) by the external login round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionMarker {
    Issued {
        credential: Credential,
        /// `redirect_uri` query parameter present on the landing URL.
        redirect_param: Option<String>,
    },
    /// The user signed in but lacks the scope the caller requested.
    Denied {
        required_scope: Option<String>,
        reason: Option<String>,
    },
}

const REDIRECT_PARAM: &str = "redirect_uri";
const MARKER_QUERY_PARAMS: &[&str] = &["login_status", "reason", "required_scope", REDIRECT_PARAM];

impl CompletionMarker {
    /// Look for a marker in the fragment of `location`.
    ///
    /// Accepts `access_token=` (and the older `token=`) with an optional
    /// `login_status`; `login_status=access_denied` wins over any token.
    pub fn detect(location: &Location) -> Option<Self> {
        location.fragment.as_ref()?;
        let status = location
            .fragment_param("login_status")
            .and_then(|value| value.parse::<LoginStatus>().ok());
        if status == Some(LoginStatus::AccessDenied) {
            return Some(Self::Denied {
                required_scope: location.fragment_param("required_scope"),
                reason: location.fragment_param("reason"),
            });
        }
        let token = location
            .fragment_param("access_token")
            .or_else(|| location.fragment_param("token"))
            .filter(|value| !value.trim().is_empty())?;
        Some(Self::Issued {
            credential: Credential::new(token),
            redirect_param: location.query_param(REDIRECT_PARAM),
        })
    }

    /// `location` as it should appear once the marker has been consumed.
    pub fn strip(location: Location) -> Location {
        location
            .without_fragment()
            .without_query_params(MARKER_QUERY_PARAMS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(url: &str) -> Location {
        Location::parse(url).unwrap()
    }

    #[test]
    fn detects_issued_credential() {
        let marker =
            CompletionMarker::detect(&at("/#access_token=abc&token_type=bearer&login_status=success"));
        assert_eq!(
            marker,
            Some(CompletionMarker::Issued {
                credential: Credential::new("abc"),
                redirect_param: None,
            })
        );
    }

    #[test]
    fn accepts_legacy_token_key_and_redirect_param() {
        let marker = CompletionMarker::detect(&at("/?redirect_uri=%2Fadmin%2Fusers#token=abc"));
        assert_eq!(
            marker,
            Some(CompletionMarker::Issued {
                credential: Credential::new("abc"),
                redirect_param: Some("/admin/users".to_string()),
            })
        );
    }

    #[test]
    fn detects_denial() {
        let marker = CompletionMarker::detect(&at(
            "/#login_status=access_denied&reason=scope_missing&required_scope=admin",
        ));
        assert_eq!(
            marker,
            Some(CompletionMarker::Denied {
                required_scope: Some("admin".to_string()),
                reason: Some("scope_missing".to_string()),
            })
        );
    }

    #[test]
    fn ignores_unrelated_fragments() {
        assert_eq!(CompletionMarker::detect(&at("/admin#section-2")), None);
        assert_eq!(CompletionMarker::detect(&at("/admin")), None);
        assert_eq!(CompletionMarker::detect(&at("/#access_token=")), None);
    }

    #[test]
    fn strip_removes_fragment_and_marker_params() {
        let stripped = CompletionMarker::strip(at(
            "/admin?tab=2&redirect_uri=%2Fx&login_status=success#access_token=abc",
        ));
        assert_eq!(stripped.to_string(), "/admin?tab=2");
    }
}
