//! Failure categories and the login-failure classifier.
//!
//! When login does not reach an authenticated page, the classifier reads the
//! portal's known error-banner locations and the page title and maps the text
//! onto an [`ErrorCategory`] so the final report can separate actionable
//! failures (bad credential) from transient ones (service unavailable).

use crate::driver::BrowserDriver;
use crate::naming::fold_text;
use crate::Selector;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Why a taxpayer's run did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    InvalidId,
    InvalidCredential,
    ExpiredCredential,
    CaptchaBlocked,
    AccountLocked,
    ConcurrentSession,
    ServiceUnavailable,
    LoginTimeout,
    NavigationFailure,
    ProcessingTimeout,
    Unclassified,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 11] = [
        ErrorCategory::InvalidId,
        ErrorCategory::InvalidCredential,
        ErrorCategory::ExpiredCredential,
        ErrorCategory::CaptchaBlocked,
        ErrorCategory::AccountLocked,
        ErrorCategory::ConcurrentSession,
        ErrorCategory::ServiceUnavailable,
        ErrorCategory::LoginTimeout,
        ErrorCategory::NavigationFailure,
        ErrorCategory::ProcessingTimeout,
        ErrorCategory::Unclassified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidId => "invalid-id",
            ErrorCategory::InvalidCredential => "invalid-credential",
            ErrorCategory::ExpiredCredential => "expired-credential",
            ErrorCategory::CaptchaBlocked => "captcha-blocked",
            ErrorCategory::AccountLocked => "account-locked",
            ErrorCategory::ConcurrentSession => "concurrent-session",
            ErrorCategory::ServiceUnavailable => "service-unavailable",
            ErrorCategory::LoginTimeout => "login-timeout",
            ErrorCategory::NavigationFailure => "navigation-failure",
            ErrorCategory::ProcessingTimeout => "processing-timeout",
            ErrorCategory::Unclassified => "unclassified",
        }
    }

    /// Human-readable label for reports
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidId => "Invalid tax ID",
            ErrorCategory::InvalidCredential => "Incorrect credential",
            ErrorCategory::ExpiredCredential => "Expired credential",
            ErrorCategory::CaptchaBlocked => "Blocked by captcha",
            ErrorCategory::AccountLocked => "Account locked",
            ErrorCategory::ConcurrentSession => "Another session is active",
            ErrorCategory::ServiceUnavailable => "Portal unavailable",
            ErrorCategory::LoginTimeout => "Login timed out",
            ErrorCategory::NavigationFailure => "Report screen unreachable",
            ErrorCategory::ProcessingTimeout => "Processing timed out",
            ErrorCategory::Unclassified => "Unclassified error",
        }
    }

    /// Sort key for remediation: the user can fix data problems first, then
    /// re-run timeouts, then chase system errors.
    pub fn fixability_rank(&self) -> u8 {
        match self {
            ErrorCategory::InvalidId => 0,
            ErrorCategory::InvalidCredential => 1,
            ErrorCategory::ExpiredCredential => 2,
            ErrorCategory::LoginTimeout => 3,
            ErrorCategory::ProcessingTimeout => 4,
            ErrorCategory::AccountLocked => 5,
            ErrorCategory::CaptchaBlocked => 6,
            ErrorCategory::ConcurrentSession => 7,
            ErrorCategory::ServiceUnavailable => 8,
            ErrorCategory::NavigationFailure => 9,
            ErrorCategory::Unclassified => 10,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown error category '{s}'"))
    }
}

/// Keyword table, checked in order; earlier entries win. Keywords are matched
/// against accent-folded, lower-cased text.
const BANNER_KEYWORDS: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::CaptchaBlocked,
        &["captcha", "no soy un robot", "not a robot"],
    ),
    (
        ErrorCategory::ExpiredCredential,
        &[
            "clave vencida",
            "clave expirada",
            "clave fiscal vencida",
            "debe cambiar su clave",
            "expired credential",
            "password expired",
            "credential has expired",
        ],
    ),
    (
        ErrorCategory::AccountLocked,
        &["bloquead", "account locked", "locked out", "inhabilitad"],
    ),
    (
        ErrorCategory::ConcurrentSession,
        &[
            "sesion activa",
            "otra sesion",
            "sesion abierta",
            "concurrent session",
            "already logged in",
        ],
    ),
    (
        ErrorCategory::InvalidId,
        &[
            "cuit incorrecto",
            "cuit invalido",
            "cuil incorrecto",
            "cuil invalido",
            "numero de cuit",
            "usuario inexistente",
            "invalid id",
            "invalid tax id",
            "unknown user",
        ],
    ),
    (
        ErrorCategory::InvalidCredential,
        &[
            "clave incorrecta",
            "contrasena incorrecta",
            "clave o usuario incorrecto",
            "usuario o clave incorrecto",
            "incorrect credential",
            "invalid credential",
            "invalid password",
            "wrong password",
        ],
    ),
    (
        ErrorCategory::ServiceUnavailable,
        &[
            "no disponible",
            "mantenimiento",
            "intente mas tarde",
            "service unavailable",
            "temporarily unavailable",
            "error 503",
            "502 bad gateway",
            "gateway timeout",
        ],
    ),
];

/// Map banner or title text onto a category, if any keyword matches.
pub fn classify_text(text: &str) -> Option<ErrorCategory> {
    let folded = fold_text(text);
    if folded.is_empty() {
        return None;
    }
    BANNER_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| folded.contains(k)))
        .map(|(category, _)| *category)
}

/// Evidence the classifier found on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: ErrorCategory,
    pub evidence: Option<String>,
}

/// Refine a login failure by reading the live page.
///
/// Banners are read first, then the title; `fallback` is used when neither
/// matches a known message.
pub async fn classify_login_failure(
    driver: &dyn BrowserDriver,
    banner_selectors: &[String],
    fallback: ErrorCategory,
) -> Classification {
    for raw in banner_selectors {
        let selector = Selector::from(raw);
        let Ok(banners) = driver.find_all(&selector).await else {
            continue;
        };
        for banner in banners {
            if !banner.is_displayed().await.unwrap_or(true) {
                continue;
            }
            let text = banner.text_or_empty().await;
            if text.is_empty() {
                continue;
            }
            debug!("Error banner at {}: {}", selector, text);
            if let Some(category) = classify_text(&text) {
                info!("Login failure classified as {} from banner", category);
                return Classification {
                    category,
                    evidence: Some(text),
                };
            }
        }
    }

    if let Ok(title) = driver.title().await {
        if let Some(category) = classify_text(&title) {
            info!("Login failure classified as {} from page title", category);
            return Classification {
                category,
                evidence: Some(title),
            };
        }
    }

    Classification {
        category: fallback,
        evidence: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_texts_map_to_categories() {
        assert_eq!(
            classify_text("Clave o usuario incorrecto"),
            Some(ErrorCategory::InvalidCredential)
        );
        assert_eq!(
            classify_text("Incorrect credential. Please try again."),
            Some(ErrorCategory::InvalidCredential)
        );
        assert_eq!(
            classify_text("El número de CUIT ingresado es inválido"),
            Some(ErrorCategory::InvalidId)
        );
        assert_eq!(
            classify_text("Su CLAVE FISCAL VENCIDA debe ser renovada"),
            Some(ErrorCategory::ExpiredCredential)
        );
        assert_eq!(
            classify_text("La cuenta se encuentra bloqueada"),
            Some(ErrorCategory::AccountLocked)
        );
        assert_eq!(
            classify_text("Ya existe una sesión activa para este usuario"),
            Some(ErrorCategory::ConcurrentSession)
        );
        assert_eq!(
            classify_text("Servicio no disponible momentáneamente"),
            Some(ErrorCategory::ServiceUnavailable)
        );
        assert_eq!(
            classify_text("Complete el captcha"),
            Some(ErrorCategory::CaptchaBlocked)
        );
    }

    #[test]
    fn expired_wins_over_generic_credential_wording() {
        assert_eq!(
            classify_text("Clave vencida: clave incorrecta para el periodo"),
            Some(ErrorCategory::ExpiredCredential)
        );
    }

    #[test]
    fn unknown_text_is_unclassified() {
        assert_eq!(classify_text("Bienvenido"), None);
        assert_eq!(classify_text("   "), None);
    }

    #[test]
    fn fixability_orders_data_errors_first() {
        let mut all = ErrorCategory::ALL.to_vec();
        all.sort_by_key(|c| c.fixability_rank());
        assert_eq!(
            &all[..5],
            &[
                ErrorCategory::InvalidId,
                ErrorCategory::InvalidCredential,
                ErrorCategory::ExpiredCredential,
                ErrorCategory::LoginTimeout,
                ErrorCategory::ProcessingTimeout,
            ]
        );
        assert_eq!(all.last(), Some(&ErrorCategory::Unclassified));
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for category in ErrorCategory::ALL {
            assert_eq!(category.as_str().parse::<ErrorCategory>(), Ok(category));
        }
        assert!("nope".parse::<ErrorCategory>().is_err());
    }
}
