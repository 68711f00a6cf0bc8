// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{http::StatusCode, response::IntoResponse};
use vitals_tracker::error::AppError;
use vitals_tracker::models::Provider;

#[test]
fn test_requires_reauthorization_matches() {
    let err = AppError::ProviderAuth {
        provider: Provider::Whoop,
        message: "No valid Whoop token. Authorization required.".to_string(),
    };
    assert!(err.requires_reauthorization());

    let err = AppError::TokenExchange {
        provider: Provider::Oura,
        details: "invalid_grant".to_string(),
    };
    assert!(err.requires_reauthorization());
}

#[test]
fn test_requires_reauthorization_no_match() {
    let err = AppError::ProviderFetch {
        provider: Provider::Oura,
        message: "stress: HTTP 503".to_string(),
    };
    assert!(!err.requires_reauthorization());

    assert!(!AppError::InvalidState.requires_reauthorization());
    assert!(!AppError::Database("unavailable".to_string()).requires_reauthorization());
}

#[test]
fn test_error_messages_name_provider() {
    let err = AppError::ProviderAuth {
        provider: Provider::Oura,
        message: "Oura rejected the access token. Authorization required.".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Oura: Oura rejected the access token. Authorization required."
    );

    let err = AppError::TokenExchange {
        provider: Provider::Whoop,
        details: "HTTP 400".to_string(),
    };
    assert_eq!(err.to_string(), "Whoop token exchange failed: HTTP 400");
}

#[test]
fn test_status_codes() {
    let cases = [
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
        (AppError::BadRequest("days".into()), StatusCode::BAD_REQUEST),
        (
            AppError::UnsupportedProvider("fitbit".into()),
            StatusCode::BAD_REQUEST,
        ),
        (AppError::InvalidState, StatusCode::BAD_REQUEST),
        (
            AppError::TokenExchange {
                provider: Provider::Whoop,
                details: "x".into(),
            },
            StatusCode::BAD_GATEWAY,
        ),
        (
            AppError::ProviderFetch {
                provider: Provider::Oura,
                message: "x".into(),
            },
            StatusCode::BAD_GATEWAY,
        ),
        (
            AppError::Database("x".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (err, status) in cases {
        let label = err.to_string();
        assert_eq!(err.into_response().status(), status, "{}", label);
    }
}
