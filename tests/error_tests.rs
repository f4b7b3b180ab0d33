// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use chatvibes_api::error::AppError;

#[test]
fn test_is_twitch_token_error_matches() {
    let err = AppError::TwitchApi(AppError::TWITCH_TOKEN_ERROR.to_string());
    assert!(err.is_twitch_token_error());

    let err = AppError::TwitchApi("HTTP 400 Bad Request: Invalid refresh token".to_string());
    assert!(err.is_twitch_token_error());

    let err = AppError::TwitchApi("invalid_grant".to_string());
    assert!(err.is_twitch_token_error());

    assert!(AppError::TwitchReauthRequired.is_twitch_token_error());
}

#[test]
fn test_is_twitch_token_error_no_match() {
    let err = AppError::TwitchApi("Twitch rate limit exceeded".to_string());
    assert!(!err.is_twitch_token_error());

    let err = AppError::TwitchApi("HTTP 500 Internal Server Error: oops".to_string());
    assert!(!err.is_twitch_token_error());

    let err = AppError::BadRequest("Bad Request".to_string());
    assert!(!err.is_twitch_token_error());
}

#[test]
fn test_status_codes() {
    let cases = [
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
        (AppError::InvalidToken, StatusCode::UNAUTHORIZED),
        (AppError::TwitchReauthRequired, StatusCode::UNAUTHORIZED),
        (AppError::Forbidden("no".into()), StatusCode::FORBIDDEN),
        (AppError::NotFound("gone".into()), StatusCode::NOT_FOUND),
        (AppError::BadRequest("bad".into()), StatusCode::BAD_REQUEST),
        (AppError::NotConfigured("off".into()), StatusCode::NOT_IMPLEMENTED),
        (AppError::TwitchApi("down".into()), StatusCode::BAD_GATEWAY),
        (AppError::TtsProvider("down".into()), StatusCode::BAD_GATEWAY),
        (AppError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        (
            AppError::Internal(anyhow::anyhow!("x")),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (err, expected) in cases {
        let label = err.to_string();
        assert_eq!(err.into_response().status(), expected, "{label}");
    }
}
