// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    not_ready = { ErrorCode::NotReady, 503, "NOT_READY" },
    exited = { ErrorCode::Exited, 410, "EXITED" },
    unauthorized = { ErrorCode::Unauthorized, 401, "UNAUTHORIZED" },
    forbidden = { ErrorCode::Forbidden, 403, "FORBIDDEN" },
    bad_request = { ErrorCode::BadRequest, 400, "BAD_REQUEST" },
    not_found = { ErrorCode::NotFound, 404, "NOT_FOUND" },
    ambiguous = { ErrorCode::Ambiguous, 409, "AMBIGUOUS" },
    internal = { ErrorCode::Internal, 500, "INTERNAL" },
)]
fn codes_map_to_http(code: ErrorCode, status: u16, name: &str) {
    assert_eq!(code.http_status(), status);
    assert_eq!(code.as_str(), name);
    assert_eq!(code.to_string(), name);
}

#[test]
fn serializes_as_name() {
    let json = serde_json::to_string(&ErrorCode::Ambiguous).unwrap_or_default();
    assert_eq!(json, "\"Ambiguous\"");
}
