use axum::http::HeaderMap;

// Identity used when no proxy header yields a caller address
pub const UNKNOWN_CLIENT: &str = "unknown";

// Resolves the caller identity from proxy headers. X-Forwarded-For wins
// (first non-empty hop), then X-Real-IP. Total function: absent or
// malformed headers degrade to "unknown" instead of failing the request.
pub fn resolve_client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded_for.to_str() {
            if let Some(ip) = value.split(',').map(str::trim).find(|s| !s.is_empty()) {
                return ip.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    UNKNOWN_CLIENT.to_string()
}
