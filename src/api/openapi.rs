//! OpenAPI document for every REST endpoint.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{conversations, credits, profiles, requests, sessions, system};
use crate::error::ErrorResponse;

/// Generated OpenAPI 3 document, served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "skillswap-gateway",
        description = "Peer-to-peer skill exchange: profiles, learning requests, sessions, credits, messaging and reviews."
    ),
    paths(
        system::health_handler,
        profiles::create_profile,
        profiles::get_me,
        profiles::update_me,
        profiles::replace_my_skills,
        profiles::list_profiles,
        profiles::get_profile,
        profiles::list_reviews,
        credits::list_skills,
        credits::top_up,
        credits::list_transactions,
        requests::send_request,
        requests::list_requests,
        requests::get_request,
        requests::accept_request,
        requests::reject_request,
        requests::cancel_request,
        sessions::book_ai_session,
        sessions::list_sessions,
        sessions::get_session,
        sessions::start_session,
        sessions::cancel_session,
        sessions::complete_session,
        sessions::create_review,
        conversations::open_conversation,
        conversations::list_conversations,
        conversations::list_messages,
        conversations::send_message,
        conversations::mark_read,
    ),
    components(schemas(ErrorResponse)),
    modifiers(&SecurityAddon),
    tags(
        (name = "System", description = "Health"),
        (name = "Profiles", description = "Member profiles and skills"),
        (name = "Skills", description = "Skill catalog"),
        (name = "Credits", description = "Balances and the credit ledger"),
        (name = "Requests", description = "Learning requests"),
        (name = "Sessions", description = "Booked sessions and settlement"),
        (name = "Reviews", description = "Post-session ratings"),
        (name = "Messaging", description = "Conversations and messages"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` JWT scheme referenced by `security(("bearer" = []))`.
#[derive(Debug)]
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_marketplace_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/v1/profiles",
            "/api/v1/requests/{id}/accept",
            "/api/v1/sessions/{id}/complete",
            "/api/v1/conversations/{id}/messages",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn document_registers_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let Some(components) = doc.components else {
            panic!("expected components");
        };
        assert!(components.security_schemes.contains_key("bearer"));
    }

    #[test]
    fn credits_are_documented_as_decimal_strings() {
        let Ok(doc) = serde_json::to_value(ApiDoc::openapi()) else {
            panic!("document does not serialize");
        };
        let credits = &doc["components"]["schemas"]["Credits"];
        assert_eq!(credits["type"], "string", "{credits}");
    }
}
