// ABOUTME: LTI 1.3 protocol constants: claim URIs, scopes, media types, and lifetimes
// ABOUTME: Shared by the launch handshake, registration, and the AGS/NRPS service clients
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Grouped by the IMS specification that defines them.

/// Token lifetimes in seconds
pub mod lifetimes {
    /// Login state token validity (10 minutes)
    pub const STATE_TOKEN_SECS: i64 = 600;
    /// Session token validity (24 hours), never renewed
    pub const SESSION_TOKEN_SECS: i64 = 86_400;
    /// Client assertion validity for the token endpoint (5 minutes)
    pub const CLIENT_ASSERTION_SECS: i64 = 300;
    /// Safety margin subtracted from `expires_in` before caching an access token
    pub const ACCESS_TOKEN_EXPIRY_MARGIN_SECS: u64 = 30;
    /// Key set responses may be cached this long by the LMS
    pub const JWKS_MAX_AGE_SECS: u64 = 3_600;
}

/// OIDC login and launch parameters
pub mod oidc {
    /// Authorization request `response_type`
    pub const RESPONSE_TYPE: &str = "id_token";
    /// Authorization request `response_mode`
    pub const RESPONSE_MODE: &str = "form_post";
    /// Authorization request `scope`
    pub const SCOPE: &str = "openid";
    /// Authorization request `prompt`
    pub const PROMPT: &str = "none";
    /// Only signature algorithm accepted or produced
    pub const SIGNING_ALG: &str = "RS256";
    /// Length of the login nonce in hex characters
    pub const NONCE_LENGTH: usize = 32;
}

/// LTI 1.3 core claim URIs
pub mod claims {
    /// `https://purl.imsglobal.org/spec/lti/claim/message_type`
    pub const MESSAGE_TYPE: &str = "https://purl.imsglobal.org/spec/lti/claim/message_type";
    /// Role URIs of the launching user
    pub const ROLES: &str = "https://purl.imsglobal.org/spec/lti/claim/roles";
    /// Course context
    pub const CONTEXT: &str = "https://purl.imsglobal.org/spec/lti/claim/context";
    /// Deployment identifier
    pub const DEPLOYMENT_ID: &str = "https://purl.imsglobal.org/spec/lti/claim/deployment_id";
    /// Target link URI of the launch
    pub const TARGET_LINK_URI: &str = "https://purl.imsglobal.org/spec/lti/claim/target_link_uri";
    /// Grade service endpoint claim
    pub const AGS_ENDPOINT: &str = "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint";
    /// Roster service claim
    pub const NRPS_SERVICE: &str =
        "https://purl.imsglobal.org/spec/lti-nrps/claim/namesroleservice";
}

/// OAuth2 client credentials with a JWT bearer assertion
pub mod oauth {
    /// `grant_type` for service access tokens
    pub const GRANT_TYPE_CLIENT_CREDENTIALS: &str = "client_credentials";
    /// `client_assertion_type` for signed assertions
    pub const CLIENT_ASSERTION_TYPE: &str =
        "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
}

/// Assignment and Grade Services
pub mod ags {
    /// Line item read/write
    pub const SCOPE_LINEITEM: &str = "https://purl.imsglobal.org/spec/lti-ags/scope/lineitem";
    /// Line item read only
    pub const SCOPE_LINEITEM_READONLY: &str =
        "https://purl.imsglobal.org/spec/lti-ags/scope/lineitem.readonly";
    /// Result read only
    pub const SCOPE_RESULT_READONLY: &str =
        "https://purl.imsglobal.org/spec/lti-ags/scope/result.readonly";
    /// Score publish
    pub const SCOPE_SCORE: &str = "https://purl.imsglobal.org/spec/lti-ags/scope/score";

    /// Full scope set requested before narrowing to score only
    pub const FULL_SCOPES: [&str; 4] = [
        SCOPE_LINEITEM,
        SCOPE_LINEITEM_READONLY,
        SCOPE_RESULT_READONLY,
        SCOPE_SCORE,
    ];

    /// Line item collection
    pub const MEDIA_TYPE_LINEITEM_CONTAINER: &str =
        "application/vnd.ims.lis.v2.lineitemcontainer+json";
    /// Single line item
    pub const MEDIA_TYPE_LINEITEM: &str = "application/vnd.ims.lis.v2.lineitem+json";
    /// Score submission
    pub const MEDIA_TYPE_SCORE: &str = "application/vnd.ims.lis.v1.score+json";
    /// Result collection
    pub const MEDIA_TYPE_RESULT_CONTAINER: &str =
        "application/vnd.ims.lis.v2.resultcontainer+json";

    /// Label for created line items when the assessment has no title
    pub const DEFAULT_LINE_ITEM_LABEL: &str = "Assessment Score";
    /// Sub-resource for score submission
    pub const SCORES_SUFFIX: &str = "/scores";
    /// Sub-resource for results listing
    pub const RESULTS_SUFFIX: &str = "/results";
}

/// Names and Role Provisioning Services
pub mod nrps {
    /// Roster read scope
    pub const SCOPE_MEMBERSHIP_READONLY: &str =
        "https://purl.imsglobal.org/spec/lti-nrps/scope/contextmembership.readonly";
    /// Membership container media type
    pub const MEDIA_TYPE_MEMBERSHIP_CONTAINER: &str =
        "application/vnd.ims.lti-nrps.v2.membershipcontainer+json";
    /// Default service version when the launch omits it
    pub const DEFAULT_SERVICE_VERSION: &str = "2.0";
    /// Role requested when the caller does not pick one
    pub const DEFAULT_ROLE: &str = "Learner";
    /// Role value that disables role filtering
    pub const ALL_ROLES: &str = "all";
    /// Member status considered active
    pub const STATUS_ACTIVE: &str = "Active";
    /// Default pagination ceiling
    pub const DEFAULT_MAX_PAGES: usize = 100;
}

/// LIS v2 membership role vocabulary
pub mod roles {
    /// Learner
    pub const LEARNER: &str = "http://purl.imsglobal.org/vocab/lis/v2/membership#Learner";
    /// Instructor
    pub const INSTRUCTOR: &str = "http://purl.imsglobal.org/vocab/lis/v2/membership#Instructor";
    /// Administrator
    pub const ADMINISTRATOR: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/membership#Administrator";
    /// Content developer
    pub const CONTENT_DEVELOPER: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/membership#ContentDeveloper";
    /// Mentor
    pub const MENTOR: &str = "http://purl.imsglobal.org/vocab/lis/v2/membership#Mentor";
    /// Manager
    pub const MANAGER: &str = "http://purl.imsglobal.org/vocab/lis/v2/membership#Manager";
    /// Officer
    pub const OFFICER: &str = "http://purl.imsglobal.org/vocab/lis/v2/membership#Officer";
    /// Member
    pub const MEMBER: &str = "http://purl.imsglobal.org/vocab/lis/v2/membership#Member";
    /// Observer
    pub const OBSERVER: &str = "http://purl.imsglobal.org/vocab/lis/v2/membership#Observer";
    /// Teaching assistant (Instructor sub-role)
    pub const TEACHING_ASSISTANT: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/membership/Instructor#TeachingAssistant";

    /// Case-insensitive short names accepted in place of a URN
    pub const SHORT_NAMES: &[(&str, &str)] = &[
        ("learner", LEARNER),
        ("student", LEARNER),
        ("instructor", INSTRUCTOR),
        ("teacher", INSTRUCTOR),
        ("administrator", ADMINISTRATOR),
        ("admin", ADMINISTRATOR),
        ("contentdeveloper", CONTENT_DEVELOPER),
        ("content developer", CONTENT_DEVELOPER),
        ("mentor", MENTOR),
        ("manager", MANAGER),
        ("officer", OFFICER),
        ("member", MEMBER),
        ("observer", OBSERVER),
        ("teachingassistant", TEACHING_ASSISTANT),
        ("teaching assistant", TEACHING_ASSISTANT),
        ("ta", TEACHING_ASSISTANT),
    ];
}

/// Dynamic registration
pub mod registration {
    /// LTI message type for resource link launches
    pub const MESSAGE_RESOURCE_LINK: &str = "LtiResourceLinkRequest";
    /// LTI message type for deep linking
    pub const MESSAGE_DEEP_LINKING: &str = "LtiDeepLinkingRequest";
    /// Message the close page posts to the LMS window
    pub const CLOSE_SUBJECT: &str = "org.imsglobal.lti.close";
    /// Claims requested in the registration document
    pub const REQUESTED_CLAIMS: [&str; 6] =
        ["iss", "sub", "name", "email", "given_name", "family_name"];
    /// Login initiation path on the public origin
    pub const LOGIN_PATH: &str = "/api/lti/login";
    /// Launch (redirect URI) path on the public origin
    pub const LAUNCH_PATH: &str = "/api/lti/launch";
    /// Key set path on the tool origin
    pub const KEYS_PATH: &str = "/api/lti/keys";
    /// Dashboard path the launch redirects to
    pub const DASHBOARD_PATH: &str = "/dashboard";
}
