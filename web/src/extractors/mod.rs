pub(crate) mod bearer_credentials;
pub(crate) mod explicit_session_id;

pub(crate) use bearer_credentials::BearerCredentials;
pub(crate) use explicit_session_id::ExplicitSessionId;
