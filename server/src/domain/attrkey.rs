//! Canonical attribute keys
//!
//! Every filter, group and column directive addresses span data through these keys.
//! Keys prefixed with `_` are span intrinsics backed by dedicated index columns; the
//! rest follow semantic conventions and live in the span attributes.
//!
//! Unknown keys are valid: they are treated as opaque attributes.

use std::sync::LazyLock;

use rustc_hash::FxHashMap;

// =============================================================================
// Alerts
// =============================================================================

pub const ALERT_TYPE: &str = "alert_type";
pub const ALERT_STATUS: &str = "alert_status";

// =============================================================================
// Span intrinsics
// =============================================================================

pub const SPAN_SYSTEM: &str = "_system";
pub const SPAN_GROUP_ID: &str = "_group_id";

pub const SPAN_ID: &str = "_id";
pub const SPAN_PARENT_ID: &str = "_parent_id";
pub const SPAN_TRACE_ID: &str = "_trace_id";

pub const SPAN_NAME: &str = "_name";
pub const SPAN_EVENT_NAME: &str = "_event_name";
pub const SPAN_IS_EVENT: &str = "_is_event";

pub const SPAN_KIND: &str = "_kind";
pub const SPAN_TIME: &str = "_time";
pub const SPAN_DURATION: &str = "_duration";

pub const SPAN_STATUS_CODE: &str = "_status_code";
pub const SPAN_STATUS_MESSAGE: &str = "_status_message";

pub const SPAN_LINK_COUNT: &str = "_link_count";
pub const SPAN_EVENT_COUNT: &str = "_event_count";
pub const SPAN_EVENT_ERROR_COUNT: &str = "_event_error_count";
pub const SPAN_EVENT_LOG_COUNT: &str = "_event_log_count";

// =============================================================================
// Derived span metrics
// =============================================================================

pub const SPAN_COUNT: &str = "_count";
pub const SPAN_COUNT_PER_MIN: &str = "per_min(_count)";
pub const SPAN_ERROR_COUNT: &str = "_error_count";
pub const SPAN_ERROR_RATE: &str = "_error_rate";

// =============================================================================
// Resource identity
// =============================================================================

pub const DISPLAY_NAME: &str = "display_name";

pub const TELEMETRY_SDK_NAME: &str = "telemetry_sdk_name";
pub const TELEMETRY_SDK_VERSION: &str = "telemetry_sdk_version";
pub const TELEMETRY_SDK_LANGUAGE: &str = "telemetry_sdk_language";
pub const TELEMETRY_AUTO_VERSION: &str = "telemetry_auto_version";

pub const OTEL_LIBRARY_NAME: &str = "otel_library_name";
pub const OTEL_LIBRARY_VERSION: &str = "otel_library_version";

pub const DEPLOYMENT_ENVIRONMENT: &str = "deployment_environment";

pub const SERVICE_NAME: &str = "service_name";
pub const SERVICE_VERSION: &str = "service_version";
pub const SERVICE_NAMESPACE: &str = "service_namespace";
pub const SERVICE_INSTANCE_ID: &str = "service_instance_id";
pub const PEER_SERVICE: &str = "peer_service";

// =============================================================================
// Host
// =============================================================================

pub const HOST_ID: &str = "host_id";
pub const HOST_NAME: &str = "host_name";
pub const HOST_TYPE: &str = "host_type";
pub const HOST_ARCH: &str = "host_arch";
pub const HOST_IMAGE_NAME: &str = "host_image_name";
pub const HOST_IMAGE_ID: &str = "host_image_id";
pub const HOST_IMAGE_VERSION: &str = "host_image_version";

// =============================================================================
// Network
// =============================================================================

pub const SERVER_ADDRESS: &str = "server_address";
pub const SERVER_PORT: &str = "server_port";
pub const SERVER_SOCKET_DOMAIN: &str = "server_socket_domain";
pub const SERVER_SOCKET_ADDRESS: &str = "server_socket_address";
pub const SERVER_SOCKET_PORT: &str = "server_socket_port";

pub const CLIENT_ADDRESS: &str = "client_address";
pub const CLIENT_PORT: &str = "client_port";
pub const CLIENT_SOCKET_ADDRESS: &str = "client_socket_address";
pub const CLIENT_SOCKET_PORT: &str = "client_socket_port";

// =============================================================================
// URL / HTTP / RPC
// =============================================================================

pub const URL_SCHEME: &str = "url_scheme";
pub const URL_FULL: &str = "url_full";
pub const URL_PATH: &str = "url_path";
pub const URL_QUERY: &str = "url_query";
pub const URL_FRAGMENT: &str = "url_fragment";

pub const HTTP_REQUEST_METHOD: &str = "http_request_method";
pub const HTTP_REQUEST_BODY_SIZE: &str = "http_request_body_size";
pub const HTTP_RESPONSE_BODY_SIZE: &str = "http_response_body_size";
pub const HTTP_RESPONSE_STATUS_CODE: &str = "http_response_status_code";
pub const HTTP_RESPONSE_STATUS_CLASS: &str = "http_response_status_class";
pub const HTTP_ROUTE: &str = "http_route";

pub const RPC_SYSTEM: &str = "rpc_system";
pub const RPC_SERVICE: &str = "rpc_service";
pub const RPC_METHOD: &str = "rpc_method";

// =============================================================================
// User agent / end user
// =============================================================================

pub const USER_AGENT_ORIGINAL: &str = "user_agent_original";
pub const USER_AGENT_NAME: &str = "user_agent_name";
pub const USER_AGENT_VERSION: &str = "user_agent_version";
pub const USER_AGENT_OS_NAME: &str = "user_agent_os_name";
pub const USER_AGENT_OS_VERSION: &str = "user_agent_os_version";
pub const USER_AGENT_DEVICE: &str = "user_agent_device";
pub const USER_AGENT_IS_BOT: &str = "user_agent_is_bot";

pub const ENDUSER_ID: &str = "enduser_id";
pub const ENDUSER_ROLE: &str = "enduser_role";
pub const ENDUSER_SCOPE: &str = "enduser_scope";

// =============================================================================
// Database
// =============================================================================

pub const DB_SYSTEM: &str = "db_system";
pub const DB_NAME: &str = "db_name";
pub const DB_STATEMENT: &str = "db_statement";
pub const DB_OPERATION: &str = "db_operation";
pub const DB_SQL_TABLE: &str = "db_sql_table";

// =============================================================================
// Logs / exceptions / code
// =============================================================================

pub const LOG_MESSAGE: &str = "log_message";
pub const LOG_SEVERITY: &str = "log_severity";
pub const LOG_SEVERITY_NUMBER: &str = "log_severity_number";
pub const LOG_SOURCE: &str = "log_source";
pub const LOG_FILE_PATH: &str = "log_file_path";
pub const LOG_FILE_NAME: &str = "log_file_name";

pub const EXCEPTION_TYPE: &str = "exception_type";
pub const EXCEPTION_MESSAGE: &str = "exception_message";
pub const EXCEPTION_STACKTRACE: &str = "exception_stacktrace";

pub const CODE_FUNCTION: &str = "code_function";
pub const CODE_FILEPATH: &str = "code_filepath";

// =============================================================================
// Messaging
// =============================================================================

pub const MESSAGING_SYSTEM: &str = "messaging_system";
pub const MESSAGING_OPERATION: &str = "messaging_operation";
pub const MESSAGING_DESTINATION_NAME: &str = "messaging_destination_name";
pub const MESSAGING_DESTINATION_KIND: &str = "messaging_destination_kind";
pub const MESSAGING_DESTINATION_TEMPORARY: &str = "messaging_destination_temporary";
pub const MESSAGING_MESSAGE_ID: &str = "messaging_message_id";
pub const MESSAGING_MESSAGE_TYPE: &str = "messaging_message_type";
pub const MESSAGING_MESSAGE_PAYLOAD_SIZE_BYTES: &str = "messaging_message_payload_size_bytes";
pub const MESSAGING_MESSAGE_PAYLOAD_COMPRESSED_SIZE_BYTES: &str =
    "messaging_message_payload_compressed_size_bytes";

// =============================================================================
// Cloud
// =============================================================================

pub const CLOUD_PROVIDER: &str = "cloud_provider";
pub const CLOUD_ACCOUNT_ID: &str = "cloud_account_id";
pub const CLOUD_REGION: &str = "cloud_region";
pub const CLOUD_RESOURCE_ID: &str = "cloud_resource_id";
pub const CLOUD_AVAILABILITY_ZONE: &str = "cloud_availability_zone";
pub const CLOUD_PLATFORM: &str = "cloud_platform";

/// Vocabulary a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCategory {
    Alert,
    /// Stored in a dedicated index column
    SpanIntrinsic,
    /// Computed by aggregation, never stored
    SpanMetric,
    Resource,
    Service,
    Host,
    Network,
    Http,
    Rpc,
    UserAgent,
    Enduser,
    Database,
    Log,
    Exception,
    Code,
    Messaging,
    Cloud,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    pub key: &'static str,
    pub category: KeyCategory,
}

const KEYS: &[(&str, KeyCategory)] = {
    use KeyCategory::*;
    &[
        (ALERT_TYPE, Alert),
        (ALERT_STATUS, Alert),
        (SPAN_SYSTEM, SpanIntrinsic),
        (SPAN_GROUP_ID, SpanIntrinsic),
        (SPAN_ID, SpanIntrinsic),
        (SPAN_PARENT_ID, SpanIntrinsic),
        (SPAN_TRACE_ID, SpanIntrinsic),
        (SPAN_NAME, SpanIntrinsic),
        (SPAN_EVENT_NAME, SpanIntrinsic),
        (SPAN_IS_EVENT, SpanIntrinsic),
        (SPAN_KIND, SpanIntrinsic),
        (SPAN_TIME, SpanIntrinsic),
        (SPAN_DURATION, SpanIntrinsic),
        (SPAN_STATUS_CODE, SpanIntrinsic),
        (SPAN_STATUS_MESSAGE, SpanIntrinsic),
        (SPAN_LINK_COUNT, SpanIntrinsic),
        (SPAN_EVENT_COUNT, SpanIntrinsic),
        (SPAN_EVENT_ERROR_COUNT, SpanIntrinsic),
        (SPAN_EVENT_LOG_COUNT, SpanIntrinsic),
        (SPAN_COUNT, SpanMetric),
        (SPAN_COUNT_PER_MIN, SpanMetric),
        (SPAN_ERROR_COUNT, SpanMetric),
        (SPAN_ERROR_RATE, SpanMetric),
        (DISPLAY_NAME, Resource),
        (TELEMETRY_SDK_NAME, Resource),
        (TELEMETRY_SDK_VERSION, Resource),
        (TELEMETRY_SDK_LANGUAGE, Resource),
        (TELEMETRY_AUTO_VERSION, Resource),
        (OTEL_LIBRARY_NAME, Resource),
        (OTEL_LIBRARY_VERSION, Resource),
        (DEPLOYMENT_ENVIRONMENT, Resource),
        (SERVICE_NAME, Service),
        (SERVICE_VERSION, Service),
        (SERVICE_NAMESPACE, Service),
        (SERVICE_INSTANCE_ID, Service),
        (PEER_SERVICE, Service),
        (HOST_ID, Host),
        (HOST_NAME, Host),
        (HOST_TYPE, Host),
        (HOST_ARCH, Host),
        (HOST_IMAGE_NAME, Host),
        (HOST_IMAGE_ID, Host),
        (HOST_IMAGE_VERSION, Host),
        (SERVER_ADDRESS, Network),
        (SERVER_PORT, Network),
        (SERVER_SOCKET_DOMAIN, Network),
        (SERVER_SOCKET_ADDRESS, Network),
        (SERVER_SOCKET_PORT, Network),
        (CLIENT_ADDRESS, Network),
        (CLIENT_PORT, Network),
        (CLIENT_SOCKET_ADDRESS, Network),
        (CLIENT_SOCKET_PORT, Network),
        (URL_SCHEME, Http),
        (URL_FULL, Http),
        (URL_PATH, Http),
        (URL_QUERY, Http),
        (URL_FRAGMENT, Http),
        (HTTP_REQUEST_METHOD, Http),
        (HTTP_REQUEST_BODY_SIZE, Http),
        (HTTP_RESPONSE_BODY_SIZE, Http),
        (HTTP_RESPONSE_STATUS_CODE, Http),
        (HTTP_RESPONSE_STATUS_CLASS, Http),
        (HTTP_ROUTE, Http),
        (RPC_SYSTEM, Rpc),
        (RPC_SERVICE, Rpc),
        (RPC_METHOD, Rpc),
        (USER_AGENT_ORIGINAL, UserAgent),
        (USER_AGENT_NAME, UserAgent),
        (USER_AGENT_VERSION, UserAgent),
        (USER_AGENT_OS_NAME, UserAgent),
        (USER_AGENT_OS_VERSION, UserAgent),
        (USER_AGENT_DEVICE, UserAgent),
        (USER_AGENT_IS_BOT, UserAgent),
        (ENDUSER_ID, Enduser),
        (ENDUSER_ROLE, Enduser),
        (ENDUSER_SCOPE, Enduser),
        (DB_SYSTEM, Database),
        (DB_NAME, Database),
        (DB_STATEMENT, Database),
        (DB_OPERATION, Database),
        (DB_SQL_TABLE, Database),
        (LOG_MESSAGE, Log),
        (LOG_SEVERITY, Log),
        (LOG_SEVERITY_NUMBER, Log),
        (LOG_SOURCE, Log),
        (LOG_FILE_PATH, Log),
        (LOG_FILE_NAME, Log),
        (EXCEPTION_TYPE, Exception),
        (EXCEPTION_MESSAGE, Exception),
        (EXCEPTION_STACKTRACE, Exception),
        (CODE_FUNCTION, Code),
        (CODE_FILEPATH, Code),
        (MESSAGING_SYSTEM, Messaging),
        (MESSAGING_OPERATION, Messaging),
        (MESSAGING_DESTINATION_NAME, Messaging),
        (MESSAGING_DESTINATION_KIND, Messaging),
        (MESSAGING_DESTINATION_TEMPORARY, Messaging),
        (MESSAGING_MESSAGE_ID, Messaging),
        (MESSAGING_MESSAGE_TYPE, Messaging),
        (MESSAGING_MESSAGE_PAYLOAD_SIZE_BYTES, Messaging),
        (MESSAGING_MESSAGE_PAYLOAD_COMPRESSED_SIZE_BYTES, Messaging),
        (CLOUD_PROVIDER, Cloud),
        (CLOUD_ACCOUNT_ID, Cloud),
        (CLOUD_REGION, Cloud),
        (CLOUD_RESOURCE_ID, Cloud),
        (CLOUD_AVAILABILITY_ZONE, Cloud),
        (CLOUD_PLATFORM, Cloud),
    ]
};

static REGISTRY: LazyLock<FxHashMap<&'static str, KeyInfo>> = LazyLock::new(|| {
    KEYS.iter()
        .map(|&(key, category)| (key, KeyInfo { key, category }))
        .collect()
});

/// Look up a known key. `None` means the key is an opaque attribute.
pub fn lookup(key: &str) -> Option<KeyInfo> {
    REGISTRY.get(key).copied()
}

/// Number of registered keys
pub fn len() -> usize {
    REGISTRY.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_unique() {
        assert_eq!(len(), KEYS.len(), "duplicate key in registry");
    }

    #[test]
    fn test_lookup_intrinsic() {
        let info = lookup(SPAN_GROUP_ID).unwrap();
        assert_eq!(info.category, KeyCategory::SpanIntrinsic);
    }

    #[test]
    fn test_lookup_semantic() {
        let info = lookup("http_request_method").unwrap();
        assert_eq!(info.key, HTTP_REQUEST_METHOD);
        assert_eq!(info.category, KeyCategory::Http);
    }

    #[test]
    fn test_lookup_unknown_is_none() {
        assert!(lookup("my_custom_attr").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn test_metrics_are_not_intrinsic() {
        for key in [SPAN_COUNT, SPAN_COUNT_PER_MIN, SPAN_ERROR_COUNT, SPAN_ERROR_RATE] {
            assert_eq!(lookup(key).unwrap().category, KeyCategory::SpanMetric);
        }
    }
}
